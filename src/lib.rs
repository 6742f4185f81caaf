//! Trains a small convolutional network that classifies the rotation angle of
//! scanned 32x32 text tiles (0°, 90°, 180° or 270°) and exports the trained
//! weights for deployment in a lightweight inference runtime.

pub mod data;
pub mod dataset;
pub mod inference;
pub mod lr;
pub mod model;
pub mod tracking;
pub mod training;
