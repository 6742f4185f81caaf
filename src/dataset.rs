use std::path::Path;

use burn::data::dataset::{
    transform::ComposedDataset,
    vision::{ImageFolderDataset, ImageLoaderError},
    Dataset,
};

/// A pooled split combining synthetically generated tiles with real-world
/// scans. The pooling is a plain concatenation; no reweighting.
pub type TextAngleDataset = ComposedDataset<ImageFolderDataset>;

/// Loads the pooled training split from `root` (`synth/train` + `real/train`).
///
/// Each source follows the directory-per-class layout (`0/`, `90/`, `180/`,
/// `270/`) produced by the dataset generator.
pub fn train_split<P: AsRef<Path>>(root: P) -> Result<TextAngleDataset, ImageLoaderError> {
    load_pooled(root.as_ref(), "train")
}

/// Loads the pooled validation split from `root` (`synth/val` + `real/val`).
pub fn val_split<P: AsRef<Path>>(root: P) -> Result<TextAngleDataset, ImageLoaderError> {
    load_pooled(root.as_ref(), "val")
}

fn load_pooled(root: &Path, split: &str) -> Result<TextAngleDataset, ImageLoaderError> {
    let synth = ImageFolderDataset::new_classification(root.join("synth").join(split))?;
    let real = ImageFolderDataset::new_classification(root.join("real").join(split))?;

    log::info!(
        "{split} split: {} synthetic + {} real samples",
        synth.len(),
        real.len()
    );

    Ok(ComposedDataset::new(vec![synth, real]))
}
