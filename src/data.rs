use burn::{
    data::{
        dataloader::batcher::Batcher,
        dataset::vision::{Annotation, ImageDatasetItem, PixelDepth},
    },
    prelude::*,
};

use crate::model::{CHANNELS, IMAGE_SIZE};

/// Assembles image-folder items into training batches.
///
/// Each image is converted to single-channel grayscale and scaled to [0, 1].
/// Images are assumed pre-sized to 32x32; anything else is a fatal error.
#[derive(Clone, Default)]
pub struct TextAngleBatcher;

#[derive(Clone, Debug)]
pub struct TextAngleBatch<B: Backend> {
    /// Images of shape `[batch_size, 1, 32, 32]`, values in [0, 1].
    pub images: Tensor<B, 4>,
    /// Rotation class per sample, in {0, 1, 2, 3}.
    pub targets: Tensor<B, 1, Int>,
}

fn pixel_value(pixel: &PixelDepth) -> f32 {
    match pixel {
        PixelDepth::U8(value) => *value as f32 / u8::MAX as f32,
        PixelDepth::U16(value) => *value as f32 / u16::MAX as f32,
        PixelDepth::F32(value) => *value,
    }
}

/// Converts an interleaved HWC pixel buffer to a grayscale plane in [0, 1].
///
/// Single-channel sources pass through, gray+alpha sources keep the gray
/// plane, and RGB(A) sources are reduced with the ITU-R 601-2 luma transform,
/// matching the original dataset preprocessing.
fn to_grayscale(pixels: &[PixelDepth]) -> Vec<f32> {
    let num_pixels = IMAGE_SIZE * IMAGE_SIZE;
    assert!(
        !pixels.is_empty() && pixels.len() % num_pixels == 0,
        "image must be {IMAGE_SIZE}x{IMAGE_SIZE}, got {} values",
        pixels.len()
    );

    let channels = pixels.len() / num_pixels;
    match channels {
        1 => pixels.iter().map(pixel_value).collect(),
        2 => (0..num_pixels)
            .map(|i| pixel_value(&pixels[i * 2]))
            .collect(),
        3 | 4 => (0..num_pixels)
            .map(|i| {
                let r = pixel_value(&pixels[i * channels]);
                let g = pixel_value(&pixels[i * channels + 1]);
                let b = pixel_value(&pixels[i * channels + 2]);
                0.299 * r + 0.587 * g + 0.114 * b
            })
            .collect(),
        _ => panic!("unsupported channel count: {channels}"),
    }
}

impl<B: Backend> Batcher<B, ImageDatasetItem, TextAngleBatch<B>> for TextAngleBatcher {
    fn batch(&self, items: Vec<ImageDatasetItem>, device: &B::Device) -> TextAngleBatch<B> {
        let targets = items
            .iter()
            .map(|item| match item.annotation {
                Annotation::Label(label) => Tensor::<B, 1, Int>::from_data(
                    TensorData::from([(label as i64).elem::<B::IntElem>()]),
                    device,
                ),
                _ => panic!("expected a class label annotation"),
            })
            .collect();

        let images = items
            .iter()
            .map(|item| {
                TensorData::new(
                    to_grayscale(&item.image),
                    Shape::new([CHANNELS, IMAGE_SIZE, IMAGE_SIZE]),
                )
            })
            .map(|data| Tensor::<B, 3>::from_data(data.convert::<B::FloatElem>(), device))
            .collect();

        TextAngleBatch {
            images: Tensor::stack(images, 0),
            targets: Tensor::cat(targets, 0),
        }
    }
}
