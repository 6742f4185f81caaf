use burn::{
    data::{dataloader::batcher::Batcher, dataset::vision::ImageDatasetItem},
    module::Module,
    prelude::*,
    record::CompactRecorder,
};

use crate::{
    data::{TextAngleBatch, TextAngleBatcher},
    model::TextAngleClassifier,
    training::MODEL_FILE,
};

/// Loads the trained weights from `artifact_dir` and classifies a single
/// image, returning the predicted rotation class in {0, 1, 2, 3}.
///
/// The saved artifact holds parameters only, so the identical architecture is
/// rebuilt here before loading.
pub fn infer<B: Backend>(artifact_dir: &str, device: B::Device, item: ImageDatasetItem) -> usize {
    let model = TextAngleClassifier::<B>::new(&device)
        .load_file(
            format!("{artifact_dir}/{MODEL_FILE}"),
            &CompactRecorder::new(),
            &device,
        )
        .expect("Trained model weights should be loaded");

    let batch: TextAngleBatch<B> = TextAngleBatcher.batch(vec![item], &device);
    let output = model.forward(batch.images);

    output
        .argmax(1)
        .flatten::<1>(0, 1)
        .into_scalar()
        .elem::<i64>() as usize
}
