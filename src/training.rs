use burn::{
    config::Config,
    data::dataloader::DataLoaderBuilder,
    lr_scheduler::LrScheduler,
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::{BinFileRecorder, CompactRecorder, FullPrecisionSettings},
    tensor::{backend::AutodiffBackend, Distribution},
};

use crate::{
    data::TextAngleBatcher,
    dataset,
    lr::OneCycleLrConfig,
    model::{TextAngleClassifier, CHANNELS, IMAGE_SIZE, NUM_CLASSES},
    tracking::{EpochRecord, RunConfig, TrackingRun},
};

/// Base name of the weights-only artifact (no optimizer state, no
/// architecture description; the loading side rebuilds the architecture).
pub const MODEL_FILE: &str = "text_angle_classifier";

/// Base name of the full-precision record consumed by the embedded runtime's
/// offline conversion step.
pub const EXPORT_FILE: &str = "text_angle_classifier_export";

#[derive(Config)]
pub struct TrainingConfig {
    pub optimizer: AdamConfig,
    #[config(default = 500)]
    pub num_epochs: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Peak learning rate of the one-cycle schedule.
    #[config(default = 5e-3)]
    pub max_lr: f64,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    /// Save an intermediate copy of the weights every N epochs.
    pub checkpoint_every: Option<usize>,
}

/// Validation accuracy as a percentage.
fn accuracy(correct: i64, total: usize) -> f64 {
    100.0 * correct as f64 / total as f64
}

/// Runs the full training procedure: pooled dataset loading, the one-cycle
/// optimization loop with per-epoch validation and metric reporting, and the
/// final weight/export artifacts under `artifact_dir`.
///
/// `data_dir` is the image root holding the four fixed class-folder layouts
/// (`synth/train`, `synth/val`, `real/train`, `real/val`).
///
/// Failures are fatal: missing datasets, shape mismatches or I/O errors
/// terminate the process with a diagnostic. There is no retry logic.
pub fn train<B: AutodiffBackend>(
    artifact_dir: &str,
    data_dir: &str,
    config: TrainingConfig,
    device: B::Device,
) {
    std::fs::create_dir_all(artifact_dir).ok();
    config
        .save(format!("{artifact_dir}/config.json"))
        .expect("Config should be saved successfully");

    B::seed(config.seed);

    // Batches must be assembled on the same device as the model; a mismatch
    // is a fatal error on the first forward pass.
    let dataloader_train = DataLoaderBuilder::<B, _, _>::new(TextAngleBatcher)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(dataset::train_split(data_dir).expect("Training dataset should be loaded"));

    let dataloader_valid = DataLoaderBuilder::<B::InnerBackend, _, _>::new(TextAngleBatcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(dataset::val_split(data_dir).expect("Validation dataset should be loaded"));

    // The schedule spans the entire run: it is stepped once per training
    // batch, not once per epoch.
    let steps_per_epoch = dataloader_train.num_items().div_ceil(config.batch_size);
    let num_iters = config.num_epochs * steps_per_epoch;
    log::info!("{steps_per_epoch} steps per epoch, {num_iters} total");

    let mut model = TextAngleClassifier::<B>::new(&device);
    let mut optim = config.optimizer.init::<B, TextAngleClassifier<B>>();
    let mut scheduler = OneCycleLrConfig::new(config.max_lr, num_iters).init();
    let loss_train = CrossEntropyLossConfig::new().init::<B>(&device);
    let loss_valid = CrossEntropyLossConfig::new().init::<B::InnerBackend>(&device);

    let mut run = TrackingRun::create(
        format!("{artifact_dir}/run"),
        "wefi",
        "docangle",
        &RunConfig {
            learning_rate: config.learning_rate,
            epochs: config.num_epochs,
            batch_size: config.batch_size,
            scheduler: "one-cycle".to_string(),
        },
    )
    .expect("Tracking run should be created");

    for epoch in 1..=config.num_epochs {
        // Training pass. On the autodiff backend batch norm uses per-batch
        // statistics and updates its running estimates.
        let mut train_loss_sum = 0.0;
        let mut train_batches = 0;

        for batch in dataloader_train.iter() {
            let output = model.forward(batch.images);
            let loss = loss_train.forward(output, batch.targets);
            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            let lr = scheduler.step();
            model = optim.step(lr, model, grads);
        }

        // The rate active after the epoch's final step, i.e. the one the next
        // batch will train at.
        let last_lr = scheduler.peek();

        // Validation pass on the inner backend: no gradient tracking, batch
        // norm frozen to its accumulated running statistics.
        let model_valid = model.valid();
        let mut val_loss_sum = 0.0;
        let mut correct = 0;
        let mut total = 0;

        for batch in dataloader_valid.iter() {
            let [batch_size] = batch.targets.dims();
            let output = model_valid.forward(batch.images);
            let loss = loss_valid.forward(output.clone(), batch.targets.clone());
            // Weight by batch size so the epoch average is per sample even
            // when the last batch is short.
            val_loss_sum += loss.into_scalar().elem::<f64>() * batch_size as f64;

            let predictions = output.argmax(1).flatten::<1>(0, 1);
            correct += predictions
                .equal(batch.targets)
                .int()
                .sum()
                .into_scalar()
                .elem::<i64>();
            total += batch_size;
        }

        let train_loss = train_loss_sum / train_batches as f64;
        let val_loss = val_loss_sum / total as f64;
        let val_accuracy = accuracy(correct, total);

        println!(
            "Epoch {epoch}/{}, Loss: {train_loss:.4}, Validation Loss: {val_loss:.4}, \
             Validation Accuracy: {val_accuracy:.2}%, LR: {last_lr:.6}",
            config.num_epochs
        );
        run.log_epoch(&EpochRecord {
            epoch,
            train_loss,
            val_loss,
            val_accuracy,
            learning_rate: last_lr,
        })
        .expect("Epoch metrics should be recorded");

        if let Some(every) = config.checkpoint_every {
            if epoch % every == 0 {
                model
                    .clone()
                    .save_file(
                        format!("{artifact_dir}/checkpoint-{epoch}"),
                        &CompactRecorder::new(),
                    )
                    .expect("Checkpoint should be saved successfully");
            }
        }
    }

    run.finish().expect("Tracking run should be finalized");

    model
        .clone()
        .save_file(format!("{artifact_dir}/{MODEL_FILE}"), &CompactRecorder::new())
        .expect("Trained model should be saved successfully");

    export::<B>(artifact_dir, model, &device);
}

/// Produces the frozen export artifact for the embedded inference runtime.
///
/// The forward pass is exercised once at the exact deployment input shape
/// before the full-precision record is written, so a shape regression fails
/// here rather than on the device.
fn export<B: AutodiffBackend>(
    artifact_dir: &str,
    model: TextAngleClassifier<B>,
    device: &B::Device,
) {
    let model = model.valid();
    let example_input = Tensor::<B::InnerBackend, 4>::random(
        [1, CHANNELS, IMAGE_SIZE, IMAGE_SIZE],
        Distribution::Default,
        device,
    );
    let logits = model.forward(example_input);
    assert_eq!(logits.dims(), [1, NUM_CLASSES]);

    model
        .save_file(
            format!("{artifact_dir}/{EXPORT_FILE}"),
            &BinFileRecorder::<FullPrecisionSettings>::default(),
        )
        .expect("Export record should be saved successfully");
    println!("Model exported as '{artifact_dir}/{EXPORT_FILE}.bin'");

    println!("\nTo deploy on the embedded inference runtime:");
    println!("1. Copy {EXPORT_FILE}.bin into the inference crate and embed it with include_bytes!.");
    println!("2. Load it through a BinBytesRecorder with full precision settings.");
    println!("3. Rebuild the identical architecture with TextAngleClassifier::new before loading.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lr::OneCycleLrConfig;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
    use burn::data::dataset::vision::{Annotation, ImageDatasetItem, PixelDepth};
    use burn::data::dataset::InMemDataset;
    use burn::tensor::Int;

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn fixed_batch(
        device: &NdArrayDevice,
    ) -> (Tensor<TestAutodiffBackend, 4>, Tensor<TestAutodiffBackend, 1, Int>) {
        let images = Tensor::random(
            [8, CHANNELS, IMAGE_SIZE, IMAGE_SIZE],
            Distribution::Default,
            device,
        );
        let targets = Tensor::from_ints([0, 1, 2, 3, 0, 1, 2, 3], device);
        (images, targets)
    }

    #[test]
    fn training_steps_decrease_the_loss_on_a_fixed_batch() {
        let device = NdArrayDevice::Cpu;
        TestAutodiffBackend::seed(7);

        let mut model = TextAngleClassifier::<TestAutodiffBackend>::new(&device);
        let mut optim = AdamConfig::new().init::<TestAutodiffBackend, TextAngleClassifier<_>>();
        let mut scheduler = OneCycleLrConfig::new(0.05, 20).init();
        let loss_fn = CrossEntropyLossConfig::new().init::<TestAutodiffBackend>(&device);
        let (images, targets) = fixed_batch(&device);

        let initial_loss = loss_fn
            .forward(model.forward(images.clone()), targets.clone())
            .into_scalar()
            .elem::<f64>();

        for _ in 0..10 {
            let loss = loss_fn.forward(model.forward(images.clone()), targets.clone());
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(scheduler.step(), model, grads);
        }

        let final_loss = loss_fn
            .forward(model.forward(images.clone()), targets)
            .into_scalar()
            .elem::<f64>();

        assert!(
            final_loss < initial_loss,
            "loss must decrease on the batch being fitted: {initial_loss} -> {final_loss}"
        );
    }

    #[test]
    fn dataloader_delivers_batches_on_the_configured_device() {
        let device = NdArrayDevice::Cpu;
        let items: Vec<ImageDatasetItem> = (0..4)
            .map(|i| ImageDatasetItem {
                image: vec![PixelDepth::U8(i as u8 * 60); IMAGE_SIZE * IMAGE_SIZE],
                annotation: Annotation::Label(i % NUM_CLASSES),
                image_path: format!("{}/tile.png", i % NUM_CLASSES),
                image_width: IMAGE_SIZE,
                image_height: IMAGE_SIZE,
            })
            .collect();

        let dataloader = DataLoaderBuilder::<TestBackend, _, _>::new(TextAngleBatcher)
            .batch_size(2)
            .set_device(device.clone())
            .build(InMemDataset::new(items));

        let mut batches = 0;
        for batch in dataloader.iter() {
            assert_eq!(batch.images.device(), device);
            assert_eq!(batch.targets.device(), device);
            batches += 1;
        }
        assert_eq!(batches, 2);
    }

    #[test]
    fn accuracy_is_an_exact_percentage() {
        assert_eq!(accuracy(3, 4), 75.0);
        assert_eq!(accuracy(0, 10), 0.0);
        assert_eq!(accuracy(10, 10), 100.0);
    }

    #[test]
    fn saved_parameters_reproduce_inference_outputs() {
        let device = NdArrayDevice::Cpu;
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join(MODEL_FILE);

        let model = TextAngleClassifier::<TestBackend>::new(&device);
        let input = Tensor::<TestBackend, 4>::random(
            [2, CHANNELS, IMAGE_SIZE, IMAGE_SIZE],
            Distribution::Default,
            &device,
        );
        let expected = model.forward(input.clone()).to_data().to_vec::<f32>().unwrap();

        let recorder = BinFileRecorder::<FullPrecisionSettings>::default();
        model
            .save_file(path.clone(), &recorder)
            .expect("model should save");
        let restored = TextAngleClassifier::<TestBackend>::new(&device)
            .load_file(path, &recorder, &device)
            .expect("model should load");

        let actual = restored.forward(input).to_data().to_vec::<f32>().unwrap();
        for (a, e) in actual.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-6, "outputs must match after reload");
        }
    }
}
