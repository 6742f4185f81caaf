use std::{
    fs,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Config snapshot sent once when a run is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub scheduler: String,
}

/// Per-epoch scalar summary reported to the experiment tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub learning_rate: f64,
}

/// Handle to a single experiment-tracking run.
///
/// Created once per training run and passed explicitly to whoever reports
/// metrics; there is no process-wide run singleton. The run materializes as a
/// directory holding the config snapshot (`config.json`), one JSON line per
/// epoch (`metrics.jsonl`) and a completion marker (`finished`), ready for an
/// external tracker's offline importer.
pub struct TrackingRun {
    directory: PathBuf,
    metrics: BufWriter<File>,
}

impl TrackingRun {
    /// Creates the run directory and writes the config snapshot, tagged with
    /// the owning entity and project.
    pub fn create<P: AsRef<Path>>(
        directory: P,
        entity: &str,
        project: &str,
        config: &RunConfig,
    ) -> std::io::Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;

        let snapshot = serde_json::json!({
            "entity": entity,
            "project": project,
            "config": config,
        });
        fs::write(
            directory.join("config.json"),
            serde_json::to_string_pretty(&snapshot)?,
        )?;

        let metrics = BufWriter::new(File::create(directory.join("metrics.jsonl"))?);

        Ok(Self { directory, metrics })
    }

    /// Appends one epoch record to the run.
    pub fn log_epoch(&mut self, record: &EpochRecord) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.metrics, record)?;
        writeln!(self.metrics)
    }

    /// Finalizes the run, flushing metrics and writing the completion marker.
    pub fn finish(mut self) -> std::io::Result<()> {
        self.metrics.flush()?;
        fs::write(self.directory.join("finished"), "")
    }
}
