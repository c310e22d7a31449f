use std::sync::Arc;

use log::info;

use crate::error::Result;
use crate::history::HistoryStore;
use crate::models::{DetectionOutcome, DetectionRecord};
use crate::pipeline::{MediaPipeline, UploadedFile};

/// Process-wide application context.
///
/// Built once at startup so the models are loaded a single time, then
/// shared with every request handler.
pub struct DetectionService {
    pipeline: MediaPipeline,
    history: HistoryStore,
}

pub type SharedService = Arc<DetectionService>;

impl DetectionService {
    pub fn new(pipeline: MediaPipeline, history: HistoryStore) -> Self {
        Self { pipeline, history }
    }

    /// Run an upload through the pipeline and log any non-empty reading
    pub fn detect(&self, upload: &UploadedFile) -> Result<DetectionOutcome> {
        let outcome = self.pipeline.process(upload)?;

        match outcome.plate_number.as_deref() {
            Some(plate) if !plate.is_empty() => {
                self.history
                    .record(plate, outcome.confidence, &outcome.output_file)?;
                info!(
                    "Detected plate {} ({:?}) in {}",
                    plate, outcome.confidence, upload.filename
                );
            }
            _ => info!("No plate read in {}", upload.filename),
        }

        Ok(outcome)
    }

    pub fn history(&self) -> Vec<DetectionRecord> {
        self.history.read_all()
    }
}
