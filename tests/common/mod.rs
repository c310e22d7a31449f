#![allow(dead_code, unused_imports)]

mod fixtures;
pub use fixtures::*;

pub use platescan::{DetectionOutcome, DetectionRecord, DetectionRegion, PipelineError, UploadedFile};
