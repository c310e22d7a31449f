pub mod annotate;
pub mod config;
pub mod detection;
pub mod error;
pub mod history;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod service;
pub mod storage;
pub mod video;

pub use annotate::FrameAnnotator;
pub use config::ServerConfig;
pub use detection::{PlateDetector, TextRecognizer};
pub use error::PipelineError;
pub use history::HistoryStore;
pub use models::{DetectionOutcome, DetectionRecord, DetectionRegion, PlateReading, RecognizedText};
pub use pipeline::{MediaKind, MediaPipeline, UploadedFile};
pub use service::{DetectionService, SharedService};
pub use storage::StorageLayout;
