//! Error types for the detection pipeline

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Failed to decode media: {0}")]
    Decode(String),

    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History store error: {0}")]
    History(String),
}

impl PipelineError {
    /// Whether the caller is at fault (maps to a 4xx response)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidRequest(_) | PipelineError::UnsupportedMediaType(_)
        )
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
