//! Frame-accurate video decoding and encoding.
//!
//! The pipeline only sees RGB frames; backends translate to and from the
//! container format.

#[cfg(feature = "backend-opencv")]
pub mod opencv_backend;

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;

use crate::error::{PipelineError, Result};

/// Frame rate used when the container does not report a usable one
pub const DEFAULT_FPS: f64 = 25.0;

/// Codec used for annotated output videos
pub const OUTPUT_FOURCC: [char; 4] = ['m', 'p', '4', 'v'];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProps {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoProps {
    /// Build properties, falling back to [`DEFAULT_FPS`] for a zero or
    /// non-finite rate
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { DEFAULT_FPS };
        Self { width, height, fps }
    }
}

/// Decoded input stream
pub trait VideoSource {
    fn props(&self) -> VideoProps;

    /// Next frame in presentation order, `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Encoded output stream
pub trait VideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close the output file
    fn finish(self: Box<Self>) -> Result<()>;
}

pub trait VideoBackend: Send + Sync {
    fn open_source(&self, path: &Path) -> Result<Box<dyn VideoSource>>;

    fn create_sink(&self, path: &Path, props: VideoProps) -> Result<Box<dyn VideoSink>>;
}

pub type DynVideoBackend = Arc<dyn VideoBackend>;

/// Backend used when no video support is compiled in
#[derive(Debug, Default, Clone)]
pub struct UnavailableBackend;

impl VideoBackend for UnavailableBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        Err(PipelineError::Decode(format!(
            "cannot open {}: video support not compiled in (enable the backend-opencv feature)",
            path.display()
        )))
    }

    fn create_sink(&self, path: &Path, _props: VideoProps) -> Result<Box<dyn VideoSink>> {
        Err(PipelineError::Decode(format!(
            "cannot create {}: video support not compiled in (enable the backend-opencv feature)",
            path.display()
        )))
    }
}

/// The best backend available in this build
pub fn default_backend() -> DynVideoBackend {
    #[cfg(feature = "backend-opencv")]
    {
        Arc::new(opencv_backend::OpenCvBackend)
    }
    #[cfg(not(feature = "backend-opencv"))]
    {
        Arc::new(UnavailableBackend)
    }
}
