pub mod ocr;
pub mod preprocessing;
pub mod yolo;

use image::RgbImage;

use crate::error::Result;
use crate::models::{DetectionRegion, RecognizedText};

pub use ocr::OcrsRecognizer;
pub use yolo::{YoloParams, YoloPlateDetector};

/// Locates plate regions in a frame.
///
/// Implementations are loaded once at startup and shared between requests,
/// so they must be `Send + Sync`.
pub trait PlateDetector: Send + Sync {
    /// Return every region scoring at least `min_confidence`.
    ///
    /// The order of the returned regions is significant: the pipeline keeps
    /// the reading of the last region.
    fn detect(&self, frame: &RgbImage, min_confidence: f32) -> Result<Vec<DetectionRegion>>;
}

/// Reads text out of a cropped plate image.
pub trait TextRecognizer: Send + Sync {
    /// Recognize text lines in `crop`, top to bottom. May be empty.
    fn recognize(&self, crop: &RgbImage) -> Result<Vec<RecognizedText>>;
}
