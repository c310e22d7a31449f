use serde::{Deserialize, Serialize};

/// One plate bounding box reported by the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionRegion {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub confidence: f32,
}

impl DetectionRegion {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> Self {
        Self { x1, y1, x2, y2, confidence }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Clamp the box to a `width` x `height` frame.
    ///
    /// Returns `(x, y, w, h)` suitable for cropping, or `None` when nothing
    /// of the box lies inside the frame.
    pub fn clamped(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.x1.clamp(0, width as i32) as u32;
        let y1 = self.y1.clamp(0, height as i32) as u32;
        let x2 = self.x2.clamp(0, width as i32) as u32;
        let y2 = self.y2.clamp(0, height as i32) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }

    /// Intersection over union with another region
    pub fn iou(&self, other: &DetectionRegion) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = ((ix2 - ix1).max(0) as f32) * ((iy2 - iy1).max(0) as f32);
        let area_a = (self.width().max(0) * self.height().max(0)) as f32;
        let area_b = (other.width().max(0) * other.height().max(0)) as f32;
        let union = area_a + area_b - inter;

        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

/// A line of text found by the recognizer inside a crop
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    /// Index of the text line within the crop, top to bottom
    pub line: usize,
}

/// Best-effort plate reading for one region
#[derive(Debug, Clone, PartialEq)]
pub struct PlateReading {
    pub text: String,
    pub confidence: f64,
}

/// Persisted detection event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub plate_number: String,
    pub confidence: Option<f64>,
    pub image_path: String,
    pub timestamp: String,
}

/// Result of running one upload through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub plate_number: Option<String>,
    pub confidence: Option<f64>,
    pub output_file: String,
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
