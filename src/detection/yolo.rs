use std::path::Path;

use anyhow::Context;
use image::RgbImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;

use crate::detection::{PlateDetector, preprocessing};
use crate::error::{PipelineError, Result};
use crate::models::DetectionRegion;

/// Tuning for the YOLO plate detector
#[derive(Debug, Clone)]
pub struct YoloParams {
    /// Square input edge expected by the model (640 for stock exports)
    pub input_size: u32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

/// Plate detector backed by a YOLO-style model exported to `.rten`.
///
/// The model takes a `[1, 3, S, S]` RGB tensor and yields `[1, 4 + C, N]`
/// predictions: box centre, width and height in input pixels followed by one
/// score per class.
pub struct YoloPlateDetector {
    model: Model,
    params: YoloParams,
}

impl YoloPlateDetector {
    pub fn load(model_path: &Path, params: YoloParams) -> anyhow::Result<Self> {
        if !model_path.exists() {
            anyhow::bail!(
                "Plate detector model not found at {}",
                model_path.display()
            );
        }

        let model = Model::load_file(model_path)
            .with_context(|| format!("Failed to load detector model {:?}", model_path))?;

        Ok(Self { model, params })
    }
}

impl PlateDetector for YoloPlateDetector {
    fn detect(&self, frame: &RgbImage, min_confidence: f32) -> Result<Vec<DetectionRegion>> {
        let size = self.params.input_size;
        let data = preprocessing::to_chw_tensor(frame, size);
        let input = NdTensor::from_data([1, 3, size as usize, size as usize], data);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| PipelineError::ModelInvocation(format!("detector: {}", e)))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| PipelineError::ModelInvocation(format!("detector output: {:?}", e)))?;

        let [_, channels, anchors] = output.shape();
        let scale_x = frame.width() as f32 / size as f32;
        let scale_y = frame.height() as f32 / size as f32;

        let candidates = decode_predictions(
            &output.to_vec(),
            channels,
            anchors,
            (scale_x, scale_y),
            min_confidence,
        );
        Ok(non_max_suppression(
            candidates,
            self.params.iou_threshold,
            self.params.max_detections,
        ))
    }
}

/// Turn raw `[4 + C, N]` predictions into frame-space regions.
pub fn decode_predictions(
    data: &[f32],
    channels: usize,
    anchors: usize,
    scale: (f32, f32),
    min_confidence: f32,
) -> Vec<DetectionRegion> {
    if channels < 5 || data.len() < channels * anchors {
        return Vec::new();
    }

    let at = |channel: usize, anchor: usize| data[channel * anchors + anchor];
    let mut regions = Vec::new();

    for anchor in 0..anchors {
        let score = (4..channels)
            .map(|class| at(class, anchor))
            .fold(f32::MIN, f32::max);
        if score < min_confidence {
            continue;
        }

        let (cx, cy) = (at(0, anchor), at(1, anchor));
        let (w, h) = (at(2, anchor), at(3, anchor));
        regions.push(DetectionRegion::new(
            ((cx - w / 2.0) * scale.0) as i32,
            ((cy - h / 2.0) * scale.1) as i32,
            ((cx + w / 2.0) * scale.0) as i32,
            ((cy + h / 2.0) * scale.1) as i32,
            score,
        ));
    }

    regions
}

/// Greedy NMS. Output is ordered by descending confidence.
pub fn non_max_suppression(
    mut regions: Vec<DetectionRegion>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<DetectionRegion> {
    regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<DetectionRegion> = Vec::new();
    for region in regions {
        if keep.len() >= max_detections {
            break;
        }
        if keep.iter().all(|kept| kept.iou(&region) <= iou_threshold) {
            keep.push(region);
        }
    }
    keep
}
