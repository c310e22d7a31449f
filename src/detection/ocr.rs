use std::path::{Path, PathBuf};

use image::RgbImage;
use image::imageops::{self, FilterType};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;

use crate::detection::TextRecognizer;
use crate::error::{PipelineError, Result};
use crate::models::RecognizedText;

/// Crops shorter than this are upscaled before OCR
const MIN_CROP_HEIGHT: u32 = 64;

/// Default location of the ocrs model files
pub fn default_model_dir() -> PathBuf {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home_dir).join(".cache/ocrs")
}

/// Initialize the OCR engine from `text-detection.rten` and
/// `text-recognition.rten` inside `model_dir`
pub fn init_ocr_engine(model_dir: &Path) -> anyhow::Result<OcrEngine> {
    let detection_model_path = model_dir.join("text-detection.rten");
    let recognition_model_path = model_dir.join("text-recognition.rten");

    if !detection_model_path.exists() || !recognition_model_path.exists() {
        anyhow::bail!(
            "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
             Expected locations:\n  - {}\n  - {}",
            detection_model_path.display(),
            recognition_model_path.display()
        );
    }

    let detection_model = Model::load_file(&detection_model_path)?;
    let recognition_model = Model::load_file(&recognition_model_path)?;

    let engine = OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })?;

    Ok(engine)
}

/// Scale small crops up so the text detector has something to work with
pub fn prepare_crop(crop: &RgbImage) -> RgbImage {
    let (width, height) = crop.dimensions();
    if height >= MIN_CROP_HEIGHT || height == 0 {
        return crop.clone();
    }

    let scale = MIN_CROP_HEIGHT as f32 / height as f32;
    let scaled_w = ((width as f32 * scale) as u32).max(1);
    imageops::resize(crop, scaled_w, MIN_CROP_HEIGHT, FilterType::CatmullRom)
}

/// Text recognizer backed by the ocrs engine
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    pub fn new(engine: OcrEngine) -> Self {
        Self { engine }
    }

    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(init_ocr_engine(model_dir)?))
    }
}

impl TextRecognizer for OcrsRecognizer {
    fn recognize(&self, crop: &RgbImage) -> Result<Vec<RecognizedText>> {
        let img = prepare_crop(crop);

        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())
            .map_err(|e| PipelineError::ModelInvocation(format!("ocr input: {}", e)))?;
        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| PipelineError::ModelInvocation(format!("ocr input: {}", e)))?;

        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| PipelineError::ModelInvocation(format!("ocr detection: {}", e)))?;
        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);
        let lines = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| PipelineError::ModelInvocation(format!("ocr recognition: {}", e)))?;

        Ok(lines
            .into_iter()
            .enumerate()
            .filter_map(|(line, text_line)| {
                let text = text_line?.to_string().trim().to_string();
                (!text.is_empty()).then_some(RecognizedText { text, line })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn prepare_crop_upscales_short_crops() {
        let crop = RgbImage::from_pixel(40, 16, Rgb([255, 255, 255]));
        let prepared = prepare_crop(&crop);
        assert_eq!(prepared.dimensions(), (160, MIN_CROP_HEIGHT));
    }

    #[test]
    fn prepare_crop_leaves_large_crops_alone() {
        let crop = RgbImage::from_pixel(200, 80, Rgb([0, 0, 0]));
        assert_eq!(prepare_crop(&crop).dimensions(), (200, 80));
    }

    #[test]
    fn missing_models_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = init_ocr_engine(dir.path()).err().unwrap();
        assert!(err.to_string().contains("OCR models not found"));
    }
}
