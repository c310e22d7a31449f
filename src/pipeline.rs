use std::fs;
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use log::{debug, info};
use uuid::Uuid;

use crate::annotate::{FrameAnnotator, format_label};
use crate::detection::{PlateDetector, TextRecognizer, preprocessing};
use crate::error::{PipelineError, Result};
use crate::models::{DetectionOutcome, DetectionRegion, PlateReading, round2};
use crate::storage::StorageLayout;
use crate::video::{DynVideoBackend, VideoProps};

/// Detector cutoff used unless configured otherwise
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.4;

/// Label used when OCR finds nothing in a still image
pub const IMAGE_SENTINEL: &str = "Not Read";

/// Label used when OCR finds nothing in a video frame
pub const VIDEO_SENTINEL: &str = "Reading";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "m4v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a lowercase extension against the allow-list
    pub fn from_extension(ext: &str) -> Result<Self> {
        if IMAGE_EXTENSIONS.contains(&ext) {
            Ok(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Ok(MediaKind::Video)
        } else if ext.is_empty() {
            Err(PipelineError::UnsupportedMediaType("missing extension".to_string()))
        } else {
            Err(PipelineError::UnsupportedMediaType(ext.to_string()))
        }
    }
}

/// Lowercased text after the last `.` of a filename, empty if none
pub fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// A file received from a client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }
}

/// Video run summary, mostly useful to callers checking frame parity
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSummary {
    pub props: VideoProps,
    pub frames: usize,
    pub reading: Option<PlateReading>,
}

/// Detect → crop → recognize → annotate over images and videos
pub struct MediaPipeline {
    detector: Arc<dyn PlateDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    annotator: Arc<FrameAnnotator>,
    video: DynVideoBackend,
    storage: StorageLayout,
    min_confidence: f32,
}

impl MediaPipeline {
    pub fn new(
        detector: Arc<dyn PlateDetector>,
        recognizer: Arc<dyn TextRecognizer>,
        annotator: FrameAnnotator,
        video: DynVideoBackend,
        storage: StorageLayout,
    ) -> Self {
        Self {
            detector,
            recognizer,
            annotator: Arc::new(annotator),
            video,
            storage,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Save the upload, run the matching media path and return the reading
    /// together with the annotated output location
    pub fn process(&self, upload: &UploadedFile) -> Result<DetectionOutcome> {
        if upload.filename.is_empty() {
            return Err(PipelineError::InvalidRequest("Empty filename".to_string()));
        }

        let ext = extension_of(&upload.filename);
        let kind = MediaKind::from_extension(&ext)?;
        let uid = Uuid::new_v4();

        let upload_path = self.storage.upload_path(&uid, &ext);
        fs::write(&upload_path, &upload.data)?;
        info!(
            "Processing {} as {:?} ({} bytes) -> {}",
            upload.filename,
            kind,
            upload.data.len(),
            uid
        );

        let (reading, output_path) = match kind {
            MediaKind::Image => {
                let output_path = self.storage.image_output_path(&uid);
                let reading = self.process_image(&upload_path, &output_path)?;
                (reading, output_path)
            }
            MediaKind::Video => {
                let output_path = self.storage.video_output_path(&uid);
                let summary = self.process_video(&upload_path, &output_path)?;
                (summary.reading, output_path)
            }
        };

        Ok(DetectionOutcome {
            plate_number: reading.as_ref().map(|r| r.text.clone()),
            confidence: reading.map(|r| round2(r.confidence)),
            output_file: output_path.display().to_string(),
        })
    }

    /// Annotate a still image. The reading of the last region wins.
    pub fn process_image(&self, input: &Path, output: &Path) -> Result<Option<PlateReading>> {
        let mut frame = ImageReader::open(input)?
            .with_guessed_format()?
            .decode()?
            .to_rgb8();

        let reading = self.scan_frame(&mut frame, IMAGE_SENTINEL)?.map(|r| PlateReading {
            confidence: round2(r.confidence),
            ..r
        });

        DynamicImage::ImageRgb8(frame)
            .save_with_format(output, ImageFormat::Jpeg)
            .map_err(|e| {
                PipelineError::Io(std::io::Error::other(format!(
                    "failed to write {}: {}",
                    output.display(),
                    e
                )))
            })?;

        Ok(reading)
    }

    /// Annotate every frame of a video, keeping frame count and timing.
    ///
    /// The reading is the last region of the last frame with any detection.
    pub fn process_video(&self, input: &Path, output: &Path) -> Result<VideoSummary> {
        let mut source = self.video.open_source(input)?;
        let props = source.props();
        let mut sink = self.video.create_sink(output, props)?;

        let mut last_reading = None;
        let mut frames = 0;

        while let Some(mut frame) = source.next_frame()? {
            if let Some(reading) = self.scan_frame(&mut frame, VIDEO_SENTINEL)? {
                last_reading = Some(reading);
            }
            sink.write_frame(&frame)?;
            frames += 1;
        }
        sink.finish()?;

        debug!(
            "Wrote {} frames ({}x{} @ {:.2} fps) to {}",
            frames,
            props.width,
            props.height,
            props.fps,
            output.display()
        );

        Ok(VideoSummary {
            props,
            frames,
            reading: last_reading,
        })
    }

    /// Run detection and OCR on one frame and draw every region onto it.
    ///
    /// All crops are read from the frame before anything is drawn. Returns
    /// the reading of the last region with its raw confidence.
    pub fn scan_frame(&self, frame: &mut RgbImage, sentinel: &str) -> Result<Option<PlateReading>> {
        let regions = self.detector.detect(frame, self.min_confidence)?;

        let mut labelled: Vec<(DetectionRegion, PlateReading)> = Vec::with_capacity(regions.len());
        for region in regions {
            let text = self
                .read_region(frame, &region)?
                .unwrap_or_else(|| sentinel.to_string());
            debug!(
                "Region ({}, {})-({}, {}) conf {:.3}: {}",
                region.x1, region.y1, region.x2, region.y2, region.confidence, text
            );
            labelled.push((
                region,
                PlateReading {
                    text,
                    confidence: region.confidence as f64,
                },
            ));
        }

        for (region, reading) in &labelled {
            let label = format_label(&reading.text, reading.confidence);
            self.annotator.annotate(frame, region, &label);
        }

        Ok(labelled.pop().map(|(_, reading)| reading))
    }

    fn read_region(&self, frame: &RgbImage, region: &DetectionRegion) -> Result<Option<String>> {
        let Some((x, y, width, height)) = region.clamped(frame.width(), frame.height()) else {
            return Ok(None);
        };

        let crop = preprocessing::crop(frame, x, y, width, height);
        let texts = self.recognizer.recognize(&crop)?;
        Ok(texts.into_iter().next().map(|t| t.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased_last_segment() {
        assert_eq!(extension_of("car.JPG"), "jpg");
        assert_eq!(extension_of("archive.tar.mp4"), "mp4");
        assert_eq!(extension_of("noext"), "");
    }

    #[test]
    fn media_kind_uses_allow_list() {
        assert_eq!(MediaKind::from_extension("jpeg").unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_extension("png").unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_extension("mp4").unwrap(), MediaKind::Video);
        assert!(matches!(
            MediaKind::from_extension("exe"),
            Err(PipelineError::UnsupportedMediaType(ext)) if ext == "exe"
        ));
        assert!(matches!(
            MediaKind::from_extension(""),
            Err(PipelineError::UnsupportedMediaType(_))
        ));
    }
}
