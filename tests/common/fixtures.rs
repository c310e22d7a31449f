use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use platescan::error::Result;
use platescan::video::{VideoBackend, VideoProps, VideoSink, VideoSource};
use platescan::{
    DetectionRegion, DetectionService, FrameAnnotator, HistoryStore, MediaPipeline, PipelineError,
    PlateDetector, RecognizedText, StorageLayout, TextRecognizer,
};
use tempfile::TempDir;

/// Returns the same regions for every frame
pub struct FixedDetector(pub Vec<DetectionRegion>);

impl PlateDetector for FixedDetector {
    fn detect(&self, _frame: &RgbImage, min_confidence: f32) -> Result<Vec<DetectionRegion>> {
        Ok(self
            .0
            .iter()
            .filter(|r| r.confidence >= min_confidence)
            .copied()
            .collect())
    }
}

/// Finds one plate at (4, 4)-(14, 10) in frames whose top-left red value is
/// non-zero, scoring red / 255
pub struct MarkerDetector;

impl PlateDetector for MarkerDetector {
    fn detect(&self, frame: &RgbImage, min_confidence: f32) -> Result<Vec<DetectionRegion>> {
        let marker = frame.get_pixel(0, 0)[0];
        let confidence = marker as f32 / 255.0;
        if marker == 0 || confidence < min_confidence {
            return Ok(Vec::new());
        }
        Ok(vec![DetectionRegion::new(4, 4, 14, 10, confidence)])
    }
}

pub struct FailingDetector;

impl PlateDetector for FailingDetector {
    fn detect(&self, _frame: &RgbImage, _min_confidence: f32) -> Result<Vec<DetectionRegion>> {
        Err(PipelineError::ModelInvocation("detector offline".to_string()))
    }
}

/// Always reads the same text
pub struct FixedRecognizer(pub &'static str);

impl TextRecognizer for FixedRecognizer {
    fn recognize(&self, _crop: &RgbImage) -> Result<Vec<RecognizedText>> {
        Ok(vec![RecognizedText {
            text: self.0.to_string(),
            line: 0,
        }])
    }
}

/// Reads `W<crop width>` so tests can tell regions apart
pub struct WidthRecognizer;

impl TextRecognizer for WidthRecognizer {
    fn recognize(&self, crop: &RgbImage) -> Result<Vec<RecognizedText>> {
        Ok(vec![
            RecognizedText {
                text: format!("W{}", crop.width()),
                line: 0,
            },
            RecognizedText {
                text: "second line".to_string(),
                line: 1,
            },
        ])
    }
}

/// Never reads anything
pub struct EmptyRecognizer;

impl TextRecognizer for EmptyRecognizer {
    fn recognize(&self, _crop: &RgbImage) -> Result<Vec<RecognizedText>> {
        Ok(Vec::new())
    }
}

/// Frames written by a [`MemoryVideoBackend`] sink
#[derive(Default)]
pub struct WrittenVideo {
    pub props: Option<VideoProps>,
    pub frames: Vec<RgbImage>,
    pub finished: bool,
}

/// Decodes a fixed list of frames regardless of the input file and keeps
/// whatever the pipeline writes
pub struct MemoryVideoBackend {
    pub frames: Vec<RgbImage>,
    pub props: VideoProps,
    pub written: Arc<Mutex<WrittenVideo>>,
}

impl MemoryVideoBackend {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Self {
            frames,
            props: VideoProps::new(width, height, fps),
            written: Arc::new(Mutex::new(WrittenVideo::default())),
        }
    }
}

struct MemorySource {
    frames: std::vec::IntoIter<RgbImage>,
    props: VideoProps,
}

impl VideoSource for MemorySource {
    fn props(&self) -> VideoProps {
        self.props
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.next())
    }
}

struct MemorySink {
    path: std::path::PathBuf,
    written: Arc<Mutex<WrittenVideo>>,
}

impl VideoSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.written.lock().unwrap().frames.push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        std::fs::write(&self.path, b"")?;
        self.written.lock().unwrap().finished = true;
        Ok(())
    }
}

impl VideoBackend for MemoryVideoBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        if !path.exists() {
            return Err(PipelineError::Decode(format!("missing {}", path.display())));
        }
        Ok(Box::new(MemorySource {
            frames: self.frames.clone().into_iter(),
            props: self.props,
        }))
    }

    fn create_sink(&self, path: &Path, props: VideoProps) -> Result<Box<dyn VideoSink>> {
        self.written.lock().unwrap().props = Some(props);
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            written: self.written.clone(),
        }))
    }
}

/// Black frame with the detector marker set to `marker`
pub fn marker_frame(marker: u8) -> RgbImage {
    let mut frame = RgbImage::new(32, 24);
    frame.put_pixel(0, 0, Rgb([marker, 0, 0]));
    frame
}

/// Encode a plain grey image in the given format
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("Failed to encode test image");
    buf
}

/// A service rooted in a fresh temp directory.
/// Keep the returned `TempDir` alive for the duration of the test.
pub struct TestService {
    pub service: Arc<DetectionService>,
    pub storage: StorageLayout,
    pub history_path: std::path::PathBuf,
    pub dir: TempDir,
}

pub fn build_service(
    detector: impl PlateDetector + 'static,
    recognizer: impl TextRecognizer + 'static,
    video: Arc<dyn VideoBackend>,
) -> TestService {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let storage = StorageLayout::new(dir.path().join("static"));
    storage.ensure_dirs().expect("Failed to create storage layout");
    let history_path = dir.path().join("history.json");

    let pipeline = MediaPipeline::new(
        Arc::new(detector),
        Arc::new(recognizer),
        FrameAnnotator::new().expect("Failed to load bundled font"),
        video,
        storage.clone(),
    );
    let service = Arc::new(DetectionService::new(
        pipeline,
        HistoryStore::new(&history_path),
    ));

    TestService {
        service,
        storage,
        history_path,
        dir,
    }
}

/// Service with a backend that cannot decode video
pub fn image_service(
    detector: impl PlateDetector + 'static,
    recognizer: impl TextRecognizer + 'static,
) -> TestService {
    build_service(
        detector,
        recognizer,
        Arc::new(platescan::video::UnavailableBackend),
    )
}
