use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::detection::ocr::default_model_dir;
use crate::pipeline::DEFAULT_MIN_CONFIDENCE;

#[derive(Parser, Debug, Clone)]
#[command(name = "platescan")]
#[command(about = "Detect and read license plates in uploaded images and videos")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Root directory for uploads and annotated outputs
    #[arg(long, value_name = "DIR", default_value = "static")]
    pub static_root: PathBuf,

    /// JSON file holding the detection history
    #[arg(long, value_name = "FILE", default_value = "history.json")]
    pub history_file: PathBuf,

    /// Plate detector model (.rten)
    #[arg(long, value_name = "FILE", default_value = "models/plate-detector.rten")]
    pub detector_model: PathBuf,

    /// Square input size the detector was exported with
    #[arg(long, default_value_t = 640)]
    pub detector_input_size: u32,

    /// Directory with text-detection.rten and text-recognition.rten
    #[arg(long, value_name = "DIR")]
    pub ocr_models: Option<PathBuf>,

    /// TTF/OTF font for the labels drawn on outputs (bundled DejaVu Sans Mono if unset)
    #[arg(long, value_name = "FILE")]
    pub font: Option<PathBuf>,

    /// Minimum detector confidence
    #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
    pub confidence: f32,

    /// Largest accepted upload in MiB
    #[arg(long, default_value_t = 512)]
    pub max_upload_mb: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn ocr_model_dir(&self) -> PathBuf {
        self.ocr_models.clone().unwrap_or_else(default_model_dir)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            anyhow::bail!("--confidence must be within 0..=1, got {}", self.confidence);
        }
        if self.detector_input_size == 0 || self.detector_input_size % 32 != 0 {
            anyhow::bail!(
                "--detector-input-size must be a positive multiple of 32, got {}",
                self.detector_input_size
            );
        }
        Ok(())
    }
}
