use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use uuid::Uuid;

const UPLOAD_DIR_NAME: &str = "uploads";
const IMAGE_OUTPUT_DIR: &str = "outputs/images";
const VIDEO_OUTPUT_DIR: &str = "outputs/videos";

/// On-disk layout for uploads and annotated outputs
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Create every directory of the layout
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        for dir in [self.uploads_dir(), self.image_output_dir(), self.video_output_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory {:?}", dir))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOAD_DIR_NAME)
    }

    pub fn image_output_dir(&self) -> PathBuf {
        self.root.join(IMAGE_OUTPUT_DIR)
    }

    pub fn video_output_dir(&self) -> PathBuf {
        self.root.join(VIDEO_OUTPUT_DIR)
    }

    pub fn upload_path(&self, uid: &Uuid, ext: &str) -> PathBuf {
        self.uploads_dir().join(format!("{}.{}", uid, ext))
    }

    pub fn image_output_path(&self, uid: &Uuid) -> PathBuf {
        self.image_output_dir().join(format!("{}_out.jpg", uid))
    }

    pub fn video_output_path(&self, uid: &Uuid) -> PathBuf {
        self.video_output_dir().join(format!("{}_out.mp4", uid))
    }
}
