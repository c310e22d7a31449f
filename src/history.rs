//! Append-only detection history kept in a single JSON file

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use log::warn;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use time::{OffsetDateTime, UtcOffset};
use time::macros::format_description;

use crate::error::{PipelineError, Result};
use crate::models::DetectionRecord;

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Capture the local UTC offset.
///
/// Must run before any other thread is spawned: on Unix the offset can only
/// be read soundly from a single-threaded process.
pub fn init_local_offset() {
    if let Ok(offset) = UtcOffset::current_local_offset() {
        let _ = LOCAL_OFFSET.set(offset);
    }
}

/// Local wall-clock time formatted as `YYYY-MM-DD HH:MM:SS`.
///
/// Falls back to UTC when the local offset cannot be determined.
pub fn timestamp_now() -> String {
    let now = match LOCAL_OFFSET.get() {
        Some(offset) => OffsetDateTime::now_utc().to_offset(*offset),
        None => OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
    };
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    now.format(&format).unwrap_or_default()
}

/// JSON array of [`DetectionRecord`]s on disk.
///
/// Appends rewrite the whole file under a mutex, via a temp file and rename.
/// A missing or malformed file reads as an empty history.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a detection stamped with the current local time
    pub fn record(
        &self,
        plate_number: &str,
        confidence: Option<f64>,
        image_path: &str,
    ) -> Result<DetectionRecord> {
        let record = DetectionRecord {
            plate_number: plate_number.to_string(),
            confidence,
            image_path: image_path.to_string(),
            timestamp: timestamp_now(),
        };
        self.append(record.clone())?;
        Ok(record)
    }

    pub fn append(&self, record: DetectionRecord) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut records = self.load();
        records.push(record);
        self.persist(&records)
    }

    pub fn read_all(&self) -> Vec<DetectionRecord> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
    }

    fn load(&self) -> Vec<DetectionRecord> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "History file {} is corrupt, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn persist(&self, records: &[DetectionRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            let mut serializer =
                serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
            records
                .serialize(&mut serializer)
                .map_err(|e| PipelineError::History(e.to_string()))?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
