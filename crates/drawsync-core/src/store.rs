//! Per-series history persistence.
//!
//! Each series lives in `<out_dir>/history_<series>.json`, with its lock
//! file under the hidden `<out_dir>/.drawsync/` directory. Saves write a
//! sibling temp file, fsync it, then rename over the target, so readers see
//! either the previous document or the new one and never a partial write.
//!
//! Loading is forward-compatible: missing fields take defaults, a non-array
//! `items` becomes empty, and unknown top-level keys are preserved.

use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ErrorCode;
use crate::lock::{HistoryLock, LockError};
use crate::model::{Draw, HistoryDocument, SeriesId};
use crate::normalize::{coerce_u64, json_type};

/// Hidden directory under the out dir that holds lock files.
pub const LOCK_DIR: &str = ".drawsync";

/// Default wait for the per-series lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors reading or writing a history document.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("history document {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to serialize history for {series}: {source}")]
    Serialize {
        series: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lock history: {0}")]
    Lock(#[from] LockError),
}

impl PersistenceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::HistoryReadFailed,
            Self::Corrupt { .. } => ErrorCode::HistoryCorrupt,
            Self::Serialize { .. } | Self::Write { .. } => ErrorCode::HistoryWriteFailed,
            Self::Lock(err) => err.code(),
        }
    }
}

/// Owns the on-disk layout of history documents under one directory.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    out_dir: PathBuf,
}

impl HistoryStore {
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Path of the persisted document for `series`.
    #[must_use]
    pub fn path_for(&self, series: &SeriesId) -> PathBuf {
        self.out_dir
            .join(format!("history_{}.json", series.file_stem()))
    }

    fn lock_path_for(&self, series: &SeriesId) -> PathBuf {
        self.out_dir
            .join(LOCK_DIR)
            .join(format!("history_{}.lock", series.file_stem()))
    }

    /// Take the exclusive per-series lock.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Lock`] on timeout or lock-file I/O failure.
    pub fn lock(
        &self,
        series: &SeriesId,
        timeout: Duration,
    ) -> Result<HistoryLock, PersistenceError> {
        Ok(HistoryLock::acquire(&self.lock_path_for(series), timeout)?)
    }

    /// Load the document for `series`, or a fresh one if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Read`] if an existing file cannot be read
    /// and [`PersistenceError::Corrupt`] if it is not a JSON object or holds
    /// values that cannot be coerced.
    pub fn load(&self, series: &SeriesId) -> Result<HistoryDocument, PersistenceError> {
        let path = self.path_for(series);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(series = %series, path = %path.display(), "no history yet");
                return Ok(HistoryDocument::new(series));
            }
            Err(source) => return Err(PersistenceError::Read { path, source }),
        };

        let value: Value =
            serde_json::from_slice(&bytes).map_err(|err| PersistenceError::Corrupt {
                path: path.clone(),
                reason: err.to_string(),
            })?;

        let object = match value {
            Value::Object(object) => object,
            Value::Null => Map::new(),
            other => {
                return Err(PersistenceError::Corrupt {
                    path,
                    reason: format!("top-level value is not an object: {}", json_type(&other)),
                });
            }
        };

        document_from_object(series, object).map_err(|reason| PersistenceError::Corrupt {
            path,
            reason,
        })
    }

    /// Atomically replace the persisted document.
    ///
    /// Output is indented JSON in a fixed key order with non-ASCII text kept
    /// verbatim, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Write`] on any I/O failure. The previous
    /// document, if any, is left intact.
    pub fn save(&self, doc: &HistoryDocument) -> Result<(), PersistenceError> {
        let series = &doc.key;
        let path = self.path_for(series);

        fs::create_dir_all(&self.out_dir).map_err(|source| PersistenceError::Write {
            path: self.out_dir.clone(),
            source,
        })?;

        let mut body =
            serde_json::to_vec_pretty(doc).map_err(|source| PersistenceError::Serialize {
                series: doc.series_id.clone(),
                source,
            })?;
        body.push(b'\n');

        let tmp_path = path.with_extension("json.tmp");
        if let Err(source) = write_synced(&tmp_path, &body) {
            let _ = fs::remove_file(&tmp_path);
            return Err(PersistenceError::Write {
                path: tmp_path,
                source,
            });
        }

        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            PersistenceError::Write {
                path: path.clone(),
                source,
            }
        })?;

        debug!(
            series = %series,
            items = doc.items.len(),
            last_contest = doc.last_contest,
            "history saved"
        );
        Ok(())
    }
}

fn write_synced(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(body)?;
    file.sync_all()
}

fn document_from_object(
    series: &SeriesId,
    mut object: Map<String, Value>,
) -> Result<HistoryDocument, String> {
    let mut doc = HistoryDocument::new(series);

    if let Some(id) = take_text(&mut object, "loteria")?
        && !id.is_empty()
    {
        doc.series_id = id;
    }

    if let Some(updated_at) = take_text(&mut object, "updatedAt")? {
        doc.updated_at = updated_at;
    }

    match object.remove("lastConcurso") {
        None | Some(Value::Null) => {}
        Some(value) => {
            doc.last_contest =
                coerce_u64(&value).map_err(|err| format!("lastConcurso: {err}"))?;
        }
    }

    if let Some(Value::Array(items)) = object.remove("items") {
        doc.items = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                serde_json::from_value::<Draw>(item).map_err(|err| format!("items[{idx}]: {err}"))
            })
            .collect::<Result<_, _>>()?;
    }

    doc.extra = object.into_iter().collect();
    Ok(doc)
}

fn take_text(object: &mut Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match object.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(other) => Err(format!("{key}: expected a string, found JSON {}", json_type(&other))),
    }
}
