use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Advisory lock errors for history files.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{}: lock timed out after {waited:?} at {}", ErrorCode::LockContention.code(), .path.display())]
    Timeout { path: PathBuf, waited: Duration },

    #[error("{}: {0}", ErrorCode::HistoryWriteFailed.code())]
    Io(#[from] io::Error),
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::HistoryWriteFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// RAII guard for the exclusive per-series lock held across one
/// reconciliation (load through save).
#[derive(Debug)]
pub struct HistoryLock {
    file: File,
    path: PathBuf,
    /// The lock file did not exist before `acquire`.
    created_file: bool,
    /// Directories `acquire` had to create, deepest first.
    created_dirs: Vec<PathBuf>,
}

impl HistoryLock {
    /// Acquire an exclusive advisory lock on `path`, polling until `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if another holder keeps the lock past
    /// `timeout`, or [`LockError::Io`] if the lock file cannot be opened.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        let created_dirs: Vec<PathBuf> = parent
            .ancestors()
            .take_while(|dir| !dir.as_os_str().is_empty() && !dir.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(parent)?;
        let created_file = !path.exists();

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            if file.try_lock_exclusive().is_ok() {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    created_file,
                    created_dirs,
                });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Release the lock and remove the lock file and any directories that
    /// `acquire` created, leaving the filesystem as it was before.
    ///
    /// Directories that gained other entries in the meantime are kept.
    pub fn discard(mut self) {
        let path = std::mem::take(&mut self.path);
        let created_file = self.created_file;
        let created_dirs = std::mem::take(&mut self.created_dirs);
        drop(self);

        if created_file {
            let _ = fs::remove_file(&path);
        }
        for dir in created_dirs {
            if fs::remove_dir(&dir).is_err() {
                break;
            }
        }
    }
}

impl Drop for HistoryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
