//! Size-rotated daemon log file.
//!
//! The log is append-only text. When it grows past the size limit it is
//! renamed to `<name>.last` (replacing any previous one) and a fresh file
//! is opened. The daemon's maintenance timer decides when to check.

use crate::SeatwardenError;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

struct LogState {
    path: PathBuf,
    file: File,
    max_bytes: u64,
}

/// Shared handle to the daemon log. Cloning shares the same file.
#[derive(Clone)]
pub struct RotatingLog {
    state: Arc<Mutex<LogState>>,
}

impl std::fmt::Debug for RotatingLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingLog").finish_non_exhaustive()
    }
}

fn open_append(path: &Path) -> Result<File, SeatwardenError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SeatwardenError::ConfigError(format!("Failed to open log {}: {}", path.display(), e)))
}

/// Name the previous log is kept under.
pub fn rotated_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".last");
    PathBuf::from(name)
}

impl RotatingLog {
    /// Open (or create) `path` for appending.
    pub fn open(path: &Path, max_bytes: u64) -> Result<Self, SeatwardenError> {
        let file = open_append(path)?;
        Ok(Self {
            state: Arc::new(Mutex::new(LogState {
                path: path.to_path_buf(),
                file,
                max_bytes,
            })),
        })
    }

    /// Rotate when the file is over the size limit.
    ///
    /// Returns whether a rotation happened.
    pub fn rotate_if_needed(&self) -> Result<bool, SeatwardenError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SeatwardenError::ConfigError("log lock poisoned".to_string()))?;

        let size = fs::metadata(&state.path).map(|m| m.len()).unwrap_or(0);
        if size <= state.max_bytes {
            return Ok(false);
        }

        state
            .file
            .flush()
            .map_err(|e| SeatwardenError::WriteError(format!("Failed to flush log: {}", e)))?;
        let last = rotated_path(&state.path);
        fs::rename(&state.path, &last).map_err(|e| {
            SeatwardenError::WriteError(format!("Failed to rotate log: {}", e))
        })?;
        state.file = open_append(&state.path)?;
        Ok(true)
    }

    /// Path of the live log.
    pub fn path(&self) -> PathBuf {
        match self.state.lock() {
            Ok(state) => state.path.clone(),
            Err(poisoned) => poisoned.into_inner().path.clone(),
        }
    }
}

/// Writer handed to `tracing-subscriber` for one event.
pub struct RotatingLogWriter {
    state: Arc<Mutex<LogState>>,
}

impl Write for RotatingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log lock poisoned"))?;
        state.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log lock poisoned"))?;
        state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingLog {
    type Writer = RotatingLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingLogWriter {
            state: Arc::clone(&self.state),
        }
    }
}
