//! Quick-revalidate stamp with atomic writes.
//!
//! Records the last successful validation of a program code so that a
//! program re-invoked within a few seconds can skip validating again.
//! Stored as JSON under `dirs::data_dir()/seatwarden/`, written with
//! temp file + rename.

use crate::program::ProgramCode;
use crate::SeatwardenError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stamp file name.
pub const STAMP_FILE_NAME: &str = ".seatwarden-stamp";

/// Contents of the stamp file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampRecord {
    /// Program that validated.
    pub program: ProgramCode,
    /// Host claim that validated.
    pub host: String,
    /// Validation time, epoch seconds.
    pub validated_at: u32,
}

/// File-backed quick-revalidate stamp.
#[derive(Debug, Clone)]
pub struct QuickStamp {
    path: PathBuf,
}

impl QuickStamp {
    /// Stamp under the user data directory.
    pub fn new() -> Result<Self, SeatwardenError> {
        let base_dir = dirs::data_dir().ok_or_else(|| {
            SeatwardenError::ConfigError("Could not find data directory".to_string())
        })?;
        Self::in_dir(&base_dir.join("seatwarden"))
    }

    /// Stamp in a specific directory.
    pub fn in_dir(dir: &Path) -> Result<Self, SeatwardenError> {
        fs::create_dir_all(dir).map_err(|e| {
            SeatwardenError::WriteError(format!("Failed to create stamp dir: {}", e))
        })?;
        Ok(Self {
            path: dir.join(STAMP_FILE_NAME),
        })
    }

    /// Record a successful validation.
    pub fn save(&self, record: &StampRecord) -> Result<(), SeatwardenError> {
        let json = serde_json::to_string(record)
            .map_err(|e| SeatwardenError::WriteError(format!("Failed to encode stamp: {}", e)))?;
        let temp_path = self.path.with_extension("tmp");

        fs::write(&temp_path, json)
            .map_err(|e| SeatwardenError::WriteError(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| SeatwardenError::WriteError(format!("Failed to rename stamp file: {}", e)))?;

        Ok(())
    }

    /// Load the stamp, if one exists and parses.
    pub fn load(&self) -> Option<StampRecord> {
        let json = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unreadable stamp");
                None
            }
        }
    }

    /// A stamp for `program` made no more than `window` before `now`.
    pub fn fresh(&self, program: ProgramCode, now: u32, window: Duration) -> Option<StampRecord> {
        self.load().filter(|r| {
            r.program == program
                && r.validated_at <= now
                && ((now - r.validated_at) as u64) <= window.as_secs()
        })
    }

    /// Remove the stamp.
    pub fn clear(&self) -> Result<(), SeatwardenError> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| SeatwardenError::WriteError(format!("Failed to delete stamp: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(at: u32) -> StampRecord {
        StampRecord {
            program: ProgramCode::Wrspice,
            host: "build1".to_string(),
            validated_at: at,
        }
    }

    #[test]
    fn test_stamp_roundtrip() {
        let dir = TempDir::new().unwrap();
        let stamp = QuickStamp::in_dir(dir.path()).unwrap();
        assert!(stamp.load().is_none());

        stamp.save(&record(1_000)).unwrap();
        assert_eq!(stamp.load(), Some(record(1_000)));
    }

    #[test]
    fn test_stamp_window() {
        let dir = TempDir::new().unwrap();
        let stamp = QuickStamp::in_dir(dir.path()).unwrap();
        stamp.save(&record(1_000)).unwrap();

        let window = Duration::from_secs(5);
        assert!(stamp.fresh(ProgramCode::Wrspice, 1_005, window).is_some());
        assert!(stamp.fresh(ProgramCode::Wrspice, 1_006, window).is_none());
        assert!(stamp.fresh(ProgramCode::Xic, 1_001, window).is_none());
        // A stamp from the future is not trusted.
        assert!(stamp.fresh(ProgramCode::Wrspice, 999, window).is_none());
    }

    #[test]
    fn test_corrupt_stamp_ignored() {
        let dir = TempDir::new().unwrap();
        let stamp = QuickStamp::in_dir(dir.path()).unwrap();
        fs::write(dir.path().join(STAMP_FILE_NAME), "not json").unwrap();
        assert!(stamp.load().is_none());

        stamp.clear().unwrap();
        assert!(!dir.path().join(STAMP_FILE_NAME).exists());
    }
}
