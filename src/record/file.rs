//! License file load, verify, seal, and atomic save.
//!
//! A file is `CONTENT_RECORDS` license records followed by one whole-file
//! checksum record. The trailing checksum is the keyed digest of all
//! records (with that checksum zeroed) plus the secret.

use crate::crypto::digest::{digests_equal, keyed_digest};
use crate::crypto::secret::SharedSecret;
use crate::record::block::{Block, BLOCK_SIZE};
use crate::record::matchkey::MatchKey;
use crate::SeatwardenError;
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Number of content records in every file.
pub const CONTENT_RECORDS: usize = 63;

/// Total records including the trailing checksum record.
pub const TOTAL_RECORDS: usize = CONTENT_RECORDS + 1;

/// Exact file size.
pub const FILE_SIZE: usize = TOTAL_RECORDS * BLOCK_SIZE;

/// License file name looked up in license directories.
pub const LICENSE_FILE_NAME: &str = "license.xt";

/// A verified, in-memory license file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseFile {
    records: Vec<Block>,
}

impl LicenseFile {
    /// Wrap a full record set without verifying it.
    pub(crate) fn from_records(records: Vec<Block>) -> Self {
        debug_assert_eq!(records.len(), TOTAL_RECORDS);
        Self { records }
    }

    /// Load and verify a license file.
    ///
    /// # Errors
    /// - `NoLicenseFile` - file does not exist or cannot be opened
    /// - `TruncatedFile` - fewer than [`FILE_SIZE`] bytes
    /// - `ReadError` - other I/O failure
    /// - `ChecksumMismatch` - whole-file checksum does not verify
    pub fn load(path: &Path, secret: &SharedSecret) -> Result<Self, SeatwardenError> {
        let mut file = fs::File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                SeatwardenError::NoLicenseFile(format!("{}: {}", path.display(), e))
            }
            _ => SeatwardenError::ReadError(format!("{}: {}", path.display(), e)),
        })?;

        let mut buf = Vec::with_capacity(FILE_SIZE);
        file.by_ref()
            .take(FILE_SIZE as u64)
            .read_to_end(&mut buf)
            .map_err(|e| SeatwardenError::ReadError(format!("{}: {}", path.display(), e)))?;

        Self::from_bytes(&buf, secret)
    }

    /// Decode and verify the serialized form.
    ///
    /// Bytes beyond [`FILE_SIZE`] are ignored.
    pub fn from_bytes(bytes: &[u8], secret: &SharedSecret) -> Result<Self, SeatwardenError> {
        if bytes.len() < FILE_SIZE {
            return Err(SeatwardenError::TruncatedFile {
                actual: bytes.len(),
                expected: FILE_SIZE,
            });
        }

        let records = bytes[..FILE_SIZE]
            .chunks_exact(BLOCK_SIZE)
            .map(|chunk| {
                let mut raw = [0u8; BLOCK_SIZE];
                raw.copy_from_slice(chunk);
                Block::from_bytes(&raw)
            })
            .collect();

        let file = Self { records };
        file.verify(secret)?;
        Ok(file)
    }

    /// Serialize all records, trailing checksum included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_SIZE);
        for record in &self.records {
            out.extend_from_slice(&record.to_bytes());
        }
        out
    }

    /// Compute the whole-file checksum over a zeroed trailing checksum.
    pub fn compute_checksum(&self, secret: &SharedSecret) -> [u8; 16] {
        let mut bytes = self.to_bytes();
        bytes[CONTENT_RECORDS * BLOCK_SIZE..CONTENT_RECORDS * BLOCK_SIZE + 16].fill(0);
        keyed_digest(&bytes, secret)
    }

    /// Store the whole-file checksum in the trailing record.
    pub fn seal(&mut self, secret: &SharedSecret) {
        let sum = self.compute_checksum(secret);
        self.records[CONTENT_RECORDS].checksum = sum;
    }

    /// Check the trailing checksum.
    pub fn verify(&self, secret: &SharedSecret) -> Result<(), SeatwardenError> {
        let stored = self.records[CONTENT_RECORDS].checksum;
        if !digests_equal(&stored, &self.compute_checksum(secret)) {
            return Err(SeatwardenError::ChecksumMismatch);
        }
        Ok(())
    }

    /// Write the file atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), SeatwardenError> {
        let temp_path = path.with_extension("tmp");

        fs::write(&temp_path, self.to_bytes()).map_err(|e| {
            SeatwardenError::WriteError(format!("Failed to write temp file: {}", e))
        })?;

        fs::rename(&temp_path, path).map_err(|e| {
            SeatwardenError::WriteError(format!("Failed to rename license file: {}", e))
        })?;

        Ok(())
    }

    /// Find the first content record whose checksum equals the key digest.
    pub fn find_match(&self, key: &MatchKey, secret: &SharedSecret) -> Option<(usize, &Block)> {
        let wanted = key.digest(secret);
        self.content()
            .iter()
            .enumerate()
            .find(|(_, block)| digests_equal(&block.checksum, &wanted))
    }

    /// Seat cap stored at `slot`, or `None` when the slot is out of range.
    pub fn seat_cap(&self, slot: u8) -> Option<u8> {
        self.content().get(slot as usize).map(|b| b.user_count)
    }

    /// The content records (trailing checksum record excluded).
    pub fn content(&self) -> &[Block] {
        &self.records[..CONTENT_RECORDS]
    }

    /// All records, trailing checksum record included.
    pub fn records(&self) -> &[Block] {
        &self.records
    }
}

/// Locate `license.xt` in the first directory of a `:`-separated search path
/// that contains one.
pub fn find_license_file(search_path: &str) -> Result<PathBuf, SeatwardenError> {
    for dir in search_path.split(':').filter(|d| !d.is_empty()) {
        let candidate = Path::new(dir).join(LICENSE_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(SeatwardenError::NoLicenseFile(format!(
        "{} not found in {}",
        LICENSE_FILE_NAME, search_path
    )))
}
