//! Seatwarden error types.

use thiserror::Error;

/// Errors that can occur while loading, matching, or serving licenses.
#[derive(Debug, Error)]
pub enum SeatwardenError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No license file could be found or opened.
    #[error("No license file found: {0}")]
    NoLicenseFile(String),

    /// Allocation failure reported by the peer.
    #[error("Out of memory")]
    OutOfMemory,

    /// License file could not be read.
    #[error("License file read error: {0}")]
    ReadError(String),

    /// License file could not be written.
    #[error("License file write error: {0}")]
    WriteError(String),

    /// License file is shorter than the fixed record layout.
    #[error("License file truncated ({actual} of {expected} bytes)")]
    TruncatedFile {
        /// Bytes actually read.
        actual: usize,
        /// Bytes required by the layout.
        expected: usize,
    },

    /// Whole-file checksum does not match (file corrupt or edited).
    #[error("License file checksum mismatch")]
    ChecksumMismatch,

    /// No license record matches the claimed identity.
    #[error("Not licensed for host {host}")]
    NotLicensed {
        /// Host name the request was made for.
        host: String,
    },

    /// A matching record exists but has expired.
    #[error("License expired for host {host}")]
    Expired {
        /// Host name the request was made for.
        host: String,
    },

    /// A matching record exists but all seats are in use.
    #[error("Seat quota exceeded for host {host}")]
    SeatLimitReached {
        /// Host name the request was made for.
        host: String,
    },

    /// Unclassified failure.
    #[error("Unknown license error")]
    Unknown,

    /// Client attempted to claim the reserved server program code.
    #[error("Server program code cannot be requested by a client")]
    ServerSideRequestRejected,

    /// Request could not be decoded or carries reserved values.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Socket read or write did not complete before its deadline.
    #[error("Network operation timed out")]
    Timeout,

    /// TCP transport error talking to the license daemon.
    #[error("License server transport error: {0}")]
    Transport(String),

    /// Acknowledgement did not verify against the request.
    #[error("Acknowledgement failed verification")]
    AckForged,
}

impl SeatwardenError {
    /// Whether another candidate identity should be tried after this error.
    ///
    /// Only "no matching record" and transport-class failures are
    /// identity-dependent; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotLicensed { .. } | Self::Timeout | Self::Transport(_) | Self::AckForged
        )
    }

    /// Whether the license data itself (not the claimed identity) is bad.
    pub fn is_license_data_error(&self) -> bool {
        matches!(
            self,
            Self::NoLicenseFile(_)
                | Self::ReadError(_)
                | Self::TruncatedFile { .. }
                | Self::ChecksumMismatch
        )
    }

    /// Wire error code carried in acknowledgements.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoLicenseFile(_) => ErrorCode::NoLicenseFile,
            Self::OutOfMemory => ErrorCode::OutOfMemory,
            Self::ReadError(_) | Self::TruncatedFile { .. } => ErrorCode::ReadError,
            Self::ChecksumMismatch => ErrorCode::ChecksumMismatch,
            Self::NotLicensed { .. } => ErrorCode::NotLicensed,
            Self::Expired { .. } => ErrorCode::Expired,
            Self::SeatLimitReached { .. } => ErrorCode::SeatLimitReached,
            Self::ServerSideRequestRejected => ErrorCode::ServerSideRequestRejected,
            Self::MalformedRequest(_) => ErrorCode::MalformedRequest,
            _ => ErrorCode::Unknown,
        }
    }
}

/// Numeric error codes sent in the last two bytes of an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// Request succeeded.
    Ok = 0,
    /// See [`SeatwardenError::NoLicenseFile`].
    NoLicenseFile = 1,
    /// See [`SeatwardenError::OutOfMemory`].
    OutOfMemory = 2,
    /// See [`SeatwardenError::ReadError`].
    ReadError = 3,
    /// See [`SeatwardenError::ChecksumMismatch`].
    ChecksumMismatch = 4,
    /// See [`SeatwardenError::NotLicensed`].
    NotLicensed = 5,
    /// See [`SeatwardenError::Expired`].
    Expired = 6,
    /// See [`SeatwardenError::SeatLimitReached`].
    SeatLimitReached = 7,
    /// See [`SeatwardenError::Unknown`].
    Unknown = 8,
    /// See [`SeatwardenError::ServerSideRequestRejected`].
    ServerSideRequestRejected = 9,
    /// See [`SeatwardenError::MalformedRequest`].
    MalformedRequest = 10,
}

impl ErrorCode {
    /// Decode a wire value; unrecognized values read as `Unknown`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::NoLicenseFile,
            2 => Self::OutOfMemory,
            3 => Self::ReadError,
            4 => Self::ChecksumMismatch,
            5 => Self::NotLicensed,
            6 => Self::Expired,
            7 => Self::SeatLimitReached,
            9 => Self::ServerSideRequestRejected,
            10 => Self::MalformedRequest,
            _ => Self::Unknown,
        }
    }

    /// Rebuild a client-side error for a denial received from the daemon.
    pub fn into_error(self, host: &str) -> SeatwardenError {
        let host = host.to_string();
        match self {
            Self::Ok | Self::Unknown => SeatwardenError::Unknown,
            Self::NoLicenseFile => SeatwardenError::NoLicenseFile("on license server".into()),
            Self::OutOfMemory => SeatwardenError::OutOfMemory,
            Self::ReadError => SeatwardenError::ReadError("on license server".into()),
            Self::ChecksumMismatch => SeatwardenError::ChecksumMismatch,
            Self::NotLicensed => SeatwardenError::NotLicensed { host },
            Self::Expired => SeatwardenError::Expired { host },
            Self::SeatLimitReached => SeatwardenError::SeatLimitReached { host },
            Self::ServerSideRequestRejected => SeatwardenError::ServerSideRequestRejected,
            Self::MalformedRequest => {
                SeatwardenError::MalformedRequest("rejected by license server".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip_through_wire_value() {
        for code in [
            ErrorCode::Ok,
            ErrorCode::NotLicensed,
            ErrorCode::Expired,
            ErrorCode::SeatLimitReached,
            ErrorCode::MalformedRequest,
        ] {
            assert_eq!(ErrorCode::from_u16(code as u16), code);
        }
        assert_eq!(ErrorCode::from_u16(999), ErrorCode::Unknown);
    }

    #[test]
    fn test_retry_classification() {
        let not_licensed = SeatwardenError::NotLicensed { host: "a".into() };
        assert!(not_licensed.is_retryable());
        assert!(SeatwardenError::Timeout.is_retryable());
        assert!(!SeatwardenError::Expired { host: "a".into() }.is_retryable());
        assert!(!SeatwardenError::ChecksumMismatch.is_retryable());
        assert!(SeatwardenError::ChecksumMismatch.is_license_data_error());
        assert!(!not_licensed.is_license_data_error());
    }

    #[test]
    fn test_denial_rebuilds_host_specific_error() {
        let err = ErrorCode::SeatLimitReached.into_error("build1");
        assert_eq!(err.to_string(), "Seat quota exceeded for host build1");
    }
}
