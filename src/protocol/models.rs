//! Fixed-size request struct shared by every request type.
//!
//! ```text
//! offset size field
//!      0   64 host claim, NUL padded
//!     64   64 user name, NUL padded
//!    128    4 date (epoch seconds)
//!    132    4 IPv4 address
//!    136    4 request type
//!    140    4 process id
//!    144    4 program code
//! ```
//!
//! All integers are big-endian. There is no length prefix: both ends know
//! the struct size.

use crate::identity::local::Identity;
use crate::program::ProgramCode;
use crate::SeatwardenError;
use std::net::Ipv4Addr;

/// Width of the host and user fields.
pub const NAME_FIELD_LEN: usize = 64;

/// Serialized size of a [`JobReq`].
pub const JOB_REQ_SIZE: usize = NAME_FIELD_LEN * 2 + 4 * 5;

/// Request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RequestType {
    /// Placeholder; never valid on the wire.
    None = 0,
    /// Begin a session.
    Open = 1,
    /// Heartbeat for an open session.
    Check = 2,
    /// End a session.
    Close = 3,
    /// Stream a listing of the job registry.
    Dump = 4,
    /// Terminate the daemon.
    Kill = 5,
}

impl RequestType {
    /// Decode a wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Open),
            2 => Some(Self::Check),
            3 => Some(Self::Close),
            4 => Some(Self::Dump),
            5 => Some(Self::Kill),
            _ => None,
        }
    }

    /// Upper-case name used in logs and listings.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Open => "OPEN",
            Self::Check => "CHECK",
            Self::Close => "CLOSE",
            Self::Dump => "DUMP",
            Self::Kill => "KILL",
        }
    }
}

/// The request structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReq {
    /// Host claim, possibly with a `:suffix`.
    pub host: String,
    /// User name of the requesting process.
    pub user: String,
    /// Client's clock at send time.
    pub date: u32,
    /// Claimed IPv4 address.
    pub addr: Ipv4Addr,
    /// Raw request type.
    pub req_type: u32,
    /// Requesting process id.
    pub pid: u32,
    /// Raw program code.
    pub code: u32,
}

impl JobReq {
    /// Request for `identity`, filled with the given fields.
    pub fn new(
        req_type: RequestType,
        identity: &Identity,
        user: &str,
        pid: u32,
        code: Option<ProgramCode>,
        date: u32,
    ) -> Self {
        Self {
            host: identity.host.clone(),
            user: user.to_string(),
            date,
            addr: identity.addr,
            req_type: req_type as u32,
            pid,
            code: code.map(|c| c as u32).unwrap_or(0),
        }
    }

    /// Administrative request carrying no identity.
    pub fn admin(req_type: RequestType, date: u32) -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            date,
            addr: Ipv4Addr::UNSPECIFIED,
            req_type: req_type as u32,
            pid: 0,
            code: 0,
        }
    }

    /// Encode to the wire form. Names longer than 63 bytes are truncated.
    pub fn to_bytes(&self) -> [u8; JOB_REQ_SIZE] {
        let mut out = [0u8; JOB_REQ_SIZE];
        put_name(&mut out[..NAME_FIELD_LEN], &self.host);
        put_name(&mut out[NAME_FIELD_LEN..NAME_FIELD_LEN * 2], &self.user);
        out[128..132].copy_from_slice(&self.date.to_be_bytes());
        out[132..136].copy_from_slice(&self.addr.octets());
        out[136..140].copy_from_slice(&self.req_type.to_be_bytes());
        out[140..144].copy_from_slice(&self.pid.to_be_bytes());
        out[144..148].copy_from_slice(&self.code.to_be_bytes());
        out
    }

    /// Decode the wire form.
    ///
    /// # Errors
    /// `MalformedRequest` if a name field is not UTF-8.
    pub fn from_bytes(bytes: &[u8; JOB_REQ_SIZE]) -> Result<Self, SeatwardenError> {
        Ok(Self {
            host: get_name(&bytes[..NAME_FIELD_LEN], "host")?,
            user: get_name(&bytes[NAME_FIELD_LEN..NAME_FIELD_LEN * 2], "user")?,
            date: be_u32(&bytes[128..132]),
            addr: Ipv4Addr::new(bytes[132], bytes[133], bytes[134], bytes[135]),
            req_type: be_u32(&bytes[136..140]),
            pid: be_u32(&bytes[140..144]),
            code: be_u32(&bytes[144..148]),
        })
    }

    /// Decoded request type.
    pub fn request_type(&self) -> Option<RequestType> {
        RequestType::from_u32(self.req_type)
    }

    /// Decoded program code.
    pub fn program(&self) -> Option<ProgramCode> {
        ProgramCode::from_u32(self.code)
    }

    /// Identity claimed by this request.
    pub fn identity(&self) -> Identity {
        Identity::new(self.host.clone(), self.addr)
    }
}

fn put_name(field: &mut [u8], value: &str) {
    let mut n = value.len().min(field.len() - 1);
    while !value.is_char_boundary(n) {
        n -= 1;
    }
    field[..n].copy_from_slice(&value.as_bytes()[..n]);
}

fn get_name(field: &[u8], what: &str) -> Result<String, SeatwardenError> {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8(field[..end].to_vec())
        .map_err(|_| SeatwardenError::MalformedRequest(format!("{} field is not UTF-8", what)))
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
