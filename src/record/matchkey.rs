//! Match keys: the byte strings digested to locate a license record.

use crate::crypto::digest::{keyed_digest, Digest128};
use crate::crypto::secret::SharedSecret;
use crate::program::ProgramCode;
use std::net::Ipv4Addr;

/// Width of the host field, including its NUL terminator.
pub const HOST_FIELD_LEN: usize = 56;

/// Total match key length.
pub const MATCH_KEY_LEN: usize = HOST_FIELD_LEN + 4 + 4;

/// Reserved host name for class-C site licenses (last octet zeroed).
pub const SITE_CLASS_C: &str = "*SITE-C*";

/// Reserved host name for class-B site licenses (last two octets zeroed).
pub const SITE_CLASS_B: &str = "*SITE-B*";

/// Reserved host name for any-address grants. Never produced by the resolver.
pub const SITE_ANY: &str = "*SITE-ANY*";

/// All host names a requester may not claim.
pub const RESERVED_HOSTS: [&str; 3] = [SITE_CLASS_C, SITE_CLASS_B, SITE_ANY];

/// Whether `host` is one of the reserved site names.
pub fn is_reserved_host(host: &str) -> bool {
    RESERVED_HOSTS.iter().any(|r| r.eq_ignore_ascii_case(host))
}

/// Zero the last octet of an address.
pub fn class_c_network(addr: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = addr.octets();
    Ipv4Addr::new(a, b, c, 0)
}

/// Zero the last two octets of an address.
pub fn class_b_network(addr: Ipv4Addr) -> Ipv4Addr {
    let [a, b, _, _] = addr.octets();
    Ipv4Addr::new(a, b, 0, 0)
}

/// A fully built match key.
#[derive(Clone, PartialEq, Eq)]
pub struct MatchKey {
    bytes: [u8; MATCH_KEY_LEN],
    host: String,
    addr: Ipv4Addr,
    program: ProgramCode,
}

impl MatchKey {
    /// Build a key from the host string exactly as given.
    ///
    /// The host is truncated to 55 bytes and NUL terminated; the rest of the
    /// field is filled from the secret at the same index.
    pub fn new(host: &str, addr: Ipv4Addr, program: ProgramCode, secret: &SharedSecret) -> Self {
        let mut bytes = [0u8; MATCH_KEY_LEN];

        let host_bytes = host.as_bytes();
        let n = host_bytes.len().min(HOST_FIELD_LEN - 1);
        bytes[..n].copy_from_slice(&host_bytes[..n]);
        bytes[n] = 0;
        for (i, b) in bytes.iter_mut().enumerate().take(HOST_FIELD_LEN).skip(n + 1) {
            *b = secret.byte(i);
        }

        bytes[HOST_FIELD_LEN..HOST_FIELD_LEN + 4].copy_from_slice(&addr.octets());
        bytes[HOST_FIELD_LEN + 4] = program as u8;
        bytes[HOST_FIELD_LEN + 5] = secret.byte(0);
        bytes[HOST_FIELD_LEN + 6] = secret.byte(16);
        bytes[HOST_FIELD_LEN + 7] = secret.byte(32);

        Self {
            bytes,
            host: String::from_utf8_lossy(&host_bytes[..n]).into_owned(),
            addr,
            program,
        }
    }

    /// Build the current-format key: host folded to lower case.
    pub fn lowercase(host: &str, addr: Ipv4Addr, program: ProgramCode, secret: &SharedSecret) -> Self {
        Self::new(&host.to_lowercase(), addr, program, secret)
    }

    /// Class-C site key for `addr`.
    pub fn site_class_c(addr: Ipv4Addr, program: ProgramCode, secret: &SharedSecret) -> Self {
        Self::new(SITE_CLASS_C, class_c_network(addr), program, secret)
    }

    /// Class-B site key for `addr`.
    pub fn site_class_b(addr: Ipv4Addr, program: ProgramCode, secret: &SharedSecret) -> Self {
        Self::new(SITE_CLASS_B, class_b_network(addr), program, secret)
    }

    /// The digest a record must carry to match this key.
    pub fn digest(&self, secret: &SharedSecret) -> Digest128 {
        keyed_digest(&self.bytes, secret)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; MATCH_KEY_LEN] {
        &self.bytes
    }

    /// Host string stored in the key (after truncation).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Address stored in the key.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// Program code stored in the key.
    pub fn program(&self) -> ProgramCode {
        self.program
    }
}

impl std::fmt::Debug for MatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchKey")
            .field("host", &self.host)
            .field("addr", &self.addr)
            .field("program", &self.program)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SharedSecret {
        let mut bytes = [0u8; 64];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = 100 + i as u8;
        }
        SharedSecret::from_bytes(bytes)
    }

    #[test]
    fn test_host_field_padding() {
        let key = MatchKey::new("ab", Ipv4Addr::new(10, 1, 2, 3), ProgramCode::Xic, &secret());
        let b = key.as_bytes();
        assert_eq!(&b[..2], b"ab");
        assert_eq!(b[2], 0);
        assert_eq!(b[3], 103);
        assert_eq!(b[55], 155);
        assert_eq!(&b[56..60], &[10, 1, 2, 3]);
        assert_eq!(&b[60..64], &[5, 100, 116, 132]);
    }

    #[test]
    fn test_long_host_truncated() {
        let long = "h".repeat(80);
        let key = MatchKey::new(&long, Ipv4Addr::LOCALHOST, ProgramCode::Xiv, &secret());
        assert_eq!(key.host().len(), 55);
        assert_eq!(key.as_bytes()[55], 0);
    }

    #[test]
    fn test_lowercase_folding() {
        let s = secret();
        let a = MatchKey::lowercase("Build1", Ipv4Addr::LOCALHOST, ProgramCode::Xic, &s);
        let b = MatchKey::new("build1", Ipv4Addr::LOCALHOST, ProgramCode::Xic, &s);
        assert_eq!(a, b);
        assert_eq!(a.digest(&s), b.digest(&s));
    }

    #[test]
    fn test_site_networks() {
        let addr = Ipv4Addr::new(192, 168, 7, 42);
        assert_eq!(class_c_network(addr), Ipv4Addr::new(192, 168, 7, 0));
        assert_eq!(class_b_network(addr), Ipv4Addr::new(192, 168, 0, 0));
        let key = MatchKey::site_class_b(addr, ProgramCode::Oa, &secret());
        assert_eq!(key.host(), SITE_CLASS_B);
        assert_eq!(key.addr(), Ipv4Addr::new(192, 168, 0, 0));
    }

    #[test]
    fn test_reserved_hosts() {
        assert!(is_reserved_host("*site-c*"));
        assert!(is_reserved_host(SITE_ANY));
        assert!(!is_reserved_host("build1"));
    }
}
