//! Fallback match-key enumeration.
//!
//! Keys are produced in strict priority order:
//! 1. host lower-cased (current format)
//! 2. host exactly as claimed, only if it has upper-case characters
//! 3. class-C site key
//! 4. class-B site key
//!
//! Site keys are never produced for the server code or for host claims
//! carrying a `:suffix` hardware qualifier.

use crate::crypto::secret::SharedSecret;
use crate::program::ProgramCode;
use crate::record::block::Block;
use crate::record::file::LicenseFile;
use crate::record::matchkey::MatchKey;
use std::net::Ipv4Addr;

/// Which fallback tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Lower-cased host.
    Host,
    /// Raw-case host from an older record.
    RawCaseHost,
    /// Class-C site license.
    SiteClassC,
    /// Class-B site license.
    SiteClassB,
}

/// A match key together with the tier it represents.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Tier of this key.
    pub tier: MatchTier,
    /// The key itself.
    pub key: MatchKey,
}

/// A record located by [`lookup`].
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    /// Index of the record in the file.
    pub index: usize,
    /// The record.
    pub block: &'a Block,
    /// Tier that matched.
    pub tier: MatchTier,
}

/// Whether site wildcards may be considered for this request.
pub fn site_eligible(host_claim: &str, program: ProgramCode) -> bool {
    program != ProgramCode::Server && !host_claim.contains(':')
}

/// Enumerate candidate keys in priority order.
pub fn resolve(
    host_claim: &str,
    addr: Ipv4Addr,
    program: ProgramCode,
    secret: &SharedSecret,
) -> Vec<Candidate> {
    let mut keys = Vec::with_capacity(4);

    keys.push(Candidate {
        tier: MatchTier::Host,
        key: MatchKey::lowercase(host_claim, addr, program, secret),
    });

    if host_claim.chars().any(char::is_uppercase) {
        keys.push(Candidate {
            tier: MatchTier::RawCaseHost,
            key: MatchKey::new(host_claim, addr, program, secret),
        });
    }

    if site_eligible(host_claim, program) {
        keys.push(Candidate {
            tier: MatchTier::SiteClassC,
            key: MatchKey::site_class_c(addr, program, secret),
        });
        keys.push(Candidate {
            tier: MatchTier::SiteClassB,
            key: MatchKey::site_class_b(addr, program, secret),
        });
    }

    keys
}

/// Try each candidate key against the file and return the first hit.
pub fn lookup<'a>(
    file: &'a LicenseFile,
    host_claim: &str,
    addr: Ipv4Addr,
    program: ProgramCode,
    secret: &SharedSecret,
) -> Option<Resolved<'a>> {
    resolve(host_claim, addr, program, secret)
        .into_iter()
        .find_map(|candidate| {
            file.find_match(&candidate.key, secret)
                .map(|(index, block)| Resolved {
                    index,
                    block,
                    tier: candidate.tier,
                })
        })
}
