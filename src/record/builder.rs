//! Assemble and seal license files from grant descriptions.
//!
//! Seat caps use the legacy slot indirection: every capped grant points at
//! a "slot" record whose `user_count` byte holds the cap. Grants with the
//! same program code and cap share a slot and therefore a seat pool.

use crate::crypto::secret::SharedSecret;
use crate::program::ProgramCode;
use crate::record::block::Block;
use crate::record::file::{LicenseFile, CONTENT_RECORDS, TOTAL_RECORDS};
use crate::record::matchkey::{is_reserved_host, MatchKey};
use crate::SeatwardenError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Which kind of identity a grant is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantTarget {
    /// A specific host name (optionally with a `:hwaddr` suffix) and address.
    Host {
        /// Host claim, stored lower-cased.
        host: String,
        /// IPv4 address.
        addr: Ipv4Addr,
    },
    /// Any host on the class-C network of `addr`.
    SiteClassC {
        /// Any address on the network.
        addr: Ipv4Addr,
    },
    /// Any host on the class-B network of `addr`.
    SiteClassB {
        /// Any address on the network.
        addr: Ipv4Addr,
    },
}

/// One license grant to be placed in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Identity the grant is bound to.
    #[serde(flatten)]
    pub target: GrantTarget,
    /// Program authorized by the grant.
    pub program: ProgramCode,
    /// Expiration in epoch seconds; absent or 0 never expires.
    #[serde(default)]
    pub expiry: u32,
    /// Concurrent seat cap; absent means uncapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats: Option<u8>,
}

impl Grant {
    /// Grant for a named host.
    pub fn host(host: &str, addr: Ipv4Addr, program: ProgramCode) -> Self {
        Self {
            target: GrantTarget::Host {
                host: host.to_string(),
                addr,
            },
            program,
            expiry: 0,
            seats: None,
        }
    }

    /// Class-C site grant.
    pub fn site_class_c(addr: Ipv4Addr, program: ProgramCode) -> Self {
        Self {
            target: GrantTarget::SiteClassC { addr },
            program,
            expiry: 0,
            seats: None,
        }
    }

    /// Class-B site grant.
    pub fn site_class_b(addr: Ipv4Addr, program: ProgramCode) -> Self {
        Self {
            target: GrantTarget::SiteClassB { addr },
            program,
            expiry: 0,
            seats: None,
        }
    }

    /// Set a seat cap.
    pub fn seats(mut self, cap: u8) -> Self {
        self.seats = Some(cap);
        self
    }

    /// Set an expiration time.
    pub fn expires(mut self, epoch_secs: u32) -> Self {
        self.expiry = epoch_secs;
        self
    }

    /// Match key the record for this grant is digested from.
    pub fn match_key(&self, secret: &SharedSecret) -> MatchKey {
        match &self.target {
            GrantTarget::Host { host, addr } => {
                MatchKey::lowercase(host, *addr, self.program, secret)
            }
            GrantTarget::SiteClassC { addr } => MatchKey::site_class_c(*addr, self.program, secret),
            GrantTarget::SiteClassB { addr } => MatchKey::site_class_b(*addr, self.program, secret),
        }
    }

    fn validate(&self) -> Result<(), SeatwardenError> {
        if let GrantTarget::Host { host, .. } = &self.target {
            if host.trim().is_empty() {
                return Err(SeatwardenError::ConfigError("grant host is empty".into()));
            }
            if is_reserved_host(host) {
                return Err(SeatwardenError::ConfigError(format!(
                    "grant host {} is reserved",
                    host
                )));
            }
        }
        if self.program == ProgramCode::Server && !matches!(self.target, GrantTarget::Host { .. })
        {
            return Err(SeatwardenError::ConfigError(
                "server grants must name a host".into(),
            ));
        }
        if self.seats == Some(0) {
            return Err(SeatwardenError::ConfigError("seat cap must be at least 1".into()));
        }
        Ok(())
    }
}

/// Collects grants and produces a sealed [`LicenseFile`].
#[derive(Debug, Default)]
pub struct LicenseBuilder {
    grants: Vec<Grant>,
}

impl LicenseBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grant.
    ///
    /// # Errors
    /// `ConfigError` if the grant is invalid or the file is full.
    pub fn add(&mut self, grant: Grant) -> Result<&mut Self, SeatwardenError> {
        grant.validate()?;
        if self.grants.len() >= CONTENT_RECORDS {
            return Err(SeatwardenError::ConfigError(format!(
                "a license file holds at most {} grants",
                CONTENT_RECORDS
            )));
        }
        self.grants.push(grant);
        Ok(self)
    }

    /// Grants added so far.
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Place grants, fill unused records with noise, and seal.
    pub fn build(&self, secret: &SharedSecret) -> LicenseFile {
        let mut rng = rand::thread_rng();
        let mut records = vec![Block::default(); TOTAL_RECORDS];

        for record in records.iter_mut().take(CONTENT_RECORDS).skip(self.grants.len()) {
            rng.fill_bytes(&mut record.checksum);
        }

        // (program, cap) -> slot index
        let mut pools: Vec<(ProgramCode, u8, u8)> = Vec::new();

        for (index, grant) in self.grants.iter().enumerate() {
            let record = &mut records[index];
            record.checksum = grant.match_key(secret).digest(secret);
            record.expiry = grant.expiry;
            record.program_code = grant.program as u8;

            if let Some(cap) = grant.seats {
                let slot = match pools
                    .iter()
                    .find(|(program, c, _)| *program == grant.program && *c == cap)
                {
                    Some((_, _, slot)) => *slot,
                    None => {
                        let slot = index as u8;
                        pools.push((grant.program, cap, slot));
                        record.user_count = cap;
                        slot
                    }
                };
                record.user_limit_flag = 1;
                record.user_limit_slot = slot;
            }
        }

        let mut file = LicenseFile::from_records(records);
        file.seal(secret);
        file
    }
}
