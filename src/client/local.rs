//! Standalone validation against a license file, no daemon involved.

use crate::crypto::secret::SharedSecret;
use crate::identity::local::Identity;
use crate::identity::resolver::lookup;
use crate::policy::access::{evaluate, SeatPolicy};
use crate::program::ProgramCode;
use crate::record::file::{find_license_file, LicenseFile};
use crate::SeatwardenError;

/// Find and verify `license.xt` on a `:`-separated search path.
pub fn load_license(search_path: &str, secret: &SharedSecret) -> Result<LicenseFile, SeatwardenError> {
    let path = find_license_file(search_path)?;
    tracing::debug!(path = %path.display(), "using local license file");
    LicenseFile::load(&path, secret)
}

/// Validate `code` for the first identity that has a matching record.
///
/// Once a record is found its policy result is final; later identities are
/// only tried when nothing matched. Seat caps above one seat need the
/// daemon and fail here.
///
/// # Errors
/// - `NotLicensed` - no identity matched (named after the first identity)
/// - `Expired` / `SeatLimitReached` - the matched record's policy failed
pub fn validate_identities(
    file: &LicenseFile,
    identities: &[Identity],
    code: ProgramCode,
    now: u32,
    secret: &SharedSecret,
) -> Result<Identity, SeatwardenError> {
    for identity in identities {
        if let Some(hit) = lookup(file, &identity.host, identity.addr, code, secret) {
            tracing::debug!(
                host = %identity.host,
                addr = %identity.addr,
                tier = ?hit.tier,
                record = hit.index,
                "local record matched"
            );
            evaluate(hit.block, file, now, SeatPolicy::Local, &identity.host)?;
            return Ok(identity.clone());
        }
    }

    Err(SeatwardenError::NotLicensed {
        host: identities
            .first()
            .map(|i| i.host.clone())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::builder::{Grant, LicenseBuilder};
    use crate::record::file::LICENSE_FILE_NAME;
    use std::net::Ipv4Addr;
    use tempfile::TempDir;

    fn build(grants: Vec<Grant>) -> LicenseFile {
        let mut builder = LicenseBuilder::new();
        for grant in grants {
            builder.add(grant).unwrap();
        }
        builder.build(&SharedSecret::builtin())
    }

    fn ids() -> Vec<Identity> {
        vec![
            Identity::new("build1", Ipv4Addr::new(192, 168, 0, 1)),
            Identity::new("build1:0A1B2C3D4E5F", Ipv4Addr::new(192, 168, 0, 1)),
            Identity::new("build1", Ipv4Addr::new(10, 0, 0, 7)),
        ]
    }

    #[test]
    fn test_falls_through_to_interface_identity() {
        let file = build(vec![Grant::host("build1", Ipv4Addr::new(10, 0, 0, 7), ProgramCode::Xiv)]);
        let secret = SharedSecret::builtin();
        let id = validate_identities(&file, &ids(), ProgramCode::Xiv, 0, &secret).unwrap();
        assert_eq!(id.addr, Ipv4Addr::new(10, 0, 0, 7));
    }

    #[test]
    fn test_hardware_claim_matches() {
        let file = build(vec![Grant::host(
            "build1:0a1b2c3d4e5f",
            Ipv4Addr::new(192, 168, 0, 1),
            ProgramCode::Wrspice,
        )]);
        let secret = SharedSecret::builtin();
        let id = validate_identities(&file, &ids(), ProgramCode::Wrspice, 0, &secret).unwrap();
        assert_eq!(id.host, "build1:0A1B2C3D4E5F");
    }

    #[test]
    fn test_policy_failure_is_final() {
        let file = build(vec![
            Grant::host("build1", Ipv4Addr::new(192, 168, 0, 1), ProgramCode::Xic).expires(10),
            Grant::host("build1", Ipv4Addr::new(10, 0, 0, 7), ProgramCode::Xic),
        ]);
        let secret = SharedSecret::builtin();
        let result = validate_identities(&file, &ids(), ProgramCode::Xic, 100, &secret);
        assert!(matches!(result, Err(SeatwardenError::Expired { .. })));
    }

    #[test]
    fn test_floating_caps_need_daemon() {
        let file = build(vec![
            Grant::host("build1", Ipv4Addr::new(192, 168, 0, 1), ProgramCode::Xic).seats(4)
        ]);
        let secret = SharedSecret::builtin();
        let result = validate_identities(&file, &ids(), ProgramCode::Xic, 0, &secret);
        assert!(matches!(result, Err(SeatwardenError::SeatLimitReached { .. })));
    }

    #[test]
    fn test_no_match_names_primary_host() {
        let file = build(vec![]);
        let secret = SharedSecret::builtin();
        let result = validate_identities(&file, &ids(), ProgramCode::Xic, 0, &secret);
        assert!(matches!(result, Err(SeatwardenError::NotLicensed { host }) if host == "build1"));
    }

    #[test]
    fn test_load_from_search_path() {
        let dir = TempDir::new().unwrap();
        let secret = SharedSecret::builtin();
        build(vec![])
            .save(&dir.path().join(LICENSE_FILE_NAME))
            .unwrap();
        let search = format!("/nonexistent:{}", dir.path().display());
        assert!(load_license(&search, &secret).is_ok());
        assert!(matches!(
            load_license("/nonexistent", &secret),
            Err(SeatwardenError::NoLicenseFile(_))
        ));
    }
}
