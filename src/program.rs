//! Program codes identifying which application a license record authorizes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Application identifier stored in license records and requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ProgramCode {
    /// The license daemon itself. Never counted against seats.
    Server = 1,
    /// OpenAccess plug-in.
    Oa = 2,
    /// Viewer-only layout editor.
    Xiv = 3,
    /// Mid-tier layout editor.
    Xicii = 4,
    /// Full layout editor; the umbrella code.
    Xic = 5,
    /// Headless layout server.
    XicDaemon = 6,
    /// Circuit simulator.
    Wrspice = 7,
}

impl ProgramCode {
    /// Every known code, in wire order.
    pub const ALL: [ProgramCode; 7] = [
        Self::Server,
        Self::Oa,
        Self::Xiv,
        Self::Xicii,
        Self::Xic,
        Self::XicDaemon,
        Self::Wrspice,
    ];

    /// Decode a stored or wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| *c as u8 == value)
    }

    /// Decode a 32-bit wire field.
    pub fn from_u32(value: u32) -> Option<Self> {
        u8::try_from(value).ok().and_then(Self::from_u8)
    }

    /// Codes to try, highest capability first, when requesting `self`.
    ///
    /// Only the umbrella code has a downgrade chain.
    pub fn downgrade_chain(self) -> &'static [ProgramCode] {
        match self {
            Self::Xic => &[Self::Xic, Self::Xicii, Self::Xiv],
            Self::Server => &[Self::Server],
            Self::Oa => &[Self::Oa],
            Self::Xiv => &[Self::Xiv],
            Self::Xicii => &[Self::Xicii],
            Self::XicDaemon => &[Self::XicDaemon],
            Self::Wrspice => &[Self::Wrspice],
        }
    }

    /// Programs that are re-invoked in quick succession by batch scripts
    /// and may reuse a validation made a few seconds earlier.
    pub fn allows_quick_revalidate(self) -> bool {
        matches!(self, Self::Wrspice)
    }

    /// Canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Server => "SERVER",
            Self::Oa => "OA",
            Self::Xiv => "XIV",
            Self::Xicii => "XICII",
            Self::Xic => "XIC",
            Self::XicDaemon => "XIC_DAEMON",
            Self::Wrspice => "WRSPICE",
        }
    }
}

impl fmt::Display for ProgramCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProgramCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == upper)
            .ok_or_else(|| format!("unknown program code: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values_roundtrip() {
        for code in ProgramCode::ALL {
            assert_eq!(ProgramCode::from_u8(code as u8), Some(code));
            assert_eq!(ProgramCode::from_u32(code as u32), Some(code));
        }
        assert_eq!(ProgramCode::from_u8(0), None);
        assert_eq!(ProgramCode::from_u32(0x105), None);
    }

    #[test]
    fn test_umbrella_downgrade_order() {
        assert_eq!(
            ProgramCode::Xic.downgrade_chain(),
            &[ProgramCode::Xic, ProgramCode::Xicii, ProgramCode::Xiv]
        );
        assert_eq!(ProgramCode::Wrspice.downgrade_chain(), &[ProgramCode::Wrspice]);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("xic_daemon".parse::<ProgramCode>(), Ok(ProgramCode::XicDaemon));
        assert_eq!(" XIC ".parse::<ProgramCode>(), Ok(ProgramCode::Xic));
        assert!("spice".parse::<ProgramCode>().is_err());
    }

    #[test]
    fn test_serde_uses_upper_case_names() {
        let json = serde_json::to_string(&ProgramCode::XicDaemon).unwrap();
        assert_eq!(json, "\"XIC_DAEMON\"");
        let back: ProgramCode = serde_json::from_str("\"WRSPICE\"").unwrap();
        assert_eq!(back, ProgramCode::Wrspice);
    }
}
