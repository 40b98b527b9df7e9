//! Identity of the local machine: host name, addresses, and hardware ids.
//!
//! Used by the client driver to build the ordered list of identities it
//! presents, first to the license file or daemon, then as fallbacks.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// A network interface with an IPv4 address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface name (e.g. `eth0`).
    pub name: String,
    /// IPv4 address assigned to the interface.
    pub addr: Ipv4Addr,
    /// Hardware address as 12 upper-case hex digits, when known.
    pub hwaddr: Option<String>,
}

/// One (host claim, address) pair to present for validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Host claim, possibly with a `:hwaddr` suffix.
    pub host: String,
    /// Claimed IPv4 address.
    pub addr: Ipv4Addr,
}

impl Identity {
    /// Construct an identity.
    pub fn new(host: impl Into<String>, addr: Ipv4Addr) -> Self {
        Self {
            host: host.into(),
            addr,
        }
    }

    /// The host part of the claim without any `:suffix`.
    pub fn bare_host(&self) -> &str {
        self.host.split(':').next().unwrap_or(&self.host)
    }
}

/// Snapshot of the local machine's identity sources.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    /// Short host name.
    pub hostname: String,
    /// Primary IPv4 address (host name resolution, else first interface).
    pub primary_addr: Ipv4Addr,
    /// Every non-loopback address the host name resolves to, primary first.
    pub resolved_addrs: Vec<Ipv4Addr>,
    /// Primary hardware identifier.
    pub hardware_id: Option<String>,
    /// Non-loopback IPv4 interfaces.
    pub interfaces: Vec<Interface>,
}

impl LocalIdentity {
    /// Collect identity sources from the running system.
    pub fn collect() -> Self {
        let hostname = get_hostname();
        let interfaces = list_interfaces();
        let resolved_addrs: Vec<Ipv4Addr> = resolve_ipv4(&hostname)
            .into_iter()
            .filter(|a| !a.is_loopback())
            .collect();
        let primary_addr = resolved_addrs
            .first()
            .copied()
            .or_else(|| interfaces.first().map(|i| i.addr))
            .unwrap_or(Ipv4Addr::LOCALHOST);
        let hardware_id = interfaces
            .iter()
            .find(|i| i.addr == primary_addr)
            .and_then(|i| i.hwaddr.clone())
            .or_else(|| interfaces.iter().find_map(|i| i.hwaddr.clone()));

        tracing::debug!(
            host = %hostname,
            addr = %primary_addr,
            resolved = resolved_addrs.len(),
            interfaces = interfaces.len(),
            "collected local identity"
        );

        Self {
            hostname,
            primary_addr,
            resolved_addrs,
            hardware_id,
            interfaces,
        }
    }

    /// Ordered identities to try, without duplicates:
    /// primary, hardware-keyed primary, every other resolved address of the
    /// host name, then each interface address and each interface's
    /// hardware-keyed claim.
    pub fn candidates(&self) -> Vec<Identity> {
        let mut out: Vec<Identity> = Vec::new();
        let mut push = |id: Identity| {
            if !out.contains(&id) {
                out.push(id);
            }
        };

        push(Identity::new(self.hostname.clone(), self.primary_addr));
        if let Some(hw) = &self.hardware_id {
            push(Identity::new(hardware_claim(&self.hostname, hw), self.primary_addr));
        }
        for addr in &self.resolved_addrs {
            push(Identity::new(self.hostname.clone(), *addr));
        }
        for iface in &self.interfaces {
            push(Identity::new(self.hostname.clone(), iface.addr));
            if let Some(hw) = &iface.hwaddr {
                push(Identity::new(hardware_claim(&self.hostname, hw), iface.addr));
            }
        }
        out
    }
}

/// Host claim qualified by a hardware identifier.
pub fn hardware_claim(host: &str, hwaddr: &str) -> String {
    format!("{}:{}", host, hwaddr)
}

/// Short host name of this machine.
pub fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.split('.').next().unwrap_or_default().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// IPv4 addresses a host name resolves to.
pub fn resolve_ipv4(host: &str) -> Vec<Ipv4Addr> {
    match (host, 0).to_socket_addrs() {
        Ok(addrs) => addrs
            .filter_map(|sa| match sa.ip() {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .collect(),
        Err(e) => {
            tracing::debug!(host, error = %e, "host name did not resolve");
            Vec::new()
        }
    }
}

/// Format raw hardware address bytes as upper-case hex.
pub fn format_hwaddr(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() || bytes.iter().all(|b| *b == 0) {
        return None;
    }
    Some(hex::encode_upper(bytes))
}

/// Non-loopback IPv4 interfaces.
#[cfg(unix)]
pub fn list_interfaces() -> Vec<Interface> {
    use std::ffi::CStr;

    let mut out = Vec::new();
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();

    // SAFETY: getifaddrs allocates a list we release with freeifaddrs below.
    if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
        tracing::warn!("getifaddrs failed: {}", std::io::Error::last_os_error());
        return out;
    }

    let mut cursor = ifap;
    while !cursor.is_null() {
        // SAFETY: cursor is a live node of the list returned by getifaddrs.
        let ifa = unsafe { &*cursor };
        cursor = ifa.ifa_next;

        if ifa.ifa_addr.is_null() || ifa.ifa_name.is_null() {
            continue;
        }
        // SAFETY: ifa_addr is non-null and points at a sockaddr.
        let family = unsafe { (*ifa.ifa_addr).sa_family } as i32;
        if family != libc::AF_INET {
            continue;
        }
        // SAFETY: AF_INET addresses are sockaddr_in.
        let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
        let addr = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
        if addr.is_loopback() || addr.is_unspecified() {
            continue;
        }
        // SAFETY: ifa_name is a NUL-terminated string owned by the list.
        let name = unsafe { CStr::from_ptr(ifa.ifa_name) }
            .to_string_lossy()
            .into_owned();

        let hwaddr = read_hwaddr(&name);
        out.push(Interface { name, addr, hwaddr });
    }

    // SAFETY: ifap came from a successful getifaddrs call.
    unsafe { libc::freeifaddrs(ifap) };
    out
}

/// Interface enumeration is not available on this platform.
#[cfg(not(unix))]
pub fn list_interfaces() -> Vec<Interface> {
    Vec::new()
}

#[cfg(target_os = "linux")]
fn read_hwaddr(name: &str) -> Option<String> {
    let text = std::fs::read_to_string(format!("/sys/class/net/{}/address", name)).ok()?;
    let bytes: Option<Vec<u8>> = text
        .trim()
        .split(':')
        .map(|part| u8::from_str_radix(part, 16).ok())
        .collect();
    format_hwaddr(&bytes?)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn read_hwaddr(_name: &str) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LocalIdentity {
        LocalIdentity {
            hostname: "build1".into(),
            primary_addr: Ipv4Addr::new(192, 168, 0, 1),
            resolved_addrs: vec![Ipv4Addr::new(192, 168, 0, 1), Ipv4Addr::new(172, 16, 4, 2)],
            hardware_id: Some("0A1B2C3D4E5F".into()),
            interfaces: vec![
                Interface {
                    name: "eth0".into(),
                    addr: Ipv4Addr::new(192, 168, 0, 1),
                    hwaddr: Some("0A1B2C3D4E5F".into()),
                },
                Interface {
                    name: "eth1".into(),
                    addr: Ipv4Addr::new(10, 0, 0, 7),
                    hwaddr: None,
                },
            ],
        }
    }

    #[test]
    fn test_candidate_order_and_dedup() {
        let ids = sample().candidates();
        assert_eq!(
            ids,
            vec![
                Identity::new("build1", Ipv4Addr::new(192, 168, 0, 1)),
                Identity::new("build1:0A1B2C3D4E5F", Ipv4Addr::new(192, 168, 0, 1)),
                Identity::new("build1", Ipv4Addr::new(172, 16, 4, 2)),
                Identity::new("build1", Ipv4Addr::new(10, 0, 0, 7)),
            ]
        );
    }

    #[test]
    fn test_bare_host() {
        let id = Identity::new("build1:0A1B2C3D4E5F", Ipv4Addr::LOCALHOST);
        assert_eq!(id.bare_host(), "build1");
    }

    #[test]
    fn test_format_hwaddr() {
        assert_eq!(
            format_hwaddr(&[0x0a, 0x1b, 0x2c, 0x3d, 0x4e, 0x5f]),
            Some("0A1B2C3D4E5F".to_string())
        );
        assert_eq!(format_hwaddr(&[0; 6]), None);
    }

    #[test]
    fn test_collect_does_not_panic() {
        let local = LocalIdentity::collect();
        assert!(!local.hostname.is_empty());
        assert!(!local.candidates().is_empty());
        assert!(local.resolved_addrs.iter().all(|a| !a.is_loopback()));
    }
}
