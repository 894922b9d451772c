//! Target URL safety checks.
//!
//! Probes must never reach loopback or internal network endpoints, whether
//! the URL names them directly or through DNS.

use std::net::{IpAddr, Ipv4Addr};

use url::{Host, Url};

use super::ProbeError;

/// Returns true if the URL may be probed. Fails closed.
pub async fn is_safe(url: &str) -> bool {
    check_url(url).await.is_ok()
}

/// Validate scheme and host, resolving the host to check every address.
pub async fn check_url(url: &str) -> Result<(), ProbeError> {
    let parsed = Url::parse(url).map_err(|e| ProbeError::Unsafe(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(ProbeError::Unsafe(format!("unsupported scheme: {}", other))),
    }

    let port = parsed.port_or_known_default().unwrap_or(80);

    match parsed.host() {
        None => Err(ProbeError::Unsafe("missing host".to_string())),
        Some(Host::Domain("")) => Err(ProbeError::Unsafe("missing host".to_string())),
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let addrs: Vec<_> = tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| {
                    ProbeError::Unsafe(format!("DNS resolution failed for {}: {}", domain, e))
                })?
                .collect();

            if addrs.is_empty() {
                return Err(ProbeError::Unsafe(format!("no addresses found for {}", domain)));
            }

            for addr in addrs {
                check_ip(addr.ip())?;
            }
            Ok(())
        }
    }
}

fn check_ip(ip: IpAddr) -> Result<(), ProbeError> {
    if is_forbidden_ip(ip) {
        return Err(ProbeError::Unsafe(format!("address {} is not publicly routable", ip)));
    }
    Ok(())
}

/// Loopback, private, unspecified, broadcast and link-local addresses.
pub fn is_forbidden_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_forbidden_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_forbidden_v4(v4);
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (first & 0xffc0) == 0xfe80 // link local fe80::/10
        }
    }
}

fn is_forbidden_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_link_local()
}
