//! SSRF Protection
//!
//! Decides whether a partner webhook URL may be called at all.
//!
//! Checks are static: the host is normalised textually and never resolved,
//! so a public name that resolves to a private address is not caught here.

use std::net::IpAddr;

use reqwest::Url;

use super::types::UrlRejection;

/// Hosts refused outright, unless they name the backend itself.
pub const BLOCKED_HOSTS: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "0.0.0.0",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
];

/// Textual prefixes of private-network hosts.
pub const BLOCKED_PREFIXES: &[&str] = &["169.254.", "10.", "192.168."];

/// Validates partner webhook URLs before any request is made.
///
/// `backend_host` is the host of the server's own public URL. A URL pointing
/// at that host is allowed even when it is a loopback name, so a deployment can
/// host its own demo webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookUrlValidator {
    backend_host: Option<String>,
}

impl WebhookUrlValidator {
    pub fn new(backend_host: Option<&str>) -> Self {
        Self {
            backend_host: backend_host
                .map(normalize_host)
                .filter(|host| !host.is_empty()),
        }
    }

    /// Take the backend host from the server's public base URL.
    ///
    /// An unparseable base URL disables the self-call exception.
    pub fn from_backend_url(backend_url: &str) -> Self {
        let host = Url::parse(backend_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned));
        Self::new(host.as_deref())
    }

    pub fn backend_host(&self) -> Option<&str> {
        self.backend_host.as_deref()
    }

    /// Accept or reject a webhook URL, returning it parsed on success.
    pub fn validate(&self, url: &str) -> Result<Url, UrlRejection> {
        let url = url.trim();
        if url.is_empty() {
            return Err(UrlRejection::Empty);
        }

        let parsed = Url::parse(url).map_err(|e| UrlRejection::Malformed(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(UrlRejection::BadScheme(parsed.scheme().to_owned()));
        }

        let host = normalize_host(parsed.host_str().unwrap_or_default());
        if host.is_empty() {
            return Err(UrlRejection::NoHost);
        }

        if self.is_backend_self_call(&host) {
            return Ok(parsed);
        }

        if BLOCKED_HOSTS.contains(&host.as_str()) {
            return Err(UrlRejection::Blocked(host));
        }
        if BLOCKED_PREFIXES.iter().any(|prefix| host.starts_with(prefix)) {
            return Err(UrlRejection::BlockedPrivate(host));
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            if is_private_ip(&ip) {
                return Err(UrlRejection::BlockedPrivate(host));
            }
        }

        Ok(parsed)
    }

    /// The backend may call itself on a loopback host, nowhere else private.
    fn is_backend_self_call(&self, host: &str) -> bool {
        if self.backend_host.as_deref() != Some(host) {
            return false;
        }
        BLOCKED_HOSTS.contains(&host)
            || host
                .parse::<IpAddr>()
                .is_ok_and(|ip| ip.is_loopback() || ip.is_unspecified())
    }
}

/// Lowercase, strip IPv6 brackets and one trailing root-label dot.
///
/// `localhost.` resolves exactly like `localhost`, so both must compare equal.
fn normalize_host(host: &str) -> String {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase()
}

/// Check if an IP address is private, loopback, link-local, or otherwise reserved.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            v4.is_loopback()              // 127.0.0.0/8
                || v4.is_private()         // 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
                || v4.is_link_local()      // 169.254.0.0/16
                || v4.is_broadcast()
                || v4.is_unspecified()
                || a == 100 && (b & 0xC0) == 64 // 100.64.0.0/10 (CGN)
                || a == 198 && (b & 0xFE) == 18 // 198.18.0.0/15 (benchmark)
                || a == 192 && b == 0 && (c == 0 || c == 2) // IETF, TEST-NET-1
                || a == 198 && b == 51 && c == 100 // TEST-NET-2
                || a == 203 && b == 0 && c == 113 // TEST-NET-3
                || a >= 224 // multicast + reserved
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xFE00) == 0xFC00 // fc00::/7 (ULA)
                || (v6.segments()[0] & 0xFFC0) == 0xFE80 // fe80::/10 (link-local)
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}
