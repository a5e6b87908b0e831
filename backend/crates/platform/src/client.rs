//! Client identification utilities
//!
//! Who is calling, as far as HTTP headers can tell.

use std::net::IpAddr;

use axum::http::{HeaderMap, header};

/// Request origin used for audit rows and rate-limit keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(ip: Option<IpAddr>, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }

    /// Build from request headers and the socket peer address
    pub fn from_headers(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Self {
        Self {
            ip: extract_client_ip(headers, direct_ip),
            user_agent: extract_user_agent(headers),
        }
    }

    pub fn ip_string(&self) -> Option<String> {
        self.ip.map(|ip| ip.to_string())
    }

    /// Rate limit identity; all unidentifiable clients share one bucket
    pub fn rate_limit_key(&self) -> String {
        match self.ip {
            Some(ip) => ip.to_string(),
            None => "unknown".to_string(),
        }
    }
}

/// Client IP address
///
/// Checks X-Forwarded-For (first entry) then X-Real-IP, falling back to the
/// direct connection address.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    forwarded.or_else(real_ip).or(direct_ip)
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .map(str::to_owned)
}

/// Loopback, private, link-local or unique-local address
///
/// Such addresses never leave the local network, so there is nothing to
/// geolocate.
pub fn is_local_network(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_local_network(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (first & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_client_ip_xff() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let ip = extract_client_ip(&headers, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(ip, Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_extract_client_ip_real_ip_then_direct() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(
            extract_client_ip(&headers, None),
            Some("198.51.100.7".parse().unwrap())
        );

        let direct: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(extract_client_ip(&HeaderMap::new(), Some(direct)), Some(direct));
    }

    #[test]
    fn test_extract_user_agent() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_user_agent(&headers), None);

        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
        assert_eq!(extract_user_agent(&headers).as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn test_is_local_network() {
        for local in ["127.0.0.1", "10.1.2.3", "192.168.0.10", "172.16.5.4", "::1", "fd00::1", "fe80::1", "::ffff:192.168.1.1"] {
            let ip: IpAddr = local.parse().unwrap();
            assert!(is_local_network(&ip), "{local} should be local");
        }
        for public in ["8.8.8.8", "203.0.113.9", "2001:4860:4860::8888"] {
            let ip: IpAddr = public.parse().unwrap();
            assert!(!is_local_network(&ip), "{public} should be public");
        }
    }

    #[test]
    fn test_rate_limit_key() {
        let info = ClientInfo::new(Some("203.0.113.9".parse().unwrap()), None);
        assert_eq!(info.rate_limit_key(), "203.0.113.9");
        assert_eq!(ClientInfo::default().rate_limit_key(), "unknown");
    }
}
