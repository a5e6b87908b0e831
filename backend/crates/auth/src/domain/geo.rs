//! Location and device labels
//!
//! Turns an IP into a coarse location string and a User-Agent into a device
//! label. Both end up in audit rows and notification emails, and location
//! strings are compared verbatim by the lockout policy.

use std::fmt;
use std::net::IpAddr;

use platform::client::is_local_network;

pub const LOCAL_NETWORK: &str = "Local Network";
/// The lookup itself failed or there was no address
pub const LOOKUP_FAILED: &str = "Unknown location";
/// The lookup succeeded but returned neither city nor country
pub const NO_LOCATION_DATA: &str = "Unknown Location";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoLocation {
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("Geolocation lookup failed: {0}")]
pub struct GeoError(pub String);

/// IP geolocation lookup
pub trait GeoLocator: Send + Sync + fmt::Debug {
    fn locate(&self, ip: IpAddr) -> Result<GeoLocation, GeoError>;
}

/// Location label for an IP
///
/// Local addresses never reach the locator.
pub fn resolve_location(locator: &dyn GeoLocator, ip: Option<IpAddr>) -> String {
    let Some(ip) = ip else {
        return LOOKUP_FAILED.to_string();
    };
    if is_local_network(&ip) {
        return LOCAL_NETWORK.to_string();
    }

    match locator.locate(ip) {
        Ok(GeoLocation {
            city: Some(city),
            country: Some(country),
        }) => format!("{city}, {country}"),
        Ok(GeoLocation {
            country: Some(country),
            ..
        }) => country,
        Ok(_) => NO_LOCATION_DATA.to_string(),
        Err(e) => {
            tracing::debug!(%ip, error = %e, "Geolocation lookup failed");
            LOOKUP_FAILED.to_string()
        }
    }
}

/// "Device (OS, Browser)" label from a User-Agent
pub fn describe_device(user_agent: Option<&str>) -> String {
    let Some(ua) = user_agent.filter(|ua| !ua.trim().is_empty()) else {
        return "Unknown device".to_string();
    };

    let os = if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("iPhone") || ua.contains("iPad") {
        "iOS"
    } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
        "macOS"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("CrOS") {
        "ChromeOS"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        "Unknown OS"
    };

    // Order matters: Edge and Opera UAs also contain "Chrome", Chrome's contains "Safari"
    let browser = if ua.contains("Edg/") {
        "Edge"
    } else if ua.contains("OPR/") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Firefox/") {
        "Firefox"
    } else if ua.contains("Chrome/") || ua.contains("CriOS/") {
        "Chrome"
    } else if ua.contains("Safari/") {
        "Safari"
    } else {
        "Unknown browser"
    };

    let device = if ua.contains("iPad") || ua.contains("Tablet") {
        "Tablet"
    } else if ua.contains("Mobile") || ua.contains("iPhone") {
        "Mobile"
    } else {
        "Desktop"
    };

    format!("{device} ({os}, {browser})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FixedLocator(Result<GeoLocation, &'static str>);

    impl GeoLocator for FixedLocator {
        fn locate(&self, _ip: IpAddr) -> Result<GeoLocation, GeoError> {
            self.0.clone().map_err(|e| GeoError(e.to_string()))
        }
    }

    fn public_ip() -> Option<IpAddr> {
        Some("203.0.113.9".parse().unwrap())
    }

    #[test]
    fn test_local_addresses_skip_lookup() {
        let locator = FixedLocator(Err("must not be called"));
        for ip in ["127.0.0.1", "::1", "192.168.1.20", "10.0.0.3"] {
            assert_eq!(
                resolve_location(&locator, Some(ip.parse().unwrap())),
                LOCAL_NETWORK
            );
        }
    }

    #[test]
    fn test_location_formats() {
        let both = FixedLocator(Ok(GeoLocation {
            city: Some("Lisbon".into()),
            country: Some("Portugal".into()),
        }));
        assert_eq!(resolve_location(&both, public_ip()), "Lisbon, Portugal");

        let country_only = FixedLocator(Ok(GeoLocation {
            city: None,
            country: Some("Portugal".into()),
        }));
        assert_eq!(resolve_location(&country_only, public_ip()), "Portugal");

        let empty = FixedLocator(Ok(GeoLocation::default()));
        assert_eq!(resolve_location(&empty, public_ip()), NO_LOCATION_DATA);

        let failing = FixedLocator(Err("timeout"));
        assert_eq!(resolve_location(&failing, public_ip()), LOOKUP_FAILED);
        assert_eq!(resolve_location(&failing, None), LOOKUP_FAILED);
    }

    #[test]
    fn test_describe_device() {
        let chrome_win = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        assert_eq!(describe_device(Some(chrome_win)), "Desktop (Windows, Chrome)");

        let safari_iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
        assert_eq!(describe_device(Some(safari_iphone)), "Mobile (iOS, Safari)");

        let edge_mac = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
        assert_eq!(describe_device(Some(edge_mac)), "Desktop (macOS, Edge)");

        assert_eq!(describe_device(None), "Unknown device");
        assert_eq!(describe_device(Some("  ")), "Unknown device");
    }
}
