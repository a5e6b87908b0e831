//! Table-driven geolocation
//!
//! Deployments without a GeoIP service run with an empty table, so every
//! public address resolves to the "unknown" label. Tests seed entries to
//! simulate logins from different places.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::domain::geo::{GeoError, GeoLocation, GeoLocator};

#[derive(Debug, Clone, Default)]
pub struct StaticGeoLocator {
    entries: HashMap<IpAddr, GeoLocation>,
}

impl StaticGeoLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(
        mut self,
        ip: IpAddr,
        city: Option<&str>,
        country: Option<&str>,
    ) -> Self {
        self.entries.insert(
            ip,
            GeoLocation {
                city: city.map(str::to_string),
                country: country.map(str::to_string),
            },
        );
        self
    }
}

impl GeoLocator for StaticGeoLocator {
    fn locate(&self, ip: IpAddr) -> Result<GeoLocation, GeoError> {
        self.entries
            .get(&ip)
            .cloned()
            .ok_or_else(|| GeoError(format!("no entry for {ip}")))
    }
}
