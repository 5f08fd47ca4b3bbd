//! Startup helpers.
//!
//! # Responsibilities
//! - Bind the client-facing listener before the server is built
//! - Evaluate a single device against the startup policy (check mode)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::fmt;
use std::net::TcpListener;

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::migration::router::bucket;
use crate::migration::{route, MigrationPolicy, Percentage, PolicyError, RouteDecision};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the client-facing listener.
pub fn bind_listener(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address).map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}

/// How the startup policy treats one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCheck {
    pub udid: String,
    pub bucket: u32,
    pub percentage: Percentage,
    pub explicitly_listed: bool,
    pub decision: RouteDecision,
}

impl DeviceCheck {
    pub fn evaluate(config: &ProxyConfig, udid: &str) -> Result<Self, PolicyError> {
        let percentage = Percentage::try_from(config.migration.percentage)?;
        let policy = MigrationPolicy::new(config.migration.udids.iter().map(|u| u.trim()), percentage);

        Ok(Self {
            udid: udid.to_string(),
            bucket: bucket(udid),
            percentage,
            explicitly_listed: policy.included.contains(udid),
            decision: route(udid, &policy),
        })
    }
}

impl fmt::Display for DeviceCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "udid:              {}", self.udid)?;
        writeln!(f, "bucket:            {}", self.bucket)?;
        writeln!(f, "percentage:        {}", self.percentage)?;
        writeln!(f, "explicitly listed: {}", self.explicitly_listed)?;
        write!(f, "backend:           {}", self.decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_device_is_new() {
        let mut config = ProxyConfig::default();
        config.migration.udids = vec!["ABC".into()];
        let check = DeviceCheck::evaluate(&config, "ABC").unwrap();
        assert!(check.explicitly_listed);
        assert_eq!(check.decision, RouteDecision::New);
        assert!(check.to_string().contains("backend:           new"));
    }

    #[test]
    fn unlisted_device_follows_percentage() {
        let mut config = ProxyConfig::default();
        let zero = DeviceCheck::evaluate(&config, "XYZ").unwrap();
        assert_eq!(zero.decision, RouteDecision::Legacy);
        assert!(!zero.explicitly_listed);

        config.migration.percentage = 100;
        let full = DeviceCheck::evaluate(&config, "XYZ").unwrap();
        assert_eq!(full.decision, RouteDecision::New);
        assert_eq!(full.bucket, zero.bucket);
    }

    #[test]
    fn invalid_percentage_is_an_error() {
        let mut config = ProxyConfig::default();
        config.migration.percentage = -1;
        assert!(DeviceCheck::evaluate(&config, "XYZ").is_err());
    }

    #[test]
    fn bind_reports_address() {
        let err = bind_listener("not-an-address").unwrap_err();
        assert!(err.to_string().contains("not-an-address"));
    }
}
