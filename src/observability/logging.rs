//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Pick the log level from config, debug mode, or `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` always wins over configuration

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Default filter directive for the given settings.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    let level = if config.debug {
        "debug"
    } else {
        config.log_level.as_str()
    };
    format!("mdm_migration_proxy={level},tower_http={level}")
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    // A subscriber may already be installed (tests, embedding).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_mode_overrides_level() {
        let mut config = ObservabilityConfig::default();
        assert_eq!(default_directive(&config), "mdm_migration_proxy=info,tower_http=info");

        config.debug = true;
        assert_eq!(default_directive(&config), "mdm_migration_proxy=debug,tower_http=debug");
    }
}
