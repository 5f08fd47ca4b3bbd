//! MDM migration proxy.
//!
//! ```text
//!                          ┌──────────────────────────────────────────┐
//!                          │             MIGRATION PROXY              │
//!     Device / scanner     │  ┌──────────┐   ┌────────────┐           │
//!     ─────────────────────┼─▶│classifier│──▶│ dispatcher │           │
//!                          │  └──────────┘   └─────┬──────┘           │
//!                          │                       │ /mdm/* only      │
//!                          │                       ▼                  │
//!                          │               ┌──────────────┐           │
//!                          │               │ UDID + policy│           │
//!                          │               └──────┬───────┘           │
//!                          │          legacy ◀────┴────▶ new          │
//!                          │  ┌──────────────────┐  ┌──────────────┐  │
//!                          │  │ legacy backend   │  │ new backend  │──┼──▶ Fleet
//!                          │  └──────────────────┘  └──────────────┘  │
//!     Operator             │  ┌──────────────────────────────────┐    │
//!     ─────────────────────┼─▶│ /admin/{percentage,udids,policy} │    │
//!                          │  └──────────────────────────────────┘    │
//!                          └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use mdm_migration_proxy::config::{read_config, validate_config, TlsConfig};
use mdm_migration_proxy::lifecycle::signals::spawn_signal_handler;
use mdm_migration_proxy::lifecycle::startup::{bind_listener, DeviceCheck};
use mdm_migration_proxy::observability::{logging, metrics};
use mdm_migration_proxy::{HttpServer, ProxyConfig, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "mdm-migration-proxy")]
#[command(about = "Gradually migrates MDM-enrolled devices between two servers", long_about = None)]
struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    listen: Option<String>,

    /// Bearer token for the admin endpoints
    #[arg(long, env = "MIGRATION_PROXY_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Base URL of the legacy MDM server
    #[arg(long)]
    legacy_url: Option<String>,

    /// Name to verify the legacy server certificate against
    #[arg(long)]
    legacy_hostname: Option<String>,

    /// Base URL of the new MDM server
    #[arg(long)]
    new_url: Option<String>,

    /// Percentage of unlisted devices to migrate
    #[arg(long)]
    percentage: Option<i64>,

    /// Comma-separated UDIDs that are always migrated
    #[arg(long, value_delimiter = ',')]
    udids: Option<Vec<String>>,

    /// Log upstream responses from the new server and undecodable bodies
    #[arg(long)]
    debug: bool,

    /// Log forbidden requests at info level
    #[arg(long)]
    log_skipped: bool,

    /// Print the routing decision for one UDID and exit
    #[arg(long, value_name = "UDID")]
    check_udid: Option<String>,

    /// PEM certificate for serving TLS
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<String>,

    /// PEM private key for serving TLS
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<String>,

    /// Expose Prometheus metrics on the configured metrics address
    #[arg(long)]
    metrics: bool,
}

impl Cli {
    /// Layer flag values over the file configuration.
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(token) = self.auth_token {
            config.admin.auth_token = Some(token);
        }
        if let Some(url) = self.legacy_url {
            config.backends.legacy.url = url;
        }
        if let Some(name) = self.legacy_hostname {
            config.backends.legacy.tls_server_name = Some(name);
        }
        if let Some(url) = self.new_url {
            config.backends.new.url = url;
        }
        if let Some(percentage) = self.percentage {
            config.migration.percentage = percentage;
        }
        if let Some(udids) = self.udids {
            config.migration.udids = udids
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect();
        }
        if let (Some(cert_path), Some(key_path)) = (self.tls_cert, self.tls_key) {
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        config.observability.debug |= self.debug;
        config.observability.log_skipped |= self.log_skipped;
        config.observability.metrics_enabled |= self.metrics;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    let check_udid = cli.check_udid.take();
    cli.apply(&mut config);

    logging::init_logging(&config.observability);

    if let Some(udid) = check_udid {
        let check = DeviceCheck::evaluate(&config, udid.trim())?;
        println!("{check}");
        return Ok(());
    }

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(error = %error, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "mdm-migration-proxy starting"
    );

    // Both the listener and the upstream connector use aws-lc-rs.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = bind_listener(&config.listener.bind_address)?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
