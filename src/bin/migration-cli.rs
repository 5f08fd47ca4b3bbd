use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "migration-cli")]
#[command(about = "Admin CLI for the MDM migration proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "MIGRATION_PROXY_AUTH_TOKEN", hide_env_values = true)]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the rollout percentage (0-100)
    Percentage { value: i64 },
    /// Replace the explicitly migrated UDID set
    Udids {
        /// UDIDs to migrate; none clears the set
        ids: Vec<String>,
        /// Read whitespace-separated UDIDs from a file instead
        #[arg(short, long, conflicts_with = "ids")]
        file: Option<PathBuf>,
    },
    /// Show the current migration policy
    Policy,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.token))?,
    );

    let res = match cli.command {
        Commands::Percentage { value } => {
            client
                .post(format!("{base}/admin/percentage"))
                .headers(headers)
                .body(value.to_string())
                .send()
                .await?
        }
        Commands::Udids { ids, file } => {
            let body = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => ids.join("\n"),
            };
            client
                .post(format!("{base}/admin/udids"))
                .headers(headers)
                .body(body)
                .send()
                .await?
        }
        Commands::Policy => {
            client
                .get(format!("{base}/admin/policy"))
                .headers(headers)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: admin API returned status {status}");
        eprint!("{text}");
        return Ok(ExitCode::FAILURE);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => print!("{text}"),
    }
    Ok(ExitCode::SUCCESS)
}
