use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shorturl::api::ErrorResponse;
use shorturl::models::{CreateShortUrlRequest, CreateShortUrlResponse, UrlStatsResponse};

#[derive(Parser)]
#[command(name = "shorturl-admin")]
#[command(about = "Manage short URLs on a running shorturl server", long_about = None)]
struct Cli {
    /// Base address of the server
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shorten a URL
    Create {
        /// Target URL (http or https)
        url: String,
        /// Validity in minutes (server default when omitted)
        #[arg(long)]
        validity: Option<i64>,
        /// Custom shortcode
        #[arg(long)]
        code: Option<String>,
    },
    /// Show statistics for a shortcode
    Stats { code: String },
    /// Delete a shortcode
    Delete { code: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let server = cli.server.trim_end_matches('/');

    match cli.command {
        Commands::Create {
            url,
            validity,
            code,
        } => {
            let request = CreateShortUrlRequest {
                url,
                validity,
                shortcode: code,
            };
            let response = client
                .post(format!("{server}/shorturls"))
                .json(&request)
                .send()
                .await
                .context("failed to reach server")?;
            if !response.status().is_success() {
                return Err(server_error(response).await);
            }
            let created: CreateShortUrlResponse = response.json().await?;
            println!("✓ Created {}", created.short_link);
            println!("  expires {}", created.expiry.to_rfc3339());
        }
        Commands::Stats { code } => {
            let response = client
                .get(format!("{server}/shorturls/{code}"))
                .send()
                .await
                .context("failed to reach server")?;
            if !response.status().is_success() {
                return Err(server_error(response).await);
            }
            let stats: UrlStatsResponse = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Delete { code } => {
            let response = client
                .delete(format!("{server}/shorturls/{code}"))
                .send()
                .await
                .context("failed to reach server")?;
            if !response.status().is_success() {
                return Err(server_error(response).await);
            }
            println!("✓ Deleted shortcode '{}'", code);
        }
    }

    Ok(())
}

async fn server_error(response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) if body.details.is_empty() => anyhow::anyhow!("{} ({})", body.error, status),
        Ok(body) => anyhow::anyhow!("{} ({}): {}", body.error, status, body.details),
        Err(_) => anyhow::anyhow!("server returned {status}"),
    }
}
