use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use rtb_bidder::price::PriceCodec;

#[derive(Parser)]
#[command(name = "bidder-cli")]
#[command(about = "Management CLI for the RTB bidder", long_about = None)]
struct Cli {
    /// Base URL of a listener with the ADMIN feature.
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    /// Bearer key for the status endpoint.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version and controller states
    Status,
    /// Check whether every controller is running
    Health,
    /// Encode or decode winning prices offline
    Price {
        /// Base64 encryption key
        #[arg(long)]
        encryption_key: String,
        /// Base64 integrity key
        #[arg(long)]
        integrity_key: String,
        #[command(subcommand)]
        action: PriceAction,
    },
}

#[derive(Subcommand)]
enum PriceAction {
    /// Encrypt a price given in currency units
    Encode { price: f64 },
    /// Decrypt and verify a price token
    Decode { token: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let mut headers = HeaderMap::new();
            if let Some(key) = &cli.key {
                headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
            }
            let res = reqwest::Client::new()
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = reqwest::get(format!("{}/healthz", cli.url)).await?;
            print_response(res).await?;
        }
        Commands::Price {
            encryption_key,
            integrity_key,
            action,
        } => {
            let codec = PriceCodec::from_base64(&encryption_key, &integrity_key)?;
            match action {
                PriceAction::Encode { price } => println!("{}", codec.encode(price)?),
                PriceAction::Decode { token } => println!("{}", codec.decode(&token)?),
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: bidder returned status {}", status);
    }
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
