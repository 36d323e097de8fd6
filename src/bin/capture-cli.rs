use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "capture-cli")]
#[command(about = "Operator CLI for the HAR capturing proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Bearer token; omit when the endpoints are unauthenticated.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a client IP address to an app
    MapAdd {
        ip_address: String,
        package: String,
        platform: String,
    },
    /// Remove every mapping for the given triple
    MapRemove {
        ip_address: String,
        package: String,
        platform: String,
    },
    /// List requests archived under a mapping
    Requests { mapping_id: String },
    /// Export the captured entries as HAR
    Entries,
    /// Clear the captured entries
    Reset,
    /// Show the capture policy
    Policy,
    /// Change the capture policy
    SetPolicy {
        #[arg(long)]
        body_logging: bool,
        #[arg(long)]
        post_data_logging: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let res = match cli.command {
        Commands::MapAdd {
            ip_address,
            package,
            platform,
        } => {
            client
                .post(format!("{}/mappings", cli.url))
                .headers(headers)
                .json(&json!({ "ip_address": ip_address, "package": package, "platform": platform }))
                .send()
                .await?
        }
        Commands::MapRemove {
            ip_address,
            package,
            platform,
        } => {
            client
                .delete(format!("{}/mappings", cli.url))
                .headers(headers)
                .json(&json!({ "ip_address": ip_address, "package": package, "platform": platform }))
                .send()
                .await?
        }
        Commands::Requests { mapping_id } => {
            client
                .get(format!("{}/mappings/requests", cli.url))
                .query(&[("id", mapping_id)])
                .headers(headers)
                .send()
                .await?
        }
        Commands::Entries => {
            client
                .get(format!("{}/entries", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Reset => {
            client
                .post(format!("{}/entries/reset", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Policy => {
            client
                .get(format!("{}/capture/policy", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::SetPolicy {
            body_logging,
            post_data_logging,
        } => {
            client
                .put(format!("{}/capture/policy", cli.url))
                .headers(headers)
                .json(&json!({ "body_logging": body_logging, "post_data_logging": post_data_logging }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: operator API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
