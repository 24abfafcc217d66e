use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "glance", about = "Glance face recognition CLI")]
struct Cli {
    /// Base URL of the glanced daemon.
    #[arg(long, default_value = "http://127.0.0.1:8093")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new identity from an image
    Register {
        /// Display name for the identity
        #[arg(short, long)]
        name: String,
        /// Image file containing the face
        image: PathBuf,
    },
    /// Detect faces in an image
    Detect { image: PathBuf },
    /// Recognize registered identities in an image
    Recognize { image: PathBuf },
    /// Check daemon health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Register { name, image } => {
            let url = format!("{}/api/recognition/register", cli.addr);
            let request = client.post(&url).query(&[("name", name)]);
            let body = upload(request, &image).await?;
            print_json(&body);
        }
        Commands::Detect { image } => {
            let url = format!("{}/api/recognition/detect", cli.addr);
            let body = upload(client.post(&url), &image).await?;
            print_json(&body);
        }
        Commands::Recognize { image } => {
            let url = format!("{}/api/recognition/recognize", cli.addr);
            let body = upload(client.post(&url), &image).await?;
            print_json(&body);
        }
        Commands::Status => {
            let url = format!("{}/health", cli.addr);
            let response = client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("glanced not reachable at {}", cli.addr))?;
            println!("glanced: {}", response.status());
        }
    }

    Ok(())
}

/// Attach `image` as the multipart `file` field and send the request.
async fn upload(request: reqwest::RequestBuilder, image: &Path) -> Result<String> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("failed to read {}", image.display()))?;

    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let form = reqwest::multipart::Form::new()
        .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

    let response = request.multipart(form).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        bail!("{status}: {body}");
    }
    Ok(body)
}

/// Pretty-print a JSON response body, falling back to the raw text.
fn print_json(body: &str) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default()),
        Err(_) => println!("{body}"),
    }
}
