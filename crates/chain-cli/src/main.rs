use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "chain-cli")]
#[command(about = "CLI client for the minimal chain node")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a block with the given payload
    Append {
        /// Node base URL (e.g. http://127.0.0.1:8080)
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        /// Opaque block payload
        #[arg(long)]
        body: String,
    },
    /// Show the current chain head
    Head {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
    /// Fetch the block at a height
    Get {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long)]
        height: u64,
    },
    /// Validate the whole chain and list invalid heights
    Validate {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
}

#[derive(Serialize)]
struct AppendReq {
    body: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Append { node, body } => {
            let client = reqwest::Client::new();
            let res = client
                .post(format!("{node}/block"))
                .json(&AppendReq { body })
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Head { node } => {
            print_response(reqwest::get(format!("{node}/chain/head")).await?).await?;
        }
        Command::Get { node, height } => {
            print_response(reqwest::get(format!("{node}/block/{height}")).await?).await?;
        }
        Command::Validate { node } => {
            print_response(reqwest::get(format!("{node}/chain/validate")).await?).await?;
        }
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    println!("{body}");
    Ok(())
}
