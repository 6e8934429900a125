use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    routing::{get, post},
    Json, Router,
};
use chain_core::{ChainError, Draft, Ledger};
use chain_storage::SledKv;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Data directory for sled
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Append this many synthetic blocks after startup (0 disables)
    #[arg(long, default_value_t = 0)]
    demo_blocks: u32,

    /// Delay between synthetic appends, in milliseconds
    #[arg(long, default_value_t = 1000)]
    demo_interval_ms: u64,
}

#[derive(Clone)]
struct AppState {
    ledger: Ledger<SledKv>,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Head {
    height: Option<u64>,
    tip_hash: Option<String>,
}

#[derive(Serialize)]
struct Validation {
    invalid: Vec<u64>,
}

#[derive(Deserialize)]
struct AppendIn {
    body: String,
}

fn error_response(err: ChainError) -> Response {
    match err {
        ChainError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()).into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = Arc::new(SledKv::open(&args.data_dir)?);
    let ledger = Ledger::new(store);
    ledger.bootstrap_genesis().await?;

    let state = AppState { ledger };

    if args.demo_blocks > 0 {
        tokio::spawn(demo_appender(
            state.ledger.clone(),
            args.demo_blocks,
            args.demo_interval_ms,
        ));
    }

    let app = Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route(
            "/chain/head",
            get({
                let state = state.clone();
                move || async move {
                    match head(&state.ledger).await {
                        Ok(head) => Json(head).into_response(),
                        Err(err) => error_response(err),
                    }
                }
            }),
        )
        .route(
            "/chain/validate",
            get({
                let state = state.clone();
                move || async move {
                    match state.ledger.validate_chain().await {
                        Ok(invalid) => Json(Validation { invalid }).into_response(),
                        Err(err) => error_response(err),
                    }
                }
            }),
        )
        .route(
            "/block/{height}",
            get({
                let state = state.clone();
                move |Path(height): Path<u64>| async move {
                    match state.ledger.get_block(height).await {
                        Ok(block) => Json(block).into_response(),
                        Err(err) => error_response(err),
                    }
                }
            }),
        )
        .route(
            "/block",
            post({
                let state = state.clone();
                move |Json(input): Json<AppendIn>| async move {
                    match state.ledger.append(Draft::new(input.body)).await {
                        Ok(block) => Json(block).into_response(),
                        Err(err) => error_response(err),
                    }
                }
            }),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = args.listen.parse()?;
    info!("chain-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

async fn head(ledger: &Ledger<SledKv>) -> Result<Head, ChainError> {
    let height = ledger.current_height().await?;
    let tip_hash = match height {
        Some(height) => Some(ledger.get_block(height).await?.hash),
        None => None,
    };
    Ok(Head { height, tip_hash })
}

/// Appends synthetic blocks on a timer, then reports on chain integrity.
async fn demo_appender(ledger: Ledger<SledKv>, count: u32, interval_ms: u64) {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    for i in 1..=count {
        ticker.tick().await;
        match ledger.append(Draft::new(format!("demo payload {i}"))).await {
            Ok(block) => info!("demo block {} appended at height {}", i, block.height),
            Err(err) => warn!("demo append {i} failed: {err}"),
        }
    }
    match ledger.validate_chain().await {
        Ok(invalid) if invalid.is_empty() => info!("no errors detected"),
        Ok(invalid) => warn!("invalid heights: {invalid:?}"),
        Err(err) => warn!("chain validation failed: {err}"),
    }
}
