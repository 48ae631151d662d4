//! Tick volatility attestation relay
//!
//! Scans a pool contract's swap logs over a block window, asks the local prover
//! for a ZK proof of the selected receipt fields and relays the proof to the
//! attestation network, which calls back the target contract once verified.

mod accumulator;
mod attestation_client;
mod chain_client;
mod config;
mod error;
mod pipeline;
mod prover_client;
mod receipt_builder;
mod schema;
mod server;
mod signer;
mod types;
mod window;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::attestation_client::HttpAttestationClient;
use crate::chain_client::RpcChainClient;
use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineSettings, RunSpec};
use crate::prover_client::HttpProverClient;
use crate::schema::Schema;
use crate::server::Triggers;
use crate::signer::SubmissionSigner;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting tick volatility attestation relay");

    // File first, environment overrides on top
    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config file {}: {}. Using environment variables.", args.config, e);
            Config::from_env().context("Failed to load configuration from environment variables")?
        }
    };
    info!("Configuration loaded successfully");

    let signer = Arc::new(SubmissionSigner::new(&config.server_private_key)?);
    info!("Submitting as {}", signer.address());

    let chain = RpcChainClient::new(&config.rpc_endpoint, config.request_timeout())?;
    let prover = HttpProverClient::new(&config.prover_endpoint, config.prove_timeout())?;
    let attestation = HttpAttestationClient::new(
        &config.attestation_endpoint,
        signer,
        config.request_timeout(),
        config.poll_interval(),
        config.max_poll_attempts,
    )?;

    let pipeline = Pipeline::new(
        Arc::new(chain),
        Arc::new(prover),
        Arc::new(attestation),
        PipelineSettings::from_config(&config)?,
    );

    let shutdown = CancellationToken::new();
    let triggers = Arc::new(Triggers {
        pipeline: Arc::new(pipeline),
        volatility: RunSpec {
            schema: Schema::Volatility,
            lookback: config.volatility_lookback,
        },
        compute: RunSpec {
            schema: Schema::Compute,
            lookback: config.compute_lookback,
        },
        shutdown: shutdown.clone(),
    });

    info!("All components initialized successfully");

    let (addr, server) = warp::serve(server::routes(triggers)).bind_with_graceful_shutdown(
        ([0, 0, 0, 0], config.port),
        async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown requested, cancelling in-flight runs");
            shutdown.cancel();
        },
    );

    info!("Server is running on {}", addr);
    server.await;

    Ok(())
}
