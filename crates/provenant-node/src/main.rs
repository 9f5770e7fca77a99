//! blockchain_service — the Provenant ledger-node binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the durable store and load the chain
//!   2. Validate; a corrupt or invalid replica refuses writes until healed
//!   3. Join the peer mesh via the bootstrap node, if given
//!   4. Heal from peers before serving, when needed
//!   5. Spawn background tasks (auto-mine, health probe, sync, re-validate)
//!   6. Serve the JSON HTTP API until ctrl-c, then drain and exit 0

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use provenant_consensus::{spawn_background_tasks, LedgerNode, NodeConfig};
use provenant_core::{DEFAULT_DIFFICULTY, PEER_DISCOVERY_DEPTH};
use provenant_p2p::discover;

#[derive(Parser, Debug)]
#[command(
    name = "blockchain_service",
    version,
    about = "Provenant ledger node — tamper-evident provenance for physical supply chains"
)]
struct Args {
    /// HTTP listen port. Peers reach this node at http://<host>:<port>.
    #[arg(long, env = "NODE_PORT")]
    port: u16,

    /// Leading hex zero characters required of every block hash.
    #[arg(long, env = "NODE_DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Peer URL to join on startup (recursive discovery follows).
    #[arg(long, env = "NODE_BOOTSTRAP")]
    bootstrap: Option<String>,

    /// Database path. Defaults to blockchain_<port>.db.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory holding <actor>_private.pem / <actor>_public.pem files.
    #[arg(long, env = "KEYS_DIR", default_value = "keys")]
    keys_dir: PathBuf,

    /// Accept unsigned transactions. Meant for local experiments only; the
    /// default requires a verifying signature on every submission.
    #[arg(long)]
    allow_unsigned: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,provenant=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!(port = args.port, difficulty = args.difficulty, "Provenant node starting");

    let mut cfg = NodeConfig::for_port(args.port);
    cfg.difficulty = args.difficulty;
    cfg.keys_dir = args.keys_dir;
    cfg.bootstrap = args.bootstrap;
    cfg.require_signatures = !args.allow_unsigned;
    if let Some(db) = args.db {
        cfg.db_path = db;
    }

    let node = LedgerNode::open(cfg.clone()).context("opening ledger node")?;

    // ── Peer mesh ─────────────────────────────────────────────────────────────
    if let Some(bootstrap) = &cfg.bootstrap {
        node.register_peer(bootstrap)
            .context("registering bootstrap peer")?;
        if let Err(e) = discover(node.peers(), node.client(), bootstrap, PEER_DISCOVERY_DEPTH).await
        {
            warn!(error = %e, "bootstrap discovery failed; continuing with known peers");
        }
    }

    // ── Heal before serving ───────────────────────────────────────────────────
    if !node.is_chain_valid() {
        warn!(
            message = %node.validation_message(),
            "replica invalid at startup; attempting heal before serving"
        );
        if let Err(e) = node.resolve_conflicts().await {
            warn!(error = %e, "startup heal attempt failed");
        }
        node.revalidate_and_heal().await;
    }

    // ── Background tasks & HTTP API ───────────────────────────────────────────
    let tasks = spawn_background_tasks(&node);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    provenant_rpc::serve(Arc::clone(&node), addr, shutdown_signal())
        .await
        .context("running HTTP server")?;

    info!("shutting down");
    for task in &tasks {
        task.abort();
    }
    Ok(())
}

/// Resolves on ctrl-c; axum then drains in-flight requests before the
/// process exits cleanly.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}
