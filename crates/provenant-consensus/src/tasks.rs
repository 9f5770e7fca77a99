//! Background workers: auto-mining, peer health probing, periodic sync,
//! and periodic chain re-validation. Each runs as an independent tokio
//! task against the shared node state and is aborted on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use provenant_core::LedgerError;

use crate::node::LedgerNode;

/// Spawn every background loop. The caller keeps the handles and aborts
/// them during graceful shutdown.
pub fn spawn_background_tasks(node: &Arc<LedgerNode>) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(auto_mine_loop(Arc::clone(node))),
        tokio::spawn(health_probe_loop(Arc::clone(node))),
        tokio::spawn(sync_loop(Arc::clone(node))),
        tokio::spawn(revalidate_loop(Arc::clone(node))),
    ]
}

/// Mine when the periodic timer fires with a non-empty mempool, or
/// immediately when admission signals a threshold crossing. TTL eviction
/// piggybacks on the same loop.
async fn auto_mine_loop(node: Arc<LedgerNode>) {
    let mut ticker = interval(Duration::from_secs(node.config().auto_mine_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = node.wait_mine_signal() => {}
        }
        node.evict_expired_pending().await;
        if !node.is_chain_valid() || node.mempool_size().await == 0 {
            continue;
        }
        match Arc::clone(&node).mine_once().await {
            Ok(Some(index)) => debug!(index, "auto-mine sealed a block"),
            Ok(None) => {}
            Err(LedgerError::MiningCancelled) => debug!("auto-mine attempt cancelled"),
            Err(e) => warn!(error = %e, "auto-mine failed"),
        }
    }
}

/// Probe every registered peer's `/status`; one failed probe marks it
/// unhealthy, one success restores it. Peers are never removed.
async fn health_probe_loop(node: Arc<LedgerNode>) {
    let mut ticker = interval(Duration::from_secs(node.config().health_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        for peer in node.peers().urls() {
            let node = Arc::clone(&node);
            tokio::spawn(async move {
                let healthy = node.client().probe_status(&peer).await.is_ok();
                node.peers().mark(&peer, healthy);
            });
        }
    }
}

/// Periodic longest-valid-chain resolution against healthy peers.
async fn sync_loop(node: Arc<LedgerNode>) {
    let mut ticker = interval(Duration::from_secs(node.config().sync_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if node.peers().is_empty() {
            continue;
        }
        match node.resolve_conflicts().await {
            Ok(outcome) if outcome.adopted => {
                debug!(length = outcome.new_length, "periodic sync adopted a longer chain");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "periodic sync failed"),
        }
    }
}

/// Periodic local re-validation with auto-heal on failure.
async fn revalidate_loop(node: Arc<LedgerNode>) {
    let mut ticker = interval(Duration::from_secs(node.config().revalidate_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        node.revalidate_and_heal().await;
    }
}
