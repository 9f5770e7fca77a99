use std::collections::HashSet;

use tracing::{debug, info, warn};

use provenant_core::LedgerError;

use crate::client::PeerClient;
use crate::registry::{normalize_url, PeerRegistry};

/// Bootstrap join: announce this node at `bootstrap_url`, adopt the
/// bootstrap's peer list, and walk `/nodes` of newly learned peers up to
/// `depth` hops, announcing ourselves at each.
///
/// Unreachable peers along the walk are logged and skipped; the node comes
/// up with whatever portion of the mesh answered.
pub async fn discover(
    registry: &PeerRegistry,
    client: &PeerClient,
    bootstrap_url: &str,
    depth: u32,
) -> Result<usize, LedgerError> {
    let bootstrap = normalize_url(bootstrap_url)?;
    registry.add(&bootstrap)?;
    if let Err(e) = client.register_self(&bootstrap, registry.self_url()).await {
        warn!(peer = %bootstrap, error = %e, "could not announce to bootstrap node");
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier = vec![bootstrap];
    let mut discovered = 0usize;

    for hop in 0..=depth {
        let mut next = Vec::new();
        for peer in frontier.drain(..) {
            if !visited.insert(peer.clone()) {
                continue;
            }
            let nodes = match client.fetch_nodes(&peer).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "peer discovery fetch failed");
                    continue;
                }
            };
            for raw in nodes {
                let Ok(url) = normalize_url(&raw) else {
                    continue;
                };
                if url == registry.self_url() || visited.contains(&url) {
                    continue;
                }
                if registry.add(&url)? {
                    discovered += 1;
                    if let Err(e) = client.register_self(&url, registry.self_url()).await {
                        debug!(peer = %url, error = %e, "could not announce to discovered peer");
                    }
                }
                next.push(url);
            }
        }
        if next.is_empty() {
            break;
        }
        debug!(hop, frontier = next.len(), "peer discovery advancing");
        frontier = next;
    }

    info!(
        discovered,
        total = registry.len(),
        "bootstrap peer discovery finished"
    );
    Ok(discovered)
}
