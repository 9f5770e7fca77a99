use std::time::Duration;

use serde_json::{json, Value};

use provenant_core::{Block, LedgerError, PEER_FETCH_TIMEOUT_SECS, PEER_PROBE_TIMEOUT_SECS};

/// HTTP client for talking to other ledger nodes. Every call carries its
/// own timeout so a hung peer cannot stall a background task.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PEER_FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| LedgerError::Peer(format!("building http client: {e}")))?;
        Ok(Self { http })
    }

    /// Lightweight health probe: `GET /status` with the short timeout.
    pub async fn probe_status(&self, peer: &str) -> Result<Value, LedgerError> {
        let resp = self
            .http
            .get(format!("{peer}/status"))
            .timeout(Duration::from_secs(PEER_PROBE_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| transport_err(peer, e))?;
        if !resp.status().is_success() {
            return Err(LedgerError::Peer(format!(
                "{peer}/status returned {}",
                resp.status()
            )));
        }
        resp.json().await.map_err(|e| transport_err(peer, e))
    }

    /// Fetch a peer's full chain for longest-valid-chain resolution.
    pub async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, LedgerError> {
        let resp = self
            .http
            .get(format!("{peer}/chain"))
            .send()
            .await
            .map_err(|e| transport_err(peer, e))?;
        if !resp.status().is_success() {
            return Err(LedgerError::Peer(format!(
                "{peer}/chain returned {}",
                resp.status()
            )));
        }
        let body: Value = resp.json().await.map_err(|e| transport_err(peer, e))?;
        let chain = body
            .get("chain")
            .cloned()
            .ok_or_else(|| LedgerError::Peer(format!("{peer}/chain response lacks 'chain'")))?;
        serde_json::from_value(chain)
            .map_err(|e| LedgerError::Peer(format!("{peer} sent undecodable chain: {e}")))
    }

    /// Fetch the peer URLs a node knows about.
    pub async fn fetch_nodes(&self, peer: &str) -> Result<Vec<String>, LedgerError> {
        let resp = self
            .http
            .get(format!("{peer}/nodes"))
            .send()
            .await
            .map_err(|e| transport_err(peer, e))?;
        let body: Value = resp.json().await.map_err(|e| transport_err(peer, e))?;
        let nodes = body
            .get("nodes")
            .cloned()
            .ok_or_else(|| LedgerError::Peer(format!("{peer}/nodes response lacks 'nodes'")))?;
        serde_json::from_value(nodes)
            .map_err(|e| LedgerError::Peer(format!("{peer} sent undecodable node list: {e}")))
    }

    /// Announce `self_url` to a peer's registry.
    pub async fn register_self(&self, peer: &str, self_url: &str) -> Result<(), LedgerError> {
        let resp = self
            .http
            .post(format!("{peer}/register-node"))
            .json(&json!({ "url": self_url }))
            .send()
            .await
            .map_err(|e| transport_err(peer, e))?;
        if !resp.status().is_success() {
            return Err(LedgerError::Peer(format!(
                "{peer}/register-node returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Gossip a freshly sealed block. Returns the peer's HTTP status so the
    /// caller can distinguish append (200) from fork (409).
    pub async fn send_block(&self, peer: &str, block: &Block) -> Result<u16, LedgerError> {
        let resp = self
            .http
            .post(format!("{peer}/receive-block"))
            .json(block)
            .send()
            .await
            .map_err(|e| transport_err(peer, e))?;
        Ok(resp.status().as_u16())
    }
}

fn transport_err(peer: &str, e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Timeout(format!("{peer}: {e}"))
    } else {
        LedgerError::Peer(format!("{peer}: {e}"))
    }
}
