use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::Serialize;

use provenant_core::LedgerError;

/// Normalize a peer base URL so the registry deduplicates on it: trimmed,
/// no trailing slash, lowercased. Peer URLs are scheme + host + port only,
/// so whole-string lowercasing is safe.
pub fn normalize_url(raw: &str) -> Result<String, LedgerError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(LedgerError::BadRequest("peer url must not be empty".into()));
    }
    let lowered = trimmed.to_ascii_lowercase();
    if !lowered.starts_with("http://") && !lowered.starts_with("https://") {
        return Err(LedgerError::BadRequest(format!(
            "peer url must be http(s): {raw}"
        )));
    }
    Ok(lowered)
}

/// One peer as reported by `/status`-driven probing.
#[derive(Clone, Debug, Serialize)]
pub struct PeerInfo {
    pub url: String,
    pub healthy: bool,
}

/// Process-wide peer set. Failing peers are marked unhealthy but never
/// removed; probes resume indefinitely.
pub struct PeerRegistry {
    self_url: String,
    peers: RwLock<BTreeMap<String, bool>>,
}

impl PeerRegistry {
    pub fn new(self_url: &str) -> Result<Self, LedgerError> {
        Ok(Self {
            self_url: normalize_url(self_url)?,
            peers: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// Add a peer, deduplicating on the normalized URL and refusing to add
    /// this node itself. Returns whether the peer was new. New peers start
    /// healthy and the first failed probe demotes them.
    pub fn add(&self, raw: &str) -> Result<bool, LedgerError> {
        let url = normalize_url(raw)?;
        if url == self.self_url {
            return Ok(false);
        }
        let mut peers = self.peers.write().expect("peer registry lock poisoned");
        Ok(peers.insert(url, true).is_none())
    }

    /// Flip a peer's health flag; unknown URLs are ignored.
    pub fn mark(&self, url: &str, healthy: bool) {
        let mut peers = self.peers.write().expect("peer registry lock poisoned");
        if let Some(flag) = peers.get_mut(url) {
            *flag = healthy;
        }
    }

    pub fn urls(&self) -> Vec<String> {
        let peers = self.peers.read().expect("peer registry lock poisoned");
        peers.keys().cloned().collect()
    }

    pub fn healthy_urls(&self) -> Vec<String> {
        let peers = self.peers.read().expect("peer registry lock poisoned");
        peers
            .iter()
            .filter(|(_, healthy)| **healthy)
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<PeerInfo> {
        let peers = self.peers.read().expect("peer registry lock poisoned");
        peers
            .iter()
            .map(|(url, healthy)| PeerInfo {
                url: url.clone(),
                healthy: *healthy,
            })
            .collect()
    }

    pub fn contains(&self, url: &str) -> bool {
        let peers = self.peers.read().expect("peer registry lock poisoned");
        peers.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.peers.read().expect("peer registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_dedups_variants() {
        let reg = PeerRegistry::new("http://127.0.0.1:9000").unwrap();
        assert!(reg.add("http://127.0.0.1:9001").unwrap());
        assert!(!reg.add("HTTP://127.0.0.1:9001/").unwrap());
        assert!(!reg.add("  http://127.0.0.1:9001  ").unwrap());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn never_registers_itself() {
        let reg = PeerRegistry::new("http://127.0.0.1:9000").unwrap();
        assert!(!reg.add("http://127.0.0.1:9000/").unwrap());
        assert!(reg.is_empty());
    }

    #[test]
    fn rejects_non_http_urls() {
        let reg = PeerRegistry::new("http://127.0.0.1:9000").unwrap();
        assert!(reg.add("ftp://127.0.0.1:9001").is_err());
        assert!(reg.add("").is_err());
    }

    #[test]
    fn health_flag_partitions_urls() {
        let reg = PeerRegistry::new("http://127.0.0.1:9000").unwrap();
        reg.add("http://127.0.0.1:9001").unwrap();
        reg.add("http://127.0.0.1:9002").unwrap();
        reg.mark("http://127.0.0.1:9001", false);

        assert_eq!(reg.healthy_urls(), vec!["http://127.0.0.1:9002".to_string()]);
        // Unhealthy peers stay registered.
        assert_eq!(reg.len(), 2);

        reg.mark("http://127.0.0.1:9001", true);
        assert_eq!(reg.healthy_urls().len(), 2);
    }
}
