use serde::Serialize;

use provenant_chain::BatchEvent;
use provenant_core::{Block, Transaction};

/// Error envelope for every non-2xx reply.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct AddTransactionResponse {
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct MineResponse {
    pub mined: bool,
    pub index: u64,
}

#[derive(Debug, Serialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
    pub valid: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MempoolResponse {
    pub mempool: Vec<Transaction>,
    pub count: usize,
}

/// Node health and metrics, also used as the peer health probe target.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub chain_length: usize,
    pub chain_valid: bool,
    pub validation_message: String,
    pub peers: usize,
    pub mempool_size: usize,
    pub difficulty: u32,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct NodesResponse {
    pub nodes: Vec<String>,
    pub count: usize,
}

#[derive(Debug, serde::Deserialize)]
pub struct RegisterNodeRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterNodeResponse {
    pub registered: bool,
}

#[derive(Debug, Serialize)]
pub struct ReceiveBlockResponse {
    pub appended: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub synced: bool,
    pub new_length: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub batch_id: String,
    pub history: Vec<BatchEvent>,
    pub transaction_count: usize,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub batch_id: String,
    pub verified: bool,
    pub events: Vec<BatchEvent>,
    pub message: String,
}
