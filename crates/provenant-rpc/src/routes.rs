use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use provenant_consensus::{LedgerNode, ReceiveOutcome};
use provenant_core::{Block, LedgerError, Transaction};

use crate::types::*;

/// Map an error to the status code its kind promises: admission failures
/// are the client's fault (4xx), infrastructure is ours (5xx).
fn error_reply(err: LedgerError) -> Response {
    let status = match &err {
        LedgerError::BadRequest(_)
        | LedgerError::InvalidOrder(_)
        | LedgerError::DuplicateTransaction { .. }
        | LedgerError::Canonicalization(_)
        | LedgerError::Serialization(_) => StatusCode::BAD_REQUEST,
        LedgerError::InvalidSignature(_)
        | LedgerError::UnknownActor(_)
        | LedgerError::KeyNotFound(_) => StatusCode::UNAUTHORIZED,
        LedgerError::ChainInvalid(_)
        | LedgerError::MempoolFull
        | LedgerError::NoHealthyPeers => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::MiningCancelled => StatusCode::CONFLICT,
        LedgerError::Peer(_) => StatusCode::BAD_GATEWAY,
        LedgerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        LedgerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// `POST /add-transaction`
pub async fn add_transaction(
    State(node): State<Arc<LedgerNode>>,
    Json(tx): Json<Transaction>,
) -> Response {
    match node.submit_transaction(tx).await {
        Ok(()) => Json(AddTransactionResponse { accepted: true }).into_response(),
        Err(e) => error_reply(e),
    }
}

/// `POST /mine` — force one mining attempt. 204 when there is nothing to
/// seal.
pub async fn mine(State(node): State<Arc<LedgerNode>>) -> Response {
    match Arc::clone(&node).mine_once().await {
        Ok(Some(index)) => Json(MineResponse { mined: true, index }).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_reply(e),
    }
}

/// `GET /chain` — the full replica plus its current validity verdict.
pub async fn chain(State(node): State<Arc<LedgerNode>>) -> Json<ChainResponse> {
    let chain = node.chain_snapshot().await;
    Json(ChainResponse {
        length: chain.len(),
        chain,
        valid: node.is_chain_valid(),
        message: node.validation_message(),
    })
}

/// `GET /mempool`
pub async fn mempool(State(node): State<Arc<LedgerNode>>) -> Json<MempoolResponse> {
    let pending = node.pending_transactions().await;
    Json(MempoolResponse {
        count: pending.len(),
        mempool: pending,
    })
}

/// `GET /status` — node health and metrics; also the peer probe target.
pub async fn status(State(node): State<Arc<LedgerNode>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        chain_length: node.chain_length().await,
        chain_valid: node.is_chain_valid(),
        validation_message: node.validation_message(),
        peers: node.peers().len(),
        mempool_size: node.mempool_size().await,
        difficulty: node.config().difficulty,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /health` — bare liveness.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /nodes`
pub async fn nodes(State(node): State<Arc<LedgerNode>>) -> Json<NodesResponse> {
    let nodes = node.peers().urls();
    Json(NodesResponse {
        count: nodes.len(),
        nodes,
    })
}

/// `POST /register-node`
pub async fn register_node(
    State(node): State<Arc<LedgerNode>>,
    Json(req): Json<RegisterNodeRequest>,
) -> Response {
    match node.register_peer(&req.url) {
        Ok(_) => Json(RegisterNodeResponse { registered: true }).into_response(),
        Err(e) => error_reply(e),
    }
}

/// `POST /receive-block` — gossip intake. 200 on append, 409 on fork
/// (resolution runs in the background), 400 for an invalid block.
pub async fn receive_block(
    State(node): State<Arc<LedgerNode>>,
    Json(block): Json<Block>,
) -> Response {
    match node.receive_block(block).await {
        Ok(ReceiveOutcome::Appended) => {
            Json(ReceiveBlockResponse { appended: true }).into_response()
        }
        Ok(ReceiveOutcome::Fork) => {
            let resolver = Arc::clone(&node);
            tokio::spawn(async move {
                if let Err(e) = resolver.resolve_conflicts().await {
                    warn!(error = %e, "resolution after forked gossip failed");
                }
            });
            (
                StatusCode::CONFLICT,
                Json(ReceiveBlockResponse { appended: false }),
            )
                .into_response()
        }
        Err(e @ LedgerError::Persistence(_)) => error_reply(e),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// `POST /sync` — force a longest-valid-chain resolution.
pub async fn sync(State(node): State<Arc<LedgerNode>>) -> Response {
    match node.resolve_conflicts().await {
        Ok(outcome) => Json(SyncResponse {
            synced: outcome.adopted,
            new_length: outcome.new_length,
        })
        .into_response(),
        Err(e) => error_reply(e),
    }
}

/// `GET /history/{batch_id}` — ordered sealed events for a batch.
pub async fn history(
    State(node): State<Arc<LedgerNode>>,
    Path(batch_id): Path<String>,
) -> Json<HistoryResponse> {
    let history = node.history(&batch_id).await;
    Json(HistoryResponse {
        transaction_count: history.len(),
        history,
        batch_id,
    })
}

/// `GET /verify/{batch_id}` — provenance check.
pub async fn verify(
    State(node): State<Arc<LedgerNode>>,
    Path(batch_id): Path<String>,
) -> Json<VerifyResponse> {
    let outcome = node.verify(&batch_id).await;
    Json(VerifyResponse {
        batch_id,
        verified: outcome.verified,
        events: outcome.events,
        message: outcome.message,
    })
}
