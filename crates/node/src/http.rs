//! HTTP surface for peers and orderers.
//!
//! Bodies are the wire entities in JSON; signed fields are produced and
//! verified through their canonical form, so transport-level field order is
//! irrelevant. Error mapping follows the network-facing taxonomy:
//! signature failures and malformed requests are 400, missing chaincode is
//! 404, chaincode failures are 422, store failures are 500.

use crate::committer::CommitSender;
use crate::consensus::Consensus;
use crate::endorser::Endorser;
use crate::error::NodeError;
use crate::orderer::OrdererService;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use litefab_chain::{Block, Msp, Proposal, ProposalResponse, Role, TransactionEnvelope};
use litefab_storage::WorldStateStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::warn;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
}

type Reply<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_reply(err: NodeError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        NodeError::SignatureInvalid(_) | NodeError::BadRequest(_) => StatusCode::BAD_REQUEST,
        NodeError::NotFound(_) => StatusCode::NOT_FOUND,
        NodeError::ChaincodeExecution(_) => StatusCode::UNPROCESSABLE_ENTITY,
        NodeError::Consensus(_) => StatusCode::SERVICE_UNAVAILABLE,
        NodeError::Storage(_) | NodeError::Chain(_) | NodeError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// peer
// ────────────────────────────────────────────────────────────────────────────

pub struct PeerState {
    pub node_id: String,
    pub msp: Arc<Msp>,
    pub endorser: Arc<Endorser>,
    pub commit_queue: CommitSender,
    pub world: Arc<RwLock<WorldStateStore>>,
    pub orderer_addrs: Vec<String>,
    pub next_orderer: AtomicUsize,
    pub http: reqwest::Client,
}

pub fn peer_router(state: Arc<PeerState>) -> Router {
    Router::new()
        .route("/proposal", post(peer_proposal))
        .route("/submit", post(peer_submit))
        .route("/query", get(peer_query))
        .route("/block", post(peer_block))
        .route("/health", get(peer_health))
        .with_state(state)
}

async fn peer_proposal(
    State(state): State<Arc<PeerState>>,
    Json(proposal): Json<Proposal>,
) -> Reply<ProposalResponse> {
    let endorser = state.endorser.clone();
    let result = tokio::task::spawn_blocking(move || endorser.handle_proposal(&proposal))
        .await
        .map_err(|e| error_reply(NodeError::Internal(format!("endorse task failed: {e}"))))?;
    result.map(Json).map_err(error_reply)
}

/// Verify the client envelope signature, then relay to a configured orderer
/// round-robin and return its response.
async fn peer_submit(
    State(state): State<Arc<PeerState>>,
    Json(envelope): Json<TransactionEnvelope>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, Json<ErrorResponse>)> {
    let bytes = envelope
        .signing_bytes()
        .map_err(|e| error_reply(NodeError::BadRequest(e.to_string())))?;
    let outcome = state.msp.verify_signature(
        &bytes,
        &envelope.client_signature,
        &envelope.creator_id,
        Some(Role::Client),
    );
    if !outcome.valid {
        return Err(error_reply(NodeError::SignatureInvalid(
            outcome.error.unwrap_or_else(|| "client signature".to_string()),
        )));
    }

    if state.orderer_addrs.is_empty() {
        return Err(error_reply(NodeError::Consensus(
            "no orderers configured".to_string(),
        )));
    }
    let start = state.next_orderer.fetch_add(1, Ordering::Relaxed);
    let count = state.orderer_addrs.len();
    let mut last_error = String::new();
    for i in 0..count {
        let orderer = &state.orderer_addrs[(start + i) % count];
        let url = format!("{}/submit", orderer.trim_end_matches('/'));
        match state
            .http
            .post(&url)
            .timeout(FORWARD_TIMEOUT)
            .json(&envelope)
            .send()
            .await
        {
            Ok(resp) => {
                let status = StatusCode::from_u16(resp.status().as_u16())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                let body = resp
                    .json::<serde_json::Value>()
                    .await
                    .unwrap_or_else(|_| serde_json::json!({ "status": "submitted" }));
                return Ok((status, Json(body)));
            }
            Err(e) => {
                warn!(orderer = %orderer, error = %e, "orderer unreachable, trying next");
                last_error = e.to_string();
            }
        }
    }
    Err((
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: format!("no orderer reachable: {last_error}"),
        }),
    ))
}

async fn peer_query(
    State(state): State<Arc<PeerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply<QueryResponse> {
    let key = params
        .get("key")
        .ok_or_else(|| error_reply(NodeError::BadRequest("missing query parameter: key".into())))?;
    let value = state
        .world
        .read()
        .get(key)
        .map_err(|e| error_reply(e.into()))?;
    Ok(Json(QueryResponse { value }))
}

async fn peer_block(
    State(state): State<Arc<PeerState>>,
    Json(block): Json<Block>,
) -> Reply<StatusResponse> {
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .commit_queue
        .send((block, reply_tx))
        .await
        .map_err(|_| error_reply(NodeError::Internal("commit worker is gone".into())))?;
    let result = reply_rx
        .await
        .map_err(|_| error_reply(NodeError::Internal("commit worker dropped reply".into())))?;
    result
        .map(|_| {
            Json(StatusResponse {
                status: "committed".to_string(),
            })
        })
        .map_err(error_reply)
}

async fn peer_health(State(state): State<Arc<PeerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        node_id: state.node_id.clone(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// orderer
// ────────────────────────────────────────────────────────────────────────────

pub struct OrdererState {
    pub node_id: String,
    pub msp: Arc<Msp>,
    pub consensus: Arc<dyn Consensus>,
    pub core: Arc<OrdererService>,
}

pub fn orderer_router(state: Arc<OrdererState>) -> Router {
    Router::new()
        .route("/submit", post(orderer_submit))
        .route("/broadcast", post(orderer_broadcast))
        .route("/health", get(orderer_health))
        .with_state(state)
}

async fn orderer_submit(
    State(state): State<Arc<OrdererState>>,
    Json(envelope): Json<TransactionEnvelope>,
) -> Reply<StatusResponse> {
    let bytes = envelope
        .signing_bytes()
        .map_err(|e| error_reply(NodeError::BadRequest(e.to_string())))?;
    let outcome = state.msp.verify_signature(
        &bytes,
        &envelope.client_signature,
        &envelope.creator_id,
        Some(Role::Client),
    );
    if !outcome.valid {
        return Err(error_reply(NodeError::SignatureInvalid(
            outcome.error.unwrap_or_else(|| "client signature".to_string()),
        )));
    }
    state
        .consensus
        .submit_tx(envelope)
        .await
        .map_err(error_reply)?;
    Ok(Json(StatusResponse {
        status: "submitted".to_string(),
    }))
}

/// Accept a block cut by another orderer and store it locally.
async fn orderer_broadcast(
    State(state): State<Arc<OrdererState>>,
    Json(block): Json<Block>,
) -> Reply<StatusResponse> {
    let bytes = block
        .orderer_signing_bytes()
        .map_err(|e| error_reply(NodeError::BadRequest(e.to_string())))?;
    let outcome = state.msp.verify_signature(
        &bytes,
        &block.metadata.orderer_signature,
        &block.metadata.orderer_id,
        Some(Role::Orderer),
    );
    if !outcome.valid {
        return Err(error_reply(NodeError::SignatureInvalid(
            outcome.error.unwrap_or_else(|| "orderer signature".to_string()),
        )));
    }
    state.core.store_block(&block).map_err(error_reply)?;
    Ok(Json(StatusResponse {
        status: "stored".to_string(),
    }))
}

async fn orderer_health(State(state): State<Arc<OrdererState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        node_id: state.node_id.clone(),
    })
}
