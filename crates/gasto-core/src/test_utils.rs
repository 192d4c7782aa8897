//! Test utilities for gasto-core
//!
//! In-process mock servers for the two HTTP collaborators:
//! - [`MockLlmServer`]: OpenAI-compatible chat completions endpoint
//! - [`MockPluggyServer`]: the subset of the Pluggy API used for ingestion

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::OpenAICompatibleBackend;
use crate::settings::{AiSettings, PluggySettings};
use crate::pluggy::PluggyClient;
use crate::AIClient;

/// Bind an ephemeral port and serve `app` until the sender fires
async fn spawn_server(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

#[derive(Default)]
struct LlmState {
    reply: Mutex<String>,
    failing: AtomicBool,
    hits: AtomicUsize,
    last_request: Mutex<Option<Value>>,
}

/// Mock OpenAI-compatible LLM server
pub struct MockLlmServer {
    addr: SocketAddr,
    state: Arc<LlmState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockLlmServer {
    /// Start a server that answers every completion with `reply`
    pub async fn start(reply: &str) -> Self {
        let state = Arc::new(LlmState {
            reply: Mutex::new(reply.to_string()),
            ..Default::default()
        });

        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat_completion))
            .with_state(state.clone());

        let (addr, shutdown_tx) = spawn_server(app).await;

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// An AI client pointed at this server
    pub fn client(&self) -> AIClient {
        self.client_with(&AiSettings::default())
    }

    pub fn client_with(&self, settings: &AiSettings) -> AIClient {
        AIClient::OpenAICompatible(
            OpenAICompatibleBackend::new(&self.url(), "gpt-4o-mini", Some("sk-test"), settings)
                .unwrap(),
        )
    }

    /// Change the scripted reply
    pub fn set_reply(&self, reply: &str) {
        *self.state.reply.lock().unwrap() = reply.to_string();
    }

    /// Make completions return HTTP 500 (or recover)
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of completion requests received
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Body of the most recent completion request
    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLlmServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_models() -> Json<Value> {
    Json(json!({"object": "list", "data": [{"id": "gpt-4o-mini", "object": "model"}]}))
}

async fn handle_chat_completion(
    State(state): State<Arc<LlmState>>,
    Json(request): Json<Value>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_request.lock().unwrap() = Some(request.clone());

    if state.failing.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded").into_response();
    }

    let reply = state.reply.lock().unwrap().clone();
    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": request["model"],
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": reply},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

/// API key the mock Pluggy server accepts
pub const MOCK_PLUGGY_KEY: &str = "pluggy-test-key";

#[derive(Default)]
struct PluggyState {
    /// item id -> accounts JSON
    accounts: Mutex<HashMap<String, Vec<Value>>>,
    /// account id -> transactions JSON
    transactions: Mutex<HashMap<String, Vec<Value>>>,
    failing: AtomicBool,
    hits: AtomicUsize,
}

/// Mock Pluggy API server
pub struct MockPluggyServer {
    addr: SocketAddr,
    state: Arc<PluggyState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Deserialize)]
struct AccountsQuery {
    #[serde(rename = "itemId")]
    item_id: String,
}

#[derive(Debug, Deserialize)]
struct TransactionsQuery {
    #[serde(rename = "accountId")]
    account_id: String,
    from: String,
    to: String,
}

impl MockPluggyServer {
    pub async fn start() -> Self {
        let state = Arc::new(PluggyState::default());

        let app = Router::new()
            .route("/accounts", get(handle_accounts))
            .route("/transactions", get(handle_transactions))
            .with_state(state.clone());

        let (addr, shutdown_tx) = spawn_server(app).await;

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A client configured with the accepted key
    pub fn client(&self) -> PluggyClient {
        let settings = PluggySettings {
            base_url: self.url(),
            ..Default::default()
        };
        PluggyClient::new(&settings, MOCK_PLUGGY_KEY).unwrap()
    }

    /// Register an account under an item
    pub fn add_account(&self, item_id: &str, account_id: &str, name: &str, balance: f64) {
        self.state
            .accounts
            .lock()
            .unwrap()
            .entry(item_id.to_string())
            .or_default()
            .push(json!({
                "id": account_id,
                "name": name,
                "type": "BANK",
                "balance": balance,
            }));
    }

    /// Register a transaction under an account; `date` is `YYYY-MM-DD`
    pub fn add_transaction(
        &self,
        account_id: &str,
        transaction_id: &str,
        description: &str,
        amount: f64,
        date: &str,
    ) {
        self.state
            .transactions
            .lock()
            .unwrap()
            .entry(account_id.to_string())
            .or_default()
            .push(json!({
                "id": transaction_id,
                "description": description,
                "amount": amount,
                "date": format!("{}T12:00:00.000Z", date),
            }));
    }

    /// Make every endpoint return HTTP 500 (or recover)
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockPluggyServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Shared auth and failure handling; returns an error response to short-circuit
fn check_request(state: &PluggyState, headers: &HeaderMap) -> Option<Response> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if headers.get("X-API-KEY").and_then(|v| v.to_str().ok()) != Some(MOCK_PLUGGY_KEY) {
        return Some((StatusCode::UNAUTHORIZED, "invalid api key").into_response());
    }
    if state.failing.load(Ordering::SeqCst) {
        return Some((StatusCode::INTERNAL_SERVER_ERROR, "upstream unavailable").into_response());
    }
    None
}

async fn handle_accounts(
    State(state): State<Arc<PluggyState>>,
    headers: HeaderMap,
    Query(query): Query<AccountsQuery>,
) -> Response {
    if let Some(response) = check_request(&state, &headers) {
        return response;
    }
    let results = state
        .accounts
        .lock()
        .unwrap()
        .get(&query.item_id)
        .cloned()
        .unwrap_or_default();
    Json(json!({"total": results.len(), "results": results})).into_response()
}

async fn handle_transactions(
    State(state): State<Arc<PluggyState>>,
    headers: HeaderMap,
    Query(query): Query<TransactionsQuery>,
) -> Response {
    if let Some(response) = check_request(&state, &headers) {
        return response;
    }
    let transactions: Vec<Value> = state
        .transactions
        .lock()
        .unwrap()
        .get(&query.account_id)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|tx| {
            // ISO dates compare correctly as strings
            let day = tx["date"].as_str().unwrap_or_default().get(..10).unwrap_or_default();
            day >= query.from.as_str() && day <= query.to.as_str()
        })
        .collect();
    Json(json!({"transactions": transactions})).into_response()
}
