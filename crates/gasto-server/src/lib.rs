//! Gasto Web Server
//!
//! Axum-based REST API over gasto-core. Handlers stay thin: they parse
//! input, call into the core and map errors onto status codes. Bulk
//! categorization is handed to the job queue and answered with 202.
//!
//! There is no authentication layer; deploy behind something that has one.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use gasto_core::{
    AIBackend, AIClient, BankSync, CategorizationQueue, Classifier, Database, PluggyClient,
    Settings,
};

mod handlers;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub classifier: Classifier,
    pub queue: CategorizationQueue,
    /// None when no Pluggy API key is configured
    pub bank: Option<BankSync>,
}

impl AppState {
    /// Wire the classifier, job queue and ingestion around one database
    pub fn new(
        db: Database,
        settings: &Settings,
        llm: Option<AIClient>,
        pluggy: Option<PluggyClient>,
    ) -> Self {
        let classifier = Classifier::new(db.clone(), llm, settings);
        let queue = CategorizationQueue::new(db.clone(), classifier.clone(), &settings.jobs);
        let bank = pluggy.map(|client| BankSync::new(db.clone(), client));
        Self {
            db,
            classifier,
            queue,
            bank,
        }
    }

    /// Build the state from resolved settings and the process environment
    pub fn from_settings(db: Database, settings: &Settings) -> anyhow::Result<Self> {
        let llm = AIClient::from_settings(&settings.ai);
        match &llm {
            Some(client) => info!(
                "AI backend configured: {} (model: {})",
                client.host(),
                client.model()
            ),
            None => info!("AI backend not configured, using keyword fallback only"),
        }

        let pluggy = PluggyClient::from_settings(&settings.pluggy)
            .context("Failed to build Pluggy client")?;
        if pluggy.is_none() {
            info!("Pluggy not configured (set PLUGGY_API_KEY to enable bank sync)");
        }

        Ok(Self::new(db, settings, llm, pluggy))
    }
}

/// Create the application router
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Categories and classification
        .route("/categories", get(handlers::list_categories))
        .route("/classify", post(handlers::classify))
        // Accounts and ingestion
        .route("/users/:user_id/accounts", get(handlers::list_accounts))
        .route("/users/:user_id/accounts/link", post(handlers::link_accounts))
        .route(
            "/users/:user_id/accounts/:id",
            delete(handlers::disconnect_account),
        )
        .route(
            "/users/:user_id/accounts/:id/sync",
            post(handlers::sync_account),
        )
        // Bulk categorization jobs
        .route(
            "/users/:user_id/transactions/categorize",
            post(handlers::categorize_transactions),
        )
        .route("/users/:user_id/jobs", get(handlers::list_jobs))
        .route("/jobs/:id", get(handlers::get_job));

    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(
    db: Database,
    settings: &Settings,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    // The queue lives in memory, so jobs from a previous process are gone
    match db.recover_stuck_jobs() {
        Ok(count) if count > 0 => {
            warn!("Marked {} interrupted categorization job(s) as failed", count);
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to recover stuck jobs: {}", e),
    }

    let seeded = db
        .seed_default_categories()
        .context("Failed to seed default categories")?;
    if seeded > 0 {
        info!("Seeded {} default categories", seeded);
    }

    let state = AppState::from_settings(db, settings)?;
    check_ai_connection(&state).await;

    let app = create_router(state, &config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log whether the configured LLM answers; the server starts either way
async fn check_ai_connection(state: &AppState) {
    let Some(client) = state.classifier.llm() else {
        return;
    };
    if client.health_check().await {
        info!("AI backend connected: {} ({})", client.host(), client.model());
    } else {
        warn!(
            "AI backend configured but not responding: {} ({}); fallback will be used",
            client.host(),
            client.model()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<gasto_core::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    /// The upstream aggregator failed
    pub fn bad_gateway(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_GATEWAY, msg)
    }

    /// A feature whose credentials are not configured
    pub fn unavailable(msg: &str) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<gasto_core::Error> for AppError {
    fn from(err: gasto_core::Error) -> Self {
        use gasto_core::Error;

        match err {
            Error::InvalidData(msg) => Self::bad_request(&msg),
            Error::NotFound(what) => Self::not_found(&format!("{} not found", what)),
            Error::Pluggy(msg) => {
                warn!("Pluggy request failed: {}", msg);
                Self::bad_gateway("Bank aggregator request failed")
            }
            err => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            },
        }
    }
}

#[cfg(test)]
mod tests;
