//! HTTP routes of the broker.

use std::{sync::Arc, time::Instant};

use agentforce_core::{RemoteConfig, config::OAUTH_CALLBACK_PATH};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, header},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{BrokerServerError, BrokerSettings, IdentityProvider};

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<BrokerSettings>,
    idp: IdentityProvider,
    started: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(settings: BrokerSettings) -> Self {
        let idp = IdentityProvider::new(&settings, reqwest::Client::new());
        Self {
            settings: Arc::new(settings),
            idp,
            started: Instant::now(),
        }
    }
}

/// Build the broker router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/config", get(config_handler))
        .route("/oauth/client-credentials", post(client_credentials_handler))
        .route("/oauth/token", post(token_handler))
        .fallback(api_not_found);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "uptime": state.started.elapsed().as_secs_f64(),
        "environment": state.settings.environment,
    }))
}

async fn config_handler(State(state): State<AppState>) -> Json<RemoteConfig> {
    Json(state.settings.widget_config())
}

async fn client_credentials_handler(
    State(state): State<AppState>,
) -> Result<Json<Map<String, Value>>, BrokerServerError> {
    tracing::info!("client credentials requested");
    state.idp.client_credentials().await.map(Json)
}

#[derive(Debug, Default, Deserialize)]
struct TokenRequest {
    #[serde(default)]
    code: Option<String>,
}

async fn token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<Map<String, Value>>, BrokerServerError> {
    let code = body
        .ok()
        .and_then(|Json(req)| req.code)
        .filter(|c| !c.is_empty())
        .ok_or(BrokerServerError::MissingCode)?;

    let redirect_uri = state
        .settings
        .oauth_redirect_uri
        .clone()
        .unwrap_or_else(|| derived_redirect_uri(&headers));
    tracing::info!(%redirect_uri, "exchanging authorization code");
    state.idp.exchange_code(&code, &redirect_uri).await.map(Json)
}

fn derived_redirect_uri(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");
    format!("{scheme}://{host}{OAUTH_CALLBACK_PATH}")
}

async fn api_not_found() -> BrokerServerError {
    BrokerServerError::NotFound
}
