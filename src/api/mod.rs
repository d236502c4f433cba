//! HTTP surface: shared state, the response envelope, and the router.

pub mod cache_admin;
pub mod derived;
pub mod proxy;

use crate::{
    cache::{CacheStatus, CacheStore},
    config::Config,
    elexon::Upstream,
    settlement,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub upstream: Arc<dyn Upstream>,
    pub config: Arc<Config>,
}

/// Response envelope for every cached payload: the data plus its cache
/// provenance, kept apart so upstream field names can never collide with
/// the annotations.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub data: T,
    #[serde(rename = "_cache")]
    pub cache: CacheStatus,
    #[serde(rename = "_key", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn hit(data: T, key: String) -> Self {
        Self {
            data,
            cache: CacheStatus::Hit,
            key: Some(key),
        }
    }

    pub fn miss(data: T, key: String) -> Self {
        Self {
            data,
            cache: CacheStatus::Miss,
            key: Some(key),
        }
    }

    /// Derived endpoints annotate provenance without exposing their fixed keys.
    pub fn without_key(mut self) -> Self {
        self.key = None;
        self
    }
}

/// Create the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/settlement-period", get(settlement_period))
        .route("/api/generation", get(proxy::generation))
        .route("/api/generation/latest", get(derived::generation_latest))
        .route("/api/demand", get(proxy::demand))
        .route("/api/price", get(proxy::price))
        .route("/api/imbalance", get(proxy::imbalance))
        .route("/api/frequency", get(proxy::frequency))
        .route("/api/fuel-mix/latest", get(derived::fuel_mix_latest))
        .route("/api/summary", get(derived::summary))
        .route("/api/raw/*path", get(proxy::raw_passthrough))
        .route("/api/cache/stats", get(cache_admin::stats))
        .route("/api/cache/clear", post(cache_admin::clear))
        .fallback(not_found)
        .with_state(state)
}

/// Service info and route listing, doubling as the health check.
async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "GB Electricity Market Proxy",
        "status": "ok",
        "upstream": state.config.elexon_base_url,
        "current_sp": settlement::current_settlement_period(),
        "endpoints": {
            "settlement_period": "/api/settlement-period",
            "generation": "/api/generation?date=YYYY-MM-DD",
            "generation_latest": "/api/generation/latest",
            "demand": "/api/demand?date=YYYY-MM-DD",
            "price": "/api/price?date=YYYY-MM-DD",
            "imbalance": "/api/imbalance?date=YYYY-MM-DD",
            "frequency": "/api/frequency",
            "fuel_mix_latest": "/api/fuel-mix/latest",
            "summary": "/api/summary",
            "raw": "/api/raw/{elexon_path}",
            "cache_stats": "/api/cache/stats",
            "cache_clear": "POST /api/cache/clear",
        },
    }))
}

/// Current settlement period info.
async fn settlement_period() -> Json<settlement::SettlementPeriod> {
    Json(settlement::current_settlement_period())
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "endpoint not found",
            "hint": "GET / for available routes",
        })),
    )
}
