//! Cache management endpoints.

use super::AppState;
use crate::cache::{CacheStats, ClearReport};
use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

/// Snapshot of every cached key, expired entries included.
pub async fn stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    pub key: Option<String>,
}

/// Remove one cache entry, or all of them when no key is given.
pub async fn clear(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Json<ClearReport> {
    Json(state.cache.clear(query.key.as_deref()))
}
