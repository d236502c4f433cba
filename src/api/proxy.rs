//! Cached passthrough endpoints: resolve a cache key, serve a fresh entry,
//! or fetch upstream and store the result.

use super::{AppState, Envelope};
use crate::{
    cache::raw_cache_key,
    elexon,
    error::ProxyError,
    settlement::{today_utc, yesterday_utc},
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;

/// Run the cache-aside flow for `key`: serve a fresh entry if one exists,
/// otherwise call `fetch`, store the result under `ttl_secs`, and return it.
///
/// The miss path runs inside `tokio::spawn` so a client hanging up cannot
/// cancel the upstream call; the response still lands in the cache for the
/// next requester. Concurrent misses on one key may both fetch, and the
/// last write wins.
pub(crate) async fn fetch_cached<F, Fut>(
    state: &AppState,
    key: String,
    ttl_secs: u64,
    fetch: F,
) -> Result<Envelope<Value>, ProxyError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, ProxyError>> + Send + 'static,
{
    if let Some(value) = state.cache.get(&key) {
        return Ok(Envelope::hit(value, key));
    }

    let cache = state.cache.clone();
    let store_key = key.clone();
    let future = fetch();
    let handle = tokio::spawn(async move {
        let value = future.await?;
        cache.set(&store_key, value.clone(), ttl_secs);
        Ok::<Value, ProxyError>(value)
    });

    let value = handle
        .await
        .map_err(|e| ProxyError::Internal(format!("fetch task failed: {e}")))??;

    Ok(Envelope::miss(value, key))
}

#[derive(Debug, Deserialize)]
pub struct GenerationQuery {
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

/// Half-hourly generation outturn by fuel type. Defaults to the window from
/// yesterday through today.
pub async fn generation(
    State(state): State<AppState>,
    Query(query): Query<GenerationQuery>,
) -> Result<Json<Envelope<Value>>, ProxyError> {
    let date_to = query.date.unwrap_or_else(today_utc);
    let date_from = query.date_from.unwrap_or_else(yesterday_utc);
    let key = format!("generation:{date_to}:{date_from}");

    let upstream = state.upstream.clone();
    let envelope = fetch_cached(&state, key, state.config.ttl.generation, move || async move {
        upstream
            .fetch(
                elexon::GENERATION_PATH,
                &elexon::settlement_date_range(date_from, date_to),
            )
            .await
    })
    .await?;

    Ok(Json(envelope))
}

/// Demand outturn for one settlement date (defaults to today).
pub async fn demand(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Envelope<Value>>, ProxyError> {
    let date = query.date.unwrap_or_else(today_utc);
    let key = format!("demand:{date}");

    let upstream = state.upstream.clone();
    let envelope = fetch_cached(&state, key, state.config.ttl.demand, move || async move {
        upstream
            .fetch(elexon::DEMAND_PATH, &elexon::settlement_date_range(date, date))
            .await
    })
    .await?;

    Ok(Json(envelope))
}

/// Market-index price for one settlement date (defaults to today).
pub async fn price(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Envelope<Value>>, ProxyError> {
    let date = query.date.unwrap_or_else(today_utc);
    let key = format!("price:{date}");

    let upstream = state.upstream.clone();
    let envelope = fetch_cached(&state, key, state.config.ttl.price, move || async move {
        upstream
            .fetch(elexon::PRICE_PATH, &elexon::settlement_date_param(date))
            .await
    })
    .await?;

    Ok(Json(envelope))
}

/// Indicated imbalance for one settlement date (defaults to today).
pub async fn imbalance(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Envelope<Value>>, ProxyError> {
    let date = query.date.unwrap_or_else(today_utc);
    let key = format!("imbalance:{date}");

    let upstream = state.upstream.clone();
    let envelope = fetch_cached(&state, key, state.config.ttl.imbalance, move || async move {
        upstream
            .fetch(elexon::IMBALANCE_PATH, &elexon::settlement_date_range(date, date))
            .await
    })
    .await?;

    Ok(Json(envelope))
}

/// Grid frequency readings over the last rolling hour.
pub async fn frequency(State(state): State<AppState>) -> Result<Json<Envelope<Value>>, ProxyError> {
    let upstream = state.upstream.clone();
    let envelope = fetch_cached(
        &state,
        "frequency:latest".to_string(),
        state.config.ttl.frequency,
        move || async move {
            upstream
                .fetch(
                    elexon::FREQUENCY_PATH,
                    &elexon::frequency_window_params(chrono::Utc::now()),
                )
                .await
        },
    )
    .await?;

    Ok(Json(envelope))
}

/// Pass any Elexon endpoint through directly, cached briefly under a
/// canonical key. Example: `GET /api/raw/datasets/BOAL?settlementDate=...`.
pub async fn raw_passthrough(
    State(state): State<AppState>,
    Path(elexon_path): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Envelope<Value>>, ProxyError> {
    let key = raw_cache_key(&elexon_path, &params);

    let upstream = state.upstream.clone();
    let envelope = fetch_cached(&state, key, state.config.ttl.default, move || async move {
        upstream.fetch(&elexon_path, &params).await
    })
    .await?;

    Ok(Json(envelope))
}
