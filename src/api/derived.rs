//! Derived-metric endpoints: transforms over the raw generation dataset,
//! plus the five-KPI summary.

use super::{proxy::fetch_cached, AppState, Envelope};
use crate::{
    elexon,
    error::ProxyError,
    fuel_mix,
    settlement::today_utc,
    summary::{build_summary, SUMMARY_TTL_SECS},
};
use axum::{extract::State, response::Json};
use chrono::Utc;
use serde_json::Value;

/// Only the most recent settlement period's generation, as a fuel-to-MW map.
pub async fn generation_latest(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Value>>, ProxyError> {
    let upstream = state.upstream.clone();
    let today = today_utc();

    let envelope = fetch_cached(
        &state,
        "generation_latest".to_string(),
        state.config.ttl.generation,
        move || async move {
            let raw = upstream
                .fetch(
                    elexon::GENERATION_PATH,
                    &elexon::settlement_date_range(today, today),
                )
                .await?;
            let snapshot = fuel_mix::latest_snapshot(&raw)?;
            to_json(fuel_mix::latest_generation(&snapshot, today))
        },
    )
    .await?;

    Ok(Json(envelope.without_key()))
}

/// Clean fuel-mix percentages for the latest settlement period.
pub async fn fuel_mix_latest(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Value>>, ProxyError> {
    let upstream = state.upstream.clone();
    let today = today_utc();

    let envelope = fetch_cached(
        &state,
        "fuel_mix_latest".to_string(),
        state.config.ttl.generation,
        move || async move {
            let raw = upstream
                .fetch(
                    elexon::GENERATION_PATH,
                    &elexon::settlement_date_range(today, today),
                )
                .await?;
            let snapshot = fuel_mix::latest_snapshot(&raw)?;
            to_json(fuel_mix::fuel_mix(&snapshot, today))
        },
    )
    .await?;

    Ok(Json(envelope.without_key()))
}

/// All dashboard KPIs in one call; per-dataset failures land in `errors`.
pub async fn summary(State(state): State<AppState>) -> Result<Json<Envelope<Value>>, ProxyError> {
    let upstream = state.upstream.clone();

    let envelope = fetch_cached(
        &state,
        "summary".to_string(),
        SUMMARY_TTL_SECS,
        move || async move {
            let summary = build_summary(upstream.as_ref(), Utc::now()).await;
            to_json(summary)
        },
    )
    .await?;

    Ok(Json(envelope.without_key()))
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, ProxyError> {
    serde_json::to_value(value).map_err(|e| ProxyError::Internal(e.to_string()))
}
