//! The five-KPI dashboard summary.
//!
//! One composite payload from five independent upstream calls. Each
//! sub-fetch is isolated: a failure lands in the `errors` map under its own
//! key and never aborts the siblings.

use crate::{
    elexon::{self, Upstream},
    error::ProxyError,
    fuel_mix::{self, percentage},
    settlement::{self, SettlementPeriod},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Fixed TTL for the summary key; everything in it is at most a minute old.
pub const SUMMARY_TTL_SECS: u64 = 60;

pub const NOMINAL_HZ: f64 = 50.0;

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub settlement_period: SettlementPeriod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demand: Option<DemandSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imbalance: Option<ImbalanceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<FrequencySummary>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub total_mw: i64,
    pub fuels: BTreeMap<String, i64>,
    pub wind_mw: i64,
    pub solar_mw: i64,
    pub nuclear_mw: i64,
    pub wind_pct: f64,
    pub solar_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandSummary {
    pub mw: f64,
    pub settlement_period: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub gbp_per_mwh: f64,
    pub settlement_period: u32,
    pub change_gbp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImbalanceSummary {
    pub mw: i64,
    pub settlement_period: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencySummary {
    pub hz: f64,
    pub nominal_hz: f64,
    pub deviation: f64,
    pub status: FrequencyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// How far the measured grid frequency sits from nominal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyStatus {
    Normal,
    Deviation,
    Alert,
}

/// Classify a measured frequency against the 50 Hz nominal: under 0.05 Hz
/// off is normal, under 0.2 Hz is a deviation, anything beyond is an alert.
pub fn classify_frequency(hz: f64) -> FrequencyStatus {
    let deviation = (hz - NOMINAL_HZ).abs();
    if deviation < 0.05 {
        FrequencyStatus::Normal
    } else if deviation < 0.2 {
        FrequencyStatus::Deviation
    } else {
        FrequencyStatus::Alert
    }
}

/// Fetch and derive all five KPIs, tolerating per-dataset failure.
///
/// The five fetches run concurrently; nothing is shared between them, so
/// ordering cannot change the result.
pub async fn build_summary(upstream: &dyn Upstream, now: DateTime<Utc>) -> Summary {
    let today = now.date_naive();

    let generation = async {
        let raw = upstream
            .fetch(elexon::GENERATION_PATH, &elexon::settlement_date_range(today, today))
            .await?;
        derive_generation(&raw)
    };
    let demand = async {
        let raw = upstream
            .fetch(elexon::DEMAND_PATH, &elexon::settlement_date_range(today, today))
            .await?;
        derive_demand(&raw)
    };
    let price = async {
        let raw = upstream
            .fetch(elexon::PRICE_PATH, &elexon::settlement_date_param(today))
            .await?;
        derive_price(&raw)
    };
    let imbalance = async {
        let raw = upstream
            .fetch(elexon::IMBALANCE_PATH, &elexon::settlement_date_range(today, today))
            .await?;
        derive_imbalance(&raw)
    };
    let frequency = async {
        let raw = upstream
            .fetch(elexon::FREQUENCY_PATH, &elexon::frequency_window_params(now))
            .await?;
        derive_frequency(&raw)
    };

    let (generation, demand, price, imbalance, frequency) =
        tokio::join!(generation, demand, price, imbalance, frequency);

    let mut errors = BTreeMap::new();
    Summary {
        settlement_period: settlement::settlement_period_at(now),
        generation: unwrap_or_record("generation", generation, &mut errors),
        demand: unwrap_or_record("demand", demand, &mut errors),
        price: unwrap_or_record("price", price, &mut errors),
        imbalance: unwrap_or_record("imbalance", imbalance, &mut errors),
        frequency: unwrap_or_record("frequency", frequency, &mut errors),
        errors,
    }
}

fn unwrap_or_record<T>(
    name: &str,
    result: Result<T, ProxyError>,
    errors: &mut BTreeMap<String, String>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(dataset = name, error = %e, "summary sub-fetch failed");
            errors.insert(name.to_string(), e.to_string());
            None
        }
    }
}

/// Latest-period generation totals.
fn derive_generation(raw: &Value) -> Result<GenerationSummary, ProxyError> {
    let snapshot = fuel_mix::latest_snapshot(raw)?;
    let total = snapshot.total_mw();

    let mut fuels: BTreeMap<String, i64> = BTreeMap::new();
    for record in &snapshot.records {
        if let Some(fuel_type) = &record.fuel_type {
            fuels.insert(fuel_type.clone(), record.output_mw.round() as i64);
        }
    }

    let wind_mw = fuels.get("WIND").copied().unwrap_or(0);
    let solar_mw = fuels.get("SOLAR").copied().unwrap_or(0);
    let nuclear_mw = fuels.get("NUCLEAR").copied().unwrap_or(0);

    Ok(GenerationSummary {
        total_mw: total.round() as i64,
        wind_mw,
        solar_mw,
        nuclear_mw,
        wind_pct: percentage(wind_mw as f64, total),
        solar_pct: percentage(solar_mw as f64, total),
        fuels,
    })
}

/// Latest demand outturn record by settlement period.
fn derive_demand(raw: &Value) -> Result<DemandSummary, ProxyError> {
    let mut records = period_records(raw);
    records.sort_by_key(|(sp, _)| *sp);

    let (settlement_period, latest) = records.pop().ok_or(ProxyError::NoData)?;
    let mw = latest
        .get("initialDemandOutturn")
        .and_then(Value::as_f64)
        .or_else(|| latest.get("demand").and_then(Value::as_f64))
        .unwrap_or(0.0);

    Ok(DemandSummary {
        mw,
        settlement_period,
    })
}

/// Latest market-index price plus the change from the previous period.
fn derive_price(raw: &Value) -> Result<PriceSummary, ProxyError> {
    let mut priced: Vec<(u32, f64)> = period_records(raw)
        .into_iter()
        .filter_map(|(sp, r)| r.get("price").and_then(Value::as_f64).map(|p| (sp, p)))
        .collect();
    priced.sort_by_key(|(sp, _)| *sp);

    let (settlement_period, latest) = *priced.last().ok_or(ProxyError::NoData)?;
    // With a single record the previous price is the latest itself: zero change.
    let previous = if priced.len() >= 2 {
        priced[priced.len() - 2].1
    } else {
        latest
    };

    Ok(PriceSummary {
        gbp_per_mwh: round2(latest),
        settlement_period,
        change_gbp: round2(latest - previous),
    })
}

/// Latest indicated imbalance record by settlement period.
fn derive_imbalance(raw: &Value) -> Result<ImbalanceSummary, ProxyError> {
    let mut records = period_records(raw);
    records.sort_by_key(|(sp, _)| *sp);

    let (settlement_period, latest) = records.pop().ok_or(ProxyError::NoData)?;
    let mw = latest
        .get("imbalance")
        .and_then(Value::as_f64)
        .or_else(|| latest.get("indicatedImbalance").and_then(Value::as_f64))
        .or_else(|| latest.get("value").and_then(Value::as_f64))
        .unwrap_or(0.0);

    Ok(ImbalanceSummary {
        mw: mw.round() as i64,
        settlement_period,
    })
}

/// Latest frequency reading by publish time.
fn derive_frequency(raw: &Value) -> Result<FrequencySummary, ProxyError> {
    let mut records: Vec<&Value> = raw
        .get("data")
        .and_then(Value::as_array)
        .map(|data| data.iter().collect())
        .unwrap_or_default();
    records.sort_by_key(|r| r.get("publishTime").and_then(Value::as_str).unwrap_or(""));

    let latest = records.last().ok_or(ProxyError::NoData)?;
    let hz = latest
        .get("frequency")
        .and_then(Value::as_f64)
        .or_else(|| latest.get("value").and_then(Value::as_f64))
        .unwrap_or(NOMINAL_HZ);

    Ok(FrequencySummary {
        hz: round3(hz),
        nominal_hz: NOMINAL_HZ,
        deviation: round3(hz - NOMINAL_HZ),
        status: classify_frequency(hz),
        published_at: latest
            .get("publishTime")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Records carrying a settlement period, paired with it. Malformed records
/// are dropped; sorting is stable, so ties keep upstream order.
fn period_records(raw: &Value) -> Vec<(u32, &Value)> {
    raw.get("data")
        .and_then(Value::as_array)
        .map(|data| {
            data.iter()
                .filter_map(|r| {
                    r.get("settlementPeriod")
                        .and_then(Value::as_u64)
                        .map(|sp| (sp as u32, r))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
