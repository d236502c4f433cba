//! Fuel-mix derivation from the raw half-hourly generation outturn.
//!
//! The upstream dataset reports several settlement periods at once; "latest"
//! means the highest period number present in the data, which can lag the
//! wall-clock period while publication catches up.

use crate::error::ProxyError;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Fuel categories counted as renewable.
pub const RENEWABLE_FUELS: [&str; 5] = ["WIND", "SOLAR", "NPSHYD", "HYDRO", "BIOMASS"];

/// Renewables plus nuclear.
pub const LOW_CARBON_FUELS: [&str; 6] = ["WIND", "SOLAR", "NPSHYD", "HYDRO", "BIOMASS", "NUCLEAR"];

/// One fuel category's output at one settlement period.
#[derive(Debug, Clone, PartialEq)]
pub struct FuelRecord {
    pub fuel_type: Option<String>,
    pub settlement_period: u32,
    pub output_mw: f64,
}

/// All records for a single settlement period.
#[derive(Debug, Clone)]
pub struct GenerationSnapshot {
    pub settlement_period: u32,
    pub records: Vec<FuelRecord>,
}

impl GenerationSnapshot {
    /// Total output over the full snapshot, zero and negative records included.
    pub fn total_mw(&self) -> f64 {
        self.records.iter().map(|r| r.output_mw).sum()
    }
}

/// Lenient parse of one raw record. Output prefers `generation`, then
/// `quantity`, then zero; a record without a settlement period is unusable.
fn parse_record(raw: &Value) -> Option<FuelRecord> {
    let settlement_period = raw.get("settlementPeriod").and_then(Value::as_u64)? as u32;
    let output_mw = raw
        .get("generation")
        .and_then(Value::as_f64)
        .or_else(|| raw.get("quantity").and_then(Value::as_f64))
        .unwrap_or(0.0);
    let fuel_type = raw
        .get("fuelType")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(FuelRecord {
        fuel_type,
        settlement_period,
        output_mw,
    })
}

/// Records for the highest settlement period present in `raw["data"]`.
pub fn latest_snapshot(raw: &Value) -> Result<GenerationSnapshot, ProxyError> {
    let records: Vec<FuelRecord> = raw
        .get("data")
        .and_then(Value::as_array)
        .map(|data| data.iter().filter_map(parse_record).collect())
        .unwrap_or_default();

    let settlement_period = records
        .iter()
        .map(|r| r.settlement_period)
        .max()
        .ok_or(ProxyError::NoData)?;

    let records = records
        .into_iter()
        .filter(|r| r.settlement_period == settlement_period)
        .collect();

    Ok(GenerationSnapshot {
        settlement_period,
        records,
    })
}

/// One listed fuel in the derived mix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelShare {
    pub fuel_type: String,
    pub label: String,
    pub mw: i64,
    pub percentage: f64,
}

/// Clean fuel-mix percentages for one settlement period.
#[derive(Debug, Clone, Serialize)]
pub struct FuelMix {
    pub settlement_date: NaiveDate,
    pub settlement_period: u32,
    pub total_mw: i64,
    pub renewable_mw: i64,
    pub renewable_pct: f64,
    pub low_carbon_mw: i64,
    pub low_carbon_pct: f64,
    pub fuels: Vec<FuelShare>,
}

/// Derive the fuel-mix breakdown for a snapshot.
///
/// The percentage denominator is the unfiltered snapshot total. The listing
/// keeps positive-output fuels only, sorted descending by output, and the
/// renewable/low-carbon sums run over that listing.
pub fn fuel_mix(snapshot: &GenerationSnapshot, settlement_date: NaiveDate) -> FuelMix {
    let total = snapshot.total_mw();

    let mut listed: Vec<&FuelRecord> = snapshot
        .records
        .iter()
        .filter(|r| r.fuel_type.is_some() && r.output_mw.round() > 0.0)
        .collect();
    listed.sort_by(|a, b| b.output_mw.total_cmp(&a.output_mw));

    let fuels: Vec<FuelShare> = listed
        .iter()
        .map(|r| {
            let code = r.fuel_type.clone().unwrap_or_default();
            let mw = r.output_mw.round() as i64;
            FuelShare {
                label: fuel_label(&code).to_string(),
                fuel_type: code,
                mw,
                percentage: percentage(mw as f64, total),
            }
        })
        .collect();

    let renewable_mw: i64 = fuels
        .iter()
        .filter(|f| RENEWABLE_FUELS.contains(&f.fuel_type.as_str()))
        .map(|f| f.mw)
        .sum();
    let low_carbon_mw: i64 = fuels
        .iter()
        .filter(|f| LOW_CARBON_FUELS.contains(&f.fuel_type.as_str()))
        .map(|f| f.mw)
        .sum();

    FuelMix {
        settlement_date,
        settlement_period: snapshot.settlement_period,
        total_mw: total.round() as i64,
        renewable_mw,
        renewable_pct: percentage(renewable_mw as f64, total),
        low_carbon_mw,
        low_carbon_pct: percentage(low_carbon_mw as f64, total),
        fuels,
    }
}

/// The `generation/latest` shape: totals plus a fuel-to-MW map. Unlike the
/// fuel mix, zero and negative outputs stay in the map.
#[derive(Debug, Clone, Serialize)]
pub struct LatestGeneration {
    pub settlement_date: NaiveDate,
    pub settlement_period: u32,
    pub total_mw: i64,
    pub fuels: BTreeMap<String, i64>,
}

pub fn latest_generation(snapshot: &GenerationSnapshot, settlement_date: NaiveDate) -> LatestGeneration {
    let fuels = snapshot
        .records
        .iter()
        .filter_map(|r| {
            r.fuel_type
                .as_ref()
                .map(|ft| (ft.clone(), r.output_mw.round() as i64))
        })
        .collect();

    LatestGeneration {
        settlement_date,
        settlement_period: snapshot.settlement_period,
        total_mw: snapshot.total_mw().round() as i64,
        fuels,
    }
}

/// Human-readable labels for BMRS fuel codes. Unknown codes fall back to
/// the raw code so new interconnectors degrade gracefully.
pub fn fuel_label(code: &str) -> &str {
    match code {
        "CCGT" => "Gas CCGT",
        "OCGT" => "Gas OCGT",
        "OIL" => "Oil",
        "COAL" => "Coal",
        "NUCLEAR" => "Nuclear",
        "WIND" => "Wind",
        "PS" => "Pumped Storage",
        "NPSHYD" => "Hydro",
        "OTHER" => "Other",
        "INTFR" => "France IC",
        "INTIRL" => "Ireland IC",
        "INTNED" => "Netherlands IC",
        "INTEW" => "E-W IC",
        "INTNEM" => "NEMO IC",
        "BIOMASS" => "Biomass",
        "SOLAR" => "Solar",
        _ => code,
    }
}

/// Share of `total`, rounded to one decimal place; zero when the total is zero.
pub(crate) fn percentage(mw: f64, total: f64) -> f64 {
    if total != 0.0 {
        round1(mw / total * 100.0)
    } else {
        0.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 17).unwrap()
    }

    fn record(fuel: &str, sp: u32, mw: f64) -> Value {
        json!({ "fuelType": fuel, "settlementPeriod": sp, "generation": mw })
    }

    #[test]
    fn latest_snapshot_picks_highest_period() {
        let raw = json!({ "data": [
            record("WIND", 11, 100.0),
            record("WIND", 12, 200.0),
            record("CCGT", 12, 300.0),
        ]});
        let snapshot = latest_snapshot(&raw).unwrap();

        assert_eq!(snapshot.settlement_period, 12);
        assert_eq!(snapshot.records.len(), 2);
    }

    #[test]
    fn empty_dataset_is_no_data() {
        assert!(matches!(latest_snapshot(&json!({ "data": [] })), Err(ProxyError::NoData)));
        assert!(matches!(latest_snapshot(&json!({})), Err(ProxyError::NoData)));
    }

    #[test]
    fn output_falls_back_to_quantity() {
        let raw = json!({ "data": [
            { "fuelType": "WIND", "settlementPeriod": 3, "quantity": 450.0 },
        ]});
        let snapshot = latest_snapshot(&raw).unwrap();
        assert_eq!(snapshot.records[0].output_mw, 450.0);
    }

    #[test]
    fn records_without_period_are_skipped() {
        let raw = json!({ "data": [
            { "fuelType": "WIND", "generation": 100.0 },
            record("CCGT", 5, 200.0),
        ]});
        let snapshot = latest_snapshot(&raw).unwrap();

        assert_eq!(snapshot.settlement_period, 5);
        assert_eq!(snapshot.records.len(), 1);
    }

    #[test]
    fn fuel_mix_splits_percentages() {
        let raw = json!({ "data": [record("WIND", 30, 600.0), record("CCGT", 30, 400.0)] });
        let mix = fuel_mix(&latest_snapshot(&raw).unwrap(), date());

        assert_eq!(mix.settlement_period, 30);
        assert_eq!(mix.total_mw, 1000);
        assert_eq!(
            mix.fuels[0],
            FuelShare {
                fuel_type: "WIND".to_string(),
                label: "Wind".to_string(),
                mw: 600,
                percentage: 60.0,
            }
        );
        assert_eq!(
            mix.fuels[1],
            FuelShare {
                fuel_type: "CCGT".to_string(),
                label: "Gas CCGT".to_string(),
                mw: 400,
                percentage: 40.0,
            }
        );
        assert_eq!(mix.renewable_mw, 600);
        assert_eq!(mix.renewable_pct, 60.0);
        assert_eq!(mix.low_carbon_mw, 600);
        assert_eq!(mix.low_carbon_pct, 60.0);
    }

    #[test]
    fn zero_total_yields_zero_percentages() {
        let raw = json!({ "data": [record("WIND", 1, 0.0), record("CCGT", 1, 0.0)] });
        let mix = fuel_mix(&latest_snapshot(&raw).unwrap(), date());

        assert_eq!(mix.total_mw, 0);
        assert!(mix.fuels.is_empty());
        assert_eq!(mix.renewable_pct, 0.0);
        assert_eq!(mix.low_carbon_pct, 0.0);
    }

    #[test]
    fn non_positive_fuels_are_unlisted_but_count_toward_total() {
        let raw = json!({ "data": [
            record("WIND", 7, 600.0),
            record("CCGT", 7, 400.0),
            record("OIL", 7, 0.0),
            record("INTFR", 7, -50.0),
        ]});
        let mix = fuel_mix(&latest_snapshot(&raw).unwrap(), date());

        // 600 + 400 + 0 - 50
        assert_eq!(mix.total_mw, 950);
        let listed: Vec<&str> = mix.fuels.iter().map(|f| f.fuel_type.as_str()).collect();
        assert_eq!(listed, ["WIND", "CCGT"]);
        assert_eq!(mix.fuels[0].percentage, 63.2);
        assert_eq!(mix.fuels[1].percentage, 42.1);
        assert_eq!(mix.renewable_mw, 600);
        assert_eq!(mix.renewable_pct, 63.2);
    }

    #[test]
    fn nuclear_counts_as_low_carbon_only() {
        let raw = json!({ "data": [
            record("WIND", 9, 500.0),
            record("NUCLEAR", 9, 300.0),
            record("CCGT", 9, 200.0),
        ]});
        let mix = fuel_mix(&latest_snapshot(&raw).unwrap(), date());

        assert_eq!(mix.renewable_mw, 500);
        assert_eq!(mix.low_carbon_mw, 800);
        assert_eq!(mix.renewable_pct, 50.0);
        assert_eq!(mix.low_carbon_pct, 80.0);
    }

    #[test]
    fn unknown_fuel_code_labels_itself() {
        let raw = json!({ "data": [record("INTVKL", 2, 500.0)] });
        let mix = fuel_mix(&latest_snapshot(&raw).unwrap(), date());
        assert_eq!(mix.fuels[0].label, "INTVKL");
    }

    #[test]
    fn sub_half_megawatt_rounds_out_of_the_listing() {
        let raw = json!({ "data": [record("WIND", 4, 600.0), record("OIL", 4, 0.4)] });
        let mix = fuel_mix(&latest_snapshot(&raw).unwrap(), date());

        assert_eq!(mix.fuels.len(), 1);
        assert_eq!(mix.fuels[0].fuel_type, "WIND");
    }

    #[test]
    fn latest_generation_keeps_zero_output_fuels() {
        let raw = json!({ "data": [record("WIND", 9, 600.4), record("OIL", 9, 0.0)] });
        let latest = latest_generation(&latest_snapshot(&raw).unwrap(), date());

        assert_eq!(latest.settlement_period, 9);
        assert_eq!(latest.total_mw, 600);
        assert_eq!(latest.fuels["WIND"], 600);
        assert_eq!(latest.fuels["OIL"], 0);
    }
}
