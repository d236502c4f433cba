//! Client for the Elexon BMRS public API.
//!
//! One logical fetch per call: build the URL, force `format=json`, parse
//! the body. Failures are classified but never retried; the caller decides
//! whether to degrade (summary) or surface the error (proxy endpoints).

use crate::error::ProxyError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

pub const GENERATION_PATH: &str = "generation/outturn/halfHourly";
pub const DEMAND_PATH: &str = "demand/outturn";
pub const PRICE_PATH: &str = "balancing/pricing/market-index";
pub const IMBALANCE_PATH: &str = "datasets/IMBALNGC";
pub const FREQUENCY_PATH: &str = "datasets/FREQ";

/// Seam between the proxy and the upstream API, so handlers and the summary
/// aggregator can be exercised against a stub.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Fetch one upstream dataset as parsed JSON.
    async fn fetch(&self, path: &str, params: &[(String, String)]) -> Result<Value, ProxyError>;
}

pub struct ElexonClient {
    client: Client,
    base_url: String,
}

impl ElexonClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("gridproxy/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());

        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Upstream for ElexonClient {
    async fn fetch(&self, path: &str, params: &[(String, String)]) -> Result<Value, ProxyError> {
        let url = self.endpoint_url(path);
        debug!(%url, ?params, "ELEXON GET");

        let response = self
            .client
            .get(&url)
            .query(&with_json_format(params))
            .send()
            .await
            .map_err(|e| ProxyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            error!(%url, status = status.as_u16(), "Elexon HTTP error");
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProxyError::Unavailable(format!("invalid JSON body: {e}")))
    }
}

/// Query pairs for an upstream request: the caller's params with any
/// `format` value replaced by `json`. The response format is not
/// caller-selectable.
fn with_json_format(params: &[(String, String)]) -> Vec<(&str, &str)> {
    let mut query: Vec<(&str, &str)> = params
        .iter()
        .filter(|(k, _)| k != "format")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    query.push(("format", "json"));
    query
}

/// `settlementDateFrom`/`settlementDateTo` pair for half-hourly datasets.
pub fn settlement_date_range(from: NaiveDate, to: NaiveDate) -> Vec<(String, String)> {
    vec![
        ("settlementDateFrom".to_string(), from.to_string()),
        ("settlementDateTo".to_string(), to.to_string()),
    ]
}

/// Single `settlementDate` parameter, used by the market-index endpoint.
pub fn settlement_date_param(date: NaiveDate) -> Vec<(String, String)> {
    vec![("settlementDate".to_string(), date.to_string())]
}

/// Rolling one-hour `publishDateTimeFrom` window for the frequency dataset,
/// which publishes roughly every 30 seconds.
pub fn frequency_window_params(now: DateTime<Utc>) -> Vec<(String, String)> {
    let from = now - chrono::Duration::hours(1);
    vec![(
        "publishDateTimeFrom".to_string(),
        from.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn endpoint_url_joins_cleanly() {
        let client = ElexonClient::new("https://data.elexon.co.uk/bmrs/api/v1/", 15);
        assert_eq!(
            client.endpoint_url("/datasets/FREQ"),
            "https://data.elexon.co.uk/bmrs/api/v1/datasets/FREQ"
        );
        assert_eq!(
            client.endpoint_url("datasets/FREQ"),
            "https://data.elexon.co.uk/bmrs/api/v1/datasets/FREQ"
        );
    }

    #[test]
    fn caller_format_param_is_replaced_with_json() {
        let params = vec![
            ("format".to_string(), "csv".to_string()),
            ("settlementDate".to_string(), "2025-02-17".to_string()),
            ("format".to_string(), "xml".to_string()),
        ];
        assert_eq!(
            with_json_format(&params),
            vec![("settlementDate", "2025-02-17"), ("format", "json")]
        );
        assert_eq!(with_json_format(&[]), vec![("format", "json")]);
    }

    #[test]
    fn date_range_params_use_iso_dates() {
        let from = NaiveDate::from_ymd_opt(2025, 2, 16).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 2, 17).unwrap();
        assert_eq!(
            settlement_date_range(from, to),
            vec![
                ("settlementDateFrom".to_string(), "2025-02-16".to_string()),
                ("settlementDateTo".to_string(), "2025-02-17".to_string()),
            ]
        );
    }

    #[test]
    fn frequency_window_looks_back_one_hour() {
        let now = Utc.with_ymd_and_hms(2025, 2, 17, 10, 15, 42).unwrap();
        assert_eq!(
            frequency_window_params(now),
            vec![("publishDateTimeFrom".to_string(), "2025-02-17T09:15:42Z".to_string())]
        );
    }
}
