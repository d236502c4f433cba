//! In-memory TTL cache for upstream responses.
//!
//! One process-wide store keyed by logical query identity. Entries carry the
//! TTL they were stored with and are never renewed on read; expired entries
//! stay visible to `stats` until overwritten or cleared, since there is no
//! background sweeper.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Whether a response was served from the cache or fetched upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: DateTime<Utc>,
    ttl_secs: u64,
}

impl CacheEntry {
    fn expires_at(&self) -> DateTime<Utc> {
        self.stored_at + Duration::seconds(self.ttl_secs as i64)
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

/// Per-key snapshot reported by [`CacheStore::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyStats {
    pub age_seconds: i64,
    pub expires_in_seconds: i64,
    pub stored_at_utc: DateTime<Utc>,
}

/// Snapshot over the whole store, expired entries included.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub cache: BTreeMap<String, KeyStats>,
    pub total_keys: usize,
}

/// Report returned by [`CacheStore::clear`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClearReport {
    Key { cleared: String, found: bool },
    All { cleared: String, count: usize },
}

/// Process-wide key/value store with per-entry TTLs.
///
/// Every operation holds the one internal lock for the duration of its map
/// access and nothing else, so get/set/stats/clear are linearizable with
/// respect to each other. The lock is never held across network I/O.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh value stored under `key`, if any. Expired entries are left in
    /// place for `stats` to report.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if !entry.is_fresh(now) {
            return None;
        }
        debug!(
            key,
            age_secs = (now - entry.stored_at).num_seconds(),
            "cache hit"
        );
        Some(entry.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry wholesale.
    pub fn set(&self, key: &str, value: Value, ttl_secs: u64) {
        self.set_at(key, value, ttl_secs, Utc::now());
    }

    pub fn set_at(&self, key: &str, value: Value, ttl_secs: u64, now: DateTime<Utc>) {
        let entry = CacheEntry {
            value,
            stored_at: now,
            ttl_secs,
        };
        self.entries.write().insert(key.to_string(), entry);
        debug!(key, ttl_secs, "cache set");
    }

    /// Snapshot of every entry, fresh or not.
    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let entries = self.entries.read();
        let cache = entries
            .iter()
            .map(|(key, entry)| {
                let stats = KeyStats {
                    age_seconds: (now - entry.stored_at).num_seconds(),
                    expires_in_seconds: (entry.expires_at() - now).num_seconds().max(0),
                    stored_at_utc: entry.stored_at,
                };
                (key.clone(), stats)
            })
            .collect();

        CacheStats {
            cache,
            total_keys: entries.len(),
        }
    }

    /// Remove one entry, or everything when `key` is `None`.
    pub fn clear(&self, key: Option<&str>) -> ClearReport {
        let mut entries = self.entries.write();
        match key {
            Some(key) => {
                let found = entries.remove(key).is_some();
                info!(key, found, "cache clear");
                ClearReport::Key {
                    cleared: key.to_string(),
                    found,
                }
            }
            None => {
                let count = entries.len();
                entries.clear();
                info!(count, "cache cleared");
                ClearReport::All {
                    cleared: "all".to_string(),
                    count,
                }
            }
        }
    }
}

/// Cache key for the raw passthrough: `raw:{path}:{canonical params}`.
///
/// Parameters are sorted by name then value and rendered `k=v` joined with
/// `&`, so logically identical queries share one key no matter what order
/// the client sent them in. Names and values are percent-encoded before
/// joining; `&`, `=`, and `%` never appear raw inside a component, so two
/// distinct queries cannot collapse into the same key.
pub fn raw_cache_key(path: &str, params: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = params.iter().collect();
    pairs.sort();
    let canonical = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("raw:{path}:{canonical}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn get_returns_value_while_fresh() {
        let cache = CacheStore::new();
        let now = t0();
        cache.set_at("generation:2025-02-17:2025-02-16", json!({"data": []}), 600, now);

        let later = now + Duration::seconds(599);
        assert_eq!(
            cache.get_at("generation:2025-02-17:2025-02-16", later),
            Some(json!({"data": []}))
        );
    }

    #[test]
    fn entry_is_stale_at_exact_expiry() {
        let cache = CacheStore::new();
        let now = t0();
        cache.set_at("k", json!(1), 600, now);

        assert!(cache.get_at("k", now + Duration::seconds(600)).is_none());
        assert!(cache.get_at("k", now + Duration::seconds(601)).is_none());
    }

    #[test]
    fn zero_ttl_is_immediately_stale() {
        let cache = CacheStore::new();
        let now = t0();
        cache.set_at("k", json!(1), 0, now);

        assert!(cache.get_at("k", now).is_none());
    }

    #[test]
    fn set_overwrites_value_and_ttl() {
        let cache = CacheStore::new();
        let now = t0();
        cache.set_at("k", json!("v1"), 600, now);
        cache.set_at("k", json!("v2"), 60, now);

        assert_eq!(cache.get_at("k", now + Duration::seconds(30)), Some(json!("v2")));
        // The first entry's longer TTL went with it.
        assert!(cache.get_at("k", now + Duration::seconds(90)).is_none());
    }

    #[test]
    fn stats_reports_expired_entries_until_cleared() {
        let cache = CacheStore::new();
        let now = t0();
        cache.set_at("old", json!(1), 60, now);

        let later = now + Duration::seconds(120);
        let stats = cache.stats_at(later);
        assert_eq!(stats.total_keys, 1);
        assert_eq!(stats.cache["old"].age_seconds, 120);
        assert_eq!(stats.cache["old"].expires_in_seconds, 0);
        assert!(cache.get_at("old", later).is_none());
    }

    #[test]
    fn stats_reports_age_and_remaining_ttl() {
        let cache = CacheStore::new();
        let now = t0();
        cache.set_at("k", json!(1), 600, now);

        let stats = cache.stats_at(now + Duration::seconds(100));
        assert_eq!(stats.cache["k"].age_seconds, 100);
        assert_eq!(stats.cache["k"].expires_in_seconds, 500);
        assert_eq!(stats.cache["k"].stored_at_utc, now);
    }

    #[test]
    fn clear_missing_key_reports_not_found() {
        let cache = CacheStore::new();
        let now = t0();
        cache.set_at("keep", json!(1), 600, now);

        let report = cache.clear(Some("generation:2025-01-01:2025-01-02"));
        assert_eq!(
            report,
            ClearReport::Key {
                cleared: "generation:2025-01-01:2025-01-02".to_string(),
                found: false,
            }
        );
        assert_eq!(cache.stats_at(now).total_keys, 1);
    }

    #[test]
    fn clear_existing_key_removes_only_that_entry() {
        let cache = CacheStore::new();
        let now = t0();
        cache.set_at("a", json!(1), 600, now);
        cache.set_at("b", json!(2), 600, now);

        let report = cache.clear(Some("a"));
        assert_eq!(
            report,
            ClearReport::Key {
                cleared: "a".to_string(),
                found: true,
            }
        );
        assert!(cache.get_at("a", now).is_none());
        assert!(cache.get_at("b", now).is_some());
    }

    #[test]
    fn clear_all_reports_prior_count() {
        let cache = CacheStore::new();
        let now = t0();
        cache.set_at("a", json!(1), 600, now);
        cache.set_at("b", json!(2), 600, now);

        let report = cache.clear(None);
        assert_eq!(
            report,
            ClearReport::All {
                cleared: "all".to_string(),
                count: 2,
            }
        );
        assert_eq!(cache.stats_at(now).total_keys, 0);
    }

    #[test]
    fn raw_key_is_stable_under_param_reordering() {
        let a = raw_cache_key(
            "datasets/BOAL",
            &[
                ("settlementDate".to_string(), "2025-02-17".to_string()),
                ("settlementPeriod".to_string(), "10".to_string()),
            ],
        );
        let b = raw_cache_key(
            "datasets/BOAL",
            &[
                ("settlementPeriod".to_string(), "10".to_string()),
                ("settlementDate".to_string(), "2025-02-17".to_string()),
            ],
        );

        assert_eq!(a, b);
        assert_eq!(a, "raw:datasets/BOAL:settlementDate=2025-02-17&settlementPeriod=10");
    }

    #[test]
    fn raw_key_escapes_separators_inside_values() {
        let embedded = raw_cache_key("datasets/BOAL", &[("a".to_string(), "b&c=d".to_string())]);
        let split = raw_cache_key(
            "datasets/BOAL",
            &[
                ("a".to_string(), "b".to_string()),
                ("c".to_string(), "d".to_string()),
            ],
        );

        assert_eq!(embedded, "raw:datasets/BOAL:a=b%26c%3Dd");
        assert_eq!(split, "raw:datasets/BOAL:a=b&c=d");
        assert_ne!(embedded, split);
    }

    #[test]
    fn raw_key_escapes_percent_itself() {
        assert_eq!(
            raw_cache_key("datasets/MID", &[("note".to_string(), "100%".to_string())]),
            "raw:datasets/MID:note=100%25"
        );
    }

    #[test]
    fn raw_key_without_params_keeps_trailing_colon() {
        assert_eq!(raw_cache_key("datasets/FREQ", &[]), "raw:datasets/FREQ:");
    }
}
