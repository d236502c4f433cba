//! Service configuration, loaded from the environment.

use anyhow::Result;

/// Per-endpoint-class cache TTLs, in seconds.
///
/// Defaults follow the upstream publication cadence: half-hourly datasets
/// are refreshed a few minutes after each settlement period closes, grid
/// frequency roughly every 30 seconds.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    pub generation: u64,
    pub demand: u64,
    pub price: u64,
    pub imbalance: u64,
    pub frequency: u64,
    /// Fallback class, used by the raw passthrough.
    pub default: u64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            generation: 600,
            demand: 600,
            price: 600,
            imbalance: 600,
            frequency: 60,
            default: 300,
        }
    }
}

impl TtlPolicy {
    fn from_env() -> Self {
        let base = Self::default();
        Self {
            generation: env_u64("CACHE_TTL_GENERATION_SECS", base.generation),
            demand: env_u64("CACHE_TTL_DEMAND_SECS", base.demand),
            price: env_u64("CACHE_TTL_PRICE_SECS", base.price),
            imbalance: env_u64("CACHE_TTL_IMBALANCE_SECS", base.imbalance),
            frequency: env_u64("CACHE_TTL_FREQUENCY_SECS", base.frequency),
            default: env_u64("CACHE_TTL_DEFAULT_SECS", base.default),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub elexon_base_url: String,
    pub fetch_timeout_secs: u64,
    pub ttl: TtlPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8000);

        let elexon_base_url = std::env::var("ELEXON_BASE_URL")
            .unwrap_or_else(|_| "https://data.elexon.co.uk/bmrs/api/v1".to_string());

        let fetch_timeout_secs = env_u64("ELEXON_TIMEOUT_SECS", 15);

        Ok(Self {
            port,
            elexon_base_url,
            fetch_timeout_secs,
            ttl: TtlPolicy::from_env(),
        })
    }
}

fn env_u64(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_defaults_match_publication_cadence() {
        let ttl = TtlPolicy::default();
        assert_eq!(ttl.generation, 600);
        assert_eq!(ttl.frequency, 60);
        assert_eq!(ttl.default, 300);
    }
}
