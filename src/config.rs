use serde::Deserialize;
use std::{fs, io, path::{Path, PathBuf}, time::Duration};

/// Push endpoint carrying status snapshots.
pub const STREAM_PATH: &str = "/api/stream";
pub const STATUS_PATH: &str = "/api/status";
pub const START_PATH: &str = "/api/start";
pub const STOP_PATH: &str = "/api/stop";
pub const WITHDRAW_PATH: &str = "/api/withdraw";

/// Currency code sent with every withdrawal request.
pub const WITHDRAW_CURRENCY: &str = "BTC";

/// Smallest withdrawable amount (one satoshi).
pub const MIN_WITHDRAWAL: f64 = 0.000_000_01;

/// Fixed delay before a dropped status stream is re-opened.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// How long an alert stays visible unless dismissed.
pub const ALERT_TTL: Duration = Duration::from_secs(5);

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Runtime configuration for the dashboard.
///
/// Every field has a default, so a config file only needs the keys it
/// overrides. Command-line flags are applied on top in `main`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the mining backend, without a trailing path.
    pub base_url: String,
    #[serde(with = "millis")]
    pub reconnect_delay: Duration,
    #[serde(with = "millis")]
    pub alert_ttl: Duration,
    /// Directory backing the offline cache. `None` keeps it in memory only.
    pub cache_dir: Option<PathBuf>,
    /// Request paths fetched into the offline cache at start-up.
    pub precache: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnect_delay: RECONNECT_DELAY,
            alert_ttl: ALERT_TTL,
            cache_dir: None,
            precache: vec!["/".into(), "/index.html".into(), STATUS_PATH.into()],
        }
    }
}

impl DashboardConfig {
    /// Load a JSON config file, filling unspecified keys with defaults.
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
