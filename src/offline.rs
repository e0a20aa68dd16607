use crate::{
    api::{response::Asset, AssetFetcher},
    error::ApiError,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Installing,
    Active,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredAsset {
    path: String,
    status: u16,
    content_type: Option<String>,
    #[serde(with = "hex")]
    body: Vec<u8>,
    stored_at: i64,
}

/// Network-first GET cache.
///
/// Successful (2xx) network responses are written through. The cached copy is
/// only served when the network attempt itself fails; an HTTP error status
/// from a reachable server is passed on untouched.
pub struct OfflineCache<F: ?Sized> {
    fetcher: Arc<F>,
    entries: Mutex<HashMap<String, Asset>>,
    dir: Option<PathBuf>,
    lifecycle: Lifecycle,
}

impl<F: AssetFetcher + ?Sized> OfflineCache<F> {
    /// Precache `assets` and activate immediately.
    ///
    /// Precache misses are logged and skipped so an offline start still
    /// yields a working cache serving whatever an earlier run stored.
    pub fn install(fetcher: Arc<F>, dir: Option<&Path>, assets: &[String]) -> Result<Self, ApiError> {
        if let Some(dir) = dir {
            fs::create_dir_all(dir)?;
        }
        let mut cache = Self {
            fetcher,
            entries: Mutex::new(HashMap::new()),
            dir: dir.map(Path::to_path_buf),
            lifecycle: Lifecycle::Installing,
        };

        let mut stored = 0;
        for path in assets {
            match cache.fetcher.fetch_asset(path) {
                Ok(asset) if asset.is_success() => {
                    cache.put(path, asset);
                    stored += 1;
                }
                Ok(asset) => tracing::warn!(path = %path, status = asset.status, "Precache skipped."),
                Err(e) => tracing::warn!(path = %path, "Precache failed: {}", e),
            }
        }
        tracing::info!(stored, requested = assets.len(), "Offline cache installed, activating.");
        cache.lifecycle = Lifecycle::Active;
        Ok(cache)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn fetch(&self, path: &str) -> Result<Asset, ApiError> {
        match self.fetcher.fetch_asset(path) {
            Ok(asset) => {
                if asset.is_success() {
                    self.put(path, asset.clone());
                }
                Ok(asset)
            }
            Err(e) => {
                tracing::warn!(path, "Network fetch failed, trying cache: {}", e);
                self.get(path).ok_or(e)
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<Asset> {
        if let Some(asset) = self.lock().get(path) {
            return Some(asset.clone());
        }
        let asset = self.load(path)?;
        self.lock().insert(path.to_string(), asset.clone());
        Some(asset)
    }

    fn put(&self, path: &str, asset: Asset) {
        if let Err(e) = self.store(path, &asset) {
            tracing::warn!(path, "Failed to persist cached asset: {}", e);
        }
        self.lock().insert(path.to_string(), asset);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Asset>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entry_path(&self, path: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        Some(dir.join(format!("{}.json", hex::encode(path))))
    }

    fn store(&self, path: &str, asset: &Asset) -> Result<(), ApiError> {
        let Some(file) = self.entry_path(path) else {
            return Ok(());
        };
        let stored = StoredAsset {
            path: path.into(),
            status: asset.status,
            content_type: asset.content_type.clone(),
            body: asset.body.clone(),
            stored_at: chrono::Utc::now().timestamp(),
        };
        fs::write(file, serde_json::to_vec(&stored)?)?;
        Ok(())
    }

    fn load(&self, path: &str) -> Option<Asset> {
        let file = self.entry_path(path)?;
        let raw = fs::read(&file).ok()?;
        match serde_json::from_slice::<StoredAsset>(&raw) {
            Ok(stored) if stored.path == path => {
                tracing::debug!(path, stored_at = stored.stored_at, "Loaded asset from disk cache.");
                Some(Asset {
                    status: stored.status,
                    content_type: stored.content_type,
                    body: stored.body,
                })
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(file = %file.display(), "Ignoring corrupt cache entry: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::VecDeque, io};

    /// Fetcher that replays scripted results, then reports the network down.
    #[derive(Default)]
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<Asset, ApiError>>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<Asset, ApiError>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(script.into()), requests: Mutex::default() })
        }
    }

    impl AssetFetcher for ScriptedFetcher {
        fn fetch_asset(&self, path: &str) -> Result<Asset, ApiError> {
            self.requests.lock().unwrap().push(path.to_string());
            self.script.lock().unwrap().pop_front().unwrap_or_else(|| Err(offline()))
        }
    }

    fn offline() -> ApiError {
        ApiError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "offline"))
    }

    fn asset(status: u16, body: &str) -> Asset {
        Asset { status, content_type: Some("text/html".into()), body: body.as_bytes().to_vec() }
    }

    #[test]
    fn install_precaches_and_activates() {
        let fetcher = ScriptedFetcher::new(vec![Ok(asset(200, "index")), Err(offline())]);
        let cache = OfflineCache::install(fetcher.clone(), None, &["/".into(), "/app.js".into()]).unwrap();

        assert_eq!(cache.lifecycle(), Lifecycle::Active);
        assert_eq!(*fetcher.requests.lock().unwrap(), vec!["/", "/app.js"]);
        assert_eq!(cache.get("/"), Some(asset(200, "index")));
        assert_eq!(cache.get("/app.js"), None);
    }

    #[test]
    fn network_first_then_cache_fallback() {
        let fetcher = ScriptedFetcher::new(vec![Ok(asset(200, "fresh"))]);
        let cache = OfflineCache::install(fetcher, None, &[]).unwrap();

        assert_eq!(cache.fetch("/index.html").unwrap().body, b"fresh");
        // Script exhausted: the network is now down.
        assert_eq!(cache.fetch("/index.html").unwrap().body, b"fresh");
    }

    #[test]
    fn network_response_preferred_over_cache() {
        let fetcher = ScriptedFetcher::new(vec![Ok(asset(200, "old")), Ok(asset(200, "new"))]);
        let cache = OfflineCache::install(fetcher, None, &["/".into()]).unwrap();
        assert_eq!(cache.fetch("/").unwrap().body, b"new");
        assert_eq!(cache.get("/").unwrap().body, b"new");
    }

    #[test]
    fn error_status_is_returned_not_cached() {
        let fetcher = ScriptedFetcher::new(vec![Ok(asset(200, "good")), Ok(asset(500, "oops"))]);
        let cache = OfflineCache::install(fetcher, None, &["/".into()]).unwrap();

        assert_eq!(cache.fetch("/").unwrap().status, 500);
        assert_eq!(cache.get("/").unwrap().body, b"good");
    }

    #[test]
    fn miss_while_offline_returns_network_error() {
        let cache = OfflineCache::install(ScriptedFetcher::new(vec![]), None, &[]).unwrap();
        assert!(matches!(cache.fetch("/missing"), Err(ApiError::Io(_))));
    }

    #[test]
    fn disk_cache_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let first = ScriptedFetcher::new(vec![Ok(asset(200, "{\"running\": true}"))]);
        OfflineCache::install(first, Some(dir.path()), &["/api/status".into()]).unwrap();

        let second = OfflineCache::install(ScriptedFetcher::new(vec![]), Some(dir.path()), &["/api/status".into()]).unwrap();
        let served = second.fetch("/api/status").unwrap();
        assert_eq!(served.body, b"{\"running\": true}");
        assert_eq!(served.content_type.as_deref(), Some("text/html"));
    }

    #[test]
    fn corrupt_disk_entry_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(format!("{}.json", hex::encode("/"))), "garbage").unwrap();
        let cache = OfflineCache::install(ScriptedFetcher::new(vec![]), Some(dir.path()), &[]).unwrap();
        assert!(cache.get("/").is_none());
    }
}
