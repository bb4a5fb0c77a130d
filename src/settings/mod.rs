//! Persisted endpoint and user preferences.
//!
//! Every value lives under its own key and is read and written on its own, so a
//! missing or corrupt entry only affects that entry. Reads never fail: a store
//! error is logged and the last value seen in this process (or the built-in
//! default) is returned instead.

use std::sync::Arc;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::{
    constants::{
        DEFAULT_AUTO_REFRESH_ENABLED, DEFAULT_BASE_URL, DEFAULT_KEEP_DISPLAY_AWAKE,
        DEFAULT_REFRESH_INTERVAL_SECS,
    },
    machinery::store::{Key, KvStore},
};

const COLLECTION: &str = "settings";

pub enum SettingKey {
    BaseUrl,
    AutoRefreshEnabled,
    RefreshIntervalSeconds,
    KeepDisplayAwake,
}

impl AsRef<str> for SettingKey {
    fn as_ref(&self) -> &str {
        match self {
            SettingKey::BaseUrl => "base_url",
            SettingKey::AutoRefreshEnabled => "auto_refresh_enabled",
            SettingKey::RefreshIntervalSeconds => "refresh_interval_seconds",
            SettingKey::KeepDisplayAwake => "keep_display_awake",
        }
    }
}

impl SettingKey {
    fn key<D>(self) -> Key<D> {
        Key::new(COLLECTION, self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    pub base_url: String,
    pub auto_refresh_enabled: bool,
    pub refresh_interval_seconds: u32,
    pub keep_display_awake: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auto_refresh_enabled: DEFAULT_AUTO_REFRESH_ENABLED,
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECS,
            keep_display_awake: DEFAULT_KEEP_DISPLAY_AWAKE,
        }
    }
}

pub struct EndpointStore {
    store: Arc<dyn KvStore>,
    last_seen: RwLock<Preferences>,
}

impl EndpointStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            last_seen: RwLock::new(Preferences::default()),
        }
    }

    pub async fn base_url(&self) -> String {
        let value = self.read::<String>(SettingKey::BaseUrl).await;
        let mut last_seen = self.last_seen.write().await;
        match value {
            Some(url) if !url.trim().is_empty() => {
                last_seen.base_url = url.clone();
                url
            }
            _ => last_seen.base_url.clone(),
        }
    }

    /// Validates and persists a new control-plane address.
    ///
    /// The in-memory value is updated even if the write fails, so the rest of
    /// this process keeps using the address the user asked for.
    pub async fn set_base_url(&self, url: impl AsRef<str>) -> Result<()> {
        let url = normalize_base_url(url.as_ref())?;
        self.last_seen.write().await.base_url = url.clone();
        self.write(SettingKey::BaseUrl, &url).await
    }

    pub async fn auto_refresh_enabled(&self) -> bool {
        let value = self.read::<bool>(SettingKey::AutoRefreshEnabled).await;
        let mut last_seen = self.last_seen.write().await;
        if let Some(enabled) = value {
            last_seen.auto_refresh_enabled = enabled;
        }
        last_seen.auto_refresh_enabled
    }

    pub async fn set_auto_refresh_enabled(&self, enabled: bool) -> Result<()> {
        self.last_seen.write().await.auto_refresh_enabled = enabled;
        self.write(SettingKey::AutoRefreshEnabled, &enabled).await
    }

    pub async fn refresh_interval_seconds(&self) -> u32 {
        let value = self.read::<u32>(SettingKey::RefreshIntervalSeconds).await;
        let mut last_seen = self.last_seen.write().await;
        match value {
            Some(secs) if secs > 0 => last_seen.refresh_interval_seconds = secs,
            Some(_) => warn!("ignoring non-positive persisted refresh interval"),
            None => {}
        }
        last_seen.refresh_interval_seconds
    }

    pub async fn set_refresh_interval_seconds(&self, secs: u32) -> Result<()> {
        if secs == 0 {
            bail!("refresh interval must be a positive number of seconds");
        }
        self.last_seen.write().await.refresh_interval_seconds = secs;
        self.write(SettingKey::RefreshIntervalSeconds, &secs).await
    }

    pub async fn keep_display_awake(&self) -> bool {
        let value = self.read::<bool>(SettingKey::KeepDisplayAwake).await;
        let mut last_seen = self.last_seen.write().await;
        if let Some(awake) = value {
            last_seen.keep_display_awake = awake;
        }
        last_seen.keep_display_awake
    }

    pub async fn set_keep_display_awake(&self, awake: bool) -> Result<()> {
        self.last_seen.write().await.keep_display_awake = awake;
        self.write(SettingKey::KeepDisplayAwake, &awake).await
    }

    pub async fn load(&self) -> Preferences {
        Preferences {
            base_url: self.base_url().await,
            auto_refresh_enabled: self.auto_refresh_enabled().await,
            refresh_interval_seconds: self.refresh_interval_seconds().await,
            keep_display_awake: self.keep_display_awake().await,
        }
    }

    /// Writes all four values; every key is attempted even if an earlier one fails.
    pub async fn save(&self, preferences: &Preferences) -> Result<()> {
        let results = [
            self.set_base_url(&preferences.base_url).await,
            self.set_auto_refresh_enabled(preferences.auto_refresh_enabled)
                .await,
            self.set_refresh_interval_seconds(preferences.refresh_interval_seconds)
                .await,
            self.set_keep_display_awake(preferences.keep_display_awake)
                .await,
        ];

        let failures = results
            .into_iter()
            .filter_map(|r| r.err())
            .map(|e| e.to_string())
            .collect::<Vec<_>>();

        if !failures.is_empty() {
            bail!("failed to save settings: {}", failures.join("; "));
        }
        Ok(())
    }

    pub async fn reset(&self) -> Result<()> {
        self.save(&Preferences::default()).await
    }

    async fn read<D: DeserializeOwned>(&self, setting: SettingKey) -> Option<D> {
        let name = setting.as_ref().to_string();
        match self.store.get(&setting.key::<D>()).await {
            Ok(value) => value,
            Err(e) => {
                warn!("failed to read setting {}: {}", name, e);
                None
            }
        }
    }

    async fn write<D: Serialize>(&self, setting: SettingKey, value: &D) -> Result<()> {
        let name = setting.as_ref().to_string();
        if let Err(e) = self.store.put(&setting.key::<D>(), value).await {
            warn!("failed to persist setting {}: {}", name, e);
            return Err(e);
        }
        debug!("persisted setting {}", name);
        Ok(())
    }
}

/// Accepts `http(s)://host[:port][/prefix]` and strips trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed)?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("server url must use http or https, got {}", url.scheme());
    }
    if url.host_str().is_none() {
        bail!("server url has no host: {}", trimmed);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::machinery::store::MemoryStore;

    /// Delegates to a memory store until told to fail.
    struct FlakyStore {
        inner: MemoryStore,
        broken: AtomicBool,
    }

    #[async_trait]
    impl KvStore for FlakyStore {
        async fn get_raw(&self, key: &str) -> Result<Option<String>> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(anyhow!("disk on fire"));
            }
            self.inner.get_raw(key).await
        }

        async fn set_raw(&self, key: &str, value: String) -> Result<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(anyhow!("disk on fire"));
            }
            self.inner.set_raw(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_defaults_when_nothing_persisted() {
        let settings = EndpointStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(settings.load().await, Preferences::default());
    }

    #[tokio::test]
    async fn test_values_are_independent() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        store
            .set_raw("settings/refresh_interval_seconds", "\"soon\"".to_string())
            .await
            .unwrap();
        store
            .set_raw("settings/keep_display_awake", "true".to_string())
            .await
            .unwrap();

        let settings = EndpointStore::new(store);
        let preferences = settings.load().await;

        assert_eq!(
            preferences.refresh_interval_seconds,
            DEFAULT_REFRESH_INTERVAL_SECS
        );
        assert!(preferences.keep_display_awake);
        assert_eq!(preferences.base_url, DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_to_last_seen() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            broken: AtomicBool::new(false),
        });
        let settings = EndpointStore::new(store.clone());

        settings.set_base_url("http://10.0.0.7:5000/").await.unwrap();
        assert_eq!(settings.base_url().await, "http://10.0.0.7:5000");

        store.broken.store(true, Ordering::SeqCst);
        assert_eq!(settings.base_url().await, "http://10.0.0.7:5000");
        assert_eq!(
            settings.refresh_interval_seconds().await,
            DEFAULT_REFRESH_INTERVAL_SECS
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_reported_but_kept_in_memory() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            broken: AtomicBool::new(true),
        });
        let settings = EndpointStore::new(store);

        assert!(settings.set_keep_display_awake(true).await.is_err());
        assert!(settings.keep_display_awake().await);
    }

    #[tokio::test]
    async fn test_save_and_reset() {
        let settings = EndpointStore::new(Arc::new(MemoryStore::new()));
        let custom = Preferences {
            base_url: "https://vm.example.net".to_string(),
            auto_refresh_enabled: false,
            refresh_interval_seconds: 30,
            keep_display_awake: true,
        };

        settings.save(&custom).await.unwrap();
        assert_eq!(settings.load().await, custom);

        settings.reset().await.unwrap();
        assert_eq!(settings.load().await, Preferences::default());
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let settings = EndpointStore::new(Arc::new(MemoryStore::new()));

        assert!(settings.set_base_url("ftp://host").await.is_err());
        assert!(settings.set_base_url("not a url").await.is_err());
        assert!(settings.set_refresh_interval_seconds(0).await.is_err());
        assert_eq!(settings.load().await, Preferences::default());
    }
}
