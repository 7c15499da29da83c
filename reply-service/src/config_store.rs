//! Disk-backed trigger and template configuration with a time-to-live cache.
//!
//! Both documents are read lazily on first access and kept for `ttl`. Once the
//! window has passed the next caller reloads from disk; everyone else in the
//! window shares the same `Arc`.

use mcbc_core::{
    ConfigError, CoreError, PipelineSettings, ReplyTemplates, TemplateRecord, TriggerConfig,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: StdMutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: StdMutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.start + *offset
    }
}

/// One cached slot.
pub struct TtlCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: Mutex<Option<(Instant, Arc<T>)>>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: Mutex::new(None),
        }
    }

    /// Return the cached value while it is fresh, otherwise run `loader` and cache its result.
    ///
    /// The slot stays locked during a reload, so concurrent callers wait for the
    /// one refresh instead of each reading the file. A failed reload keeps the
    /// previous value and returns the error.
    pub async fn get_or_load<F, Fut>(&self, loader: F) -> Result<Arc<T>, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut entry = self.entry.lock().await;
        let now = self.clock.now();

        if let Some((loaded_at, value)) = entry.as_ref() {
            if now.saturating_duration_since(*loaded_at) < self.ttl {
                return Ok(Arc::clone(value));
            }
        }

        let value = Arc::new(loader().await?);
        *entry = Some((now, Arc::clone(&value)));
        Ok(value)
    }
}

pub struct ConfigStore {
    trigger_path: PathBuf,
    template_path: PathBuf,
    triggers: TtlCache<TriggerConfig>,
    templates: TtlCache<ReplyTemplates>,
}

impl ConfigStore {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: &PipelineSettings, clock: Arc<dyn Clock>) -> Self {
        let ttl = settings.cache_ttl();
        Self {
            trigger_path: settings.trigger_path(),
            template_path: settings.template_path(),
            triggers: TtlCache::new(ttl, Arc::clone(&clock)),
            templates: TtlCache::new(ttl, clock),
        }
    }

    pub async fn trigger_config(&self) -> Result<Arc<TriggerConfig>, CoreError> {
        self.triggers
            .get_or_load(|| load_trigger_config(&self.trigger_path))
            .await
    }

    pub async fn reply_templates(&self) -> Result<Arc<ReplyTemplates>, CoreError> {
        self.templates
            .get_or_load(|| load_reply_templates(&self.template_path))
            .await
    }

    /// Read both documents once so a broken file stops startup.
    pub async fn preload(&self) -> Result<(), CoreError> {
        let triggers = self.trigger_config().await?;
        let templates = self.reply_templates().await?;
        info!(
            "Loaded {} triggers, {} excluded authors and {} reply templates",
            triggers.triggered_by.len(),
            triggers.undesirable.len(),
            templates.len()
        );
        Ok(())
    }
}

pub async fn load_trigger_config(path: &Path) -> Result<TriggerConfig, CoreError> {
    let config: TriggerConfig = read_json(path).await?;
    let config = config.normalized();
    if config.triggered_by.is_empty() {
        warn!("{} defines no triggers; no comment will match", path.display());
    }
    Ok(config)
}

pub async fn load_reply_templates(path: &Path) -> Result<ReplyTemplates, CoreError> {
    let raw: BTreeMap<String, (String, String, String)> = read_json(path).await?;
    if raw.is_empty() {
        return Err(ConfigError::ValidationFailed {
            reason: format!("{} contains no reply templates", path.display()),
        }
        .into());
    }
    Ok(raw
        .into_iter()
        .map(|(quote, record)| (quote, TemplateRecord::from(record)))
        .collect())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    debug!("Reading configuration from {}", path.display());
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CoreError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            })
        } else {
            CoreError::Io(e)
        }
    })?;

    serde_json::from_str(&contents).map_err(|e| {
        CoreError::Config(ConfigError::InvalidFormat {
            path: path.display().to_string(),
            details: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_config_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mcbc_config_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn settings_for(dir: &Path) -> PipelineSettings {
        PipelineSettings {
            config_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_cache_serves_same_value_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(3600), clock.clone());
        let loads = AtomicUsize::new(0);
        let counter = &loads;

        let load = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CoreError>(7)
        };

        let first = cache.get_or_load(load).await.unwrap();
        clock.advance(Duration::from_secs(3599));
        let second = cache.get_or_load(load).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_reloads_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<usize> = TtlCache::new(Duration::from_secs(3600), clock.clone());
        let loads = AtomicUsize::new(0);
        let counter = &loads;

        let load = move || async move { Ok::<_, CoreError>(counter.fetch_add(1, Ordering::SeqCst)) };

        assert_eq!(*cache.get_or_load(load).await.unwrap(), 0);
        clock.advance(Duration::from_secs(3600));
        assert_eq!(*cache.get_or_load(load).await.unwrap(), 1);
        assert_eq!(*cache.get_or_load(load).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_value() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(10), clock.clone());

        cache.get_or_load(|| async { Ok(1) }).await.unwrap();
        clock.advance(Duration::from_secs(11));

        let failed = cache
            .get_or_load(|| async {
                Err(CoreError::Internal {
                    message: "disk gone".to_string(),
                })
            })
            .await;
        assert!(failed.is_err());

        // The stale entry is still there; its timestamp is unchanged so the
        // next call retries the load.
        let value = cache.get_or_load(|| async { Ok(2) }).await.unwrap();
        assert_eq!(*value, 2);
    }

    #[tokio::test]
    async fn test_store_reads_both_documents() {
        let dir = temp_config_dir();
        write(
            &dir,
            "triggers.json",
            r#"{"triggered_by": ["Catch", "bowled"], "undesirable": ["spammer"]}"#,
        );
        write(
            &dir,
            "reply_templates.json",
            r#"{"duck": ["Bowler", "Batter", "Out for nought"]}"#,
        );

        let store = ConfigStore::new(&settings_for(&dir));
        store.preload().await.unwrap();

        let triggers = store.trigger_config().await.unwrap();
        assert!(triggers.triggered_by.contains("catch"));
        assert!(triggers.undesirable.contains("spammer"));

        let templates = store.reply_templates().await.unwrap();
        assert_eq!(
            templates.get("duck"),
            Some(&TemplateRecord {
                actor: "Bowler".to_string(),
                target: "Batter".to_string(),
                context: "Out for nought".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_store_picks_up_file_changes_after_expiry() {
        let dir = temp_config_dir();
        write(
            &dir,
            "triggers.json",
            r#"{"triggered_by": ["catch"], "undesirable": []}"#,
        );

        let clock = Arc::new(ManualClock::new());
        let store = ConfigStore::with_clock(&settings_for(&dir), clock.clone());
        assert!(store
            .trigger_config()
            .await
            .unwrap()
            .triggered_by
            .contains("catch"));

        write(
            &dir,
            "triggers.json",
            r#"{"triggered_by": ["six"], "undesirable": []}"#,
        );
        assert!(store
            .trigger_config()
            .await
            .unwrap()
            .triggered_by
            .contains("catch"));

        clock.advance(Duration::from_secs(3600));
        let refreshed = store.trigger_config().await.unwrap();
        assert!(refreshed.triggered_by.contains("six"));
        assert!(!refreshed.triggered_by.contains("catch"));
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let dir = temp_config_dir();
        let store = ConfigStore::new(&settings_for(&dir));

        let result = store.trigger_config().await;
        assert!(matches!(
            result,
            Err(CoreError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_malformed_templates_are_rejected() {
        let dir = temp_config_dir();
        write(
            &dir,
            "reply_templates.json",
            r#"{"duck": ["Bowler", "Batter"]}"#,
        );
        let store = ConfigStore::new(&settings_for(&dir));
        assert!(matches!(
            store.reply_templates().await,
            Err(CoreError::Config(ConfigError::InvalidFormat { .. }))
        ));

        write(&dir, "reply_templates.json", "{}");
        let store = ConfigStore::new(&settings_for(&dir));
        assert!(matches!(
            store.reply_templates().await,
            Err(CoreError::Config(ConfigError::ValidationFailed { .. }))
        ));
    }
}
