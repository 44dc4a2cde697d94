//! Variable dictionaries: where they come from and how they are cached.
//!
//! A dictionary is identified by a [`DictionaryKey`] (year, kind, estimate
//! window). Sources are tried through the [`DictionarySource`] trait:
//! [`DirectoryDictionaries`] reads files saved by `lowe dict download`,
//! [`RemoteDictionaries`] fetches the published `variables.json`, and
//! [`FallbackDictionaries`] chains the two. [`DictionaryCache`] sits in
//! front and loads each key at most once, however many cells ask for it
//! concurrently.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lowe_acs_models::{Estimate, TableKind, VariableDictionary};
use tokio::sync::OnceCell;

use crate::rate_limit::RateLimiter;
use crate::transport::Transport;
use crate::{AcsError, RetryConfig, request, retry};

/// Identifies one dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DictionaryKey {
    /// Survey year.
    pub year: u16,
    /// Table kind.
    pub kind: TableKind,
    /// Estimate window.
    pub estimate: Estimate,
}

impl DictionaryKey {
    /// File name of this dictionary inside a dictionary directory.
    ///
    /// 5-year dictionaries are `{kind}_vars_{year}.json`; other windows
    /// add the survey, e.g. `subject_vars_2019_acs1.json`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let stem = self.kind.dictionary_stem();
        match self.estimate {
            Estimate::FiveYear => format!("{stem}_vars_{}.json", self.year),
            other => format!("{stem}_vars_{}_{}.json", self.year, other.survey()),
        }
    }
}

impl fmt::Display for DictionaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.estimate, self.kind)
    }
}

/// Somewhere dictionaries can be loaded from.
#[async_trait]
pub trait DictionarySource: Send + Sync {
    /// Loads the dictionary for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError`] if the dictionary is unavailable or unparseable.
    async fn load(&self, key: DictionaryKey) -> Result<VariableDictionary, AcsError>;
}

/// Dictionaries saved as JSON files in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDictionaries {
    dir: PathBuf,
}

impl DirectoryDictionaries {
    /// Reads dictionaries from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file for `key`.
    #[must_use]
    pub fn path(&self, key: DictionaryKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

#[async_trait]
impl DictionarySource for DirectoryDictionaries {
    async fn load(&self, key: DictionaryKey) -> Result<VariableDictionary, AcsError> {
        let path = self.path(key);
        log::debug!("Reading {key} dictionary from {}", path.display());
        let bytes = tokio::fs::read(&path).await?;
        Ok(VariableDictionary::from_json_slice(&bytes)?)
    }
}

/// Dictionaries fetched from the published `variables.json` endpoints.
///
/// Requests count against the shared rate limit and are retried like data
/// requests.
#[derive(Clone)]
pub struct RemoteDictionaries {
    transport: Arc<dyn Transport>,
    base_url: String,
    retry: RetryConfig,
    limiter: Arc<RateLimiter>,
}

impl RemoteDictionaries {
    /// Fetches from `base_url` through `transport`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        retry: RetryConfig,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            retry,
            limiter,
        }
    }

    /// Fetches the raw published document for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError`] if the request fails after all retries.
    pub async fn fetch_raw(&self, key: DictionaryKey) -> Result<serde_json::Value, AcsError> {
        let url = request::dictionary_url(&self.base_url, key.year, key.kind, key.estimate);
        log::info!("Downloading {key} dictionary from {url}");
        retry::with_backoff(&self.retry, &format!("{key} dictionary"), || async {
            self.limiter.acquire().await;
            self.transport.get_json(&url).await
        })
        .await
    }

    /// Downloads the dictionary for `key` into `dir`, returning the path
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError`] if the download, parse or write fails.
    pub async fn download_to(&self, key: DictionaryKey, dir: &Path) -> Result<PathBuf, AcsError> {
        let raw = self.fetch_raw(key).await?;
        let dictionary = VariableDictionary::from_json_value(raw.clone())?;
        if dictionary.is_empty() {
            return Err(AcsError::MalformedResponse {
                message: format!("{key} dictionary has no decodable variables"),
            });
        }

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(key.file_name());
        tokio::fs::write(&path, serde_json::to_vec(&raw)?).await?;
        log::info!(
            "Saved {key} dictionary ({} variables) to {}",
            dictionary.len(),
            path.display()
        );
        Ok(path)
    }
}

#[async_trait]
impl DictionarySource for RemoteDictionaries {
    async fn load(&self, key: DictionaryKey) -> Result<VariableDictionary, AcsError> {
        let raw = self.fetch_raw(key).await?;
        Ok(VariableDictionary::from_json_value(raw)?)
    }
}

/// Tries `primary`, then `fallback` if the primary fails.
pub struct FallbackDictionaries {
    primary: Arc<dyn DictionarySource>,
    fallback: Arc<dyn DictionarySource>,
}

impl FallbackDictionaries {
    /// Chains two sources.
    #[must_use]
    pub fn new(primary: Arc<dyn DictionarySource>, fallback: Arc<dyn DictionarySource>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl DictionarySource for FallbackDictionaries {
    async fn load(&self, key: DictionaryKey) -> Result<VariableDictionary, AcsError> {
        match self.primary.load(key).await {
            Ok(dictionary) => Ok(dictionary),
            Err(e) => {
                log::info!("No local {key} dictionary ({e}), fetching it");
                self.fallback.load(key).await
            }
        }
    }
}

/// Memoizes dictionaries per key with single-flight loading.
///
/// Concurrent requests for the same key wait on one load. A failed load is
/// not cached; the next request for that key tries again.
pub struct DictionaryCache {
    source: Arc<dyn DictionarySource>,
    cells: Mutex<BTreeMap<DictionaryKey, Arc<OnceCell<Arc<VariableDictionary>>>>>,
}

impl DictionaryCache {
    /// An empty cache in front of `source`.
    #[must_use]
    pub fn new(source: Arc<dyn DictionarySource>) -> Self {
        Self {
            source,
            cells: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the dictionary for `key`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns the source's error if the load fails.
    pub async fn get(&self, key: DictionaryKey) -> Result<Arc<VariableDictionary>, AcsError> {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cells.entry(key).or_default())
        };

        cell.get_or_try_init(|| async {
            let dictionary = self.source.load(key).await?;
            log::debug!("Loaded {key} dictionary ({} variables)", dictionary.len());
            Ok::<_, AcsError>(Arc::new(dictionary))
        })
        .await
        .cloned()
    }

    /// Number of keys loaded so far.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{FakeTransport, StaticDictionaries};

    fn key(year: u16) -> DictionaryKey {
        DictionaryKey {
            year,
            kind: TableKind::Subject,
            estimate: Estimate::FiveYear,
        }
    }

    #[test]
    fn file_names() {
        assert_eq!(key(2019).file_name(), "subject_vars_2019.json");
        assert_eq!(
            DictionaryKey {
                year: 2018,
                kind: TableKind::Profile,
                estimate: Estimate::OneYear,
            }
            .file_name(),
            "dprofile_vars_2018_acs1.json"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_share_one_load() {
        let source = Arc::new(StaticDictionaries::default());
        let cache = Arc::new(DictionaryCache::new(source.clone()));

        let loads = (0..16).map(|i| {
            let cache = Arc::clone(&cache);
            async move { cache.get(key(2015 + (i % 2))).await }
        });
        let results = futures::future::try_join_all(loads).await.unwrap();

        assert_eq!(results.len(), 16);
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.loaded(), 2);
        assert!(Arc::ptr_eq(&results[0], &results[2]));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_loads_are_retried_on_next_request() {
        let source = Arc::new(StaticDictionaries::failing_first(1));
        let cache = DictionaryCache::new(source.clone());

        assert!(cache.get(key(2019)).await.is_err());
        assert_eq!(cache.loaded(), 0);
        assert!(cache.get(key(2019)).await.is_ok());
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn directory_source_reads_saved_files() {
        let dir = std::env::temp_dir().join(format!("lowe-dict-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("subject_vars_2017.json"),
            serde_json::json!({
                "variables": {
                    "S1701_C01_001E": {"label": "Estimate!!Total", "concept": "POVERTY"}
                }
            })
            .to_string(),
        )
        .unwrap();

        let source = DirectoryDictionaries::new(&dir);
        let dictionary = source.load(key(2017)).await.unwrap();
        assert_eq!(dictionary.len(), 1);
        assert!(matches!(source.load(key(2016)).await, Err(AcsError::Io(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_downloads_when_local_file_is_missing() {
        let transport = Arc::new(FakeTransport::default());
        let remote = RemoteDictionaries::new(
            transport.clone(),
            "https://api.test/data",
            RetryConfig::default(),
            Arc::new(RateLimiter::new(100, std::time::Duration::from_secs(60))),
        );
        let source = FallbackDictionaries::new(
            Arc::new(DirectoryDictionaries::new("/nonexistent/lowe-dicts")),
            Arc::new(remote),
        );

        let dictionary = source.load(key(2019)).await.unwrap();
        assert!(!dictionary.is_empty());
        assert_eq!(
            transport.requests(),
            vec!["https://api.test/data/2019/acs/acs5/subject/variables.json".to_string()]
        );
    }
}
