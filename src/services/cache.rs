//! Date-gated cache for the aggregated match collection
//!
//! Two files live in the cache directory: the data file (`matches.json`)
//! and its manifest (`cache.json`). The data file is always written first,
//! so a manifest never describes data that is not on disk yet.

use crate::config::CacheConfig;
use crate::services::aggregator::AggregationPipeline;
use crate::sources::MatchSource;
use crate::types::{
    CacheManifest, CacheWarning, MatchCollection, MatchfeedError, Result, StoredCollection,
};
use chrono::{NaiveDate, Utc};
use directories::BaseDirs;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const DATA_FILE: &str = "matches.json";
const MANIFEST_FILE: &str = "cache.json";

/// Outcome of a cache-gated fetch
#[derive(Debug)]
pub enum Freshness {
    /// Manifest already covers today; nothing was fetched.
    /// Use [`FreshnessCache::load_collection`] for the payload.
    Hit(CacheManifest),
    /// A full aggregation ran and its result is returned
    Refreshed(MatchCollection),
}

impl Freshness {
    pub fn is_hit(&self) -> bool {
        matches!(self, Freshness::Hit(_))
    }
}

pub struct FreshnessCache {
    cache_dir: PathBuf,
}

impl FreshnessCache {
    /// Cache under `~/.matchfeed/cache`
    pub fn new() -> Result<Self> {
        let base_dirs = BaseDirs::new()
            .ok_or_else(|| MatchfeedError::Cache("Cannot determine home directory".into()))?;
        let cache_dir = base_dirs.home_dir().join(".matchfeed").join("cache");
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        match &config.dir {
            Some(dir) => Ok(Self::with_cache_dir(dir.clone())),
            None => Self::new(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn data_path(&self) -> PathBuf {
        self.cache_dir.join(DATA_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.cache_dir.join(MANIFEST_FILE)
    }

    /// Run the full aggregation unless the manifest is dated today (UTC).
    /// Callers must not run two of these concurrently.
    pub async fn get_or_refresh<S: MatchSource>(
        &self,
        pipeline: &AggregationPipeline<S>,
    ) -> (Freshness, Option<CacheWarning>) {
        self.get_or_refresh_on(pipeline, Utc::now().date_naive()).await
    }

    async fn get_or_refresh_on<S: MatchSource>(
        &self,
        pipeline: &AggregationPipeline<S>,
        today: NaiveDate,
    ) -> (Freshness, Option<CacheWarning>) {
        let (manifest, read_warning) = self.read_manifest();
        if let Some(warning) = &read_warning {
            warn!("{}; treating as cache miss", warning);
        }

        if let Some(manifest) = manifest {
            if manifest.is_fresh_for(today) {
                info!(
                    "Using cached data from {} ({} matches)",
                    manifest.last_fetch_date, manifest.total_matches
                );
                return (Freshness::Hit(manifest), None);
            }
        }

        let (collection, persist_warning) = self.refresh_on(pipeline, today).await;
        (Freshness::Refreshed(collection), persist_warning.or(read_warning))
    }

    /// Aggregate and persist regardless of the manifest date
    pub async fn refresh<S: MatchSource>(
        &self,
        pipeline: &AggregationPipeline<S>,
    ) -> (MatchCollection, Option<CacheWarning>) {
        self.refresh_on(pipeline, Utc::now().date_naive()).await
    }

    async fn refresh_on<S: MatchSource>(
        &self,
        pipeline: &AggregationPipeline<S>,
        today: NaiveDate,
    ) -> (MatchCollection, Option<CacheWarning>) {
        info!("Fetching fresh data...");
        let collection = pipeline.run_full_aggregation().await;

        match self.persist(&collection, today) {
            Ok(manifest) => {
                info!("Saved {} matches to cache", manifest.total_matches);
                (collection, None)
            }
            Err(e) => {
                error!("Failed to persist match cache: {}", e);
                (collection, Some(CacheWarning::PersistFailed(e.to_string())))
            }
        }
    }

    /// Manifest on disk, if any. Unreadable or malformed files come back
    /// as `None` with a warning.
    pub fn read_manifest(&self) -> (Option<CacheManifest>, Option<CacheWarning>) {
        let path = self.manifest_path();
        if !path.exists() {
            return (None, None);
        }

        let content = match read_locked(&path) {
            Ok(c) => c,
            Err(warning) => return (None, Some(warning)),
        };

        match serde_json::from_str(&content) {
            Ok(manifest) => (Some(manifest), None),
            Err(e) => (
                None,
                Some(CacheWarning::Corrupted(format!(
                    "Corrupted cache manifest: {}",
                    e
                ))),
            ),
        }
    }

    /// Read the persisted data file back into a collection
    pub fn load_collection(&self) -> Result<MatchCollection> {
        let path = self.data_path();
        let content = read_locked(&path).map_err(|w| MatchfeedError::Cache(w.to_string()))?;
        let stored: StoredCollection = serde_json::from_str(&content)
            .map_err(|e| MatchfeedError::Cache(format!("Corrupted data file: {}", e)))?;
        Ok(MatchCollection::from_stored(stored))
    }

    /// Write the data file, then a manifest dated `today`.
    /// If the data file cannot be written the manifest is left untouched.
    pub fn persist(&self, collection: &MatchCollection, today: NaiveDate) -> Result<CacheManifest> {
        fs::create_dir_all(&self.cache_dir)?;

        let data = serde_json::to_string_pretty(&collection.to_stored())
            .map_err(|e| MatchfeedError::Cache(format!("Serialization failed: {}", e)))?;
        write_atomic(&self.data_path(), &data)?;

        let manifest = CacheManifest {
            last_fetch_date: today,
            total_matches: collection.total_matches() as u64,
            last_updated: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&manifest)
            .map_err(|e| MatchfeedError::Cache(format!("Serialization failed: {}", e)))?;
        write_atomic(&self.manifest_path(), &content)?;

        Ok(manifest)
    }

    /// Remove both files
    pub fn clear(&self) -> Result<()> {
        for path in [self.manifest_path(), self.data_path()] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Read a file under a shared lock
fn read_locked(path: &Path) -> std::result::Result<String, CacheWarning> {
    let file = File::open(path)
        .map_err(|e| CacheWarning::LoadFailed(format!("Failed to open {}: {}", path.display(), e)))?;

    file.lock_shared()
        .map_err(|e| CacheWarning::LoadFailed(format!("Failed to acquire read lock: {}", e)))?;

    let mut content = String::new();
    let mut reader = std::io::BufReader::new(&file);
    let read = reader.read_to_string(&mut content);
    let _ = file.unlock();

    read.map_err(|e| CacheWarning::LoadFailed(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(content)
}

/// Atomic write (temp file + rename) with exclusive lock on the target
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("json.tmp");

    {
        let mut file = File::create(&temp_path)
            .map_err(|e| MatchfeedError::Cache(format!("Failed to create temp file: {}", e)))?;
        file.write_all(content.as_bytes())
            .map_err(|e| MatchfeedError::Cache(format!("Failed to write temp file: {}", e)))?;
        file.sync_all()
            .map_err(|e| MatchfeedError::Cache(format!("Failed to sync temp file: {}", e)))?;
    }

    let target = match OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
    {
        Ok(t) => t,
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            return Err(MatchfeedError::Cache(format!(
                "Failed to open {}: {}",
                path.display(),
                e
            )));
        }
    };

    target
        .lock_exclusive()
        .map_err(|e| MatchfeedError::Cache(format!("Failed to acquire write lock: {}", e)))?;

    let renamed = fs::rename(&temp_path, path)
        .map_err(|e| MatchfeedError::Cache(format!("Failed to rename temp file: {}", e)));

    let _ = target.unlock();
    renamed
}
