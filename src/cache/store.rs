//! JSON file cache for tool results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::config::CacheConfig;
use crate::{InstabilityError, InstabilityResult};

/// Appended to values cut down to `max_value_bytes`.
pub const TRUNCATION_MARKER: &str = "…[truncated]";

/// A cached tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    /// Last recorded result.
    pub value: String,

    /// When the result was recorded.
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(value: String) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
        }
    }
}

/// Cache summary, as shown by `/cache` and `instability test`.
#[derive(Debug, Clone)]
pub struct CacheInfo {
    /// Number of entries.
    pub total_entries: usize,

    /// When the cache file was first created.
    pub created: DateTime<Utc>,

    /// Last write.
    pub last_updated: DateTime<Utc>,

    /// Size of the serialized document.
    pub size_bytes: usize,

    /// Cached keys, sorted.
    pub keys: Vec<String>,
}

/// On-disk layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheDocument {
    created: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheDocument {
    fn empty() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            last_updated: now,
            entries: BTreeMap::new(),
        }
    }
}

/// Persistent result cache.
///
/// Maps a tool name (or a fact such as `external_ip`) to its last result.
/// The whole document is rewritten on [`ResultCache::save`]. Size is bounded
/// by `max_entries` (oldest entry evicted first) and `max_value_bytes`
/// (values truncated); a bound of `0` disables it.
#[derive(Debug)]
pub struct ResultCache {
    path: PathBuf,
    doc: CacheDocument,
    max_entries: usize,
    max_value_bytes: usize,
}

impl ResultCache {
    /// Creates an empty cache that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>, max_entries: usize, max_value_bytes: usize) -> Self {
        Self {
            path: path.into(),
            doc: CacheDocument::empty(),
            max_entries,
            max_value_bytes,
        }
    }

    /// Loads the cache described by the configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::load(&config.path, config.max_entries, config.max_value_bytes)
    }

    /// Loads the cache from `path`.
    ///
    /// A missing file gives an empty cache. An unreadable or corrupt file is
    /// logged and replaced by an empty cache on the next save.
    pub fn load(path: impl AsRef<Path>, max_entries: usize, max_value_bytes: usize) -> Self {
        let path = path.as_ref();
        match Self::try_load(path, max_entries, max_value_bytes) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("Cache at {} is unusable, starting empty: {}", path.display(), e);
                Self::new(path, max_entries, max_value_bytes)
            }
        }
    }

    /// Loads the cache from `path`, failing on an unreadable or corrupt file.
    /// A missing file still gives an empty cache.
    pub fn try_load(path: impl AsRef<Path>, max_entries: usize, max_value_bytes: usize) -> InstabilityResult<Self> {
        let path = path.as_ref();
        let mut cache = Self::new(path, max_entries, max_value_bytes);

        if !path.exists() {
            tracing::debug!("No cache at {}, starting empty", path.display());
            return Ok(cache);
        }

        let content = std::fs::read_to_string(path)?;
        let doc: CacheDocument = serde_json::from_str(&content)
            .map_err(|e| InstabilityError::Cache(format!("corrupt cache file: {}", e)))?;

        tracing::debug!(entries = doc.entries.len(), "Cache loaded from {}", path.display());
        cache.doc = doc;
        cache.enforce_capacity(None);
        Ok(cache)
    }

    /// Writes the cache to disk, creating parent directories as needed.
    pub fn save(&mut self) -> InstabilityResult<()> {
        self.doc.last_updated = Utc::now();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&self.doc)?;
        std::fs::write(&self.path, content)?;
        tracing::debug!("Cache saved to {}", self.path.display());
        Ok(())
    }

    /// Records `value` under `key` and returns the previous entry.
    pub fn update(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<CacheEntry> {
        let key = key.into();
        let value = truncate_value(value.into(), self.max_value_bytes);
        let previous = self.doc.entries.insert(key.clone(), CacheEntry::new(value));
        self.enforce_capacity(Some(&key));
        previous
    }

    /// Looks up an entry.
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.doc.entries.get(key)
    }

    /// Removes an entry.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.doc.entries.remove(key)
    }

    /// Drops every entry except the keys in `preserve`.
    pub fn clear(&mut self, preserve: &[&str]) {
        self.doc.entries.retain(|key, _| preserve.contains(&key.as_str()));
    }

    /// Iterates over entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.doc.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.doc.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.doc.entries.is_empty()
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Summary of the cache contents.
    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            total_entries: self.doc.entries.len(),
            created: self.doc.created,
            last_updated: self.doc.last_updated,
            size_bytes: serde_json::to_vec(&self.doc).map(|v| v.len()).unwrap_or(0),
            keys: self.doc.entries.keys().cloned().collect(),
        }
    }

    /// Evicts the oldest entries until the entry bound holds. `keep` is never
    /// evicted.
    fn enforce_capacity(&mut self, keep: Option<&str>) {
        if self.max_entries == 0 {
            return;
        }

        while self.doc.entries.len() > self.max_entries {
            let oldest = self
                .doc
                .entries
                .iter()
                .filter(|(key, _)| Some(key.as_str()) != keep)
                .min_by_key(|(_, entry)| entry.updated_at)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    tracing::debug!(key = %key, "Evicting oldest cache entry");
                    self.doc.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

/// Cuts `value` to at most `max` bytes on a char boundary.
fn truncate_value(value: String, max: usize) -> String {
    if max == 0 || value.len() <= max {
        return value;
    }

    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &value[..end], TRUNCATION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache(max_entries: usize) -> (tempfile::TempDir, ResultCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join("cache.json"), max_entries, 1024);
        (dir, cache)
    }

    #[test]
    fn test_update_returns_previous() {
        let (_dir, mut cache) = temp_cache(10);

        assert!(cache.update("external_ip", "1.2.3.4").is_none());
        let previous = cache.update("external_ip", "5.6.7.8").unwrap();

        assert_eq!(previous.value, "1.2.3.4");
        assert_eq!(cache.get("external_ip").unwrap().value, "5.6.7.8");
    }

    #[test]
    fn test_oldest_entry_evicted() {
        let (_dir, mut cache) = temp_cache(2);

        cache.update("a", "1");
        std::thread::sleep(std::time::Duration::from_millis(5));
        cache.update("b", "2");
        std::thread::sleep(std::time::Duration::from_millis(5));
        cache.update("c", "3");

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_rewriting_a_key_does_not_evict() {
        let (_dir, mut cache) = temp_cache(2);

        cache.update("a", "1");
        cache.update("b", "2");
        cache.update("a", "3");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().value, "3");
    }

    #[test]
    fn test_long_value_truncated_on_char_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ResultCache::new(dir.path().join("c.json"), 10, 5);

        cache.update("k", "ééééé");
        let value = &cache.get("k").unwrap().value;

        assert!(value.ends_with(TRUNCATION_MARKER));
        assert_eq!(value.trim_end_matches(TRUNCATION_MARKER), "éé");
    }

    #[test]
    fn test_clear_preserves_keys() {
        let (_dir, mut cache) = temp_cache(10);
        cache.update("external_ip", "1.2.3.4");
        cache.update("check_websites", "ok");

        cache.clear(&["external_ip"]);

        assert_eq!(cache.len(), 1);
        assert!(cache.get("external_ip").is_some());
    }

    #[test]
    fn test_save_and_reload() {
        let (dir, mut cache) = temp_cache(10);
        cache.update("check_ntp_servers", "All NTP servers are reachable.");
        cache.save().unwrap();

        let reloaded = ResultCache::load(dir.path().join("cache.json"), 10, 1024);
        assert_eq!(
            reloaded.get("check_ntp_servers").unwrap().value,
            "All NTP servers are reachable."
        );
        assert_eq!(reloaded.info().keys, vec!["check_ntp_servers".to_string()]);
    }

    #[test]
    fn test_corrupt_file_gives_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = ResultCache::load(&path, 10, 1024);
        assert!(cache.is_empty());

        let err = ResultCache::try_load(&path, 10, 1024).unwrap_err();
        assert!(matches!(err, InstabilityError::Cache(_)));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/cache.json");
        let mut cache = ResultCache::new(&path, 10, 1024);

        cache.update("k", "v");
        cache.save().unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_info_reports_size() {
        let (_dir, mut cache) = temp_cache(10);
        cache.update("k", "v");

        let info = cache.info();
        assert_eq!(info.total_entries, 1);
        assert!(info.size_bytes > 0);
    }
}
