//! Persisted learner state. Three independent records in a key-value store:
//! progress (JSON), content variant, and the onboarding flag.
//!
//! Reads never fail loudly: anything missing or unreadable falls back to
//! defaults and is logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(test)]
use std::collections::HashMap;
use std::path::PathBuf;
use std::{fs, io};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::ContentVariant;

pub const PROGRESS_KEY: &str = "optionsed_progress";
pub const VARIANT_KEY: &str = "optionsed_content_variant";
pub const ONBOARDING_KEY: &str = "optionsed_onboarding_complete";

const ONBOARDING_DONE: &str = "true";

#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(test)]
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("i/o error on `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("could not encode `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal string key-value storage, shaped like browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform data directory, e.g. `~/.local/share/optionsed` on Linux.
    pub fn default_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "optionsed").map(|p| p.data_dir().to_path_buf())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path).map(Some).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        fs::write(self.path_for(key), value).map_err(io_err)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
/// In-process store. `unavailable()` builds one that rejects every call.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    unavailable: bool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            entries: HashMap::new(),
            unavailable: true,
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("memory store disabled".into()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }
}

/// Wire shape of the progress record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub current_module_idx: usize,
    pub current_step_idx: usize,
    pub total_profit: f64,
    pub claimed_steps: Vec<String>, // "module-step"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

pub fn load_progress<S: KeyValueStore + ?Sized>(store: &S) -> Option<ProgressRecord> {
    match store.get(PROGRESS_KEY) {
        Ok(Some(s)) => match serde_json::from_str::<ProgressRecord>(&s) {
            Ok(rec) if rec.total_profit.is_finite() => Some(rec),
            Ok(_) => {
                warn!("Ignoring saved progress with a non-finite profit");
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable saved progress: {}", e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("Could not read saved progress: {:#}", e);
            None
        }
    }
}

pub fn save_progress<S: KeyValueStore + ?Sized>(
    store: &mut S,
    record: &ProgressRecord,
) -> Result<(), StoreError> {
    let s = serde_json::to_string(record).map_err(|source| StoreError::Encode {
        key: PROGRESS_KEY.to_string(),
        source,
    })?;
    store.set(PROGRESS_KEY, &s)?;
    debug!(
        "Saved progress m={} s={} profit={}",
        record.current_module_idx, record.current_step_idx, record.total_profit
    );
    Ok(())
}

pub fn clear_progress<S: KeyValueStore + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    store.remove(PROGRESS_KEY)
}

/// Anything other than a known variant name reads as the default variant.
pub fn load_variant<S: KeyValueStore + ?Sized>(store: &S) -> ContentVariant {
    match store.get(VARIANT_KEY) {
        Ok(Some(s)) => s.trim().parse().unwrap_or_else(|_| {
            warn!("Unknown stored content variant {:?}; using default", s);
            ContentVariant::Default
        }),
        Ok(None) => ContentVariant::Default,
        Err(e) => {
            warn!("Could not read content variant: {:#}", e);
            ContentVariant::Default
        }
    }
}

pub fn save_variant<S: KeyValueStore + ?Sized>(
    store: &mut S,
    variant: ContentVariant,
) -> Result<(), StoreError> {
    store.set(VARIANT_KEY, variant.as_str())
}

pub fn onboarding_complete<S: KeyValueStore + ?Sized>(store: &S) -> bool {
    match store.get(ONBOARDING_KEY) {
        Ok(Some(s)) => s.trim() == ONBOARDING_DONE,
        Ok(None) => false,
        Err(e) => {
            warn!("Could not read onboarding flag: {:#}", e);
            false
        }
    }
}

pub fn mark_onboarding_complete<S: KeyValueStore + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    store.set(ONBOARDING_KEY, ONBOARDING_DONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("optionsed-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn sample() -> ProgressRecord {
        ProgressRecord {
            current_module_idx: 2,
            current_step_idx: 1,
            total_profit: 2100.0,
            claimed_steps: vec!["1-1".into(), "2-0".into()],
            saved_at: None,
        }
    }

    #[test]
    fn progress_record_uses_camel_case_keys() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"currentModuleIdx\":2"));
        assert!(json.contains("\"claimedSteps\":[\"1-1\",\"2-0\"]"));
        assert!(!json.contains("savedAt"));
    }

    #[test]
    fn progress_survives_a_save_and_load() {
        let mut store = MemoryStore::new();
        save_progress(&mut store, &sample()).unwrap();
        assert_eq!(load_progress(&store), Some(sample()));
        clear_progress(&mut store).unwrap();
        assert_eq!(load_progress(&store), None);
    }

    #[test]
    fn record_without_timestamp_still_loads() {
        let mut store = MemoryStore::new();
        store
            .set(
                PROGRESS_KEY,
                r#"{"currentModuleIdx":1,"currentStepIdx":0,"totalProfit":600,"claimedSteps":["1-1"]}"#,
            )
            .unwrap();
        let rec = load_progress(&store).unwrap();
        assert_eq!(rec.current_module_idx, 1);
        assert_eq!(rec.total_profit, 600.0);
        assert!(rec.saved_at.is_none());
    }

    #[test]
    fn corrupt_progress_reads_as_missing() {
        let mut store = MemoryStore::new();
        store.set(PROGRESS_KEY, "{not json").unwrap();
        assert_eq!(load_progress(&store), None);
        store.set(PROGRESS_KEY, r#"{"currentModuleIdx":-1}"#).unwrap();
        assert_eq!(load_progress(&store), None);
    }

    #[test]
    fn unavailable_store_falls_back_everywhere() {
        let mut store = MemoryStore::unavailable();
        assert_eq!(load_progress(&store), None);
        assert_eq!(load_variant(&store), ContentVariant::Default);
        assert!(!onboarding_complete(&store));
        assert!(save_progress(&mut store, &sample()).is_err());
    }

    #[test]
    fn variant_record() {
        let mut store = MemoryStore::new();
        assert_eq!(load_variant(&store), ContentVariant::Default);
        save_variant(&mut store, ContentVariant::Tech).unwrap();
        assert_eq!(load_variant(&store), ContentVariant::Tech);
        store.set(VARIANT_KEY, "crypto").unwrap();
        assert_eq!(load_variant(&store), ContentVariant::Default);
    }

    #[test]
    fn onboarding_flag_needs_exact_sentinel() {
        let mut store = MemoryStore::new();
        assert!(!onboarding_complete(&store));
        store.set(ONBOARDING_KEY, "yes").unwrap();
        assert!(!onboarding_complete(&store));
        mark_onboarding_complete(&mut store).unwrap();
        assert!(onboarding_complete(&store));
    }

    #[test]
    fn file_store_round_trip() {
        let dir = temp_dir("filestore");
        let mut store = FileStore::new(&dir);
        assert_eq!(store.get(VARIANT_KEY).unwrap(), None);
        save_variant(&mut store, ContentVariant::Tech).unwrap();
        save_progress(&mut store, &sample()).unwrap();

        let reopened = FileStore::new(&dir);
        assert_eq!(load_variant(&reopened), ContentVariant::Tech);
        assert_eq!(load_progress(&reopened), Some(sample()));

        store.remove(PROGRESS_KEY).unwrap();
        store.remove(PROGRESS_KEY).unwrap(); // already gone
        assert_eq!(load_progress(&store), None);
        let _ = fs::remove_dir_all(&dir);
    }
}
