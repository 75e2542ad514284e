//! Snapshot persistence over a [`KeyValueStore`].
//!
//! Snapshots are plain JSON. Loading validates the raw JSON shape before any
//! typed decode, overlays the persisted state on the defaults, and always
//! re-derives the multiplier and features. A snapshot that fails validation
//! is discarded as a whole; the loader then tries the backup and finally
//! falls back to a fresh game.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

use crate::KeyValueStore;
use crate::constants::{BACKUP_SUFFIX, SAVE_KEY, SAVE_VERSION, SAVED_HISTORY_LEN, STATISTICS_SUFFIX};
use crate::history::{HistoryEntry, RollHistory};
use crate::layers::{self, LayerCatalog};
use crate::model::ProgressionModel;
use crate::state::ProgressionState;
use crate::upgrades::UpgradeId;

/// Numeric state fields a snapshot must carry.
const REQUIRED_NUMBERS: [&str; 4] = ["points", "current_layer_index", "multiplier", "total_rolls"];

/// State fields rebuilt from the layer index and upgrades on load.
const DERIVED_FIELDS: [&str; 2] = ["multiplier", "unlocked_features"];

/// State fields that may never be negative.
const AMOUNT_FIELDS: [&str; 11] = [
    "points",
    "total_points_earned",
    "total_rolls",
    "critical_hit_count",
    "rebirth_count",
    "combo",
    "streak",
    "best_roll",
    "multiplier",
    "prestige_level",
    "prestige_points",
];

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage failure for {key}: {message}")]
    Storage { key: String, message: String },
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

/// Long-running counters kept next to the save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveStatistics {
    pub total_play_time_ms: u64,
    pub sessions_played: u32,
    pub highest_layer: usize,
    pub total_points_earned: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSnapshot {
    pub version: String,
    pub timestamp: u64,
    pub state: ProgressionState,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub statistics: SaveStatistics,
}

impl SaveSnapshot {
    #[must_use]
    pub fn capture(model: &ProgressionModel, statistics: &SaveStatistics, now_ms: u64) -> Self {
        Self {
            version: SAVE_VERSION.to_string(),
            timestamp: now_ms,
            state: model.state().clone(),
            history: model.history().newest(SAVED_HISTORY_LEN),
            statistics: statistics.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    /// Writes the main and backup slots.
    Manual,
    /// Writes the main slot only.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    Main,
    Backup,
    Defaults,
}

#[derive(Debug, Clone)]
pub struct LoadedGame {
    pub model: ProgressionModel,
    pub source: LoadSource,
    pub timestamp: Option<u64>,
}

/// Presence and size of each slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveInfo {
    pub main_bytes: Option<usize>,
    pub backup_bytes: Option<usize>,
    pub statistics_bytes: Option<usize>,
    pub timestamp: Option<u64>,
    pub version: Option<String>,
}

impl SaveInfo {
    #[must_use]
    pub const fn has_save(&self) -> bool {
        self.main_bytes.is_some()
    }

    #[must_use]
    pub const fn has_backup(&self) -> bool {
        self.backup_bytes.is_some()
    }
}

/// Reads and writes snapshots under a fixed key family.
#[derive(Debug, Clone)]
pub struct SaveManager<S: KeyValueStore> {
    store: S,
    key: String,
    statistics: SaveStatistics,
    last_save_ms: Option<u64>,
}

impl<S: KeyValueStore> SaveManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, SAVE_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            statistics: SaveStatistics::default(),
            last_save_ms: None,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn statistics(&self) -> &SaveStatistics {
        &self.statistics
    }

    #[must_use]
    pub fn main_key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn backup_key(&self) -> String {
        format!("{}{BACKUP_SUFFIX}", self.key)
    }

    #[must_use]
    pub fn statistics_key(&self) -> String {
        format!("{}{STATISTICS_SUFFIX}", self.key)
    }

    /// Persist `model`. Returns the snapshot size in bytes.
    ///
    /// # Errors
    ///
    /// Returns a storage error when any slot write fails, or a serialization
    /// error if the snapshot cannot be encoded.
    pub fn save(&mut self, model: &ProgressionModel, kind: SaveKind, now_ms: u64) -> Result<usize, PersistenceError> {
        self.touch_statistics(model, now_ms);
        let snapshot = SaveSnapshot::capture(model, &self.statistics, now_ms);
        let text = serde_json::to_string(&snapshot)?;
        self.write(&self.key, &text)?;
        if kind == SaveKind::Manual {
            self.write(&self.backup_key(), &text)?;
        }
        let stats = serde_json::to_string(&self.statistics)?;
        self.write(&self.statistics_key(), &stats)?;
        log::debug!("{kind:?} save wrote {} bytes", text.len());
        Ok(text.len())
    }

    /// Load the main slot, then the backup, then defaults.
    ///
    /// Never fails: unreadable or invalid slots are logged and skipped.
    pub fn load(&mut self, now_ms: u64) -> LoadedGame {
        self.statistics = self.read_statistics();
        self.statistics.sessions_played = self.statistics.sessions_played.saturating_add(1);
        self.last_save_ms = Some(now_ms);

        for (key, source) in [
            (self.key.clone(), LoadSource::Main),
            (self.backup_key(), LoadSource::Backup),
        ] {
            let text = match self.store.get(&key) {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("could not read {key}: {err}");
                    continue;
                }
            };
            match decode_snapshot(&text, layers::catalog()) {
                Ok((model, timestamp)) => {
                    log::debug!("loaded game from {source:?} slot");
                    return LoadedGame {
                        model,
                        source,
                        timestamp: Some(timestamp),
                    };
                }
                Err(err) => log::warn!("discarding {source:?} snapshot: {err}"),
            }
        }
        log::debug!("no usable snapshot, starting fresh");
        LoadedGame {
            model: ProgressionModel::new(),
            source: LoadSource::Defaults,
            timestamp: None,
        }
    }

    /// Pretty JSON snapshot for manual backup.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn export_text(&self, model: &ProgressionModel, now_ms: u64) -> Result<String, PersistenceError> {
        let snapshot = SaveSnapshot::capture(model, &self.statistics, now_ms);
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Validate and decode exported text into a model.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::CorruptSnapshot`] or a serialization error
    /// when the text is not a valid snapshot.
    pub fn import_text(&self, text: &str) -> Result<ProgressionModel, PersistenceError> {
        decode_snapshot(text, layers::catalog()).map(|(model, _)| model)
    }

    /// Remove every slot.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any removal fails.
    pub fn clear_all(&mut self) -> Result<(), PersistenceError> {
        for key in [self.key.clone(), self.backup_key(), self.statistics_key()] {
            self.store.remove(&key).map_err(|err| PersistenceError::Storage {
                key: key.clone(),
                message: err.to_string(),
            })?;
        }
        self.statistics = SaveStatistics::default();
        self.last_save_ms = None;
        Ok(())
    }

    /// Describe what is currently stored.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a slot cannot be read.
    pub fn save_info(&self) -> Result<SaveInfo, PersistenceError> {
        let main = self.read(&self.key)?;
        let header = main
            .as_deref()
            .and_then(|text| serde_json::from_str::<Value>(text).ok());
        Ok(SaveInfo {
            main_bytes: main.as_ref().map(String::len),
            backup_bytes: self.read(&self.backup_key())?.as_ref().map(String::len),
            statistics_bytes: self.read(&self.statistics_key())?.as_ref().map(String::len),
            timestamp: header.as_ref().and_then(|v| v.get("timestamp")).and_then(Value::as_u64),
            version: header
                .as_ref()
                .and_then(|v| v.get("version"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn touch_statistics(&mut self, model: &ProgressionModel, now_ms: u64) {
        if let Some(last) = self.last_save_ms {
            self.statistics.total_play_time_ms = self
                .statistics
                .total_play_time_ms
                .saturating_add(now_ms.saturating_sub(last));
        }
        self.last_save_ms = Some(now_ms);
        let state = model.state();
        self.statistics.highest_layer = self.statistics.highest_layer.max(state.current_layer_index);
        self.statistics.total_points_earned = state.total_points_earned;
    }

    fn read_statistics(&self) -> SaveStatistics {
        match self.read(&self.statistics_key()) {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|err| {
                log::warn!("ignoring unreadable statistics: {err}");
                SaveStatistics::default()
            }),
            Ok(None) => SaveStatistics::default(),
            Err(err) => {
                log::warn!("{err}");
                SaveStatistics::default()
            }
        }
    }

    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.store.get(key).map_err(|err| PersistenceError::Storage {
            key: key.to_string(),
            message: err.to_string(),
        })
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.store.set(key, value).map_err(|err| PersistenceError::Storage {
            key: key.to_string(),
            message: err.to_string(),
        })
    }
}

/// Check the raw snapshot shape before any typed decode.
///
/// # Errors
///
/// Returns [`PersistenceError::CorruptSnapshot`] describing the first problem.
pub fn validate_snapshot(value: &Value, layers: &LayerCatalog) -> Result<(), PersistenceError> {
    let corrupt = |message: String| Err(PersistenceError::CorruptSnapshot(message));
    let Some(root) = value.as_object() else {
        return corrupt("snapshot is not an object".to_string());
    };
    if !root.get("version").is_some_and(Value::is_string) {
        return corrupt("missing version".to_string());
    }
    let Some(state) = root.get("state").and_then(Value::as_object) else {
        return corrupt("missing state".to_string());
    };
    for field in REQUIRED_NUMBERS {
        if !state.get(field).is_some_and(Value::is_number) {
            return corrupt(format!("{field} is missing or not a number"));
        }
    }
    for field in AMOUNT_FIELDS {
        if let Some(number) = state.get(field).and_then(Value::as_f64)
            && number < 0.0
        {
            return corrupt(format!("{field} is negative"));
        }
    }
    let layer = state.get("current_layer_index").and_then(Value::as_u64);
    match layer {
        Some(index) if usize::try_from(index).is_ok_and(|index| index <= layers.max_index()) => {}
        _ => {
            return corrupt(format!(
                "current_layer_index {} is outside 0..={}",
                state.get("current_layer_index").unwrap_or(&Value::Null),
                layers.max_index()
            ));
        }
    }
    if let Some(upgrades) = state.get("upgrades").and_then(Value::as_object)
        && upgrades.values().any(|level| level.as_f64().is_some_and(|level| level < 0.0))
    {
        return corrupt("negative upgrade level".to_string());
    }
    Ok(())
}

/// Overlay persisted state keys on the defaults, dropping unknown upgrades
/// and the derived fields.
///
/// # Errors
///
/// Returns a serialization error if the merged object does not decode.
pub fn merge_state(persisted: &Map<String, Value>) -> Result<ProgressionState, PersistenceError> {
    let mut merged = serde_json::to_value(ProgressionState::default())?;
    let Some(target) = merged.as_object_mut() else {
        return Err(PersistenceError::CorruptSnapshot("default state is not an object".to_string()));
    };
    for (key, value) in persisted {
        if !target.contains_key(key) || DERIVED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let value = if key == "upgrades" {
            known_upgrades(value)
        } else {
            value.clone()
        };
        target.insert(key.clone(), value);
    }
    Ok(serde_json::from_value(merged)?)
}

fn known_upgrades(value: &Value) -> Value {
    let Some(levels) = value.as_object() else {
        log::warn!("ignoring malformed upgrade table");
        return Value::Object(Map::new());
    };
    let known = levels
        .iter()
        .filter(|(id, _)| {
            let known = id.parse::<UpgradeId>().is_ok();
            if !known {
                log::warn!("dropping unknown upgrade id {id}");
            }
            known
        })
        .map(|(id, level)| (id.clone(), level.clone()))
        .collect();
    Value::Object(known)
}

fn decode_snapshot(text: &str, layers: &LayerCatalog) -> Result<(ProgressionModel, u64), PersistenceError> {
    let value: Value = serde_json::from_str(text)?;
    validate_snapshot(&value, layers)?;
    let persisted = value
        .get("state")
        .and_then(Value::as_object)
        .ok_or_else(|| PersistenceError::CorruptSnapshot("missing state".to_string()))?;
    let state = merge_state(persisted)?;
    let history = value
        .get("history")
        .cloned()
        .map(serde_json::from_value::<Vec<HistoryEntry>>)
        .transpose()
        .unwrap_or_else(|err| {
            log::warn!("dropping unreadable roll history: {err}");
            None
        })
        .unwrap_or_default();
    let timestamp = value.get("timestamp").and_then(Value::as_u64).unwrap_or(0);
    Ok((
        ProgressionModel::with_history(state, RollHistory::from_newest(history)),
        timestamp,
    ))
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("memory store rejected write to {0}")]
pub struct MemoryStoreError(pub String);

/// In-process store shared by clones, with switchable write failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
    fail_writes: Rc<Cell<bool>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail, as a full or unavailable store would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = MemoryStoreError;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.raw(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        if self.fail_writes.get() {
            return Err(MemoryStoreError(key.to_string()));
        }
        self.insert_raw(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
