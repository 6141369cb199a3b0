//! Persistent store: device-local key/value text storage and the typed
//! progress state kept in it.
//!
//! Each key is one text file under the data directory. Structured values are
//! serialized as JSON; the learner name is stored as plain text.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use crate::badges::UnlockedBadges;
use crate::domain::{HistoryLog, Progress};

pub const KEY_NAME: &str = "studentName";
pub const KEY_POINTS: &str = "studentPoints";
pub const KEY_STREAK: &str = "studentStreak";
pub const KEY_HISTORY: &str = "studentHistory";
pub const KEY_BADGES: &str = "unlockedBadges";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("storage I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("stored value is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("stored state is inconsistent: {0}")]
  Inconsistent(String),
}

/// Plain text key/value storage.
pub trait KvStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
  fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
  fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One file per key inside `dir`.
pub struct FileStore {
  dir: PathBuf,
}

impl FileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let dir = dir.into();
    fs::create_dir_all(&dir)?;
    Ok(Self { dir })
  }

  fn path(&self, key: &str) -> PathBuf {
    self.dir.join(key)
  }
}

impl KvStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(self.path(key)) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    // Readers see either the old or the new value, never a partial one.
    let tmp = self.dir.join(format!(".{key}.tmp"));
    fs::write(&tmp, value)?;
    fs::rename(&tmp, self.path(key))?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    match fs::remove_file(self.path(key)) {
      Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
      _ => Ok(()),
    }
  }
}

/// In-memory store used by tests. `fail_writes` simulates an unavailable or full disk.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
  pub map: std::sync::Mutex<std::collections::HashMap<String, String>>,
  pub fail_writes: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl KvStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    Ok(self.map.lock().unwrap().get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
      return Err(std::io::Error::new(ErrorKind::Other, "quota exceeded").into());
    }
    self.map.lock().unwrap().insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    self.map.lock().unwrap().remove(key);
    Ok(())
  }
}

/// Everything persisted between sessions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PersistedState {
  pub name: Option<String>,
  pub progress: Progress,
  pub history: HistoryLog,
  pub unlocked: UnlockedBadges,
}

/// Typed access to the persisted keys. The only reader/writer of the durable form.
pub struct ProgressStore<S> {
  kv: S,
}

impl<S: KvStore> ProgressStore<S> {
  pub fn new(kv: S) -> Self {
    Self { kv }
  }

  /// Load all state. Corrupt or unreadable state resets everything to defaults.
  #[instrument(level = "info", skip(self))]
  pub fn load(&self) -> PersistedState {
    match self.try_load() {
      Ok(state) => {
        debug!(target: "store", has_name = state.name.is_some(), points = state.progress.points, streak = state.progress.streak, badges = state.unlocked.len(), "Loaded persisted state");
        state
      }
      Err(e) => {
        warn!(target: "store", error = %e, "Persisted state unreadable; starting fresh");
        PersistedState::default()
      }
    }
  }

  fn try_load(&self) -> Result<PersistedState, StoreError> {
    let name = self.kv.get(KEY_NAME)?.filter(|n| !n.trim().is_empty());
    let points = self.read_json::<u32>(KEY_POINTS)?.unwrap_or_default();
    let streak = self.read_json::<u32>(KEY_STREAK)?.unwrap_or_default();
    let history = self.read_json::<HistoryLog>(KEY_HISTORY)?.unwrap_or_default();
    let misfiled = history.misfiled();
    if misfiled > 0 {
      return Err(StoreError::Inconsistent(format!("{misfiled} history entries filed under the wrong category")));
    }
    let ids = self.read_json::<Vec<String>>(KEY_BADGES)?.unwrap_or_default();
    let (unlocked, dropped) = UnlockedBadges::from_ids(ids);
    if dropped > 0 {
      warn!(target: "store", dropped, "Ignoring unknown or duplicate badge ids");
    }
    Ok(PersistedState { name, progress: Progress { points, streak }, history, unlocked })
  }

  fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
    match self.kv.get(key)? {
      Some(s) => Ok(Some(serde_json::from_str(&s)?)),
      None => Ok(None),
    }
  }

  fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
    self.kv.set(key, &serde_json::to_string(value)?)
  }

  pub fn save_name(&self, name: Option<&str>) -> Result<(), StoreError> {
    match name {
      Some(n) => self.kv.set(KEY_NAME, n),
      None => self.kv.remove(KEY_NAME),
    }
  }

  pub fn save_progress(&self, progress: &Progress) -> Result<(), StoreError> {
    self.write_json(KEY_POINTS, &progress.points)?;
    self.write_json(KEY_STREAK, &progress.streak)
  }

  pub fn save_history(&self, history: &HistoryLog) -> Result<(), StoreError> {
    self.write_json(KEY_HISTORY, history)
  }

  pub fn save_unlocked(&self, unlocked: &UnlockedBadges) -> Result<(), StoreError> {
    self.write_json(KEY_BADGES, unlocked)
  }

  #[cfg(test)]
  pub fn kv(&self) -> &S {
    &self.kv
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::badges::find;
  use crate::domain::{DictationExercise, HistoryEntry};
  use crate::progress::append_history_entry;

  fn dictation_entry() -> HistoryEntry {
    HistoryEntry::Dictation {
      exercise: DictationExercise { word: "شجرة".into(), example_sentence: "الشجرة عالية.".into() },
      written_answer: "شجره".into(),
    }
  }

  #[test]
  fn round_trips_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProgressStore::new(FileStore::new(dir.path()).unwrap());

    let mut unlocked = UnlockedBadges::default();
    unlocked.insert(find("first_correct").unwrap());
    let history = append_history_entry(HistoryLog::default(), dictation_entry());

    store.save_name(Some("مريم")).unwrap();
    store.save_progress(&Progress { points: 30, streak: 2 }).unwrap();
    store.save_history(&history).unwrap();
    store.save_unlocked(&unlocked).unwrap();

    let reopened = ProgressStore::new(FileStore::new(dir.path()).unwrap());
    let state = reopened.load();
    assert_eq!(state.name.as_deref(), Some("مريم"));
    assert_eq!(state.progress, Progress { points: 30, streak: 2 });
    assert_eq!(state.history, history);
    assert_eq!(state.unlocked, unlocked);
  }

  #[test]
  fn name_is_plain_text_and_removable() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProgressStore::new(FileStore::new(dir.path()).unwrap());
    store.save_name(Some("Ali")).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join(KEY_NAME)).unwrap(), "Ali");

    store.save_name(None).unwrap();
    store.save_name(None).unwrap();
    assert_eq!(store.load().name, None);
  }

  #[test]
  fn missing_keys_load_as_fresh_profile() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProgressStore::new(FileStore::new(dir.path()).unwrap());
    assert_eq!(store.load(), PersistedState::default());
  }

  #[test]
  fn corrupt_value_resets_everything() {
    let store = ProgressStore::new(MemoryStore::default());
    store.save_name(Some("Sara")).unwrap();
    store.save_progress(&Progress { points: 50, streak: 5 }).unwrap();
    store.kv().set(KEY_HISTORY, "{not json").unwrap();

    assert_eq!(store.load(), PersistedState::default());
  }

  #[test]
  fn misfiled_history_is_treated_as_corrupt() {
    let store = ProgressStore::new(MemoryStore::default());
    let mut history = HistoryLog::default();
    history.fill_in_blank.push(dictation_entry());
    store.save_history(&history).unwrap();
    store.save_progress(&Progress { points: 10, streak: 1 }).unwrap();

    assert_eq!(store.load(), PersistedState::default());
  }

  #[test]
  fn unknown_badge_ids_are_dropped_on_load() {
    let store = ProgressStore::new(MemoryStore::default());
    store.kv().set(KEY_BADGES, r#"["streak_5","legacy_badge"]"#).unwrap();
    let state = store.load();
    assert_eq!(state.unlocked.ids(), &["streak_5".to_string()]);
  }
}
