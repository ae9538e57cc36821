use crate::domain::models::{Appearance, ColorMode, FocusMode, Mood, PomodoroState, ThemeName};
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    FocusMode,
    Blocklist,
    Pomodoro,
    Theme,
    Mode,
    Tasklist,
    Mood,
}

impl PreferenceKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FocusMode => "focusMode",
            Self::Blocklist => "blocklist",
            Self::Pomodoro => "pomodoro",
            Self::Theme => "theme",
            Self::Mode => "mode",
            Self::Tasklist => "tasklist",
            Self::Mood => "mood",
        }
    }
}

/// Whole-value key/value persistence. Writes replace the stored value; the
/// last writer wins.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: PreferenceKey) -> Result<Option<serde_json::Value>, InfraError>;
    fn set(&self, key: PreferenceKey, value: &serde_json::Value) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqlitePreferenceStore {
    db_path: PathBuf,
}

impl SqlitePreferenceStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, InfraError> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
        };
        store.connect()?.execute_batch(SCHEMA_SQL)?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get(&self, key: PreferenceKey) -> Result<Option<serde_json::Value>, InfraError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(InfraError::from))
            .transpose()
    }

    fn set(&self, key: PreferenceKey, value: &serde_json::Value) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO preferences (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key.as_str(), value.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    values: Mutex<HashMap<PreferenceKey, serde_json::Value>>,
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get(&self, key: PreferenceKey) -> Result<Option<serde_json::Value>, InfraError> {
        let values = self
            .values
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("preference: {error}")))?;
        Ok(values.get(&key).cloned())
    }

    fn set(&self, key: PreferenceKey, value: &serde_json::Value) -> Result<(), InfraError> {
        let mut values = self
            .values
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("preference: {error}")))?;
        values.insert(key, value.clone());
        Ok(())
    }
}

/// Every persisted preference, loaded in one pass at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionState {
    pub focus_mode: FocusMode,
    pub blocklist: Vec<String>,
    pub pomodoro: PomodoroState,
    pub appearance: Appearance,
    pub tasklist: Vec<String>,
    pub mood: Option<Mood>,
}

/// Typed access to the preference keys with their defaults.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPreferenceStore::default()))
    }

    fn load_or_default<T>(&self, key: PreferenceKey) -> Result<T, InfraError>
    where
        T: DeserializeOwned + Default,
    {
        let Some(value) = self.store.get(key)? else {
            return Ok(T::default());
        };
        if value.is_null() {
            return Ok(T::default());
        }
        match serde_json::from_value(value) {
            Ok(parsed) => Ok(parsed),
            Err(error) => {
                tracing::warn!(key = key.as_str(), %error, "ignoring unreadable preference");
                Ok(T::default())
            }
        }
    }

    fn save<T: Serialize>(&self, key: PreferenceKey, value: &T) -> Result<(), InfraError> {
        self.store.set(key, &serde_json::to_value(value)?)
    }

    pub fn load_focus_mode(&self) -> Result<FocusMode, InfraError> {
        self.load_or_default(PreferenceKey::FocusMode)
    }

    pub fn save_focus_mode(&self, mode: &FocusMode) -> Result<(), InfraError> {
        self.save(PreferenceKey::FocusMode, mode)
    }

    pub fn load_blocklist(&self) -> Result<Vec<String>, InfraError> {
        self.load_or_default(PreferenceKey::Blocklist)
    }

    pub fn save_blocklist(&self, blocklist: &[String]) -> Result<(), InfraError> {
        self.save(PreferenceKey::Blocklist, &blocklist)
    }

    pub fn load_pomodoro(&self) -> Result<PomodoroState, InfraError> {
        self.load_or_default(PreferenceKey::Pomodoro)
    }

    pub fn save_pomodoro(&self, state: &PomodoroState) -> Result<(), InfraError> {
        self.save(PreferenceKey::Pomodoro, state)
    }

    pub fn load_appearance(&self) -> Result<Appearance, InfraError> {
        Ok(Appearance {
            theme: self.load_or_default::<ThemeName>(PreferenceKey::Theme)?,
            mode: self.load_or_default::<ColorMode>(PreferenceKey::Mode)?,
        })
    }

    pub fn save_appearance(&self, appearance: Appearance) -> Result<(), InfraError> {
        self.save(PreferenceKey::Theme, &appearance.theme)?;
        self.save(PreferenceKey::Mode, &appearance.mode)
    }

    pub fn load_tasklist(&self) -> Result<Vec<String>, InfraError> {
        self.load_or_default(PreferenceKey::Tasklist)
    }

    pub fn save_tasklist(&self, tasklist: &[String]) -> Result<(), InfraError> {
        self.save(PreferenceKey::Tasklist, &tasklist)
    }

    pub fn load_mood(&self) -> Result<Option<Mood>, InfraError> {
        self.load_or_default(PreferenceKey::Mood)
    }

    pub fn save_mood(&self, mood: Mood) -> Result<(), InfraError> {
        self.save(PreferenceKey::Mood, &mood)
    }

    pub fn snapshot(&self) -> Result<ExtensionState, InfraError> {
        Ok(ExtensionState {
            focus_mode: self.load_focus_mode()?,
            blocklist: self.load_blocklist()?,
            pomodoro: self.load_pomodoro()?,
            appearance: self.load_appearance()?,
            tasklist: self.load_tasklist()?,
            mood: self.load_mood()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PomodoroPhase;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DB: AtomicUsize = AtomicUsize::new(0);

    struct TempDatabase {
        dir: PathBuf,
    }

    impl TempDatabase {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DB.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!(
                "clavi-preference-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&dir).expect("create temp dir");
            Self { dir }
        }

        fn path(&self) -> PathBuf {
            self.dir.join("prefs.sqlite")
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn empty_store_yields_defaults() {
        let prefs = Preferences::in_memory();
        let state = prefs.snapshot().expect("snapshot");
        assert_eq!(state, ExtensionState::default());
        assert_eq!(state.focus_mode, FocusMode::Deep);
        assert_eq!(state.pomodoro.time_left, 1500);
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let db = TempDatabase::new();
        {
            let prefs = Preferences::new(Arc::new(
                SqlitePreferenceStore::open(db.path()).expect("open store"),
            ));
            prefs
                .save_blocklist(&["youtube.com".to_string(), "reddit.com".to_string()])
                .expect("save blocklist");
            prefs
                .save_pomodoro(&PomodoroState {
                    running: true,
                    time_left: 99,
                    mode: PomodoroPhase::Break,
                })
                .expect("save pomodoro");
            prefs.save_mood(Mood::Tired).expect("save mood");
        }

        let reopened = Preferences::new(Arc::new(
            SqlitePreferenceStore::open(db.path()).expect("reopen store"),
        ));
        let state = reopened.snapshot().expect("snapshot");
        assert_eq!(state.blocklist, vec!["youtube.com", "reddit.com"]);
        assert_eq!(state.pomodoro.time_left, 99);
        assert!(state.pomodoro.running);
        assert_eq!(state.mood, Some(Mood::Tired));
    }

    #[test]
    fn stored_wire_values_use_extension_names() {
        let store = Arc::new(InMemoryPreferenceStore::default());
        let prefs = Preferences::new(store.clone());
        prefs
            .save_appearance(Appearance {
                theme: ThemeName::HighContrast,
                mode: ColorMode::Dark,
            })
            .expect("save appearance");

        assert_eq!(
            store.get(PreferenceKey::Theme).expect("read theme"),
            Some(serde_json::json!("high-contrast"))
        );
        assert_eq!(
            store.get(PreferenceKey::Mode).expect("read mode"),
            Some(serde_json::json!("dark"))
        );
    }

    #[test]
    fn garbled_value_falls_back_to_default() {
        let store = Arc::new(InMemoryPreferenceStore::default());
        store
            .set(PreferenceKey::Pomodoro, &serde_json::json!({"running": "yes"}))
            .expect("seed garbage");
        let prefs = Preferences::new(store);
        assert_eq!(prefs.load_pomodoro().expect("load"), PomodoroState::default());
    }

    #[test]
    fn poisoned_store_reports_lock_poisoned() {
        let store = Arc::new(InMemoryPreferenceStore::default());
        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.values.lock().expect("lock");
            panic!("poison the preference map");
        })
        .join();

        match store.get(PreferenceKey::FocusMode) {
            Err(InfraError::LockPoisoned(message)) => assert!(message.starts_with("preference")),
            other => panic!("expected poisoned lock, got {other:?}"),
        }
    }
}
