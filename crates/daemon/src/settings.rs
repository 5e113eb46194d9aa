use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::errors::SettingsError;

const CHANGE_BUFFER: usize = 32;

/// Scalar key-value settings, optionally persisted as a JSON object on disk.
/// Every successful write is announced to subscribers by key.
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: Mutex<Map<String, Value>>,
    changed: broadcast::Sender<String>,
}

impl SettingsStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::with_values(None, Map::new())
    }

    /// Open (or lazily create) a store backed by `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("loaded {} settings from {}", values.len(), path.display());
        Ok(Self::with_values(Some(path), values))
    }

    fn with_values(path: Option<PathBuf>, values: Map<String, Value>) -> Self {
        let (changed, _) = broadcast::channel(CHANGE_BUFFER);
        Self { path, values: Mutex::new(values), changed }
    }

    /// Receive the key of every setting written from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changed.subscribe()
    }

    pub fn get_double(&self, key: &str) -> Result<Option<f64>, SettingsError> {
        self.get_with(key, "double", Value::as_f64)
    }

    pub fn set_double(&self, key: &str, value: f64) -> Result<(), SettingsError> {
        let number = serde_json::Number::from_f64(value)
            .ok_or_else(|| SettingsError::WrongType { key: key.to_string(), expected: "finite double" })?;
        self.set(key, Value::Number(number))
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i32>, SettingsError> {
        self.get_with(key, "int", |v| v.as_i64().and_then(|n| i32::try_from(n).ok()))
    }

    pub fn set_int(&self, key: &str, value: i32) -> Result<(), SettingsError> {
        self.set(key, Value::from(value))
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, SettingsError> {
        self.get_with(key, "string", |v| v.as_str().map(str::to_string))
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.set(key, Value::from(value))
    }

    fn get_with<T>(
        &self,
        key: &str,
        expected: &'static str,
        convert: impl Fn(&Value) -> Option<T>,
    ) -> Result<Option<T>, SettingsError> {
        let values = self.values.lock().map_err(|_| SettingsError::Poisoned)?;
        match values.get(key) {
            None => Ok(None),
            Some(v) => convert(v)
                .map(Some)
                .ok_or_else(|| SettingsError::WrongType { key: key.to_string(), expected }),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut values = self.values.lock().map_err(|_| SettingsError::Poisoned)?;
        let previous = values.insert(key.to_string(), value);
        if let Some(path) = &self.path {
            if let Err(e) = persist(path, &values) {
                // keep memory and disk in agreement
                match previous {
                    Some(v) => values.insert(key.to_string(), v),
                    None => values.remove(key),
                };
                return Err(e);
            }
        }
        // nobody listening is fine
        let _ = self.changed.send(key.to_string());
        Ok(())
    }
}

/// Write to a sibling temp file and rename it over the target so readers never see a torn file.
fn persist(path: &Path, values: &Map<String, Value>) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
