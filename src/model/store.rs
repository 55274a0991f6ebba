//! Persistence of trained model state, keyed by model name and user.

use super::{GazeModel, ModelFactory};
use crate::{filters::PointFilter, Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

/// Minimal key-value store holding serialized model state
pub trait ModelStore: Send {
    /// Value under `key`, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn put(&mut self, key: &str, value: &str) -> Result<()>;

    /// Drop the value under `key`; missing keys are not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Storage key for `model` trained by `user`
#[must_use]
pub fn model_key(model: &str, user: &str) -> String {
    format!("{model}/{user}")
}

/// What actually gets written under a model key
#[derive(Debug, Serialize, Deserialize)]
struct PersistedModel {
    model: String,
    user: String,
    saved_at: u64,
    state: String,
}

/// Persist the fitted state of `model` for `user`
///
/// # Errors
///
/// Returns an error if the model cannot export its state or the store fails
pub fn persist(model: &dyn GazeModel, store: &mut dyn ModelStore, user: &str) -> Result<()> {
    let envelope = PersistedModel {
        model: model.name().to_string(),
        user: user.to_string(),
        saved_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
        state: model.save_state()?,
    };
    let key = model_key(model.name(), user);
    store.put(&key, &serde_json::to_string(&envelope)?)?;
    log::info!("Persisted model state under '{key}'");
    Ok(())
}

/// Rebuild the model persisted for `user`, or `None` if nothing was stored
///
/// # Errors
///
/// Returns an error if the stored state is unreadable or belongs to another
/// model or user
pub fn load(
    name: &str,
    factory: &ModelFactory,
    filter: Box<dyn PointFilter>,
    store: &dyn ModelStore,
    user: &str,
) -> Result<Option<Box<dyn GazeModel>>> {
    let key = model_key(name, user);
    let Some(raw) = store.get(&key)? else {
        log::debug!("No persisted state under '{key}'");
        return Ok(None);
    };

    let envelope: PersistedModel = serde_json::from_str(&raw)?;
    if envelope.model != name {
        return Err(Error::PersistenceError(format!(
            "State under '{key}' belongs to model '{}'",
            envelope.model
        )));
    }
    if envelope.user != user {
        return Err(Error::PersistenceError(format!(
            "State under '{key}' belongs to user '{}'",
            envelope.user
        )));
    }

    let mut model = factory(filter);
    model.load_state(&envelope.state)?;
    log::info!("Loaded model state under '{key}' (saved at {})", envelope.saved_at);
    Ok(Some(model))
}

/// In-process store, mainly for tests and ephemeral sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryModelStore {
    entries: HashMap<String, String>,
}

impl MemoryModelStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ModelStore for MemoryModelStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    /// Store rooted at `dir`, created if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::IoError(format!("Failed to create model store {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// File for `key`. ASCII letters, digits and `-` are kept; every other
    /// byte becomes `_xx` (lowercase hex), so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut file = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                file.push(char::from(byte));
            } else {
                file.push_str(&format!("_{byte:02x}"));
            }
        }
        file.push_str(".json");
        self.dir.join(file)
    }
}

impl ModelStore for FileModelStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::IoError(format!("Failed to read {}: {e}", path.display()))),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        std::fs::write(&path, value).map_err(|e| Error::IoError(format!("Failed to write {}: {e}", path.display())))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
