// src/store.rs

use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::entity::{Beneficiary, ImportEntity, Visit};
use crate::error::{ImportError, ImportResult};

/// The collections the dashboard keeps locally.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub beneficiaries: Vec<Beneficiary>,
    #[serde(default)]
    pub visits: Vec<Visit>,
}

/// Local application state. Only whole batches are ever appended, so one
/// mutex around both collections is enough.
pub struct LocalStore {
    path: Option<PathBuf>,
    data: Mutex<StoreData>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(StoreData::default()),
        }
    }

    /// Open a JSON-backed store, loading the previous snapshot if there is one.
    pub fn open(path: impl Into<PathBuf>) -> ImportResult<Self> {
        let path = path.into();
        let data = if path.is_file() {
            let text = fs::read_to_string(&path).map_err(|source| ImportError::ReadFile {
                path: path.clone(),
                source: Arc::new(source),
            })?;
            serde_json::from_str(&text).map_err(|e| {
                ImportError::Store(format!("parsing {}: {}", path.display(), e))
            })?
        } else {
            StoreData::default()
        };

        info!(
            path = %path.display(),
            beneficiaries = data.beneficiaries.len(),
            visits = data.visits.len(),
            "opened local store"
        );
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a batch to the matching collection; returns the new total.
    pub fn append<E: ImportEntity>(&self, batch: Vec<E>) -> usize {
        let mut data = self.lock();
        let collection = E::collection_mut(&mut data);
        collection.extend(batch);
        debug!(entity = E::schema().label, total = collection.len(), "appended batch");
        collection.len()
    }

    pub fn all<E: ImportEntity>(&self) -> Vec<E> {
        E::collection(&self.lock()).clone()
    }

    pub fn count<E: ImportEntity>(&self) -> usize {
        E::collection(&self.lock()).len()
    }

    /// Write the snapshot through a temp file in the same directory, then
    /// rename over the target. No-op for in-memory stores.
    pub fn save(&self) -> ImportResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let store_err = |what: &str, e: &dyn std::fmt::Display| {
            ImportError::Store(format!("{} {}: {}", what, path.display(), e))
        };

        let json = {
            let data = self.lock();
            serde_json::to_vec_pretty(&*data).map_err(|e| store_err("serializing", &e))?
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| store_err("creating directory for", &e))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| store_err("creating temp file for", &e))?;
        tmp.write_all(&json)
            .map_err(|e| store_err("writing", &e))?;
        tmp.persist(path)
            .map_err(|e| store_err("renaming into", &e.error))?;

        debug!(path = %path.display(), bytes = json.len(), "saved local store");
        Ok(())
    }
}
