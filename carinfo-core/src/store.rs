//! Snapshot persistence
//!
//! The whole database is one [`Snapshot`]. Every operation loads it, every
//! mutation saves all of it back. There is no cache; the persisted snapshot is
//! the only source of truth.

use crate::error::{CarInfoError, Result};
use crate::model::{Car, Snapshot};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Backing storage for the snapshot
pub trait Store: Send + Sync {
    /// Load the full snapshot, or an empty one if nothing has been saved yet
    fn load(&self) -> Result<Snapshot>;

    /// Replace the persisted snapshot. Returns only once the write is durable.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Snapshot stored as a single JSON file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, source: std::io::Error) -> CarInfoError {
        CarInfoError::Storage {
            path: self.path.clone(),
            source,
        }
    }

    /// Flush the directory entry so the rename itself is durable
    #[cfg(unix)]
    fn sync_parent(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| self.storage_error(e))
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> Result<()> {
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Store for FileStore {
    fn load(&self) -> Result<Snapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "no snapshot on disk, starting empty");
                return Ok(Snapshot::default());
            }
            Err(e) => return Err(self.storage_error(e)),
        };

        serde_json::from_slice(&bytes).map_err(|source| CarInfoError::CorruptSnapshot {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
        }

        let bytes = serde_json::to_vec(snapshot).map_err(|source| CarInfoError::CorruptSnapshot {
            path: self.path.clone(),
            source,
        })?;

        // Write beside the target and rename over it, so readers only ever
        // see a complete snapshot.
        let tmp = self.temp_path();
        let mut file = File::create(&tmp).map_err(|e| self.storage_error(e))?;
        file.write_all(&bytes).map_err(|e| self.storage_error(e))?;
        file.sync_all().map_err(|e| self.storage_error(e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| self.storage_error(e))?;
        self.sync_parent()?;

        debug!(
            path = %self.path.display(),
            cars = snapshot.cars.len(),
            statuses = snapshot.statuses.len(),
            "snapshot saved"
        );
        Ok(())
    }
}

/// Snapshot held in process memory; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.snapshot.lock().clone().unwrap_or_default())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

/// Smallest unused identifier of the form `car<N>`, scanning up from `car0`
///
/// Linear in the number of cars, which is fine at the scale this serves.
pub fn next_identifier(cars: &BTreeMap<String, Car>) -> String {
    let mut n: u64 = 0;
    loop {
        let id = format!("car{}", n);
        if !cars.contains_key(&id) {
            return id;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use tempfile::TempDir;

    fn car(make: &str) -> Car {
        Car {
            make: make.into(),
            model: "Model".into(),
            year: 2000,
            color: "red".into(),
        }
    }

    fn cars(ids: &[&str]) -> BTreeMap<String, Car> {
        ids.iter().map(|id| (id.to_string(), car(id))).collect()
    }

    #[test]
    fn test_next_identifier_empty() {
        assert_eq!(next_identifier(&BTreeMap::new()), "car0");
    }

    #[test]
    fn test_next_identifier_contiguous() {
        assert_eq!(next_identifier(&cars(&["car0", "car1", "car2"])), "car3");
    }

    #[test]
    fn test_next_identifier_reuses_smallest_gap() {
        assert_eq!(next_identifier(&cars(&["car1"])), "car0");
        assert_eq!(next_identifier(&cars(&["car0", "car2", "car5"])), "car1");
    }

    #[test]
    fn test_next_identifier_ignores_foreign_keys() {
        assert_eq!(next_identifier(&cars(&["car00", "truck0"])), "car0");
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("data.json"));

        assert_eq!(store.load().unwrap(), Snapshot::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("data.json"));

        let mut snapshot = Snapshot::default();
        snapshot.cars.insert("car0".into(), car("Honda"));
        snapshot.statuses.insert(
            "car0".into(),
            Status {
                ready: true,
                sold: false,
                price: 15000.5,
            },
        );
        store.save(&snapshot).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, snapshot);

        store.save(&loaded).unwrap();
        assert_eq!(store.load().unwrap(), snapshot);
        assert!(!dir.path().join("nested").join("data.json.tmp").exists());
    }

    #[test]
    fn test_file_store_save_replaces_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let store = FileStore::new(&path);

        let mut snapshot = Snapshot::default();
        store.save(&snapshot).unwrap();
        snapshot.cars.insert("car0".to_string(), car("Honda"));
        store.save(&snapshot).unwrap();

        assert_eq!(store.load().unwrap(), snapshot);
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("data.json")]);
    }

    #[test]
    fn test_file_store_survives_new_handle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");

        let mut snapshot = Snapshot::default();
        snapshot.cars.insert("car4".into(), car("Ford"));
        FileStore::new(&path).save(&snapshot).unwrap();

        assert_eq!(FileStore::new(&path).load().unwrap(), snapshot);
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, b"{not json").unwrap();

        let err = FileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, CarInfoError::CorruptSnapshot { .. }));
        assert!(err.is_storage());
    }

    #[test]
    fn test_file_store_unreadable_path() {
        let dir = TempDir::new().unwrap();
        // a directory cannot be read as a file
        let err = FileStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, CarInfoError::Storage { .. }));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), Snapshot::default());

        let mut snapshot = Snapshot::default();
        snapshot.cars.insert("car0".into(), car("Honda"));
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), snapshot);
    }
}
