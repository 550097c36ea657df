//! Read-modify-write operations over the snapshot
//!
//! Each operation holds one process-wide lock from load to save, so two
//! requests in the same process can never interleave their read-modify-write
//! cycles. Separate processes sharing a data file are not coordinated.

use crate::error::{CarInfoError, Result};
use crate::model::{Car, Snapshot, Status};
use crate::store::{next_identifier, Store};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Car and status records behind a [`Store`]
pub struct Inventory {
    store: Arc<dyn Store>,
    lock: Mutex<()>,
}

impl Inventory {
    /// Create an inventory over `store`
    pub fn new(store: Arc<dyn Store>) -> Self {
        Inventory {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Load the snapshot under the lock
    pub fn snapshot(&self) -> Result<Snapshot> {
        let _guard = self.lock.lock();
        self.store.load()
    }

    /// All cars by identifier
    pub fn list_cars(&self) -> Result<BTreeMap<String, Car>> {
        Ok(self.snapshot()?.cars)
    }

    /// A single car, or `None` if it does not exist
    pub fn get_car(&self, id: &str) -> Result<Option<Car>> {
        Ok(self.snapshot()?.cars.remove(id))
    }

    /// Store `car` under the next unused identifier and return that identifier
    pub fn create_car(&self, car: Car) -> Result<String> {
        let _guard = self.lock.lock();
        let mut snapshot = self.store.load()?;

        let id = next_identifier(&snapshot.cars);
        snapshot.cars.insert(id.clone(), car);
        self.store.save(&snapshot)?;

        info!(car_id = %id, "car created");
        Ok(id)
    }

    /// Insert or replace the car at `id`. Returns `true` if it already existed.
    pub fn upsert_car(&self, id: &str, car: Car) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut snapshot = self.store.load()?;

        let existed = snapshot.cars.insert(id.to_string(), car).is_some();
        self.store.save(&snapshot)?;

        info!(car_id = %id, existed, "car stored");
        Ok(existed)
    }

    /// Remove the car at `id` and its status, if any. Removing an unknown car is not an error.
    pub fn delete_car(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut snapshot = self.store.load()?;

        if snapshot.cars.remove(id).is_some() {
            self.store.save(&snapshot)?;
            info!(car_id = %id, "car deleted");
        }

        if snapshot.statuses.remove(id).is_some() {
            self.store.save(&snapshot)?;
            debug!(car_id = %id, "status removed with car");
        }

        Ok(())
    }

    /// Status of the car at `id`
    ///
    /// Distinguishes an unknown car ([`CarInfoError::CarNotFound`]) from a
    /// known car without a status ([`CarInfoError::StatusNotFound`]).
    pub fn get_status(&self, id: &str) -> Result<Status> {
        let mut snapshot = self.snapshot()?;

        if !snapshot.cars.contains_key(id) {
            return Err(CarInfoError::CarNotFound(id.to_string()));
        }
        snapshot
            .statuses
            .remove(id)
            .ok_or_else(|| CarInfoError::StatusNotFound(id.to_string()))
    }

    /// Insert or replace the status of the car at `id`. Returns `true` if a
    /// status already existed. Fails if the car does not exist.
    pub fn upsert_status(&self, id: &str, status: Status) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut snapshot = self.store.load()?;

        if !snapshot.cars.contains_key(id) {
            return Err(CarInfoError::CarNotFound(id.to_string()));
        }

        let existed = snapshot.statuses.insert(id.to_string(), status).is_some();
        self.store.save(&snapshot)?;

        info!(car_id = %id, existed, "status stored");
        Ok(existed)
    }
}
