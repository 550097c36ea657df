//! Record types stored in the snapshot

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A car in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    /// Manufacturer (e.g., "Honda")
    pub make: String,
    /// Model name (e.g., "CRV")
    pub model: String,
    /// Model year
    pub year: i64,
    /// Exterior color
    pub color: String,
}

/// Sale status of a car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Car is ready for sale
    pub ready: bool,
    /// Car has been sold
    pub sold: bool,
    /// Asking or sale price
    pub price: f64,
}

/// Complete persisted state of both collections
///
/// Every key in `statuses` must also be a key in `cars`. Mutations that go
/// through [`crate::Inventory`] keep this true; a hand-edited file may not,
/// which [`Snapshot::orphaned_statuses`] reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Cars by identifier
    #[serde(default)]
    pub cars: BTreeMap<String, Car>,
    /// Statuses by car identifier
    #[serde(default)]
    pub statuses: BTreeMap<String, Status>,
}

impl Snapshot {
    /// Status keys that have no matching car
    pub fn orphaned_statuses(&self) -> Vec<&str> {
        self.statuses
            .keys()
            .filter(|id| !self.cars.contains_key(*id))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn honda() -> Car {
        Car {
            make: "Honda".into(),
            model: "CRV".into(),
            year: 2011,
            color: "black".into(),
        }
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let mut snapshot = Snapshot::default();
        snapshot.cars.insert("car0".into(), honda());
        snapshot.statuses.insert(
            "car0".into(),
            Status {
                ready: true,
                sold: false,
                price: 15000.0,
            },
        );

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            json!({
                "cars": {"car0": {"make": "Honda", "model": "CRV", "year": 2011, "color": "black"}},
                "statuses": {"car0": {"ready": true, "sold": false, "price": 15000.0}}
            })
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let value = serde_json::to_value(Snapshot::default()).unwrap();
        assert_eq!(value, json!({"cars": {}, "statuses": {}}));
    }

    #[test]
    fn test_snapshot_missing_collections_default_to_empty() {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "cars": {"car0": {"make": "Honda", "model": "CRV", "year": 2011, "color": "black"}}
        }))
        .unwrap();
        assert_eq!(snapshot.cars.len(), 1);
        assert!(snapshot.statuses.is_empty());

        let snapshot: Snapshot = serde_json::from_value(json!({})).unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn test_orphaned_statuses() {
        let mut snapshot = Snapshot::default();
        snapshot.cars.insert("car0".into(), honda());
        let status = Status {
            ready: false,
            sold: false,
            price: 1.0,
        };
        snapshot.statuses.insert("car0".into(), status.clone());
        snapshot.statuses.insert("car7".into(), status);

        assert_eq!(snapshot.orphaned_statuses(), vec!["car7"]);
    }
}
