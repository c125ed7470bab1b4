use std::collections::HashSet;

use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{Entity, ValidationError, Validator};

/// A store location. Exists only inside its route's `stores` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub address: String,
}

impl Store {
    /// Builds a store with a fresh `store-{millis}-{random}` id.
    pub fn with_generated_id(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: generate_store_id(),
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Store payload without an id, as entered on a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct NewStore {
    pub name: String,
    pub address: String,
}

impl NewStore {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        v.required("name", &self.name, "Store name is required");
        v.required("address", &self.address, "Store address is required");
        v.finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct UpdateStore {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl UpdateStore {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        if let Some(name) = &self.name {
            v.required("name", name, "Store name is required");
        }
        if let Some(address) = &self.address {
            v.required("address", address, "Store address is required");
        }
        v.finish()
    }

    pub fn apply(&self, store: &mut Store) {
        if let Some(name) = &self.name {
            store.name = name.clone();
        }
        if let Some(address) = &self.address {
            store.address = address.clone();
        }
    }
}

/// `store-{unix millis}-{9 lowercase alphanumerics}`; the random suffix keeps
/// ids distinct when many stores are built in the same millisecond.
pub fn generate_store_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("store-{}-{}", chrono::Utc::now().timestamp_millis(), suffix)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RouteTerritory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stores: Vec<Store>,
}

impl RouteTerritory {
    pub fn store(&self, store_id: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.id == store_id)
    }

    pub fn has_unique_store_ids(&self) -> bool {
        has_unique_ids(&self.stores)
    }
}

pub fn has_unique_ids(stores: &[Store]) -> bool {
    let mut seen = HashSet::new();
    stores.iter().all(|s| seen.insert(s.id.as_str()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CreateRoute {
    pub name: String,
    #[serde(default)]
    pub stores: Vec<Store>,
}

impl CreateRoute {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stores: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        v.required("name", &self.name, "Route name is required");
        v.check(
            has_unique_ids(&self.stores),
            "stores",
            "Store ids must be unique within a route",
        );
        v.finish()
    }
}

/// Stores have no sub-collection: changing them means rewriting `stores`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct UpdateRoute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stores: Option<Vec<Store>>,
}

impl UpdateRoute {
    pub fn stores(stores: Vec<Store>) -> Self {
        Self {
            name: None,
            stores: Some(stores),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        if let Some(name) = &self.name {
            v.required("name", name, "Route name is required");
        }
        if let Some(stores) = &self.stores {
            v.check(
                has_unique_ids(stores),
                "stores",
                "Store ids must be unique within a route",
            );
        }
        v.finish()
    }
}

impl Entity for RouteTerritory {
    const COLLECTION: &'static str = "routes";
    type Create = CreateRoute;
    type Update = UpdateRoute;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_store_ids_have_expected_shape() {
        let id = generate_store_id();
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "store");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert_ne!(generate_store_id(), id);
    }

    #[test]
    fn duplicate_store_ids_fail_validation() {
        let store = Store {
            id: "s1".to_string(),
            name: "A".to_string(),
            address: "1 Main".to_string(),
        };
        let update = UpdateRoute::stores(vec![store.clone(), store]);
        assert!(update.validate().unwrap_err().has_field("stores"));
    }

    #[test]
    fn update_store_applies_only_present_fields() {
        let mut store = Store::with_generated_id("Costco", "1718 Boston Post Rd");
        UpdateStore {
            name: Some("Costco Milford".to_string()),
            address: None,
        }
        .apply(&mut store);
        assert_eq!(store.name, "Costco Milford");
        assert_eq!(store.address, "1718 Boston Post Rd");
    }
}
