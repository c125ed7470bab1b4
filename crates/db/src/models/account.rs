use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use crate::store::{CollectionPath, DocumentStore, StoreError, to_fields};

const USERS: &str = "users";
const BUSINESSES: &str = "businesses";

/// What a signed-in identity may do within its business.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
pub enum Role {
    /// Full-access administrator of the business.
    #[serde(rename = "business_owner")]
    #[strum(serialize = "business_owner")]
    Owner,
    /// Operational user restricted to assigned routes.
    #[serde(rename = "team_member")]
    #[strum(serialize = "team_member")]
    Member,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
}

/// Profile stored at `users/{uid}`, linking an identity to its business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub business_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
}

impl UserProfile {
    fn collection() -> CollectionPath {
        CollectionPath::new(USERS)
    }

    pub async fn find_by_uid(
        store: &dyn DocumentStore,
        uid: &str,
    ) -> Result<Option<Self>, StoreError> {
        store
            .get(&Self::collection(), uid)
            .await?
            .map(|doc| serde_json::from_value(serde_json::Value::Object(doc.data)))
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn save(&self, store: &dyn DocumentStore, uid: &str) -> Result<(), StoreError> {
        store.set(&Self::collection(), uid, to_fields(self)?).await
    }
}

/// Business metadata stored at `businesses/{businessId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub subscription: SubscriptionTier,
}

impl Business {
    fn collection() -> CollectionPath {
        CollectionPath::new(BUSINESSES)
    }

    /// Business id derived from the owner's uid.
    pub fn id_for_owner(uid: &str) -> String {
        format!("biz_{uid}")
    }

    pub async fn find_by_id(
        store: &dyn DocumentStore,
        business_id: &str,
    ) -> Result<Option<Self>, StoreError> {
        store
            .get(&Self::collection(), business_id)
            .await?
            .map(|doc| serde_json::from_value(serde_json::Value::Object(doc.data)))
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn save(
        &self,
        store: &dyn DocumentStore,
        business_id: &str,
    ) -> Result<(), StoreError> {
        store.set(&Self::collection(), business_id, to_fields(self)?).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::memory::InMemoryDocumentStore;

    #[test]
    fn roles_use_stored_spelling() {
        assert_eq!(serde_json::to_value(Role::Owner).unwrap(), json!("business_owner"));
        assert_eq!(serde_json::to_value(Role::Member).unwrap(), json!("team_member"));
        assert_eq!("team_member".parse::<Role>().unwrap(), Role::Member);
    }

    #[tokio::test]
    async fn profile_roundtrips_through_users_collection() {
        let store = InMemoryDocumentStore::new();
        let profile = UserProfile {
            email: "andres@example.com".to_string(),
            display_name: "Andres".to_string(),
            role: Role::Member,
            business_id: "biz_owner".to_string(),
            employee_id: Some("driver-1".to_string()),
        };
        profile.save(&store, "uid-7").await.unwrap();

        let loaded = UserProfile::find_by_uid(&store, "uid-7").await.unwrap();
        assert_eq!(loaded, Some(profile));
        assert_eq!(UserProfile::find_by_uid(&store, "nobody").await.unwrap(), None);
    }
}
