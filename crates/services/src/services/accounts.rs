//! Sign-up provisioning and identity-to-business linkage.

use std::sync::Arc;

use chrono::Utc;
use db::{
    BusinessGateway, DocumentStore, GatewayError, StoreError,
    models::{
        Entity,
        account::{Business, Role, SubscriptionTier, UserProfile},
        employee::{CreateEmployee, UpdateEmployee},
        product::CreateProduct,
        route::CreateRoute,
        sale_alert::CreateSaleAlert,
        truck::CreateTruck,
    },
};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{info, instrument};

const DEMO_DATA: &str = include_str!("demo_data.json");
const DEFAULT_OWNER_NAME: &str = "Business Owner";
const DEFAULT_BUSINESS_PREFIX: &str = "My Business";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("invalid demo dataset: {0}")]
    DemoData(#[from] serde_json::Error),
    #[error("employee {0} does not exist")]
    UnknownEmployee(String),
}

/// A demo record with the fixed id it is stored under.
#[derive(Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Seed<T> {
    id: String,
    #[serde(flatten)]
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DemoData {
    products: Vec<Seed<CreateProduct>>,
    employees: Vec<Seed<CreateEmployee>>,
    trucks: Vec<Seed<CreateTruck>>,
    routes: Vec<Seed<CreateRoute>>,
    sale_alerts: Vec<Seed<CreateSaleAlert>>,
}

async fn seed_all<E: Entity>(
    gateway: &BusinessGateway,
    seeds: &[Seed<E::Create>],
) -> Result<(), GatewayError> {
    let collection = gateway.collection::<E>();
    for seed in seeds {
        collection.set(&seed.id, &seed.data).await?;
    }
    Ok(())
}

/// Writes the demo dataset into `gateway`'s business under fixed ids.
/// Running it again overwrites the same documents.
pub async fn seed_demo_data(gateway: &BusinessGateway) -> Result<(), AccountError> {
    use db::models::{
        employee::Employee, product::Product, route::RouteTerritory, sale_alert::SaleAlert,
        truck::Truck,
    };

    let demo: DemoData = serde_json::from_str(DEMO_DATA)?;
    seed_all::<Product>(gateway, &demo.products).await?;
    seed_all::<Employee>(gateway, &demo.employees).await?;
    seed_all::<Truck>(gateway, &demo.trucks).await?;
    seed_all::<RouteTerritory>(gateway, &demo.routes).await?;
    seed_all::<SaleAlert>(gateway, &demo.sale_alerts).await?;
    info!(
        business_id = %gateway.business_id(),
        products = demo.products.len(),
        employees = demo.employees.len(),
        trucks = demo.trucks.len(),
        routes = demo.routes.len(),
        "Seeded demo data"
    );
    Ok(())
}

pub struct AccountService {
    store: Arc<dyn DocumentStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// Profile linked to `uid`, if the identity has been provisioned.
    pub async fn resolve_session(&self, uid: &str) -> Result<Option<UserProfile>, AccountError> {
        Ok(UserProfile::find_by_uid(self.store.as_ref(), uid).await?)
    }

    /// Creates a business owned by `uid` with demo data, unless the identity
    /// already has a profile, in which case that profile is returned as is.
    #[instrument(skip(self, email, display_name))]
    pub async fn provision_owner(
        &self,
        uid: &str,
        email: &str,
        display_name: &str,
    ) -> Result<UserProfile, AccountError> {
        if let Some(existing) = self.resolve_session(uid).await? {
            info!("Profile already exists; skipping provisioning");
            return Ok(existing);
        }

        let display_name = display_name.trim();
        let business_id = Business::id_for_owner(uid);
        let business = Business {
            name: format!(
                "{}'s Business",
                if display_name.is_empty() {
                    DEFAULT_BUSINESS_PREFIX
                } else {
                    display_name
                }
            ),
            owner_id: uid.to_string(),
            created_at: Utc::now(),
            subscription: SubscriptionTier::Free,
        };
        business.save(self.store.as_ref(), &business_id).await?;

        let profile = UserProfile {
            email: email.to_string(),
            display_name: if display_name.is_empty() {
                DEFAULT_OWNER_NAME.to_string()
            } else {
                display_name.to_string()
            },
            role: Role::Owner,
            business_id: business_id.clone(),
            employee_id: None,
        };
        profile.save(self.store.as_ref(), uid).await?;

        seed_demo_data(&BusinessGateway::new(business_id.clone(), self.store.clone())).await?;
        info!(business_id = %business_id, "Provisioned business owner");
        Ok(profile)
    }

    /// Gives `uid` team-member access to `business_id` as `employee_id` and
    /// records the login on the employee.
    #[instrument(skip(self, email, display_name))]
    pub async fn link_member(
        &self,
        uid: &str,
        email: &str,
        display_name: &str,
        business_id: &str,
        employee_id: &str,
    ) -> Result<UserProfile, AccountError> {
        let gateway = BusinessGateway::new(business_id, self.store.clone());
        if gateway.employees().get_one(employee_id).await?.is_none() {
            return Err(AccountError::UnknownEmployee(employee_id.to_string()));
        }
        gateway
            .employees()
            .update(
                employee_id,
                &UpdateEmployee {
                    user_id: Some(uid.to_string()),
                    email: Some(email.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        let profile = UserProfile {
            email: email.to_string(),
            display_name: display_name.to_string(),
            role: Role::Member,
            business_id: business_id.to_string(),
            employee_id: Some(employee_id.to_string()),
        };
        profile.save(self.store.as_ref(), uid).await?;
        info!("Linked team member");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use db::InMemoryDocumentStore;

    use super::*;
    use crate::services::sync::SyncContext;

    fn service() -> AccountService {
        AccountService::new(Arc::new(InMemoryDocumentStore::new()))
    }

    #[test]
    fn demo_dataset_parses() {
        let demo: DemoData = serde_json::from_str(DEMO_DATA).unwrap();
        assert_eq!(demo.products.len(), 5);
        assert_eq!(demo.employees.len(), 7);
        assert_eq!(demo.trucks.len(), 6);
        assert_eq!(demo.routes.len(), 6);
        assert_eq!(demo.sale_alerts.len(), 3);
        assert!(demo.routes.iter().all(|r| r.data.validate().is_ok()));
        assert!(demo.trucks.iter().all(|t| t.data.validate().is_ok()));
    }

    #[tokio::test]
    async fn provisioning_creates_business_profile_and_demo_data() {
        let service = service();
        let profile = service
            .provision_owner("uid42", "chris@example.com", "Chris")
            .await
            .unwrap();

        assert_eq!(profile.role, Role::Owner);
        assert_eq!(profile.business_id, "biz_uid42");
        let business = Business::find_by_id(service.store().as_ref(), "biz_uid42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(business.name, "Chris's Business");
        assert_eq!(business.owner_id, "uid42");
        assert_eq!(business.subscription, SubscriptionTier::Free);

        let gateway = BusinessGateway::new("biz_uid42", service.store());
        let route = gateway.routes().get_one("ct-1").await.unwrap().unwrap();
        assert_eq!(route.name, "CT: Milford - Flowers");
        assert_eq!(route.stores.len(), 2);
        let andres = gateway.employees().get_one("driver-1").await.unwrap().unwrap();
        assert!(andres.assigned_routes.is_empty());
        assert_eq!(andres.user_id, None);
    }

    #[tokio::test]
    async fn provisioning_is_idempotent() {
        let service = service();
        let first = service
            .provision_owner("uid1", "a@example.com", "")
            .await
            .unwrap();
        assert_eq!(first.display_name, DEFAULT_OWNER_NAME);

        let second = service
            .provision_owner("uid1", "other@example.com", "Other")
            .await
            .unwrap();
        assert_eq!(second, first);
        let business = Business::find_by_id(service.store().as_ref(), "biz_uid1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(business.name, "My Business's Business");
    }

    #[tokio::test]
    async fn linked_member_sees_only_their_routes() {
        let service = service();
        let owner = service
            .provision_owner("owner", "o@example.com", "Owner")
            .await
            .unwrap();

        let owner_ctx = SyncContext::default();
        owner_ctx.start_session(service.store(), &owner).await;
        owner_ctx
            .update_employee(
                "driver-1",
                UpdateEmployee {
                    assigned_routes: Some(vec!["ny-1".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let member = service
            .link_member("andres-uid", "andres@example.com", "Andres", &owner.business_id, "driver-1")
            .await
            .unwrap();
        assert_eq!(
            service.resolve_session("andres-uid").await.unwrap(),
            Some(member.clone())
        );

        let member_ctx = SyncContext::default();
        member_ctx.start_session(service.store(), &member).await;
        let snapshot = member_ctx.snapshot();
        assert_eq!(snapshot.routes.len(), 1);
        assert_eq!(snapshot.routes[0].id, "ny-1");
        assert_eq!(snapshot.employees.len(), 1);
        assert_eq!(snapshot.employees[0].email.as_deref(), Some("andres@example.com"));
        assert_eq!(snapshot.products.len(), 5);
        assert!(snapshot.trucks.is_empty());
        assert!(snapshot.sale_alerts.is_empty());
    }

    #[tokio::test]
    async fn linking_unknown_employee_fails() {
        let service = service();
        let err = service
            .link_member("u", "u@example.com", "U", "biz_none", "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::UnknownEmployee(_)));
        assert_eq!(service.resolve_session("u").await.unwrap(), None);
    }
}
