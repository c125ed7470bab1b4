//! The session-scoped source of truth for everything the user can see.
//!
//! Every mutation goes through [`SyncContext`]: validate locally, write via
//! the business gateway, then let the [`ConsistencyStrategy`] produce the
//! next snapshot. Readers only ever observe whole snapshots.

use std::sync::Arc;

use async_trait::async_trait;
use db::{
    BusinessGateway, DocumentStore, GatewayError,
    models::{
        Entity, ValidationError,
        account::UserProfile,
        employee::{CreateEmployee, Employee, UpdateEmployee},
        product::{CreateProduct, Product, UpdateProduct},
        route::{CreateRoute, NewStore, RouteTerritory, Store, UpdateRoute, UpdateStore},
        sale_alert::{CreateSaleAlert, SaleAlert, UpdateSaleAlert},
        truck::{CreateTruck, MaintenanceRecord, Truck, UpdateTruck},
    },
};
use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock, watch};
use tracing::{debug, info, warn};
use ts_rs::TS;

use super::{
    csv_import::{CsvImportResult, CsvImporter, CsvKind},
    scope::AccessScope,
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no business session is active")]
    NotInitialized,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("{collection} {id} not found")]
    NotFound { collection: &'static str, id: String },
}

/// Everything visible to the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub products: Vec<Product>,
    pub employees: Vec<Employee>,
    pub trucks: Vec<Truck>,
    pub sale_alerts: Vec<SaleAlert>,
    pub routes: Vec<RouteTerritory>,
}

impl Snapshot {
    pub fn route(&self, id: &str) -> Option<&RouteTerritory> {
        self.routes.iter().find(|route| route.id == id)
    }

    pub fn truck(&self, id: &str) -> Option<&Truck> {
        self.trucks.iter().find(|truck| truck.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncState {
    Uninitialized,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum WriteKind {
    Add,
    Update,
    Delete,
    Import,
}

/// The write a strategy is reacting to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEvent {
    pub collection: &'static str,
    pub id: Option<String>,
    pub kind: WriteKind,
}

impl WriteEvent {
    fn new(collection: &'static str, id: &str, kind: WriteKind) -> Self {
        Self {
            collection,
            id: Some(id.to_string()),
            kind,
        }
    }
}

/// Produces the snapshot that follows a successful write.
#[async_trait]
pub trait ConsistencyStrategy: Send + Sync {
    async fn after_write(
        &self,
        gateway: &BusinessGateway,
        scope: &AccessScope,
        current: &Snapshot,
        write: &WriteEvent,
    ) -> Result<Snapshot, GatewayError>;
}

/// Reloads the whole visible dataset after every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefetchOnWrite;

#[async_trait]
impl ConsistencyStrategy for RefetchOnWrite {
    async fn after_write(
        &self,
        gateway: &BusinessGateway,
        scope: &AccessScope,
        _current: &Snapshot,
        _write: &WriteEvent,
    ) -> Result<Snapshot, GatewayError> {
        scope.load(gateway).await
    }
}

#[derive(Clone)]
struct BoundSession {
    gateway: BusinessGateway,
    scope: AccessScope,
}

pub struct SyncContext {
    strategy: Arc<dyn ConsistencyStrategy>,
    session: RwLock<Option<BoundSession>>,
    state: watch::Sender<SyncState>,
    snapshot: watch::Sender<Arc<Snapshot>>,
    writes: Mutex<()>,
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::new(Arc::new(RefetchOnWrite))
    }
}

impl SyncContext {
    pub fn new(strategy: Arc<dyn ConsistencyStrategy>) -> Self {
        let (state, _) = watch::channel(SyncState::Uninitialized);
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            strategy,
            session: RwLock::new(None),
            state,
            snapshot,
            writes: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.state() == SyncState::Loading
    }

    /// The current snapshot. Cheap to clone and never partially updated.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.borrow().clone()
    }

    /// Notifies on every snapshot swap.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub async fn business_id(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.gateway.business_id().to_string())
    }

    /// Binds the context to the profile's business and loads its visible
    /// dataset. A failed load is logged and leaves an empty, ready context.
    pub async fn start_session(&self, store: Arc<dyn DocumentStore>, profile: &UserProfile) {
        let _writes = self.writes.lock().await;
        let session = BoundSession {
            gateway: BusinessGateway::new(profile.business_id.clone(), store),
            scope: AccessScope::for_profile(profile),
        };
        *self.session.write().await = Some(session.clone());
        self.snapshot.send_replace(Arc::new(Snapshot::default()));
        self.state.send_replace(SyncState::Loading);

        match session.scope.load(&session.gateway).await {
            Ok(snapshot) => {
                info!(
                    business_id = %profile.business_id,
                    role = %profile.role,
                    "Session started"
                );
                self.snapshot.send_replace(Arc::new(snapshot));
            }
            Err(e) => {
                warn!(
                    business_id = %profile.business_id,
                    error = %e,
                    "Initial load failed; continuing with empty data"
                );
            }
        }
        self.state.send_replace(SyncState::Ready);
    }

    /// Unbinds the session and drops its data.
    pub async fn end_session(&self) {
        let _writes = self.writes.lock().await;
        if let Some(session) = self.session.write().await.take() {
            info!(business_id = %session.gateway.business_id(), "Session ended");
        }
        self.snapshot.send_replace(Arc::new(Snapshot::default()));
        self.state.send_replace(SyncState::Uninitialized);
    }

    /// Reloads every visible collection. On failure the snapshot is kept.
    pub async fn refetch_all(&self) -> Result<(), SyncError> {
        let (_writes, session) = self.begin_write().await?;
        self.state.send_replace(SyncState::Loading);
        let result = session.scope.load(&session.gateway).await;
        self.state.send_replace(SyncState::Ready);
        match result {
            Ok(snapshot) => {
                self.snapshot.send_replace(Arc::new(snapshot));
                Ok(())
            }
            Err(e) => {
                warn!(
                    business_id = %session.gateway.business_id(),
                    error = %e,
                    "Refetch failed"
                );
                Err(e.into())
            }
        }
    }

    async fn begin_write(&self) -> Result<(MutexGuard<'_, ()>, BoundSession), SyncError> {
        let guard = self.writes.lock().await;
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(SyncError::NotInitialized)?;
        Ok((guard, session))
    }

    /// Runs the strategy after a successful write and swaps in its result.
    async fn settle(&self, session: &BoundSession, write: WriteEvent) -> Result<(), SyncError> {
        let current = self.snapshot();
        let next = self
            .strategy
            .after_write(&session.gateway, &session.scope, &current, &write)
            .await;
        match next {
            Ok(snapshot) => {
                self.snapshot.send_replace(Arc::new(snapshot));
                Ok(())
            }
            Err(e) => {
                warn!(
                    business_id = %session.gateway.business_id(),
                    collection = write.collection,
                    kind = %write.kind,
                    error = %e,
                    "Reload after write failed"
                );
                Err(e.into())
            }
        }
    }

    async fn write_add<E: Entity>(
        &self,
        session: &BoundSession,
        data: &E::Create,
    ) -> Result<String, SyncError> {
        self.state.send_replace(SyncState::Loading);
        let result: Result<String, SyncError> = async {
            let id = session.gateway.collection::<E>().add(data).await?;
            debug!(collection = E::COLLECTION, id = %id, "Created");
            self.settle(session, WriteEvent::new(E::COLLECTION, &id, WriteKind::Add))
                .await?;
            Ok(id)
        }
        .await;
        self.state.send_replace(SyncState::Ready);
        result
    }

    async fn write_update<E: Entity>(
        &self,
        session: &BoundSession,
        id: &str,
        data: &E::Update,
    ) -> Result<(), SyncError> {
        self.state.send_replace(SyncState::Loading);
        let result: Result<(), SyncError> = async {
            session.gateway.collection::<E>().update(id, data).await?;
            self.settle(session, WriteEvent::new(E::COLLECTION, id, WriteKind::Update))
                .await
        }
        .await;
        self.state.send_replace(SyncState::Ready);
        result
    }

    async fn write_delete<E: Entity>(
        &self,
        session: &BoundSession,
        id: &str,
    ) -> Result<(), SyncError> {
        self.state.send_replace(SyncState::Loading);
        let result: Result<(), SyncError> = async {
            session.gateway.collection::<E>().delete(id).await?;
            self.settle(session, WriteEvent::new(E::COLLECTION, id, WriteKind::Delete))
                .await
        }
        .await;
        self.state.send_replace(SyncState::Ready);
        result
    }

    async fn add<E: Entity>(&self, data: &E::Create) -> Result<String, SyncError> {
        let (_writes, session) = self.begin_write().await?;
        self.write_add::<E>(&session, data).await
    }

    async fn update<E: Entity>(&self, id: &str, data: &E::Update) -> Result<(), SyncError> {
        let (_writes, session) = self.begin_write().await?;
        self.write_update::<E>(&session, id, data).await
    }

    async fn delete<E: Entity>(&self, id: &str) -> Result<(), SyncError> {
        let (_writes, session) = self.begin_write().await?;
        self.write_delete::<E>(&session, id).await
    }

    pub async fn add_product(&self, data: CreateProduct) -> Result<String, SyncError> {
        data.validate()?;
        self.add::<Product>(&data).await
    }

    pub async fn update_product(&self, id: &str, data: UpdateProduct) -> Result<(), SyncError> {
        data.validate()?;
        self.update::<Product>(id, &data).await
    }

    pub async fn delete_product(&self, id: &str) -> Result<(), SyncError> {
        self.delete::<Product>(id).await
    }

    pub async fn add_employee(&self, data: CreateEmployee) -> Result<String, SyncError> {
        data.validate()?;
        self.add::<Employee>(&data).await
    }

    pub async fn update_employee(&self, id: &str, data: UpdateEmployee) -> Result<(), SyncError> {
        data.validate()?;
        self.update::<Employee>(id, &data).await
    }

    pub async fn delete_employee(&self, id: &str) -> Result<(), SyncError> {
        self.delete::<Employee>(id).await
    }

    pub async fn add_truck(&self, data: CreateTruck) -> Result<String, SyncError> {
        data.validate()?;
        self.add::<Truck>(&data).await
    }

    pub async fn update_truck(&self, id: &str, data: UpdateTruck) -> Result<(), SyncError> {
        data.validate()?;
        self.update::<Truck>(id, &data).await
    }

    pub async fn delete_truck(&self, id: &str) -> Result<(), SyncError> {
        self.delete::<Truck>(id).await
    }

    pub async fn add_route(&self, data: CreateRoute) -> Result<String, SyncError> {
        data.validate()?;
        self.add::<RouteTerritory>(&data).await
    }

    pub async fn update_route(&self, id: &str, data: UpdateRoute) -> Result<(), SyncError> {
        data.validate()?;
        self.update::<RouteTerritory>(id, &data).await
    }

    /// Deleting a route deletes its stores. Employees that still reference
    /// the route keep the dangling id.
    pub async fn delete_route(&self, id: &str) -> Result<(), SyncError> {
        self.delete::<RouteTerritory>(id).await
    }

    pub async fn add_sale_alert(&self, data: CreateSaleAlert) -> Result<String, SyncError> {
        data.validate()?;
        self.add::<SaleAlert>(&data).await
    }

    pub async fn update_sale_alert(
        &self,
        id: &str,
        data: UpdateSaleAlert,
    ) -> Result<(), SyncError> {
        data.validate()?;
        self.update::<SaleAlert>(id, &data).await
    }

    pub async fn delete_sale_alert(&self, id: &str) -> Result<(), SyncError> {
        self.delete::<SaleAlert>(id).await
    }

    /// Current stores of a route in the snapshot.
    fn route_stores(&self, route_id: &str) -> Result<Vec<Store>, SyncError> {
        self.snapshot()
            .route(route_id)
            .map(|route| route.stores.clone())
            .ok_or_else(|| SyncError::NotFound {
                collection: RouteTerritory::COLLECTION,
                id: route_id.to_string(),
            })
    }

    /// Appends a store to a route by rewriting its `stores` array. Concurrent
    /// edits from another session to the same route are lost (last write
    /// wins).
    pub async fn add_store(&self, route_id: &str, store: NewStore) -> Result<String, SyncError> {
        store.validate()?;
        let (_writes, session) = self.begin_write().await?;
        let mut stores = self.route_stores(route_id)?;
        let store = Store::with_generated_id(store.name, store.address);
        let store_id = store.id.clone();
        stores.push(store);
        self.write_update::<RouteTerritory>(&session, route_id, &UpdateRoute::stores(stores))
            .await?;
        Ok(store_id)
    }

    pub async fn update_store(
        &self,
        route_id: &str,
        store_id: &str,
        changes: UpdateStore,
    ) -> Result<(), SyncError> {
        changes.validate()?;
        let (_writes, session) = self.begin_write().await?;
        let mut stores = self.route_stores(route_id)?;
        let store = stores
            .iter_mut()
            .find(|store| store.id == store_id)
            .ok_or_else(|| SyncError::NotFound {
                collection: "stores",
                id: store_id.to_string(),
            })?;
        changes.apply(store);
        self.write_update::<RouteTerritory>(&session, route_id, &UpdateRoute::stores(stores))
            .await
    }

    /// Removing a store that is not on the route still rewrites the array.
    pub async fn remove_store(&self, route_id: &str, store_id: &str) -> Result<(), SyncError> {
        let (_writes, session) = self.begin_write().await?;
        let mut stores = self.route_stores(route_id)?;
        stores.retain(|store| store.id != store_id);
        self.write_update::<RouteTerritory>(&session, route_id, &UpdateRoute::stores(stores))
            .await
    }

    /// Appends a service record and moves `lastService` to its date.
    pub async fn log_maintenance(
        &self,
        truck_id: &str,
        record: MaintenanceRecord,
    ) -> Result<(), SyncError> {
        record.validate()?;
        let (_writes, session) = self.begin_write().await?;
        let mut history = self
            .snapshot()
            .truck(truck_id)
            .map(|truck| truck.maintenance_history.clone())
            .ok_or_else(|| SyncError::NotFound {
                collection: Truck::COLLECTION,
                id: truck_id.to_string(),
            })?;
        let last_service = record.date;
        history.push(record);
        let changes = UpdateTruck {
            maintenance_history: Some(history),
            last_service: Some(last_service),
            ..Default::default()
        };
        self.write_update::<Truck>(&session, truck_id, &changes)
            .await
    }

    /// Imports a CSV file into the session's business and reloads. A failed
    /// import leaves the snapshot as it was.
    pub async fn import_csv(
        &self,
        importer: &CsvImporter,
        kind: CsvKind,
        filename: &str,
        bytes: &[u8],
    ) -> Result<CsvImportResult, SyncError> {
        let (_writes, session) = self.begin_write().await?;
        self.state.send_replace(SyncState::Loading);
        let result = importer
            .import(&session.gateway, kind, filename, bytes)
            .await;
        let settled = if result.success {
            let write = WriteEvent {
                collection: kind.collection(),
                id: None,
                kind: WriteKind::Import,
            };
            self.settle(&session, write).await
        } else {
            Ok(())
        };
        self.state.send_replace(SyncState::Ready);
        settled.map(|()| result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::NaiveDate;
    use db::{
        CollectionPath, Document, InMemoryDocumentStore, StoreError,
        models::{
            account::Role,
            truck::{Dimensions, HealthStatus, Upkeep},
        },
    };
    use serde_json::{Map, Value};

    use super::*;
    use crate::services::blob::InMemoryBlobStore;

    /// Delegates to an in-memory store but can be told to fail writes.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryDocumentStore,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self, flag: &AtomicBool) -> Result<(), StoreError> {
            if flag.load(Ordering::SeqCst) {
                Err(StoreError::Unavailable("injected failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
            self.check(&self.fail_reads)?;
            self.inner.list(collection).await
        }

        async fn get(
            &self,
            collection: &CollectionPath,
            id: &str,
        ) -> Result<Option<Document>, StoreError> {
            self.check(&self.fail_reads)?;
            self.inner.get(collection, id).await
        }

        async fn create(
            &self,
            collection: &CollectionPath,
            data: Map<String, Value>,
        ) -> Result<String, StoreError> {
            self.check(&self.fail_writes)?;
            self.inner.create(collection, data).await
        }

        async fn set(
            &self,
            collection: &CollectionPath,
            id: &str,
            data: Map<String, Value>,
        ) -> Result<(), StoreError> {
            self.check(&self.fail_writes)?;
            self.inner.set(collection, id, data).await
        }

        async fn update(
            &self,
            collection: &CollectionPath,
            id: &str,
            data: Map<String, Value>,
        ) -> Result<(), StoreError> {
            self.check(&self.fail_writes)?;
            self.inner.update(collection, id, data).await
        }

        async fn delete(&self, collection: &CollectionPath, id: &str) -> Result<(), StoreError> {
            self.check(&self.fail_writes)?;
            self.inner.delete(collection, id).await
        }
    }

    fn owner() -> UserProfile {
        UserProfile {
            email: "owner@example.com".to_string(),
            display_name: "Owner".to_string(),
            role: Role::Owner,
            business_id: "biz_owner".to_string(),
            employee_id: None,
        }
    }

    fn truck() -> CreateTruck {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        CreateTruck {
            plate: "NY-4821".to_string(),
            kind: "Box Truck".to_string(),
            mileage: 45000,
            last_service: date,
            health_status: HealthStatus::Good,
            issues: Vec::new(),
            maintenance_history: Vec::new(),
            registration_expiry: date,
            insurance_expiry: date,
            dimensions: Dimensions {
                height: 12.5,
                length: 24.0,
                weight: 26000.0,
            },
            upkeep: Upkeep {
                tires: 75,
                oil: 60,
                brakes: 85,
            },
        }
    }

    async fn started(store: Arc<dyn DocumentStore>) -> SyncContext {
        let ctx = SyncContext::default();
        ctx.start_session(store, &owner()).await;
        ctx
    }

    #[tokio::test]
    async fn mutations_without_session_are_configuration_errors() {
        let ctx = SyncContext::default();
        assert_eq!(ctx.state(), SyncState::Uninitialized);
        let err = ctx.delete_product("p1").await.unwrap_err();
        assert!(matches!(err, SyncError::NotInitialized));
        assert!(matches!(
            ctx.refetch_all().await.unwrap_err(),
            SyncError::NotInitialized
        ));
    }

    #[tokio::test]
    async fn add_refetches_the_visible_dataset() {
        let ctx = started(Arc::new(InMemoryDocumentStore::new())).await;
        assert_eq!(ctx.state(), SyncState::Ready);
        let mut updates = ctx.subscribe();

        let id = ctx.add_truck(truck()).await.unwrap();

        assert!(updates.has_changed().unwrap());
        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.trucks.len(), 1);
        assert_eq!(snapshot.trucks[0].id, id);
        assert!(!ctx.is_busy());
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_the_store() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let ctx = started(store.clone()).await;
        let mut bad = truck();
        bad.plate = "  ".to_string();

        let err = ctx.add_truck(bad).await.unwrap_err();
        match err {
            SyncError::Validation(e) => assert!(e.has_field("plate")),
            other => panic!("unexpected error: {other}"),
        }
        let trucks = CollectionPath::business("biz_owner", "trucks");
        assert_eq!(store.count(&trucks).await, 0);
    }

    #[tokio::test]
    async fn failed_update_leaves_snapshot_untouched() {
        let store = Arc::new(FlakyStore::default());
        let ctx = started(store.clone()).await;
        let id = ctx.add_truck(truck()).await.unwrap();
        let before = ctx.snapshot();

        store.fail_writes.store(true, Ordering::SeqCst);
        let result = ctx
            .update_truck(
                &id,
                UpdateTruck {
                    mileage: Some(99_999),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(SyncError::Gateway(_))));
        assert_eq!(*ctx.snapshot(), *before);
        assert_eq!(ctx.state(), SyncState::Ready);
    }

    #[tokio::test]
    async fn failed_refetch_is_returned_and_keeps_snapshot() {
        let store = Arc::new(FlakyStore::default());
        let ctx = started(store.clone()).await;
        ctx.add_truck(truck()).await.unwrap();
        let before = ctx.snapshot();

        store.fail_reads.store(true, Ordering::SeqCst);
        assert!(ctx.refetch_all().await.is_err());
        assert_eq!(*ctx.snapshot(), *before);
        assert_eq!(ctx.state(), SyncState::Ready);
    }

    #[tokio::test]
    async fn failed_initial_load_still_becomes_ready() {
        let store = Arc::new(FlakyStore::default());
        store.fail_reads.store(true, Ordering::SeqCst);
        let ctx = started(store).await;
        assert_eq!(ctx.state(), SyncState::Ready);
        assert_eq!(*ctx.snapshot(), Snapshot::default());
    }

    #[tokio::test]
    async fn add_store_rewrites_the_route_stores() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let gateway = BusinessGateway::new("biz_owner", store.clone());
        gateway
            .routes()
            .set("ct-1", &CreateRoute::named("CT: Milford"))
            .await
            .unwrap();
        let ctx = started(store).await;

        let store_id = ctx
            .add_store(
                "ct-1",
                NewStore {
                    name: "Costco Milford".to_string(),
                    address: "1718 Boston Post Rd".to_string(),
                },
            )
            .await
            .unwrap();

        let route = gateway.routes().get_one("ct-1").await.unwrap().unwrap();
        assert_eq!(route.stores.len(), 1);
        assert_eq!(route.stores[0].id, store_id);
        assert_eq!(route.stores[0].name, "Costco Milford");
        assert_eq!(route.stores[0].address, "1718 Boston Post Rd");
        assert_eq!(ctx.snapshot().route("ct-1"), Some(&route));
    }

    #[tokio::test]
    async fn update_and_remove_store() {
        let ctx = started(Arc::new(InMemoryDocumentStore::new())).await;
        let route_id = ctx.add_route(CreateRoute::named("NY: Yonkers")).await.unwrap();
        let first = ctx
            .add_store(
                &route_id,
                NewStore {
                    name: "Stop & Shop".to_string(),
                    address: "111 Vredenburgh Ave".to_string(),
                },
            )
            .await
            .unwrap();
        let second = ctx
            .add_store(
                &route_id,
                NewStore {
                    name: "ShopRite".to_string(),
                    address: "25-43 Prospect St".to_string(),
                },
            )
            .await
            .unwrap();

        ctx.update_store(
            &route_id,
            &second,
            UpdateStore {
                address: Some("2 Prospect St".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        ctx.remove_store(&route_id, &first).await.unwrap();

        let snapshot = ctx.snapshot();
        let route = snapshot.route(&route_id).unwrap();
        assert_eq!(route.stores.len(), 1);
        assert_eq!(route.stores[0].id, second);
        assert_eq!(route.stores[0].name, "ShopRite");
        assert_eq!(route.stores[0].address, "2 Prospect St");

        let err = ctx.remove_store("no-route", &second).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn log_maintenance_appends_and_moves_last_service() {
        let ctx = started(Arc::new(InMemoryDocumentStore::new())).await;
        let id = ctx.add_truck(truck()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 9, 14).unwrap();

        ctx.log_maintenance(
            &id,
            MaintenanceRecord {
                date,
                service: "Oil change".to_string(),
                cost: 89.5,
                provider: "Jiffy Lube".to_string(),
            },
        )
        .await
        .unwrap();

        let snapshot = ctx.snapshot();
        let truck = snapshot.truck(&id).unwrap();
        assert_eq!(truck.last_service, date);
        assert_eq!(truck.maintenance_history.len(), 1);
        assert_eq!(truck.maintenance_history[0].service, "Oil change");
    }

    #[tokio::test]
    async fn import_csv_reloads_snapshot() {
        let ctx = started(Arc::new(InMemoryDocumentStore::new())).await;
        let importer = CsvImporter::new(Arc::new(InMemoryBlobStore::new()));

        let result = ctx
            .import_csv(
                &importer,
                CsvKind::Routes,
                "routes.csv",
                b"route_name\nNY: Bronx\nCT: Stamford\n",
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.records_processed, 2);
        assert_eq!(ctx.snapshot().routes.len(), 2);
    }

    #[tokio::test]
    async fn end_session_clears_everything() {
        let ctx = started(Arc::new(InMemoryDocumentStore::new())).await;
        ctx.add_truck(truck()).await.unwrap();
        assert_eq!(ctx.business_id().await.as_deref(), Some("biz_owner"));

        ctx.end_session().await;

        assert_eq!(ctx.state(), SyncState::Uninitialized);
        assert_eq!(*ctx.snapshot(), Snapshot::default());
        assert_eq!(ctx.business_id().await, None);
    }
}
