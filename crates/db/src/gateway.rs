//! Typed access to one business's collections.
//!
//! A [`BusinessGateway`] is bound to a single business id and translates
//! entity operations into document-store calls under
//! `businesses/{businessId}/{collection}`.

use std::{marker::PhantomData, sync::Arc};

use thiserror::Error;
use tracing::debug;

use crate::{
    models::{
        Entity, employee::Employee, product::Product, route::RouteTerritory,
        sale_alert::SaleAlert, truck::Truck,
    },
    store::{CollectionPath, Document, DocumentStore, StoreError, to_fields},
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to decode {collection}/{id}: {source}")]
    Decode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Store(StoreError::NotFound { .. }))
    }
}

#[derive(Clone)]
pub struct BusinessGateway {
    business_id: String,
    store: Arc<dyn DocumentStore>,
}

impl BusinessGateway {
    pub fn new(business_id: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            business_id: business_id.into(),
            store,
        }
    }

    pub fn business_id(&self) -> &str {
        &self.business_id
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn collection<E: Entity>(&self) -> Collection<'_, E> {
        Collection {
            gateway: self,
            _entity: PhantomData,
        }
    }

    pub fn products(&self) -> Collection<'_, Product> {
        self.collection()
    }

    pub fn employees(&self) -> Collection<'_, Employee> {
        self.collection()
    }

    pub fn trucks(&self) -> Collection<'_, Truck> {
        self.collection()
    }

    pub fn routes(&self) -> Collection<'_, RouteTerritory> {
        self.collection()
    }

    pub fn sale_alerts(&self) -> Collection<'_, SaleAlert> {
        self.collection()
    }

    /// Routes whose id is in `assigned_route_ids`. An empty assignment skips
    /// the read entirely.
    pub async fn routes_for_member(
        &self,
        assigned_route_ids: &[String],
    ) -> Result<Vec<RouteTerritory>, GatewayError> {
        if assigned_route_ids.is_empty() {
            return Ok(Vec::new());
        }
        let routes = self.routes().get_all().await?;
        Ok(routes
            .into_iter()
            .filter(|route| assigned_route_ids.iter().any(|id| id == &route.id))
            .collect())
    }
}

/// Operations on one entity collection of a business.
pub struct Collection<'a, E> {
    gateway: &'a BusinessGateway,
    _entity: PhantomData<E>,
}

impl<E: Entity> Collection<'_, E> {
    pub fn path(&self) -> CollectionPath {
        CollectionPath::business(&self.gateway.business_id, E::COLLECTION)
    }

    fn decode(&self, doc: Document) -> Result<E, GatewayError> {
        let id = doc.id.clone();
        serde_json::from_value::<E>(doc.into_value()).map_err(|source| GatewayError::Decode {
            collection: self.path().to_string(),
            id,
            source,
        })
    }

    /// Every document in the collection with its store id attached.
    pub async fn get_all(&self) -> Result<Vec<E>, GatewayError> {
        let docs = self.gateway.store.list(&self.path()).await?;
        docs.into_iter().map(|doc| self.decode(doc)).collect()
    }

    /// `None` when the id does not exist.
    pub async fn get_one(&self, id: &str) -> Result<Option<E>, GatewayError> {
        match self.gateway.store.get(&self.path(), id).await? {
            Some(doc) => self.decode(doc).map(Some),
            None => Ok(None),
        }
    }

    /// Writes a single new document and returns the store-generated id.
    pub async fn add(&self, data: &E::Create) -> Result<String, GatewayError> {
        let mut fields = to_fields(data)?;
        fields.remove("id");
        let id = self.gateway.store.create(&self.path(), fields).await?;
        debug!(
            business_id = %self.gateway.business_id,
            collection = E::COLLECTION,
            id = %id,
            "Added document"
        );
        Ok(id)
    }

    /// Merges only the fields present in `data`; a missing document fails
    /// with a not-found store error.
    pub async fn update(&self, id: &str, data: &E::Update) -> Result<(), GatewayError> {
        let mut fields = to_fields(data)?;
        fields.remove("id");
        self.gateway.store.update(&self.path(), id, fields).await?;
        Ok(())
    }

    /// Deletes by id. Does not report whether the document existed.
    pub async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        self.gateway.store.delete(&self.path(), id).await?;
        Ok(())
    }

    /// Writes a document under a caller-chosen id (seeding only).
    pub async fn set(&self, id: &str, data: &E::Create) -> Result<(), GatewayError> {
        let mut fields = to_fields(data)?;
        fields.remove("id");
        self.gateway.store.set(&self.path(), id, fields).await?;
        Ok(())
    }
}
