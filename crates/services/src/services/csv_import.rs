//! Bulk import of products, routes and route stores from CSV uploads.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use db::{
    BusinessGateway, GatewayError,
    models::{
        Entity,
        product::{CreateProduct, Product, ProductCategory},
        route::{CreateRoute, RouteTerritory, Store, UpdateRoute},
    },
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

use super::blob::{BlobError, BlobStore, csv_upload_path};

const PRODUCT_NAME: &[&str] = &["name", "product_name", "Product", "Product Name"];
const PRODUCT_CATEGORY: &[&str] = &["category", "Category", "type"];
const PRODUCT_INVENTORY: &[&str] = &[
    "inventory",
    "current_inventory",
    "Inventory",
    "Current Inventory",
];
const PRODUCT_LAST_ORDER: &[&str] = &["last_order", "order_quantity", "Last Order", "Order Quantity"];
const ROUTE_NAME: &[&str] = &["route_name", "Route Name", "name", "Name"];
const STORE_ROUTE: &[&str] = &["route_name", "Route Name", "route"];
const STORE_NAME: &[&str] = &["store_name", "Store Name", "name"];
const STORE_ADDRESS: &[&str] = &["address", "Address", "location"];

#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("failed to archive upload: {0}")]
    Archive(#[from] BlobError),
    #[error("failed to parse CSV: {0}")]
    Parse(#[from] csv::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CsvKind {
    Products,
    Routes,
    Stores,
}

impl CsvKind {
    /// Collection the import writes to.
    pub fn collection(self) -> &'static str {
        match self {
            CsvKind::Products => Product::COLLECTION,
            CsvKind::Routes | CsvKind::Stores => RouteTerritory::COLLECTION,
        }
    }
}

/// A data row that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SkippedRow {
    /// 1-based line number in the file, counting the header.
    pub row: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CsvImportResult {
    pub success: bool,
    pub message: String,
    pub records_processed: usize,
    pub skipped: Vec<SkippedRow>,
}

/// One data row as header → value pairs.
struct Row {
    line: u64,
    fields: Vec<(String, String)>,
}

impl Row {
    /// First candidate header, compared case-insensitively, with a non-empty
    /// value.
    fn field(&self, candidates: &[&str]) -> Option<&str> {
        candidates.iter().find_map(|candidate| {
            self.fields
                .iter()
                .find(|(header, value)| header.eq_ignore_ascii_case(candidate) && !value.is_empty())
                .map(|(_, value)| value.as_str())
        })
    }

    /// Missing counts are 0; present ones must start with a non-negative
    /// integer.
    fn count(&self, candidates: &[&str], label: &str) -> Result<u32, String> {
        match self.field(candidates) {
            None => Ok(0),
            Some(raw) => parse_leading_int(raw)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| format!("invalid {label} value {raw:?}")),
        }
    }
}

/// Integer formed by an optional sign and the leading digits of `raw`, so
/// `"12 cases"` is 12 and `"cases"` is `None`.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    let value: i64 = rest[..digits_len].parse().ok()?;
    Some(if negative { -value } else { value })
}

fn parse_rows(bytes: &[u8]) -> Result<Vec<Row>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        rows.push(Row { line, fields });
    }
    Ok(rows)
}

/// Tally of a best-effort pass over the rows.
#[derive(Default)]
struct Outcome {
    processed: usize,
    skipped: Vec<SkippedRow>,
}

impl Outcome {
    fn skip(&mut self, line: u64, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(row = line, reason = %reason, "Skipping CSV row");
        self.skipped.push(SkippedRow { row: line, reason });
    }
}

pub struct CsvImporter {
    blobs: Arc<dyn BlobStore>,
}

impl CsvImporter {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Archives the upload, then writes its rows into the gateway's business.
    /// Only archival and parse failures fail the import; bad rows are
    /// reported in `skipped`.
    pub async fn import(
        &self,
        gateway: &BusinessGateway,
        kind: CsvKind,
        filename: &str,
        bytes: &[u8],
    ) -> CsvImportResult {
        match self.try_import(gateway, kind, filename, bytes).await {
            Ok(outcome) => {
                info!(
                    business_id = %gateway.business_id(),
                    kind = %kind,
                    processed = outcome.processed,
                    skipped = outcome.skipped.len(),
                    "CSV import finished"
                );
                CsvImportResult {
                    success: true,
                    message: format!("Successfully imported {} {kind}", outcome.processed),
                    records_processed: outcome.processed,
                    skipped: outcome.skipped,
                }
            }
            Err(e) => {
                warn!(
                    business_id = %gateway.business_id(),
                    kind = %kind,
                    error = %e,
                    "CSV import failed"
                );
                CsvImportResult {
                    success: false,
                    message: e.to_string(),
                    records_processed: 0,
                    skipped: Vec::new(),
                }
            }
        }
    }

    async fn try_import(
        &self,
        gateway: &BusinessGateway,
        kind: CsvKind,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Outcome, CsvImportError> {
        let path = csv_upload_path(
            gateway.business_id(),
            Utc::now().timestamp_millis(),
            filename,
        );
        self.blobs.put(&path, bytes).await?;

        let rows = parse_rows(bytes)?;
        match kind {
            CsvKind::Products => Ok(import_products(gateway, rows).await),
            CsvKind::Routes => Ok(import_routes(gateway, rows).await),
            CsvKind::Stores => import_stores(gateway, rows).await,
        }
    }
}

fn product_from_row(row: &Row) -> Result<CreateProduct, String> {
    let name = row
        .field(PRODUCT_NAME)
        .ok_or_else(|| "missing product name".to_string())?;
    Ok(CreateProduct {
        name: name.to_string(),
        category: ProductCategory::from_free_text(row.field(PRODUCT_CATEGORY).unwrap_or_default()),
        current_inventory: row.count(PRODUCT_INVENTORY, "inventory")?,
        last_order_quantity: row.count(PRODUCT_LAST_ORDER, "last order")?,
    })
}

async fn import_products(gateway: &BusinessGateway, rows: Vec<Row>) -> Outcome {
    let mut outcome = Outcome::default();
    for row in rows {
        let product = match product_from_row(&row) {
            Ok(product) => product,
            Err(reason) => {
                outcome.skip(row.line, reason);
                continue;
            }
        };
        match gateway.products().add(&product).await {
            Ok(_) => outcome.processed += 1,
            Err(e) => outcome.skip(row.line, e.to_string()),
        }
    }
    outcome
}

async fn import_routes(gateway: &BusinessGateway, rows: Vec<Row>) -> Outcome {
    let mut outcome = Outcome::default();
    for row in rows {
        let Some(name) = row.field(ROUTE_NAME) else {
            outcome.skip(row.line, "missing route name");
            continue;
        };
        match gateway.routes().add(&CreateRoute::named(name)).await {
            Ok(_) => outcome.processed += 1,
            Err(e) => outcome.skip(row.line, e.to_string()),
        }
    }
    outcome
}

/// Groups store rows by route name and appends each group to every existing
/// route with that exact name. Existing stores are kept.
async fn import_stores(gateway: &BusinessGateway, rows: Vec<Row>) -> Result<Outcome, CsvImportError> {
    let mut outcome = Outcome::default();
    let mut by_route: BTreeMap<String, Vec<(u64, Store)>> = BTreeMap::new();
    for row in rows {
        let (Some(route), Some(name)) = (row.field(STORE_ROUTE), row.field(STORE_NAME)) else {
            outcome.skip(row.line, "missing route or store name");
            continue;
        };
        let address = row.field(STORE_ADDRESS).unwrap_or_default();
        by_route
            .entry(route.to_string())
            .or_default()
            .push((row.line, Store::with_generated_id(name, address)));
    }
    if by_route.is_empty() {
        return Ok(outcome);
    }

    let routes = gateway.routes().get_all().await?;
    for (route_name, new_stores) in by_route {
        let targets: Vec<&RouteTerritory> =
            routes.iter().filter(|route| route.name == route_name).collect();
        if targets.is_empty() {
            for (line, _) in &new_stores {
                outcome.skip(*line, format!("no route named {route_name:?}"));
            }
            continue;
        }

        for route in targets {
            let mut stores = route.stores.clone();
            stores.extend(new_stores.iter().map(|(_, store)| store.clone()));
            match gateway
                .routes()
                .update(&route.id, &UpdateRoute::stores(stores))
                .await
            {
                Ok(()) => outcome.processed += new_stores.len(),
                Err(e) => {
                    for (line, _) in &new_stores {
                        outcome.skip(*line, e.to_string());
                    }
                }
            }
        }
    }
    Ok(outcome)
}
