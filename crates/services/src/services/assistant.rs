//! Order suggestions, operations chat and truck routing.
//!
//! [`ClaudeAssistant`] talks to the hosted model; [`OfflineAssistant`] gives
//! deterministic answers when no credential is configured or the hosted call
//! fails. Neither returns errors: callers always get something to show.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use db::models::{
    employee::{EmployeeStatus, UpdateEmployee},
    product::{Product, UpdateProduct},
    truck::{HealthStatus, Truck, UpdateTruck},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::config::Config;

use super::{
    claude_api::{ClaudeApiClient, Message, ToolDefinition},
    sync::{SyncContext, SyncError},
};

const OFFLINE_SUGGESTION_COUNT: usize = 3;
const OFFLINE_SUGGESTION_BUMP: u32 = 20;
const OFFLINE_REASON: &str = "Offline mode - configure ANTHROPIC_API_KEY for tailored suggestions";
const HISTORICAL_REASON: &str = "Historical average (assistant unavailable)";
const CHAT_UNAVAILABLE: &str = "The assistant is currently unavailable. Set ANTHROPIC_API_KEY to enable it.";
const CHAT_FAILED: &str = "I'm having trouble reaching the assistant service right now. Please try again.";
const CHAT_DONE: &str = "I've processed your request and updated the system.";
const ROUTE_UNAVAILABLE: &str = "Truck-safe routing unavailable - configure ANTHROPIC_API_KEY";
const ROUTE_FAILED: &str =
    "Failed to calculate a truck-safe route. Please use commercial truck route maps.";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SmartSuggestion {
    pub product_id: String,
    pub recommended_qty: u32,
    pub reason: String,
    pub impact_level: ImpactLevel,
}

/// Status values the chat tool accepts. Vacation and sick are recorded as
/// `off` plus a day counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StatusChange {
    Active,
    Break,
    Off,
    Vacation,
    Sick,
}

/// An operational change requested by the chat model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "name",
    content = "input",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ToolCall {
    UpdateOrderQuantity {
        product_id: String,
        new_quantity: f64,
        #[serde(default)]
        reason: Option<String>,
    },
    UpdateEmployeeStatus {
        employee_id: String,
        status: StatusChange,
        #[serde(default)]
        note: Option<String>,
    },
    ReportTruckIssue {
        truck_id: String,
        #[serde(default)]
        issue: Option<String>,
        health_status: HealthStatus,
    },
}

impl ToolCall {
    pub fn from_tool_use(name: &str, input: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json!({ "name": name, "input": input }))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::UpdateOrderQuantity { .. } => "update_order_quantity",
            ToolCall::UpdateEmployeeStatus { .. } => "update_employee_status",
            ToolCall::ReportTruckIssue { .. } => "report_truck_issue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatReply {
    fn text_only(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RouteDirections {
    pub route: String,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    async fn suggest_order_quantities(
        &self,
        products: &[Product],
        date: NaiveDate,
    ) -> Vec<SmartSuggestion>;

    async fn chat(&self, message: &str) -> ChatReply;

    async fn truck_safe_route(
        &self,
        origin: &str,
        destination: &str,
        truck: &Truck,
    ) -> RouteDirections;
}

/// Deterministic answers that need no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAssistant;

impl OfflineAssistant {
    /// Every product at 110% of its last order, rounded down.
    pub fn historical_average(products: &[Product]) -> Vec<SmartSuggestion> {
        products
            .iter()
            .map(|product| SmartSuggestion {
                product_id: product.id.clone(),
                recommended_qty: product.last_order_quantity.saturating_mul(11) / 10,
                reason: HISTORICAL_REASON.to_string(),
                impact_level: ImpactLevel::Low,
            })
            .collect()
    }
}

#[async_trait]
impl Assistant for OfflineAssistant {
    async fn suggest_order_quantities(
        &self,
        products: &[Product],
        _date: NaiveDate,
    ) -> Vec<SmartSuggestion> {
        let impacts = [ImpactLevel::High, ImpactLevel::Medium, ImpactLevel::Low];
        products
            .iter()
            .take(OFFLINE_SUGGESTION_COUNT)
            .zip(impacts)
            .map(|(product, impact_level)| SmartSuggestion {
                product_id: product.id.clone(),
                recommended_qty: product
                    .last_order_quantity
                    .saturating_add(OFFLINE_SUGGESTION_BUMP),
                reason: OFFLINE_REASON.to_string(),
                impact_level,
            })
            .collect()
    }

    async fn chat(&self, _message: &str) -> ChatReply {
        ChatReply::text_only(CHAT_UNAVAILABLE)
    }

    async fn truck_safe_route(
        &self,
        origin: &str,
        destination: &str,
        _truck: &Truck,
    ) -> RouteDirections {
        RouteDirections {
            route: format!("{origin} → {destination}"),
            warnings: vec![ROUTE_UNAVAILABLE.to_string()],
        }
    }
}

fn agent_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "update_order_quantity",
            description: "Updates the order quantity for a specific product.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "productId": {"type": "string", "description": "The id or name of the product."},
                    "newQuantity": {"type": "number", "description": "The new order quantity."},
                    "reason": {"type": "string", "description": "Brief reason for the override."}
                },
                "required": ["productId", "newQuantity"]
            }),
        },
        ToolDefinition {
            name: "update_employee_status",
            description: "Updates a team member's status or logs a sick or vacation day.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "employeeId": {"type": "string", "description": "The name or id of the employee."},
                    "status": {"type": "string", "enum": ["active", "break", "off", "vacation", "sick"]},
                    "note": {"type": "string", "description": "Note about the change."}
                },
                "required": ["employeeId", "status"]
            }),
        },
        ToolDefinition {
            name: "report_truck_issue",
            description: "Logs a maintenance issue or updates the health status of a truck.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "truckId": {"type": "string", "description": "The plate or id of the truck."},
                    "issue": {"type": "string", "description": "Description of the problem."},
                    "healthStatus": {"type": "string", "enum": ["good", "warning", "critical"]}
                },
                "required": ["truckId", "healthStatus"]
            }),
        },
    ]
}

const SUGGESTION_SYSTEM: &str = "You are a logistics expert for a bread route distributor. \
Answer with a JSON array only, one object per product with the keys productId, \
recommendedQty (integer), reason and impactLevel (low, medium or high).";

const CHAT_SYSTEM: &str = "You are the operations assistant for a bread route distribution \
business. You help the owners manage products, drivers, routes and the truck fleet. \
Be professional and proactive. Answer business questions directly and use the provided \
tools when asked to change orders, employee status or truck health.";

pub struct ClaudeAssistant {
    client: ClaudeApiClient,
}

impl ClaudeAssistant {
    pub fn new(client: ClaudeApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Assistant for ClaudeAssistant {
    async fn suggest_order_quantities(
        &self,
        products: &[Product],
        date: NaiveDate,
    ) -> Vec<SmartSuggestion> {
        let catalog = serde_json::to_string(products).unwrap_or_default();
        let prompt = format!(
            "Suggest order quantities based on seasonal trends.\n\
             Current date: {date}\n\
             Products: {catalog}\n\n\
             Market rules:\n\
             1. Hamburger and hot dog bun demand surges 3x-5x in summer, fall and around \
             BBQ holidays (Memorial Day, July 4th, Labor Day).\n\
             2. Snack cake demand doubles in winter and cold weather.\n\
             3. Sliced bread is stable but dips slightly in summer."
        );
        match self
            .client
            .ask_json::<Vec<SmartSuggestion>>(&prompt, Some(SUGGESTION_SYSTEM))
            .await
        {
            Ok(suggestions) => suggestions,
            Err(e) => {
                warn!(error = %e, "Order suggestions failed; using historical average");
                OfflineAssistant::historical_average(products)
            }
        }
    }

    async fn chat(&self, message: &str) -> ChatReply {
        let tools = agent_tools();
        let response = match self
            .client
            .complete(&[Message::user(message)], Some(CHAT_SYSTEM), &tools, 1024)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Assistant chat failed");
                return ChatReply::text_only(CHAT_FAILED);
            }
        };

        let tool_calls = response
            .tool_uses()
            .into_iter()
            .filter_map(|(name, input)| match ToolCall::from_tool_use(name, input) {
                Ok(call) => Some(call),
                Err(e) => {
                    warn!(tool = name, error = %e, "Ignoring malformed tool call");
                    None
                }
            })
            .collect();
        let text = response.text();
        ChatReply {
            text: if text.trim().is_empty() {
                CHAT_DONE.to_string()
            } else {
                text
            },
            tool_calls,
        }
    }

    async fn truck_safe_route(
        &self,
        origin: &str,
        destination: &str,
        truck: &Truck,
    ) -> RouteDirections {
        let dims = truck.dimensions;
        let prompt = format!(
            "Give truck-safe driving directions from \"{origin}\" to \"{destination}\".\n\
             Truck constraints:\n\
             - Height: {} feet\n\
             - Weight: {} lbs\n\
             - Length: {} feet\n\n\
             Avoid parkways where trucks are prohibited (such as the Merritt Parkway and \
             the Hutchinson River Parkway) and any bridge with clearance below {} feet. \
             Provide step-by-step directions that respect these constraints.",
            dims.height,
            dims.weight,
            dims.length,
            dims.height + 0.5,
        );
        match self
            .client
            .complete(&[Message::user(prompt)], None, &[], 2048)
            .await
        {
            Ok(response) => RouteDirections {
                route: response.text(),
                warnings: Vec::new(),
            },
            Err(e) => {
                warn!(error = %e, "Truck routing failed");
                RouteDirections {
                    route: ROUTE_FAILED.to_string(),
                    warnings: vec![e.to_string()],
                }
            }
        }
    }
}

/// Hosted assistant when a usable credential is configured, otherwise the
/// offline one.
pub fn assistant_from_config(config: &Config) -> Arc<dyn Assistant> {
    let Some(api_key) = config.assistant_api_key() else {
        info!("No assistant credential configured; using offline assistant");
        return Arc::new(OfflineAssistant);
    };
    match ClaudeApiClient::new(api_key, config.model.clone()) {
        Ok(client) => {
            info!(model = client.model(), "Using hosted assistant");
            Arc::new(ClaudeAssistant::new(client))
        }
        Err(e) => {
            warn!(error = %e, "Could not build assistant client; using offline assistant");
            Arc::new(OfflineAssistant)
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no product matches {0:?}")]
    UnknownProduct(String),
    #[error("no employee matches {0:?}")]
    UnknownEmployee(String),
    #[error("no truck matches {0:?}")]
    UnknownTruck(String),
    #[error("invalid order quantity {0}")]
    InvalidQuantity(f64),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Carries out a tool call through the context's mutations and returns a
/// short description of what changed.
pub async fn apply_tool_call(ctx: &SyncContext, call: &ToolCall) -> Result<String, ToolError> {
    let snapshot = ctx.snapshot();
    match call {
        ToolCall::UpdateOrderQuantity {
            product_id,
            new_quantity,
            ..
        } => {
            let product = snapshot
                .products
                .iter()
                .find(|p| p.id == *product_id || p.name.eq_ignore_ascii_case(product_id))
                .ok_or_else(|| ToolError::UnknownProduct(product_id.clone()))?;
            if !new_quantity.is_finite() || *new_quantity < 0.0 || *new_quantity > f64::from(u32::MAX)
            {
                return Err(ToolError::InvalidQuantity(*new_quantity));
            }
            let quantity = new_quantity.round() as u32;
            ctx.update_product(
                &product.id,
                UpdateProduct {
                    last_order_quantity: Some(quantity),
                    ..Default::default()
                },
            )
            .await?;
            Ok(format!("Set {} order quantity to {quantity}", product.name))
        }
        ToolCall::UpdateEmployeeStatus {
            employee_id,
            status,
            ..
        } => {
            let employee = snapshot
                .employees
                .iter()
                .find(|e| {
                    e.id == *employee_id
                        || e.name.eq_ignore_ascii_case(employee_id)
                        || e.name
                            .split_whitespace()
                            .next()
                            .is_some_and(|first| first.eq_ignore_ascii_case(employee_id))
                })
                .ok_or_else(|| ToolError::UnknownEmployee(employee_id.clone()))?;
            let mut changes = UpdateEmployee::default();
            match status {
                StatusChange::Active => changes.status = Some(EmployeeStatus::Active),
                StatusChange::Break => changes.status = Some(EmployeeStatus::Break),
                StatusChange::Off => changes.status = Some(EmployeeStatus::Off),
                StatusChange::Vacation => {
                    changes.status = Some(EmployeeStatus::Off);
                    changes.vacation_days_used = Some(employee.vacation_days_used + 1);
                }
                StatusChange::Sick => {
                    changes.status = Some(EmployeeStatus::Off);
                    changes.sick_days_used = Some(employee.sick_days_used + 1);
                }
            }
            ctx.update_employee(&employee.id, changes).await?;
            Ok(format!("Marked {} as {status}", employee.name))
        }
        ToolCall::ReportTruckIssue {
            truck_id,
            issue,
            health_status,
        } => {
            let truck = snapshot
                .trucks
                .iter()
                .find(|t| t.id == *truck_id || t.plate.eq_ignore_ascii_case(truck_id))
                .ok_or_else(|| ToolError::UnknownTruck(truck_id.clone()))?;
            let mut changes = UpdateTruck {
                health_status: Some(*health_status),
                ..Default::default()
            };
            if let Some(issue) = issue.as_deref().map(str::trim).filter(|i| !i.is_empty()) {
                let mut issues = truck.issues.clone();
                issues.push(issue.to_string());
                changes.issues = Some(issues);
            }
            ctx.update_truck(&truck.id, changes).await?;
            Ok(format!("Truck {} is now {health_status}", truck.plate))
        }
    }
}

#[cfg(test)]
mod tests {
    use db::{
        BusinessGateway, DocumentStore, InMemoryDocumentStore,
        models::{
            account::{Role, UserProfile},
            employee::{CreateEmployee, EmployeeRole},
            product::{CreateProduct, ProductCategory},
            truck::{CreateTruck, Dimensions, Upkeep},
        },
    };

    use super::*;

    fn product(id: &str, last_order_quantity: u32) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            category: ProductCategory::Buns,
            current_inventory: 0,
            last_order_quantity,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    #[tokio::test]
    async fn offline_suggestions_cover_first_three_products() {
        let products: Vec<Product> = (1..=5).map(|i| product(&i.to_string(), 100)).collect();
        let suggestions = OfflineAssistant
            .suggest_order_quantities(&products, date())
            .await;

        assert_eq!(suggestions.len(), 3);
        assert!(suggestions.iter().all(|s| s.recommended_qty == 120));
        let impacts: Vec<ImpactLevel> = suggestions.iter().map(|s| s.impact_level).collect();
        assert_eq!(
            impacts,
            vec![ImpactLevel::High, ImpactLevel::Medium, ImpactLevel::Low]
        );
    }

    #[test]
    fn historical_average_rounds_down() {
        let suggestions =
            OfflineAssistant::historical_average(&[product("1", 45), product("2", 0)]);
        assert_eq!(suggestions[0].recommended_qty, 49);
        assert_eq!(suggestions[1].recommended_qty, 0);
        assert!(suggestions.iter().all(|s| s.impact_level == ImpactLevel::Low));
    }

    #[test]
    fn suggestions_parse_from_model_json() {
        let parsed: Vec<SmartSuggestion> = serde_json::from_value(json!([
            {"productId": "1", "recommendedQty": 300, "reason": "July 4th", "impactLevel": "high"}
        ]))
        .unwrap();
        assert_eq!(parsed[0].impact_level, ImpactLevel::High);
        assert_eq!(parsed[0].recommended_qty, 300);
    }

    #[test]
    fn tool_calls_parse_from_tool_use_blocks() {
        let call = ToolCall::from_tool_use(
            "update_employee_status",
            &json!({"employeeId": "Andres", "status": "sick", "note": "flu"}),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::UpdateEmployeeStatus {
                employee_id: "Andres".to_string(),
                status: StatusChange::Sick,
                note: Some("flu".to_string()),
            }
        );
        assert_eq!(call.name(), "update_employee_status");

        assert!(ToolCall::from_tool_use("launch_rocket", &json!({})).is_err());
        assert!(
            ToolCall::from_tool_use("report_truck_issue", &json!({"truckId": "t1"})).is_err()
        );
    }

    #[tokio::test]
    async fn config_without_key_selects_offline_chat() {
        let config = Config::from_lookup(|_| None).unwrap();
        let reply = assistant_from_config(&config).chat("status?").await;
        assert_eq!(reply.text, CHAT_UNAVAILABLE);
        assert!(reply.tool_calls.is_empty());
    }

    fn truck(plate: &str) -> CreateTruck {
        let date = date();
        CreateTruck {
            plate: plate.to_string(),
            kind: "GMC 2006 16ft Box Truck".to_string(),
            mileage: 187000,
            last_service: date,
            health_status: HealthStatus::Good,
            issues: vec!["Rear door sticks".to_string()],
            maintenance_history: Vec::new(),
            registration_expiry: date,
            insurance_expiry: date,
            dimensions: Dimensions {
                height: 11.5,
                length: 16.0,
                weight: 14500.0,
            },
            upkeep: Upkeep {
                tires: 60,
                oil: 40,
                brakes: 70,
            },
        }
    }

    async fn context() -> SyncContext {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let gateway = BusinessGateway::new("biz_tools", store.clone());
        gateway
            .products()
            .set(
                "1",
                &CreateProduct {
                    name: "Hamburger Buns".to_string(),
                    category: ProductCategory::Buns,
                    current_inventory: 45,
                    last_order_quantity: 120,
                },
            )
            .await
            .unwrap();
        gateway
            .employees()
            .set("driver-1", &CreateEmployee::new("Andres Lopez", EmployeeRole::Driver))
            .await
            .unwrap();
        gateway.trucks().set("t1", &truck("GMC-06-01")).await.unwrap();

        let ctx = SyncContext::default();
        let owner = UserProfile {
            email: "owner@example.com".to_string(),
            display_name: "Owner".to_string(),
            role: Role::Owner,
            business_id: "biz_tools".to_string(),
            employee_id: None,
        };
        ctx.start_session(store, &owner).await;
        ctx
    }

    #[tokio::test]
    async fn tool_calls_apply_through_the_context() {
        let ctx = context().await;

        apply_tool_call(
            &ctx,
            &ToolCall::UpdateOrderQuantity {
                product_id: "hamburger buns".to_string(),
                new_quantity: 300.0,
                reason: None,
            },
        )
        .await
        .unwrap();
        apply_tool_call(
            &ctx,
            &ToolCall::UpdateEmployeeStatus {
                employee_id: "andres".to_string(),
                status: StatusChange::Vacation,
                note: None,
            },
        )
        .await
        .unwrap();
        apply_tool_call(
            &ctx,
            &ToolCall::ReportTruckIssue {
                truck_id: "gmc-06-01".to_string(),
                issue: Some("Brake light out".to_string()),
                health_status: HealthStatus::Warning,
            },
        )
        .await
        .unwrap();

        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.products[0].last_order_quantity, 300);
        let andres = &snapshot.employees[0];
        assert_eq!(andres.status, EmployeeStatus::Off);
        assert_eq!(andres.vacation_days_used, 1);
        assert_eq!(andres.sick_days_used, 0);
        let truck = &snapshot.trucks[0];
        assert_eq!(truck.health_status, HealthStatus::Warning);
        assert_eq!(truck.issues, vec!["Rear door sticks", "Brake light out"]);
    }

    #[tokio::test]
    async fn unknown_targets_and_bad_quantities_are_rejected() {
        let ctx = context().await;
        let err = apply_tool_call(
            &ctx,
            &ToolCall::UpdateEmployeeStatus {
                employee_id: "Nobody".to_string(),
                status: StatusChange::Sick,
                note: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::UnknownEmployee(_)));

        let err = apply_tool_call(
            &ctx,
            &ToolCall::UpdateOrderQuantity {
                product_id: "1".to_string(),
                new_quantity: -5.0,
                reason: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidQuantity(_)));
    }
}
