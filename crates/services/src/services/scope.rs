//! Role-based selection of the data a session loads.
//!
//! This is a data-minimization filter applied before fetching. Access rules
//! for the document store itself must be enforced by the store.

use db::{
    BusinessGateway, GatewayError,
    models::account::{Role, UserProfile},
};
use tracing::{debug, info};

use super::sync::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    /// Every collection, unfiltered.
    Owner,
    /// All products, the member's own employee record and its assigned
    /// routes. Trucks and sale alerts are never loaded.
    Member { employee_id: Option<String> },
}

impl AccessScope {
    pub fn for_profile(profile: &UserProfile) -> Self {
        match profile.role {
            Role::Owner => AccessScope::Owner,
            Role::Member => AccessScope::Member {
                employee_id: profile.employee_id.clone(),
            },
        }
    }

    /// Reads the dataset visible under this scope.
    pub async fn load(&self, gateway: &BusinessGateway) -> Result<Snapshot, GatewayError> {
        match self {
            AccessScope::Owner => {
                let products = gateway.products();
                let employees = gateway.employees();
                let trucks = gateway.trucks();
                let sale_alerts = gateway.sale_alerts();
                let routes = gateway.routes();
                let (products, employees, trucks, sale_alerts, routes) = tokio::try_join!(
                    products.get_all(),
                    employees.get_all(),
                    trucks.get_all(),
                    sale_alerts.get_all(),
                    routes.get_all(),
                )?;
                debug!(
                    business_id = %gateway.business_id(),
                    products = products.len(),
                    employees = employees.len(),
                    trucks = trucks.len(),
                    routes = routes.len(),
                    "Loaded owner dataset"
                );
                Ok(Snapshot {
                    products,
                    employees,
                    trucks,
                    sale_alerts,
                    routes,
                })
            }
            AccessScope::Member { employee_id } => {
                let Some(employee_id) = employee_id else {
                    info!(
                        business_id = %gateway.business_id(),
                        "Member profile has no employee link; loading nothing"
                    );
                    return Ok(Snapshot::default());
                };
                let Some(employee) = gateway.employees().get_one(employee_id).await? else {
                    info!(
                        business_id = %gateway.business_id(),
                        employee_id = %employee_id,
                        "Member employee record not found; loading nothing"
                    );
                    return Ok(Snapshot::default());
                };

                let products = gateway.products();
                let (products, routes) = tokio::try_join!(
                    products.get_all(),
                    gateway.routes_for_member(&employee.assigned_routes),
                )?;
                Ok(Snapshot {
                    products,
                    employees: vec![employee],
                    trucks: Vec::new(),
                    sale_alerts: Vec::new(),
                    routes,
                })
            }
        }
    }
}
