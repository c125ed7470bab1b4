use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::{Entity, ValidationError, Validator};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Good,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct MaintenanceRecord {
    pub date: NaiveDate,
    pub service: String,
    pub cost: f64,
    pub provider: String,
}

impl MaintenanceRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        v.required("service", &self.service, "Service description is required");
        v.check(
            self.cost.is_finite() && self.cost >= 0.0,
            "cost",
            "Cost must be 0 or greater",
        );
        v.required("provider", &self.provider, "Service provider is required");
        v.finish()
    }
}

/// Height and length in feet, weight in pounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct Dimensions {
    pub height: f64,
    pub length: f64,
    pub weight: f64,
}

/// Remaining life of wear parts, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct Upkeep {
    pub tires: u8,
    pub oil: u8,
    pub brakes: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Truck {
    pub id: String,
    pub plate: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub mileage: u64,
    pub last_service: NaiveDate,
    pub health_status: HealthStatus,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub maintenance_history: Vec<MaintenanceRecord>,
    pub registration_expiry: NaiveDate,
    pub insurance_expiry: NaiveDate,
    pub dimensions: Dimensions,
    pub upkeep: Upkeep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateTruck {
    pub plate: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub mileage: u64,
    pub last_service: NaiveDate,
    pub health_status: HealthStatus,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub maintenance_history: Vec<MaintenanceRecord>,
    pub registration_expiry: NaiveDate,
    pub insurance_expiry: NaiveDate,
    pub dimensions: Dimensions,
    pub upkeep: Upkeep,
}

impl CreateTruck {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        v.required("plate", &self.plate, "Plate number is required");
        v.required("type", &self.kind, "Truck type is required");
        check_dimensions(&mut v, &self.dimensions);
        check_upkeep(&mut v, &self.upkeep);
        v.finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTruck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_service: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_status: Option<HealthStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_history: Option<Vec<MaintenanceRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_expiry: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_expiry: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upkeep: Option<Upkeep>,
}

impl UpdateTruck {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        if let Some(plate) = &self.plate {
            v.required("plate", plate, "Plate number is required");
        }
        if let Some(kind) = &self.kind {
            v.required("type", kind, "Truck type is required");
        }
        if let Some(dimensions) = &self.dimensions {
            check_dimensions(&mut v, dimensions);
        }
        if let Some(upkeep) = &self.upkeep {
            check_upkeep(&mut v, upkeep);
        }
        v.finish()
    }
}

fn check_dimensions(v: &mut Validator, dimensions: &Dimensions) {
    let positive = |x: f64| x.is_finite() && x > 0.0;
    v.check(positive(dimensions.height), "height", "Height must be greater than 0");
    v.check(positive(dimensions.length), "length", "Length must be greater than 0");
    v.check(positive(dimensions.weight), "weight", "Weight must be greater than 0");
}

fn check_upkeep(v: &mut Validator, upkeep: &Upkeep) {
    for (field, value) in [
        ("tires", upkeep.tires),
        ("oil", upkeep.oil),
        ("brakes", upkeep.brakes),
    ] {
        v.check(value <= 100, field, "Upkeep must be between 0 and 100");
    }
}

impl Entity for Truck {
    const COLLECTION: &'static str = "trucks";
    type Create = CreateTruck;
    type Update = UpdateTruck;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CreateTruck {
        CreateTruck {
            plate: "GMC-06-01".to_string(),
            kind: "2006 GMC 16ft Box".to_string(),
            mileage: 142_000,
            last_service: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            health_status: HealthStatus::Good,
            issues: vec![],
            maintenance_history: vec![],
            registration_expiry: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            insurance_expiry: NaiveDate::from_ymd_opt(2024, 9, 15).unwrap(),
            dimensions: Dimensions {
                height: 11.5,
                length: 24.0,
                weight: 14_500.0,
            },
            upkeep: Upkeep {
                tires: 85,
                oil: 90,
                brakes: 75,
            },
        }
    }

    #[test]
    fn serializes_type_and_camel_case_fields() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["type"], "2006 GMC 16ft Box");
        assert_eq!(value["lastService"], "2024-03-15");
        assert_eq!(value["healthStatus"], "good");
    }

    #[test]
    fn zero_height_and_overfull_upkeep_are_rejected() {
        let mut truck = sample();
        truck.dimensions.height = 0.0;
        truck.upkeep.oil = 120;
        let err = truck.validate().unwrap_err();
        assert!(err.has_field("height"));
        assert!(err.has_field("oil"));
        assert!(!err.has_field("plate"));
    }

    #[test]
    fn maintenance_record_requires_service_and_provider() {
        let record = MaintenanceRecord {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            service: String::new(),
            cost: -5.0,
            provider: " ".to_string(),
        };
        let err = record.validate().unwrap_err();
        assert_eq!(err.errors.len(), 3);
    }
}
