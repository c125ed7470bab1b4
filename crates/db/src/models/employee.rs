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
pub enum EmployeeRole {
    Executive,
    #[default]
    Driver,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Break,
    Off,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceType {
    Work,
    Vacation,
    Sick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SalesRecord {
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub late_start: bool,
    pub late_finish: bool,
    #[serde(rename = "type")]
    pub kind: AttendanceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub role: EmployeeRole,
    pub hours_this_week: f64,
    pub engagement_score: u8,
    pub status: EmployeeStatus,
    #[serde(default)]
    pub sales_history: Vec<SalesRecord>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    pub vacation_days_used: u32,
    pub sick_days_used: u32,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Route ids this employee may see; editable by owners only.
    #[serde(default)]
    pub assigned_routes: Vec<String>,
}

/// Employees can exist before any login account is linked, so `user_id` and
/// `email` are written as null and `assigned_routes` as empty when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployee {
    pub name: String,
    pub role: EmployeeRole,
    pub hours_this_week: f64,
    pub engagement_score: u8,
    pub status: EmployeeStatus,
    #[serde(default)]
    pub sales_history: Vec<SalesRecord>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    pub vacation_days_used: u32,
    pub sick_days_used: u32,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub assigned_routes: Vec<String>,
}

impl CreateEmployee {
    pub fn new(name: impl Into<String>, role: EmployeeRole) -> Self {
        Self {
            name: name.into(),
            role,
            hours_this_week: 0.0,
            engagement_score: 100,
            status: EmployeeStatus::Active,
            sales_history: Vec::new(),
            attendance: Vec::new(),
            vacation_days_used: 0,
            sick_days_used: 0,
            user_id: None,
            email: None,
            assigned_routes: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        v.required("name", &self.name, "Name is required");
        check_hours(&mut v, self.hours_this_week);
        check_engagement(&mut v, self.engagement_score);
        v.finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployee {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<EmployeeRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_this_week: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EmployeeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_history: Option<Vec<SalesRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<Vec<AttendanceRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vacation_days_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sick_days_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_routes: Option<Vec<String>>,
}

impl UpdateEmployee {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        if let Some(name) = &self.name {
            v.required("name", name, "Name is required");
        }
        if let Some(hours) = self.hours_this_week {
            check_hours(&mut v, hours);
        }
        if let Some(score) = self.engagement_score {
            check_engagement(&mut v, score);
        }
        v.finish()
    }
}

fn check_hours(v: &mut Validator, hours: f64) {
    v.check(
        hours.is_finite() && hours >= 0.0,
        "hoursThisWeek",
        "Hours must be 0 or greater",
    );
}

fn check_engagement(v: &mut Validator, score: u8) {
    v.check(
        score <= 100,
        "engagementScore",
        "Engagement score must be between 0 and 100",
    );
}

impl Entity for Employee {
    const COLLECTION: &'static str = "employees";
    type Create = CreateEmployee;
    type Update = UpdateEmployee;

    fn id(&self) -> &str {
        &self.id
    }
}
