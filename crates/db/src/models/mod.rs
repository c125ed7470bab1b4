pub mod account;
pub mod employee;
pub mod product;
pub mod route;
pub mod sale_alert;
pub mod truck;

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// A business-scoped document type stored in its own collection.
pub trait Entity: DeserializeOwned + Serialize + Clone + Send + Sync + 'static {
    /// Collection name under `businesses/{businessId}/`.
    const COLLECTION: &'static str;

    /// Payload accepted by `add`; carries every field except the id.
    type Create: Serialize + Send + Sync;

    /// Partial payload accepted by `update`; absent fields are left untouched.
    type Update: Serialize + Send + Sync;

    fn id(&self) -> &str;
}

/// One failed form-level check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Local validation failure, raised before any remote call is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "validation failed ({})", messages.join("; "))
    }
}

impl ValidationError {
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

/// Accumulates field errors for a single payload.
#[derive(Debug, Default)]
pub(crate) struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub(crate) fn required(&mut self, field: &'static str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.fail(field, message);
        }
    }

    pub(crate) fn check(&mut self, ok: bool, field: &'static str, message: &str) {
        if !ok {
            self.fail(field, message);
        }
    }

    fn fail(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    pub(crate) fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}
