use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{Entity, ValidationError, Validator};

/// A promotion reported by a store contact. `store_name` is free text, not a
/// reference to a [`Store`](super::route::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SaleAlert {
    pub id: String,
    pub store_name: String,
    pub promo_type: String,
    pub date: String,
    pub contact_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleAlert {
    pub store_name: String,
    pub promo_type: String,
    pub date: String,
    pub contact_name: String,
}

impl CreateSaleAlert {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        v.required("storeName", &self.store_name, "Store name is required");
        v.required("promoType", &self.promo_type, "Promo type is required");
        v.required("date", &self.date, "Date is required");
        v.required("contactName", &self.contact_name, "Contact name is required");
        v.finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleAlert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
}

impl UpdateSaleAlert {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        for (field, value, message) in [
            ("storeName", &self.store_name, "Store name is required"),
            ("promoType", &self.promo_type, "Promo type is required"),
            ("date", &self.date, "Date is required"),
            ("contactName", &self.contact_name, "Contact name is required"),
        ] {
            if let Some(value) = value {
                v.required(field, value, message);
            }
        }
        v.finish()
    }
}

impl Entity for SaleAlert {
    const COLLECTION: &'static str = "saleAlerts";
    type Create = CreateSaleAlert;
    type Update = UpdateSaleAlert;

    fn id(&self) -> &str {
        &self.id
    }
}
