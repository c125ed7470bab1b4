use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::{Entity, ValidationError, Validator};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProductCategory {
    Buns,
    Bread,
    #[default]
    Snacks,
}

impl ProductCategory {
    /// Maps free text onto a category by substring: "bun" wins over
    /// "bread"/"loaf", anything else is snacks.
    pub fn from_free_text(text: &str) -> Self {
        let normalized = text.trim().to_lowercase();
        if normalized.contains("bun") {
            ProductCategory::Buns
        } else if normalized.contains("bread") || normalized.contains("loaf") {
            ProductCategory::Bread
        } else {
            ProductCategory::Snacks
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: ProductCategory,
    pub current_inventory: u32,
    pub last_order_quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub name: String,
    pub category: ProductCategory,
    pub current_inventory: u32,
    pub last_order_quantity: u32,
}

impl CreateProduct {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        v.required("name", &self.name, "Product name is required");
        v.finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ProductCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_inventory: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_order_quantity: Option<u32>,
}

impl UpdateProduct {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::default();
        if let Some(name) = &self.name {
            v.required("name", name, "Product name is required");
        }
        v.finish()
    }
}

impl Entity for Product {
    const COLLECTION: &'static str = "products";
    type Create = CreateProduct;
    type Update = UpdateProduct;

    fn id(&self) -> &str {
        &self.id
    }
}
