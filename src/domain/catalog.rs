use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Catalog Records - read-only to the order core
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Inactive,
    Draft,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::Draft => "draft",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProductStatus::Active),
            "inactive" => Ok(ProductStatus::Inactive),
            "draft" => Ok(ProductStatus::Draft),
            other => Err(format!("unknown product status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    /// Current catalog price; the only price an order may use.
    pub price: Decimal,
    pub stock: i32,
    pub status: ProductStatus,
}

impl Product {
    pub fn new(vendor_id: Uuid, name: impl Into<String>, price: Decimal, stock: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            vendor_id,
            name: name.into(),
            price,
            stock,
            status: ProductStatus::Active,
        }
    }

    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: Uuid,
    pub business_name: String,
    /// Share of revenue kept by the platform, as a fraction (0.15 = 15%).
    pub commission_rate: Decimal,
    pub is_active: bool,
}

impl Vendor {
    pub fn new(business_name: impl Into<String>, commission_rate: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_name: business_name.into(),
            commission_rate,
            is_active: true,
        }
    }
}
