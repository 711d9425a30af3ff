use serde::{Deserialize, Serialize};

use super::Paise;

pub type ProductId = String;

/// A product sold on the route. Read-only from the ledger's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Base unit price in paise
    pub price: Paise,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Paise) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
        }
    }

    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            name: self.name.clone(),
            base_price: self.price,
        }
    }
}

/// Product details copied onto a sale at the time it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub base_price: Paise,
}
