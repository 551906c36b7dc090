use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ProductId
// ---------------------------------------------------------------------------

/// Opaque store product identifier (e.g. `"coin_100"`).
///
/// Unique across all three category partitions of a registry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ProductId> for ProductId {
    fn from(id: &ProductId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for ProductId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ProductCategory
// ---------------------------------------------------------------------------

/// Ownership category of a product. Determines how a purchase is finalized:
///
/// - `Consumable` purchases are consumed (and leave the ledger).
/// - `NonConsumable` and `Subscription` purchases are acknowledged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCategory {
    Consumable,
    NonConsumable,
    Subscription,
}

impl ProductCategory {
    /// Stable iteration order used for batched catalog and ownership queries.
    pub const ALL: [ProductCategory; 3] = [
        ProductCategory::Consumable,
        ProductCategory::NonConsumable,
        ProductCategory::Subscription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Consumable => "CONSUMABLE",
            ProductCategory::NonConsumable => "NON_CONSUMABLE",
            ProductCategory::Subscription => "SUBSCRIPTION",
        }
    }

    /// `true` when purchases of this category are finalized by consumption.
    pub fn is_consumable(&self) -> bool {
        matches!(self, ProductCategory::Consumable)
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CatalogEntry
// ---------------------------------------------------------------------------

/// Catalog data returned by the backend for one registered product.
///
/// Immutable once created; a fresh catalog query for the same id replaces it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    pub category: ProductCategory,
    /// Backend-supplied display/pricing payload, opaque to this workspace.
    pub details: serde_json::Value,
}

impl CatalogEntry {
    pub fn new(
        product_id: impl Into<ProductId>,
        category: ProductCategory,
        details: serde_json::Value,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            category,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serializes_screaming_snake() {
        let s = serde_json::to_string(&ProductCategory::NonConsumable).unwrap();
        assert_eq!(s, "\"NON_CONSUMABLE\"");
        assert_eq!(ProductCategory::NonConsumable.to_string(), "NON_CONSUMABLE");
    }

    #[test]
    fn product_id_is_transparent_string() {
        let id = ProductId::from("coin_100");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"coin_100\"");
        assert_eq!(id.as_str(), "coin_100");
    }

    #[test]
    fn only_consumable_is_consumable() {
        let consumable: Vec<_> = ProductCategory::ALL
            .iter()
            .filter(|c| c.is_consumable())
            .collect();
        assert_eq!(consumable, vec![&ProductCategory::Consumable]);
    }
}
