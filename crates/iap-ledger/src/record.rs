use iap_schemas::{CatalogEntry, ProductCategory, ProductId, Purchase};
use serde::{Deserialize, Serialize};

/// A validated purchase matched to its catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub entry: CatalogEntry,
    pub purchase: Purchase,
    /// Acknowledgement is done, locally or already on the backend.
    /// Never set for consumables.
    pub acknowledged: bool,
}

impl PurchaseRecord {
    /// Build a record. Starts unacknowledged unless the backend already
    /// reported the purchase as acknowledged.
    pub fn new(entry: CatalogEntry, purchase: Purchase) -> Self {
        let acknowledged = purchase.acknowledged && !entry.category.is_consumable();
        Self {
            entry,
            purchase,
            acknowledged,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.purchase.product_id
    }

    pub fn category(&self) -> ProductCategory {
        self.entry.category
    }

    pub fn token(&self) -> &str {
        &self.purchase.purchase_token
    }

    /// Payment completed; eligible for finalization.
    pub fn is_purchased(&self) -> bool {
        self.purchase.is_purchased()
    }
}
