use std::fmt;

use crate::{ProductCategory, ProductId};

/// The two ways a purchase can be finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FinalizeKind {
    Consume,
    Acknowledge,
}

impl fmt::Display for FinalizeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeKind::Consume => f.write_str("consume"),
            FinalizeKind::Acknowledge => f.write_str("acknowledge"),
        }
    }
}

/// Misuse of the public contract. Returned synchronously from the call that
/// caused it; backend and transport failures never take this path.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// Overlapping category lists, empty id set, or registration after connect.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("billing client is not ready")]
    NotReady,

    /// The id is not registered, or has no catalog entry yet.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    /// No purchase for the id is held in the ledger.
    #[error("no purchase held for product: {0}")]
    UnknownItem(ProductId),

    #[error("cannot {operation} {category} product {product_id}")]
    InvalidCategory {
        product_id: ProductId,
        category: ProductCategory,
        operation: FinalizeKind,
    },

    #[error("purchase for {0} is still pending payment")]
    PurchasePending(ProductId),
}
