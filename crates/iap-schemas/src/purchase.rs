use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Raw purchase state as reported by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseState {
    Purchased,
    /// Payment not yet completed (e.g. cash at a convenience store).
    Pending,
    Unspecified,
}

impl PurchaseState {
    /// Map the platform's integer purchase state. Unknown values are `Unspecified`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => PurchaseState::Purchased,
            2 => PurchaseState::Pending,
            _ => PurchaseState::Unspecified,
        }
    }

    pub fn is_purchased(&self) -> bool {
        matches!(self, PurchaseState::Purchased)
    }
}

/// A purchase as delivered by the backend, either from an active purchase
/// flow or from a bulk ownership query.
///
/// Never constructed by the reconciliation logic itself; only backend
/// adapters build these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub product_id: ProductId,
    /// Opaque token, unique per purchase. Finalization is keyed on it.
    pub purchase_token: String,
    /// The signed receipt exactly as the backend produced it.
    pub original_payload: String,
    pub signature: String,
    pub state: PurchaseState,
    /// Backend already holds an acknowledgement for this purchase.
    #[serde(default)]
    pub acknowledged: bool,
    pub purchase_time: DateTime<Utc>,
}

impl Purchase {
    pub fn is_purchased(&self) -> bool {
        self.state.is_purchased()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_state_mapping() {
        assert_eq!(PurchaseState::from_raw(1), PurchaseState::Purchased);
        assert_eq!(PurchaseState::from_raw(2), PurchaseState::Pending);
        assert_eq!(PurchaseState::from_raw(0), PurchaseState::Unspecified);
        assert_eq!(PurchaseState::from_raw(42), PurchaseState::Unspecified);
    }

    #[test]
    fn acknowledged_defaults_to_false_on_decode() {
        let json = r#"{
            "product_id": "remove_ads",
            "purchase_token": "tok-1",
            "original_payload": "{}",
            "signature": "sig",
            "state": "PURCHASED",
            "purchase_time": "2024-01-01T00:00:00Z"
        }"#;
        let p: Purchase = serde_json::from_str(json).unwrap();
        assert!(!p.acknowledged);
        assert!(p.is_purchased());
    }
}
