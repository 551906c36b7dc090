use iap_schemas::{BackendFailure, ProductId};
use serde::{Deserialize, Serialize};

/// Where a purchase batch came from. Decides which observed-event is emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchOrigin {
    /// Bulk ownership query (bootstrap or refresh).
    OwnedQuery,
    /// Result of a user purchase flow.
    PurchaseFlow,
}

/// Outcome of one finalization attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Finalize {
    Consumed,
    Acknowledged,
    /// Token was finalized earlier; nothing was sent to the backend.
    AlreadyFinalized,
    /// Another finalization for the same token has not completed.
    InFlight,
    /// Backend refused; an error event was emitted and the record kept.
    Failed(BackendFailure),
}

impl Finalize {
    /// `true` when the token is finalized after this attempt.
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            Finalize::Consumed | Finalize::Acknowledged | Finalize::AlreadyFinalized
        )
    }

    pub fn lost_connection(&self) -> bool {
        matches!(self, Finalize::Failed(f) if f.is_disconnect())
    }
}

/// Summary of one processed batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Ids recorded into the ledger, in batch order.
    pub recorded: Vec<ProductId>,
    pub rejected_signature: usize,
    /// Ids no category registers.
    pub rejected_unknown: usize,
    /// Registered ids dropped because their catalog entry has not arrived.
    /// The backend still holds these, so ownership is not yet known.
    pub awaiting_catalog: usize,
    /// Duplicates of purchases already consumed.
    pub skipped_consumed: usize,
    /// (product id, outcome) for each finalization attempted.
    pub finalized: Vec<(ProductId, Finalize)>,
}

impl BatchReport {
    /// Some finalization failed because the service went away.
    pub fn lost_connection(&self) -> bool {
        self.finalized.iter().any(|(_, f)| f.lost_connection())
    }
}
