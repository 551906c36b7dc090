//! iap-ledger
//!
//! Purchase Ledger: in-memory record of the purchases the user currently
//! holds, keyed by product id.
//!
//! The ledger holds only signature-valid purchases for known products; that
//! is enforced by the reconciliation engine, which is the only writer.

mod ledger;
mod record;

pub use ledger::{PurchaseLedger, PurchasedResult};
pub use record::PurchaseRecord;
