//! iap-schemas
//!
//! Shared data model for the purchase reconciliation workspace.
//!
//! - Product identity and catalog entries (`product`)
//! - Purchases as delivered by the purchasing backend (`purchase`)
//! - Backend response codes and failures (`response`)
//! - The synchronous misuse taxonomy returned by public operations (`error`)
//!
//! Pure types. No IO, no backend calls.

mod error;
mod product;
mod purchase;
mod response;

pub use error::{BillingError, FinalizeKind};
pub use product::{CatalogEntry, ProductCategory, ProductId};
pub use purchase::{Purchase, PurchaseState};
pub use response::{BackendFailure, ResponseCode};
