//! iap-reconcile
//!
//! Reconciliation Engine and Event Sink.
//!
//! The engine takes raw purchase batches (from a purchase flow or a bulk
//! ownership query), validates, classifies, records and finalizes them.
//! One batch is processed to completion before the call returns:
//! validate -> resolve -> emit -> insert -> finalize.
//!
//! Observers only ever see the [`EventSink`] trait. Backend failures are
//! delivered there as [`ErrorEvent`]s, never as `Err`.

mod engine;
mod sink;
mod types;

pub use engine::{EngineSettings, ReconcileEngine};
pub use sink::{BillingEvent, ErrorEvent, ErrorKind, ErrorSource, EventSink, NullSink};
pub use types::{BatchOrigin, BatchReport, Finalize};
