//! iap-client
//!
//! Application-facing billing client: Connection Session plus the public
//! operations (connect, purchase, consume, acknowledge, ownership query).
//!
//! All methods take `&mut self` and run one batch to completion before
//! returning. Unsolicited backend signals are pulled from the channel handed
//! to [`BillingClientBuilder::build`] via [`BillingClient::handle_signal`],
//! [`BillingClient::process_pending_signals`] or [`BillingClient::run`].

mod builder;
mod client;
mod session;

pub use builder::BillingClientBuilder;
pub use client::BillingClient;
pub use session::{ReconnectPolicy, SessionState};

pub use iap_backend::{BackendSignal, BillingBackend, SubscriptionSupport};
pub use iap_ledger::{PurchaseRecord, PurchasedResult};
pub use iap_reconcile::{
    BillingEvent, ErrorEvent, ErrorKind, ErrorSource, EventSink, Finalize, NullSink,
};
pub use iap_schemas::{BillingError, CatalogEntry, ProductCategory, ProductId};
