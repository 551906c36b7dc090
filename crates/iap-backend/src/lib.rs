//! Purchasing backend boundary.
//!
//! This crate defines **only** the adapter trait and the asynchronous signals
//! a backend pushes to the client. No concrete backend, no reconciliation,
//! no ledger logic belongs here.
//!
//! Request/response calls go through [`BillingBackend`]. Unsolicited
//! notifications (purchase-flow results, service disconnects) arrive as
//! [`BackendSignal`] values on a channel owned by the adapter.

use async_trait::async_trait;
use iap_schemas::{BackendFailure, CatalogEntry, ProductCategory, ProductId, Purchase};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Notifications pushed by the backend outside of any request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendSignal {
    /// Result of a user purchase flow. `Ok` carries the purchases delivered
    /// by the flow; `Err` carries the flow's non-OK response (user canceled,
    /// item already owned, ...).
    PurchasesUpdated(Result<Vec<Purchase>, BackendFailure>),
    /// The connection to the backend service was lost.
    ServiceDisconnected,
}

/// Outcome of the subscription capability probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionSupport {
    Supported,
    NotSupported,
    /// The probe could not run because the service is gone.
    Disconnected,
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// Request/response surface of a purchasing backend.
///
/// Every method returns the backend's non-OK answer as a [`BackendFailure`];
/// adapters never panic on backend errors. A call made while the service is
/// disconnected fails with `ResponseCode::ServiceDisconnected`.
#[async_trait]
pub trait BillingBackend: Send + Sync {
    /// Open the service connection.
    async fn start_connection(&mut self) -> Result<(), BackendFailure>;

    /// Close the service connection. Idempotent.
    async fn end_connection(&mut self);

    /// Whether the service connection is currently up.
    fn is_connected(&self) -> bool;

    /// Catalog details for `ids`, all of which belong to `category`.
    /// Ids the backend does not know are simply absent from the answer.
    async fn query_catalog(
        &mut self,
        category: ProductCategory,
        ids: &[ProductId],
    ) -> Result<Vec<CatalogEntry>, BackendFailure>;

    /// Every purchase currently owned in `category`.
    async fn query_owned_purchases(
        &mut self,
        category: ProductCategory,
    ) -> Result<Vec<Purchase>, BackendFailure>;

    /// Start the user-facing purchase flow for `entry`.
    ///
    /// `Ok` means the flow was launched; its result arrives later as
    /// [`BackendSignal::PurchasesUpdated`].
    async fn launch_purchase_flow(&mut self, entry: &CatalogEntry) -> Result<(), BackendFailure>;

    async fn consume(&mut self, purchase_token: &str) -> Result<(), BackendFailure>;

    async fn acknowledge(&mut self, purchase_token: &str) -> Result<(), BackendFailure>;

    async fn subscriptions_supported(&mut self) -> SubscriptionSupport;
}
