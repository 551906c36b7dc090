use iap_ledger::PurchaseRecord;
use iap_schemas::{BackendFailure, CatalogEntry, ResponseCode};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Error events
// ---------------------------------------------------------------------------

/// What went wrong, as seen by the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ClientNotReady,
    Disconnected,
    /// Purchase for an id that is unregistered or has no catalog entry.
    UnknownProduct,
    /// Registered id the backend's catalog does not know.
    ProductNotExist,
    SignatureInvalid,
    UserCanceled,
    /// Purchase flow hit an existing purchase; the local ledger is stale.
    ItemAlreadyOwned,
    FeatureNotSupported,
    /// Any other non-OK backend response.
    Backend,
}

/// Which operation the error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorSource {
    Connection,
    FetchCatalog,
    FetchPurchases,
    PurchaseFlow,
    Signature,
    Consume,
    Acknowledge,
    SubscriptionSupport,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw backend response code, when the error came from the backend.
    pub raw_code: Option<i32>,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            raw_code: None,
        }
    }

    /// Classify a backend failure, keeping its raw code.
    pub fn from_failure(failure: &BackendFailure) -> Self {
        let kind = match failure.code {
            ResponseCode::ServiceDisconnected => ErrorKind::Disconnected,
            ResponseCode::UserCanceled => ErrorKind::UserCanceled,
            ResponseCode::ItemAlreadyOwned => ErrorKind::ItemAlreadyOwned,
            ResponseCode::FeatureNotSupported => ErrorKind::FeatureNotSupported,
            _ => ErrorKind::Backend,
        };
        Self {
            kind,
            message: failure.to_string(),
            raw_code: Some(failure.raw_code()),
        }
    }
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Observer of billing outcomes. Every method defaults to a no-op so
/// applications implement only what they care about.
///
/// Ordering: for any batch, the purchase-observed event
/// (`on_products_purchased` / `on_purchased_products_fetched`) is delivered
/// before any `on_consumed` / `on_purchase_acknowledged` for its records.
pub trait EventSink: Send + Sync {
    fn on_products_fetched(&self, _entries: &[CatalogEntry]) {}

    /// Purchases delivered by a purchase flow.
    fn on_products_purchased(&self, _records: &[PurchaseRecord]) {}

    /// Purchases returned by an ownership query (bootstrap or refresh).
    fn on_purchased_products_fetched(&self, _records: &[PurchaseRecord]) {}

    fn on_purchase_acknowledged(&self, _record: &PurchaseRecord) {}

    fn on_consumed(&self, _record: &PurchaseRecord) {}

    fn on_error(&self, _source: ErrorSource, _error: &ErrorEvent) {}
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {}

// ---------------------------------------------------------------------------
// Channel sink
// ---------------------------------------------------------------------------

/// Owned, serialisable form of every sink callback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BillingEvent {
    ProductsFetched { entries: Vec<CatalogEntry> },
    ProductsPurchased { records: Vec<PurchaseRecord> },
    PurchasedProductsFetched { records: Vec<PurchaseRecord> },
    PurchaseAcknowledged { record: PurchaseRecord },
    Consumed { record: PurchaseRecord },
    Error { source: ErrorSource, error: ErrorEvent },
}

impl BillingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BillingEvent::ProductsFetched { .. } => "products_fetched",
            BillingEvent::ProductsPurchased { .. } => "products_purchased",
            BillingEvent::PurchasedProductsFetched { .. } => "purchased_products_fetched",
            BillingEvent::PurchaseAcknowledged { .. } => "purchase_acknowledged",
            BillingEvent::Consumed { .. } => "consumed",
            BillingEvent::Error { .. } => "error",
        }
    }
}

fn forward(tx: &mpsc::UnboundedSender<BillingEvent>, event: BillingEvent) {
    if tx.send(event).is_err() {
        tracing::debug!("billing event dropped: receiver closed");
    }
}

impl EventSink for mpsc::UnboundedSender<BillingEvent> {
    fn on_products_fetched(&self, entries: &[CatalogEntry]) {
        forward(
            self,
            BillingEvent::ProductsFetched {
                entries: entries.to_vec(),
            },
        );
    }

    fn on_products_purchased(&self, records: &[PurchaseRecord]) {
        forward(
            self,
            BillingEvent::ProductsPurchased {
                records: records.to_vec(),
            },
        );
    }

    fn on_purchased_products_fetched(&self, records: &[PurchaseRecord]) {
        forward(
            self,
            BillingEvent::PurchasedProductsFetched {
                records: records.to_vec(),
            },
        );
    }

    fn on_purchase_acknowledged(&self, record: &PurchaseRecord) {
        forward(
            self,
            BillingEvent::PurchaseAcknowledged {
                record: record.clone(),
            },
        );
    }

    fn on_consumed(&self, record: &PurchaseRecord) {
        forward(
            self,
            BillingEvent::Consumed {
                record: record.clone(),
            },
        );
    }

    fn on_error(&self, source: ErrorSource, error: &ErrorEvent) {
        forward(
            self,
            BillingEvent::Error {
                source,
                error: error.clone(),
            },
        );
    }
}
