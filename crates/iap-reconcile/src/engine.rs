use std::collections::HashSet;
use std::sync::Arc;

use iap_backend::BillingBackend;
use iap_catalog::ProductRegistry;
use iap_ledger::{PurchaseLedger, PurchaseRecord};
use iap_schemas::{BillingError, FinalizeKind, ProductCategory, Purchase};
use iap_signature::{SignatureVerifier, TrustKey};

use crate::{
    BatchOrigin, BatchReport, ErrorEvent, ErrorKind, ErrorSource, EventSink, Finalize,
};

/// Automatic finalization toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Acknowledge non-consumables and subscriptions as soon as they are recorded.
    pub auto_acknowledge: bool,
    /// Consume consumables as soon as they are recorded.
    pub auto_consume: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            auto_acknowledge: true,
            auto_consume: true,
        }
    }
}

/// Owns the ledger and drives every purchase to exactly one finalization.
///
/// Finalization is keyed on purchase token:
/// - `finalized` holds tokens the backend confirmed (or reported already
///   acknowledged); they are never sent again;
/// - `in_flight` holds tokens with a finalize call outstanding.
pub struct ReconcileEngine {
    ledger: PurchaseLedger,
    finalized: HashSet<String>,
    in_flight: HashSet<String>,
    verifier: Arc<dyn SignatureVerifier>,
    trust_key: TrustKey,
    settings: EngineSettings,
}

impl std::fmt::Debug for ReconcileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileEngine")
            .field("ledger", &self.ledger)
            .field("finalized", &self.finalized.len())
            .field("in_flight", &self.in_flight.len())
            .field("trust_key", &self.trust_key)
            .field("settings", &self.settings)
            .finish()
    }
}

impl ReconcileEngine {
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        trust_key: TrustKey,
        settings: EngineSettings,
    ) -> Self {
        Self {
            ledger: PurchaseLedger::new(),
            finalized: HashSet::new(),
            in_flight: HashSet::new(),
            verifier,
            trust_key,
            settings,
        }
    }

    pub fn ledger(&self) -> &PurchaseLedger {
        &self.ledger
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn is_finalized(&self, purchase_token: &str) -> bool {
        self.finalized.contains(purchase_token)
    }

    // -----------------------------------------------------------------------
    // Batch processing
    // -----------------------------------------------------------------------

    /// Process one purchase batch to completion.
    ///
    /// Invalid signatures and unresolvable products are dropped with an
    /// error event. The observed-event for the surviving batch is emitted
    /// before any ledger mutation or finalize call. An ownership-query batch
    /// always emits, even when empty; a purchase-flow batch emits only when
    /// something survived.
    pub async fn process_batch<B>(
        &mut self,
        registry: &ProductRegistry,
        backend: &mut B,
        sink: &dyn EventSink,
        purchases: Vec<Purchase>,
        origin: BatchOrigin,
    ) -> BatchReport
    where
        B: BillingBackend + ?Sized,
    {
        let mut report = BatchReport::default();
        let lookup_source = match origin {
            BatchOrigin::OwnedQuery => ErrorSource::FetchPurchases,
            BatchOrigin::PurchaseFlow => ErrorSource::PurchaseFlow,
        };

        let mut records = Vec::with_capacity(purchases.len());
        for purchase in purchases {
            if !self.verifier.verify(
                &self.trust_key,
                &purchase.original_payload,
                &purchase.signature,
            ) {
                tracing::warn!(
                    product_id = %purchase.product_id,
                    "purchase dropped: signature invalid"
                );
                sink.on_error(
                    ErrorSource::Signature,
                    &ErrorEvent::new(
                        ErrorKind::SignatureInvalid,
                        format!("signature check failed for {}", purchase.product_id),
                    ),
                );
                report.rejected_signature += 1;
                continue;
            }

            let Some(entry) = registry.entry(purchase.product_id.as_str()) else {
                let message = if registry.classify(purchase.product_id.as_str()).is_ok() {
                    report.awaiting_catalog += 1;
                    format!("no catalog entry yet for {}", purchase.product_id)
                } else {
                    report.rejected_unknown += 1;
                    format!("{} is not a registered product", purchase.product_id)
                };
                tracing::warn!(product_id = %purchase.product_id, "purchase dropped: {message}");
                sink.on_error(
                    lookup_source,
                    &ErrorEvent::new(ErrorKind::UnknownProduct, message),
                );
                continue;
            };

            let consumable = entry.category.is_consumable();
            if consumable && self.finalized.contains(&purchase.purchase_token) {
                tracing::debug!(
                    product_id = %purchase.product_id,
                    "purchase skipped: already consumed"
                );
                report.skipped_consumed += 1;
                continue;
            }

            let mut record = PurchaseRecord::new(entry.clone(), purchase);
            if !consumable {
                if record.acknowledged {
                    self.finalized.insert(record.token().to_string());
                } else if self.finalized.contains(record.token()) {
                    record.acknowledged = true;
                }
            }
            records.push(record);
        }

        match origin {
            BatchOrigin::OwnedQuery => sink.on_purchased_products_fetched(&records),
            BatchOrigin::PurchaseFlow if !records.is_empty() => {
                sink.on_products_purchased(&records)
            }
            BatchOrigin::PurchaseFlow => {}
        }

        for record in &records {
            if let Some(prev) = self.ledger.insert(record.clone()) {
                if prev.token() != record.token() {
                    tracing::debug!(
                        product_id = %record.product_id(),
                        "ledger record replaced by newer purchase"
                    );
                }
            }
            report.recorded.push(record.product_id().clone());
        }

        for record in records {
            if !record.entry.category.is_consumable()
                && self.ledger.get(record.product_id().as_str()).map(PurchaseRecord::token)
                    != Some(record.token())
            {
                tracing::debug!(
                    product_id = %record.product_id(),
                    "purchase not finalized: superseded within batch"
                );
                continue;
            }
            if !record.is_purchased() {
                tracing::info!(
                    product_id = %record.product_id(),
                    state = ?record.purchase.state,
                    "purchase recorded but not finalized: payment incomplete"
                );
                continue;
            }
            let outcome = match record.category() {
                ProductCategory::Consumable if self.settings.auto_consume => {
                    self.consume_record(backend, sink, &record).await
                }
                ProductCategory::NonConsumable | ProductCategory::Subscription
                    if self.settings.auto_acknowledge && !record.acknowledged =>
                {
                    self.acknowledge_record(backend, sink, &record).await
                }
                _ => continue,
            };
            report.finalized.push((record.product_id().clone(), outcome));
        }

        tracing::debug!(
            origin = ?origin,
            recorded = report.recorded.len(),
            rejected_signature = report.rejected_signature,
            rejected_unknown = report.rejected_unknown,
            awaiting_catalog = report.awaiting_catalog,
            "purchase batch processed"
        );
        report
    }

    // -----------------------------------------------------------------------
    // Explicit finalization
    // -----------------------------------------------------------------------

    /// Consume the ledger's current purchase for `record`'s product.
    ///
    /// # Errors
    /// - [`BillingError::UnknownItem`] when the product is unregistered or
    ///   nothing is held for it;
    /// - [`BillingError::InvalidCategory`] unless the product is consumable;
    /// - [`BillingError::PurchasePending`] while payment is incomplete.
    ///
    /// A record whose token was already consumed is a no-op success.
    pub async fn consume<B>(
        &mut self,
        registry: &ProductRegistry,
        backend: &mut B,
        sink: &dyn EventSink,
        record: &PurchaseRecord,
    ) -> Result<Finalize, BillingError>
    where
        B: BillingBackend + ?Sized,
    {
        let current = self.check_explicit(registry, record, FinalizeKind::Consume)?;
        match current {
            Some(current) => Ok(self.consume_record(backend, sink, &current).await),
            None => Ok(Finalize::AlreadyFinalized),
        }
    }

    /// Acknowledge the ledger's current purchase for `record`'s product.
    ///
    /// Same error contract as [`consume`](Self::consume), with the category
    /// check inverted: consumables are rejected.
    pub async fn acknowledge<B>(
        &mut self,
        registry: &ProductRegistry,
        backend: &mut B,
        sink: &dyn EventSink,
        record: &PurchaseRecord,
    ) -> Result<Finalize, BillingError>
    where
        B: BillingBackend + ?Sized,
    {
        let current = self.check_explicit(registry, record, FinalizeKind::Acknowledge)?;
        match current {
            Some(current) if !current.acknowledged => {
                Ok(self.acknowledge_record(backend, sink, &current).await)
            }
            _ => Ok(Finalize::AlreadyFinalized),
        }
    }

    /// Validate an explicit finalize request. `Ok(None)` means the token is
    /// already finalized.
    fn check_explicit(
        &self,
        registry: &ProductRegistry,
        record: &PurchaseRecord,
        operation: FinalizeKind,
    ) -> Result<Option<PurchaseRecord>, BillingError> {
        let product_id = record.product_id();
        let category = registry
            .classify(product_id.as_str())
            .map_err(|_| BillingError::UnknownItem(product_id.clone()))?;

        let allowed = match operation {
            FinalizeKind::Consume => category.is_consumable(),
            FinalizeKind::Acknowledge => !category.is_consumable(),
        };
        if !allowed {
            return Err(BillingError::InvalidCategory {
                product_id: product_id.clone(),
                category,
                operation,
            });
        }

        if self.finalized.contains(record.token()) {
            return Ok(None);
        }

        let current = self
            .ledger
            .get(product_id.as_str())
            .ok_or_else(|| BillingError::UnknownItem(product_id.clone()))?;
        if !current.is_purchased() {
            return Err(BillingError::PurchasePending(product_id.clone()));
        }
        Ok(Some(current.clone()))
    }

    // -----------------------------------------------------------------------
    // Backend finalize calls
    // -----------------------------------------------------------------------

    async fn consume_record<B>(
        &mut self,
        backend: &mut B,
        sink: &dyn EventSink,
        record: &PurchaseRecord,
    ) -> Finalize
    where
        B: BillingBackend + ?Sized,
    {
        let token = record.token().to_string();
        if self.finalized.contains(&token) {
            return Finalize::AlreadyFinalized;
        }
        if !self.in_flight.insert(token.clone()) {
            return Finalize::InFlight;
        }

        let result = backend.consume(&token).await;
        self.in_flight.remove(&token);

        match result {
            Ok(()) => {
                self.finalized.insert(token.clone());
                self.ledger.remove_token(record.product_id().as_str(), &token);
                tracing::info!(product_id = %record.product_id(), "purchase consumed");
                sink.on_consumed(record);
                Finalize::Consumed
            }
            Err(failure) => {
                tracing::warn!(product_id = %record.product_id(), %failure, "consume failed");
                sink.on_error(ErrorSource::Consume, &ErrorEvent::from_failure(&failure));
                Finalize::Failed(failure)
            }
        }
    }

    async fn acknowledge_record<B>(
        &mut self,
        backend: &mut B,
        sink: &dyn EventSink,
        record: &PurchaseRecord,
    ) -> Finalize
    where
        B: BillingBackend + ?Sized,
    {
        let token = record.token().to_string();
        if self.finalized.contains(&token) {
            return Finalize::AlreadyFinalized;
        }
        if !self.in_flight.insert(token.clone()) {
            return Finalize::InFlight;
        }

        let result = backend.acknowledge(&token).await;
        self.in_flight.remove(&token);

        match result {
            Ok(()) => {
                self.finalized.insert(token.clone());
                let acknowledged = self
                    .ledger
                    .mark_acknowledged(record.product_id().as_str(), &token)
                    .unwrap_or_else(|| {
                        let mut r = record.clone();
                        r.acknowledged = true;
                        r
                    });
                tracing::info!(product_id = %record.product_id(), "purchase acknowledged");
                sink.on_purchase_acknowledged(&acknowledged);
                Finalize::Acknowledged
            }
            Err(failure) => {
                tracing::warn!(product_id = %record.product_id(), %failure, "acknowledge failed");
                sink.on_error(ErrorSource::Acknowledge, &ErrorEvent::from_failure(&failure));
                Finalize::Failed(failure)
            }
        }
    }
}
