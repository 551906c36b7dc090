use std::collections::BTreeSet;
use std::sync::Arc;

use iap_backend::{BackendSignal, BillingBackend, SubscriptionSupport};
use iap_catalog::ProductRegistry;
use iap_ledger::{PurchaseRecord, PurchasedResult};
use iap_reconcile::{
    BatchOrigin, ErrorEvent, ErrorKind, ErrorSource, EventSink, Finalize, ReconcileEngine,
};
use iap_schemas::{BackendFailure, BillingError, CatalogEntry, ProductCategory, ProductId, Purchase};
use tokio::sync::mpsc;

use crate::{ReconnectPolicy, SessionState};

/// Result of one pass of ownership queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueryOutcome {
    /// Every category answered (or was skipped as unsupported).
    Complete,
    /// At least one category failed; what arrived was still processed.
    Partial,
    /// The service went away mid-pass.
    Lost,
}

/// Billing client bound to one backend.
pub struct BillingClient<B: BillingBackend> {
    backend: B,
    signals: mpsc::UnboundedReceiver<BackendSignal>,
    registry: ProductRegistry,
    engine: ReconcileEngine,
    sink: Arc<dyn EventSink>,
    policy: ReconnectPolicy,
    state: SessionState,
    /// An ownership pass completed for every category at least once.
    purchases_fetched: bool,
}

impl<B: BillingBackend> BillingClient<B> {
    pub(crate) fn new(
        backend: B,
        signals: mpsc::UnboundedReceiver<BackendSignal>,
        registry: ProductRegistry,
        engine: ReconcileEngine,
        sink: Arc<dyn EventSink>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            backend,
            signals,
            registry,
            engine,
            sink,
            policy,
            state: SessionState::Disconnected,
            purchases_fetched: false,
        }
    }

    // -----------------------------------------------------------------------
    // Registration / connection
    // -----------------------------------------------------------------------

    /// Register more ids before [`connect`](Self::connect).
    ///
    /// # Errors
    /// [`BillingError::Configuration`] on overlap, blank id, or after connect.
    pub fn register<I, S>(&mut self, category: ProductCategory, ids: I) -> Result<(), BillingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<ProductId>,
    {
        self.registry.register(category, ids)
    }

    /// Seal the registry and establish the session.
    ///
    /// No-op while already connecting or connected. On success the catalog
    /// is fetched and the bootstrap ownership query runs before this returns.
    /// Backend failures are delivered to the sink; only configuration misuse
    /// is returned.
    ///
    /// # Errors
    /// [`BillingError::Configuration`] when no product id was registered.
    pub async fn connect(&mut self) -> Result<(), BillingError> {
        if self.state != SessionState::Disconnected {
            tracing::debug!(state = ?self.state, "connect ignored: session already active");
            return Ok(());
        }
        let ids = self.registry.seal()?;
        tracing::info!(products = ids.len(), "connecting billing client");
        self.establish().await;
        Ok(())
    }

    /// End the backend connection. The ledger and catalog are kept; a later
    /// [`connect`](Self::connect) starts a fresh session.
    pub async fn release(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.backend.end_connection().await;
        self.state = SessionState::Disconnected;
        tracing::info!("billing client released");
    }

    /// Connect, retrying per policy, then run the per-connection setup.
    /// A connection lost during setup counts as a failed attempt.
    async fn establish(&mut self) {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            self.state = SessionState::Connecting;
            tracing::info!(attempt, "starting billing service connection");

            match self.backend.start_connection().await {
                Ok(()) => {
                    self.state = SessionState::Connected;
                    tracing::info!(attempt, "billing service connected");
                    if self.on_connected().await {
                        return;
                    }
                    tracing::warn!("connection lost during session setup");
                }
                Err(failure) => {
                    tracing::warn!(attempt, %failure, "billing service connection failed");
                    self.sink
                        .on_error(ErrorSource::Connection, &ErrorEvent::from_failure(&failure));
                }
            }

            if !self.policy.allows_retry(attempt) {
                self.state = SessionState::Disconnected;
                tracing::error!(attempt, "giving up on billing service connection");
                self.sink.on_error(
                    ErrorSource::Connection,
                    &ErrorEvent::new(
                        ErrorKind::Disconnected,
                        format!("gave up after {attempt} connection attempts"),
                    ),
                );
                return;
            }
            let delay = self.policy.delay_for(attempt);
            if !delay.is_zero() {
                tracing::debug!(delay_ms = delay.as_millis() as u64, "reconnect backoff");
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Catalog fetch then bootstrap ownership query. `false` when the
    /// connection was lost on the way.
    async fn on_connected(&mut self) -> bool {
        if !self.fetch_catalog().await {
            return false;
        }
        self.query_owned().await != QueryOutcome::Lost
    }

    /// Transport loss noticed outside of `establish`.
    async fn reconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            tracing::debug!("disconnect ignored: session released");
            return;
        }
        self.establish().await;
    }

    async fn on_service_disconnected(&mut self) {
        if self.state == SessionState::Disconnected {
            tracing::debug!("service disconnect ignored: session released");
            return;
        }
        if self.state == SessionState::Connected && self.backend.is_connected() {
            tracing::debug!("service disconnect ignored: already reconnected");
            return;
        }
        tracing::warn!("billing service disconnected");
        self.sink.on_error(
            ErrorSource::Connection,
            &ErrorEvent::new(ErrorKind::Disconnected, "billing service disconnected"),
        );
        self.establish().await;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// One catalog query per non-empty category. Emits `on_products_fetched`
    /// once with everything recorded. `false` when the connection was lost.
    async fn fetch_catalog(&mut self) -> bool {
        let mut fetched: Vec<CatalogEntry> = Vec::new();
        let mut answered: BTreeSet<ProductId> = BTreeSet::new();
        let mut not_found: Vec<ProductId> = Vec::new();

        for (category, ids) in self.registry.partitions() {
            match self.backend.query_catalog(category, &ids).await {
                Ok(entries) => {
                    answered.extend(entries.iter().map(|e| e.product_id.clone()));
                    let recorded = self.registry.record_catalog(entries);
                    tracing::info!(%category, requested = ids.len(), recorded = recorded.len(), "catalog fetched");
                    fetched.extend(recorded);
                    not_found.extend(ids.into_iter().filter(|id| !answered.contains(id)));
                }
                Err(failure) => {
                    tracing::warn!(%category, %failure, "catalog query failed");
                    self.sink
                        .on_error(ErrorSource::FetchCatalog, &ErrorEvent::from_failure(&failure));
                    if failure.is_disconnect() {
                        return false;
                    }
                }
            }
        }

        for id in not_found {
            tracing::warn!(product_id = %id, "product not found in backend catalog");
            self.sink.on_error(
                ErrorSource::FetchCatalog,
                &ErrorEvent::new(
                    ErrorKind::ProductNotExist,
                    format!("product {id} does not exist in the store catalog"),
                ),
            );
        }
        self.sink.on_products_fetched(&fetched);
        true
    }

    /// Ownership query for every non-empty category, fed to the engine as
    /// one batch. Subscriptions are only queried when the backend supports
    /// them.
    async fn query_owned(&mut self) -> QueryOutcome {
        let mut purchases: Vec<Purchase> = Vec::new();
        let mut outcome = QueryOutcome::Complete;

        for (category, _) in self.registry.partitions() {
            if category == ProductCategory::Subscription {
                match self.backend.subscriptions_supported().await {
                    SubscriptionSupport::Supported => {}
                    SubscriptionSupport::NotSupported => {
                        tracing::warn!("subscriptions not supported: skipping owned query");
                        self.sink.on_error(
                            ErrorSource::SubscriptionSupport,
                            &ErrorEvent::new(
                                ErrorKind::FeatureNotSupported,
                                "subscriptions are not supported on this device",
                            ),
                        );
                        continue;
                    }
                    SubscriptionSupport::Disconnected => {
                        self.sink.on_error(
                            ErrorSource::SubscriptionSupport,
                            &ErrorEvent::from_failure(&BackendFailure::disconnected()),
                        );
                        return QueryOutcome::Lost;
                    }
                }
            }

            match self.backend.query_owned_purchases(category).await {
                Ok(found) => {
                    tracing::debug!(%category, owned = found.len(), "owned purchases fetched");
                    purchases.extend(found);
                }
                Err(failure) => {
                    tracing::warn!(%category, %failure, "owned purchases query failed");
                    self.sink
                        .on_error(ErrorSource::FetchPurchases, &ErrorEvent::from_failure(&failure));
                    if failure.is_disconnect() {
                        return QueryOutcome::Lost;
                    }
                    outcome = QueryOutcome::Partial;
                }
            }
        }

        let report = self
            .engine
            .process_batch(
                &self.registry,
                &mut self.backend,
                self.sink.as_ref(),
                purchases,
                BatchOrigin::OwnedQuery,
            )
            .await;
        if report.lost_connection() {
            return QueryOutcome::Lost;
        }
        if report.awaiting_catalog > 0 || !self.registry.is_fully_fetched() {
            tracing::info!(
                awaiting_catalog = report.awaiting_catalog,
                "ownership incomplete until the catalog is fully fetched"
            );
            outcome = QueryOutcome::Partial;
        }
        if outcome == QueryOutcome::Complete {
            self.purchases_fetched = true;
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// `true` iff connected and every registered id has a catalog entry.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Connected && self.registry.is_fully_fetched()
    }

    fn ensure_ready(&self) -> Result<(), BillingError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(BillingError::NotReady)
        }
    }

    /// Ownership of `product_id`.
    ///
    /// Unregistered ids answer `No` once purchases are known.
    pub fn is_purchased(&self, product_id: &str) -> PurchasedResult {
        if !self.is_ready() {
            return PurchasedResult::ClientNotReady;
        }
        if !self.purchases_fetched {
            return PurchasedResult::PurchasesNotFetchedYet;
        }
        if self.engine.ledger().owns(product_id) {
            PurchasedResult::Yes
        } else {
            PurchasedResult::No
        }
    }

    /// Start the purchase flow for `product_id`. The outcome arrives later as
    /// a backend signal.
    ///
    /// # Errors
    /// [`BillingError::NotReady`], or [`BillingError::UnknownProduct`] when
    /// the id has no catalog entry.
    pub async fn launch_purchase(&mut self, product_id: &str) -> Result<(), BillingError> {
        self.ensure_ready()?;
        let entry = self
            .registry
            .entry(product_id)
            .cloned()
            .ok_or_else(|| BillingError::UnknownProduct(ProductId::from(product_id)))?;

        tracing::info!(product_id, "launching purchase flow");
        if let Err(failure) = self.backend.launch_purchase_flow(&entry).await {
            tracing::warn!(product_id, %failure, "purchase flow launch failed");
            self.sink
                .on_error(ErrorSource::PurchaseFlow, &ErrorEvent::from_failure(&failure));
            if failure.is_disconnect() {
                self.reconnect().await;
            }
        }
        Ok(())
    }

    /// Consume a consumable purchase. A record already consumed is a no-op.
    ///
    /// # Errors
    /// `NotReady`, `UnknownItem`, `InvalidCategory`, `PurchasePending`.
    pub async fn consume(&mut self, record: &PurchaseRecord) -> Result<Finalize, BillingError> {
        self.ensure_ready()?;
        let outcome = self
            .engine
            .consume(&self.registry, &mut self.backend, self.sink.as_ref(), record)
            .await?;
        if outcome.lost_connection() {
            self.reconnect().await;
        }
        Ok(outcome)
    }

    /// Acknowledge a non-consumable or subscription purchase. A record
    /// already acknowledged is a no-op.
    ///
    /// # Errors
    /// `NotReady`, `UnknownItem`, `InvalidCategory`, `PurchasePending`.
    pub async fn acknowledge_purchase(
        &mut self,
        record: &PurchaseRecord,
    ) -> Result<Finalize, BillingError> {
        self.ensure_ready()?;
        let outcome = self
            .engine
            .acknowledge(&self.registry, &mut self.backend, self.sink.as_ref(), record)
            .await?;
        if outcome.lost_connection() {
            self.reconnect().await;
        }
        Ok(outcome)
    }

    /// Re-run the ownership query for every category.
    ///
    /// # Errors
    /// [`BillingError::NotReady`].
    pub async fn refresh_purchases(&mut self) -> Result<(), BillingError> {
        self.ensure_ready()?;
        if self.query_owned().await == QueryOutcome::Lost {
            self.reconnect().await;
        }
        Ok(())
    }

    /// Re-run the catalog queries, e.g. after a failed fetch left the client
    /// not ready. When this completes the catalog and ownership is not yet
    /// known, the ownership query runs again.
    ///
    /// # Errors
    /// [`BillingError::NotReady`] unless connected.
    pub async fn refresh_catalog(&mut self) -> Result<(), BillingError> {
        if self.state != SessionState::Connected {
            return Err(BillingError::NotReady);
        }
        if !self.fetch_catalog().await {
            self.reconnect().await;
            return Ok(());
        }
        if self.registry.is_fully_fetched()
            && !self.purchases_fetched
            && self.query_owned().await == QueryOutcome::Lost
        {
            self.reconnect().await;
        }
        Ok(())
    }

    /// Probe subscription support. `Disconnected` reconnects as a side effect
    /// when a session is active.
    pub async fn check_subscription_support(&mut self) -> SubscriptionSupport {
        let support = self.backend.subscriptions_supported().await;
        if support == SubscriptionSupport::Disconnected {
            self.sink.on_error(
                ErrorSource::SubscriptionSupport,
                &ErrorEvent::from_failure(&BackendFailure::disconnected()),
            );
            self.reconnect().await;
        }
        support
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    /// Apply one unsolicited backend signal.
    pub async fn handle_signal(&mut self, signal: BackendSignal) {
        match signal {
            BackendSignal::PurchasesUpdated(Ok(purchases)) => {
                tracing::debug!(count = purchases.len(), "purchase update received");
                let report = self
                    .engine
                    .process_batch(
                        &self.registry,
                        &mut self.backend,
                        self.sink.as_ref(),
                        purchases,
                        BatchOrigin::PurchaseFlow,
                    )
                    .await;
                if report.lost_connection() {
                    self.reconnect().await;
                }
            }
            BackendSignal::PurchasesUpdated(Err(failure)) if failure.is_disconnect() => {
                self.on_service_disconnected().await;
            }
            BackendSignal::PurchasesUpdated(Err(failure)) => {
                let event = ErrorEvent::from_failure(&failure);
                match event.kind {
                    ErrorKind::UserCanceled => tracing::info!("purchase flow canceled by user"),
                    ErrorKind::ItemAlreadyOwned => {
                        tracing::warn!(%failure, "purchase conflicts with an owned item; ledger is stale")
                    }
                    _ => tracing::warn!(%failure, "purchase flow failed"),
                }
                self.sink.on_error(ErrorSource::PurchaseFlow, &event);
            }
            BackendSignal::ServiceDisconnected => self.on_service_disconnected().await,
        }
    }

    /// Apply every signal already queued without waiting. Returns how many
    /// were handled.
    pub async fn process_pending_signals(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.signals.try_recv() {
            self.handle_signal(signal).await;
            handled += 1;
        }
        handled
    }

    /// Wait for the next signal and apply it. `false` once the channel is closed.
    pub async fn handle_next_signal(&mut self) -> bool {
        match self.signals.recv().await {
            Some(signal) => {
                self.handle_signal(signal).await;
                true
            }
            None => false,
        }
    }

    /// Apply signals until the backend closes the channel.
    pub async fn run(&mut self) {
        while self.handle_next_signal().await {}
        tracing::info!("backend signal channel closed");
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn session_state(&self) -> SessionState {
        self.state
    }

    pub fn purchases_fetched(&self) -> bool {
        self.purchases_fetched
    }

    /// Fetched catalog entries, sorted by id.
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.registry.entries()
    }

    /// Records currently held in the ledger, sorted by id.
    pub fn purchased_products(&self) -> Vec<PurchaseRecord> {
        self.engine.ledger().records()
    }

    pub fn purchase(&self, product_id: &str) -> Option<&PurchaseRecord> {
        self.engine.ledger().get(product_id)
    }

    pub fn registry(&self) -> &ProductRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
