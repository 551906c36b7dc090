use std::collections::BTreeMap;

use iap_schemas::ProductId;
use serde::{Deserialize, Serialize};

use crate::PurchaseRecord;

/// Four-valued ownership answer.
///
/// Distinguishes "don't know yet" from "known not owned" so transient
/// unreadiness is never read as a definitive negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchasedResult {
    ClientNotReady,
    PurchasesNotFetchedYet,
    Yes,
    No,
}

impl PurchasedResult {
    /// `true` only for a definitive answer (`Yes` / `No`).
    pub fn is_known(&self) -> bool {
        matches!(self, PurchasedResult::Yes | PurchasedResult::No)
    }
}

/// Purchases currently held, one per product id.
///
/// Merge policy is last-write-wins per product id: the backend is the source
/// of truth, so a later observation replaces an earlier one.
#[derive(Clone, Debug, Default)]
pub struct PurchaseLedger {
    /// product_id -> record
    records: BTreeMap<ProductId, PurchaseRecord>,
}

impl PurchaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its product id.
    /// Returns the record it replaced, if any.
    pub fn insert(&mut self, record: PurchaseRecord) -> Option<PurchaseRecord> {
        self.records.insert(record.product_id().clone(), record)
    }

    pub fn get(&self, product_id: &str) -> Option<&PurchaseRecord> {
        self.records.get(product_id)
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.records.contains_key(product_id)
    }

    /// `true` when a record exists for the id and its payment is complete.
    /// Pending purchases do not confer ownership.
    pub fn owns(&self, product_id: &str) -> bool {
        self.records
            .get(product_id)
            .map(PurchaseRecord::is_purchased)
            .unwrap_or(false)
    }

    /// Remove the record for `product_id` only if it still carries `token`.
    ///
    /// A newer purchase for the same product (different token) is left alone.
    pub fn remove_token(&mut self, product_id: &str, token: &str) -> Option<PurchaseRecord> {
        match self.records.get(product_id) {
            Some(r) if r.token() == token => self.records.remove(product_id),
            _ => None,
        }
    }

    /// Set `acknowledged` on the record for `product_id` if it still carries
    /// `token`. Returns a copy of the updated record.
    pub fn mark_acknowledged(&mut self, product_id: &str, token: &str) -> Option<PurchaseRecord> {
        match self.records.get_mut(product_id) {
            Some(r) if r.token() == token => {
                r.acknowledged = true;
                Some(r.clone())
            }
            _ => None,
        }
    }

    /// Snapshot of all records, sorted by product id.
    pub fn records(&self) -> Vec<PurchaseRecord> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
