use std::collections::{BTreeMap, BTreeSet};

use iap_schemas::{BillingError, CatalogEntry, ProductCategory, ProductId};

/// Registered product ids and their fetched catalog entries.
///
/// Invariants:
/// - every id belongs to exactly one category;
/// - catalog entries exist only for registered ids, and carry the registered
///   category regardless of what the backend reported.
#[derive(Clone, Debug, Default)]
pub struct ProductRegistry {
    /// product_id -> category
    categories: BTreeMap<ProductId, ProductCategory>,
    /// product_id -> latest catalog entry
    catalog: BTreeMap<ProductId, CatalogEntry>,
    sealed: bool,
}

impl ProductRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ids` under `category`.
    ///
    /// Re-registering an id under the same category is accepted. The call is
    /// atomic: on error nothing from `ids` is registered.
    ///
    /// # Errors
    /// [`BillingError::Configuration`] when an id is blank, already registered
    /// under another category, or the registry has been sealed.
    pub fn register<I, S>(&mut self, category: ProductCategory, ids: I) -> Result<(), BillingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<ProductId>,
    {
        if self.sealed {
            return Err(BillingError::Configuration(format!(
                "cannot register {category} products after connect"
            )));
        }

        let ids: Vec<ProductId> = ids.into_iter().map(Into::into).collect();
        for id in &ids {
            if id.as_str().trim().is_empty() {
                return Err(BillingError::Configuration(format!(
                    "blank product id in {category} list"
                )));
            }
            if let Some(existing) = self.categories.get(id) {
                if *existing != category {
                    return Err(BillingError::Configuration(format!(
                        "product {id} registered as both {existing} and {category}"
                    )));
                }
            }
        }

        for id in ids {
            self.categories.insert(id, category);
        }
        Ok(())
    }

    /// Close registration and return the full id set.
    ///
    /// Sealing twice returns the same set.
    ///
    /// # Errors
    /// [`BillingError::Configuration`] when no id was registered.
    pub fn seal(&mut self) -> Result<BTreeSet<ProductId>, BillingError> {
        if self.categories.is_empty() {
            return Err(BillingError::Configuration(
                "no product ids registered".to_string(),
            ));
        }
        if !self.sealed {
            tracing::debug!(products = self.categories.len(), "product registry sealed");
        }
        self.sealed = true;
        Ok(self.all_ids())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn all_ids(&self) -> BTreeSet<ProductId> {
        self.categories.keys().cloned().collect()
    }

    /// Ids registered under `category`, sorted.
    pub fn ids(&self, category: ProductCategory) -> Vec<ProductId> {
        self.categories
            .iter()
            .filter(|(_, c)| **c == category)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Non-empty category partitions in [`ProductCategory::ALL`] order.
    /// One backend query is issued per partition.
    pub fn partitions(&self) -> Vec<(ProductCategory, Vec<ProductId>)> {
        ProductCategory::ALL
            .iter()
            .map(|c| (*c, self.ids(*c)))
            .filter(|(_, ids)| !ids.is_empty())
            .collect()
    }

    pub fn has_category(&self, category: ProductCategory) -> bool {
        self.categories.values().any(|c| *c == category)
    }

    /// Merge catalog entries, replacing any earlier entry for the same id.
    ///
    /// Entries for unregistered ids are ignored. Returns the entries that
    /// were recorded, with their registered category.
    pub fn record_catalog<I>(&mut self, entries: I) -> Vec<CatalogEntry>
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut recorded = Vec::new();
        for mut entry in entries {
            let Some(category) = self.categories.get(&entry.product_id).copied() else {
                tracing::debug!(product_id = %entry.product_id, "catalog entry for unregistered id ignored");
                continue;
            };
            if entry.category != category {
                tracing::warn!(
                    product_id = %entry.product_id,
                    reported = %entry.category,
                    registered = %category,
                    "catalog entry category overridden by registration"
                );
                entry.category = category;
            }
            self.catalog.insert(entry.product_id.clone(), entry.clone());
            recorded.push(entry);
        }
        recorded
    }

    /// # Errors
    /// [`BillingError::UnknownProduct`] when `product_id` is not registered.
    pub fn classify(&self, product_id: &str) -> Result<ProductCategory, BillingError> {
        self.categories
            .get(product_id)
            .copied()
            .ok_or_else(|| BillingError::UnknownProduct(ProductId::from(product_id)))
    }

    pub fn entry(&self, product_id: &str) -> Option<&CatalogEntry> {
        self.catalog.get(product_id)
    }

    /// Snapshot of every fetched catalog entry, sorted by id.
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.catalog.values().cloned().collect()
    }

    /// Registered ids still lacking a catalog entry.
    pub fn missing_entries(&self) -> Vec<ProductId> {
        self.categories
            .keys()
            .filter(|id| !self.catalog.contains_key(*id))
            .cloned()
            .collect()
    }

    /// `true` once sealed and every sealed id has a catalog entry.
    pub fn is_fully_fetched(&self) -> bool {
        self.sealed && !self.categories.is_empty() && self.missing_entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, category: ProductCategory) -> CatalogEntry {
        CatalogEntry::new(id, category, json!({ "title": id }))
    }

    #[test]
    fn same_category_reregistration_is_accepted() {
        let mut reg = ProductRegistry::new();
        reg.register(ProductCategory::Consumable, ["coin_100"]).unwrap();
        reg.register(ProductCategory::Consumable, ["coin_100", "coin_500"])
            .unwrap();
        assert_eq!(reg.ids(ProductCategory::Consumable).len(), 2);
    }

    #[test]
    fn failed_registration_is_atomic() {
        let mut reg = ProductRegistry::new();
        reg.register(ProductCategory::NonConsumable, ["remove_ads"])
            .unwrap();
        let err = reg
            .register(ProductCategory::Consumable, ["coin_100", "remove_ads"])
            .unwrap_err();
        assert!(matches!(err, BillingError::Configuration(_)));
        assert!(reg.classify("coin_100").is_err(), "partial registration leaked");
    }

    #[test]
    fn blank_id_rejected() {
        let mut reg = ProductRegistry::new();
        let err = reg.register(ProductCategory::Subscription, ["  "]).unwrap_err();
        assert!(matches!(err, BillingError::Configuration(_)));
    }

    #[test]
    fn seal_is_idempotent() {
        let mut reg = ProductRegistry::new();
        reg.register(ProductCategory::Consumable, ["coin_100"]).unwrap();
        let first = reg.seal().unwrap();
        let second = reg.seal().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn record_catalog_overwrites_and_ignores_unregistered() {
        let mut reg = ProductRegistry::new();
        reg.register(ProductCategory::NonConsumable, ["remove_ads"])
            .unwrap();
        reg.seal().unwrap();

        let recorded = reg.record_catalog(vec![
            entry("remove_ads", ProductCategory::NonConsumable),
            entry("stranger", ProductCategory::Consumable),
        ]);
        assert_eq!(recorded.len(), 1);

        let fresh = CatalogEntry::new(
            "remove_ads",
            ProductCategory::NonConsumable,
            json!({ "title": "Remove ads", "price": "0.99" }),
        );
        reg.record_catalog(vec![fresh.clone()]);
        assert_eq!(reg.entry("remove_ads"), Some(&fresh));
        assert!(reg.entry("stranger").is_none());
    }

    #[test]
    fn record_catalog_forces_registered_category() {
        let mut reg = ProductRegistry::new();
        reg.register(ProductCategory::Subscription, ["vip_monthly"])
            .unwrap();
        let recorded = reg.record_catalog(vec![entry("vip_monthly", ProductCategory::Consumable)]);
        assert_eq!(recorded[0].category, ProductCategory::Subscription);
    }

    #[test]
    fn partitions_skip_empty_categories() {
        let mut reg = ProductRegistry::new();
        reg.register(ProductCategory::Subscription, ["vip_monthly"])
            .unwrap();
        reg.register(ProductCategory::Consumable, ["coin_100"]).unwrap();
        let parts: Vec<_> = reg.partitions().into_iter().map(|(c, _)| c).collect();
        assert_eq!(
            parts,
            vec![ProductCategory::Consumable, ProductCategory::Subscription]
        );
    }
}
