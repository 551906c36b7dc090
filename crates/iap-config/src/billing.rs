use anyhow::{bail, Result};
use iap_schemas::{ProductCategory, ProductId};
use serde::{Deserialize, Serialize};

/// Typed view of the effective configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BillingConfig {
    pub products: ProductsConfig,
    pub billing: BillingToggles,
    pub signature: SignatureConfig,
    pub reconnect: ReconnectConfig,
}

/// Product id lists per category. Absent lists are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductsConfig {
    pub consumable: Vec<String>,
    pub non_consumable: Vec<String>,
    pub subscription: Vec<String>,
}

impl ProductsConfig {
    pub fn ids(&self, category: ProductCategory) -> &[String] {
        match category {
            ProductCategory::Consumable => &self.consumable,
            ProductCategory::NonConsumable => &self.non_consumable,
            ProductCategory::Subscription => &self.subscription,
        }
    }

    /// Every category with its ids, in [`ProductCategory::ALL`] order.
    pub fn by_category(&self) -> Vec<(ProductCategory, Vec<ProductId>)> {
        ProductCategory::ALL
            .iter()
            .map(|c| (*c, self.ids(*c).iter().map(|s| ProductId::from(s.as_str())).collect()))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.consumable.len() + self.non_consumable.len() + self.subscription.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BillingToggles {
    pub auto_acknowledge: bool,
    pub auto_consume: bool,
}

impl Default for BillingToggles {
    fn default() -> Self {
        Self {
            auto_acknowledge: true,
            auto_consume: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignatureConfig {
    /// Name of the env var holding the base64 trust key.
    pub trust_key_env: String,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            trust_key_env: "IAP_TRUST_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 250,
            max_delay_ms: 30_000,
            max_attempts: None,
        }
    }
}

impl BillingConfig {
    /// Shape checks that serde cannot express. Category overlap is left to
    /// the product registry so both entry points report it the same way.
    pub fn validate(&self) -> Result<()> {
        if self.signature.trust_key_env.trim().is_empty() {
            bail!("CONFIG_INVALID: signature.trust_key_env must name an env var");
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            bail!(
                "CONFIG_INVALID: reconnect.max_delay_ms ({}) < reconnect.initial_delay_ms ({})",
                self.reconnect.max_delay_ms,
                self.reconnect.initial_delay_ms
            );
        }
        if self.reconnect.max_attempts == Some(0) {
            bail!("CONFIG_INVALID: reconnect.max_attempts must be at least 1 (or null)");
        }
        Ok(())
    }
}
