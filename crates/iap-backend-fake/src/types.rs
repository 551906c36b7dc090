use iap_schemas::{ProductCategory, ProductId};

/// One request received by the fake backend, recorded for assertions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    StartConnection,
    EndConnection,
    QueryCatalog(ProductCategory),
    QueryOwned(ProductCategory),
    LaunchFlow(ProductId),
    /// purchase token
    Consume(String),
    /// purchase token
    Acknowledge(String),
    SubscriptionsSupported,
}

impl BackendCall {
    pub fn is_finalize(&self) -> bool {
        matches!(self, BackendCall::Consume(_) | BackendCall::Acknowledge(_))
    }
}
