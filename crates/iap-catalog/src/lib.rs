//! iap-catalog
//!
//! Product Registry: the declared product ids, partitioned into three
//! disjoint ownership categories, plus the catalog entries fetched for them.
//!
//! Registration is open until the registry is sealed at connect time.
//! After sealing, only catalog entries change.

mod registry;

pub use registry::ProductRegistry;
