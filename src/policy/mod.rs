//! Policy parameters, snapshots and the policy-store seam.
//!
//! Policies are public, versioned and immutable once published. Every
//! verification pins one [`PolicySnapshot`].

pub mod types;
pub mod store;

pub use types::{AccessPolicy, DevicePolicy, LocationPolicy, PatternPolicy, PolicyParameters, Region, TimePolicy};
pub use store::{InMemoryPolicyStore, PolicyKey, PolicySnapshot, PolicySource};
