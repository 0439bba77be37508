//! Versioned, immutable policy snapshots and the policy-store seam.
//!
//! A snapshot is pinned for the whole of one verification. Publishing a new
//! version never touches snapshots already handed out.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ContextError, Result};
use crate::policy::types::PolicyParameters;
use crate::types::Commitment;

/// Lookup key: tenant plus protected resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyKey {
    pub tenant: String,
    pub resource: String,
}

impl PolicyKey {
    pub fn new(tenant: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.resource)
    }
}

/// Immutable, validated policy with its digest computed once.
#[derive(Clone, Debug)]
pub struct PolicySnapshot {
    params: Arc<PolicyParameters>,
    digest: Commitment,
}

impl PolicySnapshot {
    pub fn new(params: PolicyParameters) -> Result<Self> {
        params.validate()?;
        let digest = params.digest()?;
        Ok(Self {
            params: Arc::new(params),
            digest,
        })
    }

    pub fn version(&self) -> u64 {
        self.params.version
    }

    pub fn digest(&self) -> &Commitment {
        &self.digest
    }

    pub fn params(&self) -> &PolicyParameters {
        &self.params
    }
}

impl Deref for PolicySnapshot {
    type Target = PolicyParameters;

    fn deref(&self) -> &PolicyParameters {
        &self.params
    }
}

/// Source of policy snapshots (the external configuration store).
///
/// Fetching is a discrete step before proof generation; implementations
/// own their timeout and retry policy.
pub trait PolicySource: Send + Sync {
    fn snapshot(&self, key: &PolicyKey) -> Result<PolicySnapshot>;
}

/// In-process policy store.
///
/// Entries are whole snapshots swapped in by a single insert, so a writer
/// that panicked cannot leave one half-written. Lock poisoning is ignored.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    entries: RwLock<HashMap<PolicyKey, PolicySnapshot>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `params` under `key` as the next version and return the new snapshot.
    ///
    /// The version is one past the current entry (or 1), whatever
    /// `params.version` held.
    pub fn publish(&self, key: PolicyKey, mut params: PolicyParameters) -> Result<PolicySnapshot> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        params.version = entries.get(&key).map_or(1, |current| current.version() + 1);
        let snapshot = PolicySnapshot::new(params)?;

        info!(policy = %key, version = snapshot.version(), "published policy");
        entries.insert(key, snapshot.clone());
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PolicySource for InMemoryPolicyStore {
    fn snapshot(&self, key: &PolicyKey) -> Result<PolicySnapshot> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| ContextError::UnknownPolicy(key.to_string()))
    }
}
