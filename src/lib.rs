//! # zk-context
//!
//! Zero-knowledge context verification for zero-trust access decisions.
//!
//! A party proves that its device, access time, location and behavior
//! satisfy a tenant's policy without revealing the fingerprint, timestamps,
//! coordinates or telemetry behind the verdicts. The relying party receives
//! one [`ProofArtifact`] with per-category verdicts, a bounded trust score
//! and an audit commitment, plus an opaque proof it can check against the
//! same policy snapshot.
//!
//! ## Features
//!
//! - **Four circuits**: device attestation, time window, location chain,
//!   behavioral pattern, each usable on its own
//! - **Gated aggregation**: requirement mask, weighted trust score,
//!   verification levels 1-4
//! - **Pinned policy snapshots**: versioned, immutable, digest-bound
//! - **`nova`**: folding SNARK over Pallas/Vesta that recomputes the time,
//!   location and pattern verdicts from the witness (`nova::NovaBackend`)
//! - **`parallel`**: rayon batch verification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zk_context::{ChallengeNonce, ContextEngine, ContextWitness, PolicyParameters, PolicySnapshot};
//!
//! # fn run(witness: ContextWitness, policy_json: &str) -> zk_context::Result<()> {
//! let snapshot = PolicySnapshot::new(PolicyParameters::from_json(policy_json)?)?;
//! let nonce = ChallengeNonce::random();
//!
//! let engine = ContextEngine::new();
//! let proof = engine.prove(&witness, &snapshot, &nonce)?;
//!
//! assert!(zk_context::verify(&proof, &snapshot, &nonce));
//! println!("trust score: {}", proof.artifact.trust_score);
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! - Witness material is zeroized on drop and never logged
//! - Every proof is bound to a fresh challenge nonce
//! - Commitment comparisons are constant-time
//! - The default [`CommitmentBackend`] is an integrity tag for a trusted
//!   prover, not a proof of knowledge: it binds the statement, but anyone
//!   can tag any statement. Untrusted provers need the `nova` backend.

pub mod circuit;
pub mod engine;
pub mod error;
pub mod policy;
pub mod proof;
pub mod types;
pub mod utils;
pub mod verifier;
pub mod witness;

#[cfg(feature = "nova")]
pub mod nova;

// Re-export core functionality
pub use engine::{ContextEngine, Evaluation};
pub use proof::{CommitmentBackend, ProvingBackend, PublicStatement, WitnessDigest};
pub use verifier::{batch_verify, verify, verify_with_details, VerificationReport};

#[cfg(feature = "parallel")]
pub use verifier::par_batch_verify;

// Re-export circuit entry points
pub use circuit::{
    aggregate, behavior_commitment, device_commitment, rolling_code, time_step, trust_score,
    verify_behavior, verify_device, verify_location, verify_time_window, DeviceSigningKey,
};

// Re-export types
pub use error::{ContextError, ErrorKind, Result};
pub use policy::{
    AccessPolicy, DevicePolicy, InMemoryPolicyStore, LocationPolicy, PatternPolicy, PolicyKey,
    PolicyParameters, PolicySnapshot, PolicySource, Region, TimePolicy,
};
pub use types::{
    Category, ChallengeNonce, Commitment, ContextProof, GeoPoint, MerkleProof, ProofArtifact,
    PublicSignals, RequirementMask, VerificationLevel, ZkProof,
};
pub use utils::MerkleTree;
pub use witness::{BehaviorWitness, ContextWitness, DeviceWitness, LocationWitness, TimeWitness};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
