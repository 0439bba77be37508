//! Relying-party verification of context proofs.
//!
//! Verification needs only public data: the proof, the pinned policy
//! snapshot and the nonce the relying party issued. It checks that:
//! 1. The proof was made against this policy version
//! 2. The public signals satisfy the aggregator relation
//! 3. The artifact and audit commitment match what the policy implies
//! 4. The backend proof binds the full public statement

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::circuit::aggregator::{aggregate, CategoryHashes, CategoryVerdicts};
use crate::circuit::behavior::pattern_proof_hash;
use crate::circuit::device::device_proof_hash;
use crate::circuit::location::location_proof_hash;
use crate::circuit::time_window::time_proof_hash;
use crate::error::{ContextError, Result};
use crate::policy::{PolicyParameters, PolicySnapshot};
use crate::proof::{CommitmentBackend, ProvingBackend, PublicStatement};
use crate::types::{ChallengeNonce, ContextProof, PublicSignals};

/// Category hashes implied by the public verdicts under `params`.
pub fn category_hashes(
    params: &PolicyParameters,
    nonce: &ChallengeNonce,
    verdicts: &CategoryVerdicts,
) -> CategoryHashes {
    CategoryHashes {
        device: device_proof_hash(&params.device, nonce, verdicts.device),
        time: time_proof_hash(&params.time, verdicts.time),
        location: location_proof_hash(&params.location, verdicts.location),
        pattern: pattern_proof_hash(&params.pattern, verdicts.pattern, verdicts.pattern_risk),
    }
}

/// Full check against a specific backend, reporting why a proof fails.
pub fn check_with<B: ProvingBackend>(
    backend: &B,
    proof: &ContextProof,
    snapshot: &PolicySnapshot,
    nonce: &ChallengeNonce,
) -> Result<()> {
    nonce.validate()?;

    if proof.policy_version != snapshot.version() {
        return Err(ContextError::PolicyVersionMismatch {
            expected: snapshot.version(),
            found: proof.policy_version,
        });
    }

    let signals = PublicSignals::from_slice(&proof.public_signals)?;
    if signals.level != snapshot.access.level || signals.mask != snapshot.access.requirements {
        return Err(ContextError::MalformedProof {
            reason: "access policy in signals differs from snapshot".to_string(),
        });
    }

    let verdicts = CategoryVerdicts {
        device: signals.device,
        time: signals.time,
        location: signals.location,
        pattern: signals.pattern,
        pattern_risk: signals.risk_score,
    };
    let hashes = category_hashes(snapshot.params(), nonce, &verdicts);
    let expected = aggregate(&verdicts, &hashes, &snapshot.access, nonce, snapshot.version())?;

    if expected.signals != signals {
        return Err(ContextError::MalformedProof {
            reason: "public signals violate the aggregator relation".to_string(),
        });
    }
    if expected.artifact != proof.artifact {
        return Err(ContextError::MalformedProof {
            reason: "artifact does not match public signals".to_string(),
        });
    }

    let statement = PublicStatement::new(snapshot, nonce.clone(), signals);
    if !backend.verify(&statement, &proof.proof) {
        return Err(ContextError::MalformedProof {
            reason: format!("{} backend rejected the proof", backend.name()),
        });
    }
    Ok(())
}

/// Verify `proof` against the pinned policy and the issued nonce.
///
/// This function checks that:
/// 1. The proof was built for `snapshot`'s version and access policy
/// 2. The public signals satisfy the aggregator relation
/// 3. The artifact matches the signals
/// 4. The commitment backend's tag binds the statement
///
/// Only integrity is checked here: the commitment tag does not show that a
/// witness satisfied the policy. Use [`check_with`] and the `nova` backend
/// when the prover is not trusted.
///
/// # Arguments
/// * `proof` - The context proof received from the prover
/// * `snapshot` - The policy snapshot the relying party pinned for the request
/// * `nonce` - The challenge issued for this request
///
/// # Returns
/// `true` if every check passes, `false` otherwise
pub fn verify(proof: &ContextProof, snapshot: &PolicySnapshot, nonce: &ChallengeNonce) -> bool {
    match check_with(&CommitmentBackend, proof, snapshot, nonce) {
        Ok(()) => true,
        Err(err) => {
            debug!(error = %err, "proof rejected");
            false
        }
    }
}

/// Verify many proofs against one policy snapshot.
///
/// # Arguments
/// * `proofs` - Pairs of a proof and the nonce issued for it
/// * `snapshot` - The policy snapshot shared by every request
///
/// # Returns
/// One [`verify`] outcome per pair, in input order
pub fn batch_verify(
    proofs: &[(&ContextProof, &ChallengeNonce)],
    snapshot: &PolicySnapshot,
) -> Vec<bool> {
    proofs
        .iter()
        .map(|(proof, nonce)| verify(proof, snapshot, nonce))
        .collect()
}

/// Parallel [`batch_verify`]. Proofs are independent, so order is preserved
/// and no coordination is needed.
#[cfg(feature = "parallel")]
pub fn par_batch_verify(
    proofs: &[(&ContextProof, &ChallengeNonce)],
    snapshot: &PolicySnapshot,
) -> Vec<bool> {
    use rayon::prelude::*;

    proofs
        .par_iter()
        .map(|(proof, nonce)| verify(proof, snapshot, nonce))
        .collect()
}

/// Outcome of a single verification, for audit pipelines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationReport {
    /// Hex audit commitment claimed by the proof.
    pub proof_id: String,
    pub valid: bool,
    pub elapsed: Duration,
    pub error: Option<String>,
}

/// Verify and report timing plus the rejection reason.
pub fn verify_with_details(
    proof: &ContextProof,
    snapshot: &PolicySnapshot,
    nonce: &ChallengeNonce,
) -> VerificationReport {
    let start = Instant::now();
    let outcome = check_with(&CommitmentBackend, proof, snapshot, nonce);
    let elapsed = start.elapsed();

    let proof_id = proof.artifact.audit_id();
    if let Err(err) = &outcome {
        warn!(proof_id = %proof_id, error = %err, "verification failed");
    }

    VerificationReport {
        proof_id,
        valid: outcome.is_ok(),
        elapsed,
        error: outcome.err().map(|e| e.to_string()),
    }
}
