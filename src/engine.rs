//! Proof generation.
//!
//! [`ContextEngine`] is stateless: every call takes the witness, a pinned
//! policy snapshot and the request nonce, runs the four circuits and the
//! aggregator, and hands the public statement to the proving backend.
//! Any number of calls may run concurrently.

use tracing::{debug, info, instrument};

use crate::circuit::aggregator::{aggregate, Aggregate, CategoryHashes, CategoryVerdicts};
use crate::circuit::behavior::{pattern_proof_hash, verify_behavior, PatternOutputs, MAX_RISK};
use crate::circuit::device::{device_proof_hash, verify_device, DeviceOutputs};
use crate::circuit::location::{location_proof_hash, verify_location, LocationOutputs};
use crate::circuit::time_window::{time_proof_hash, verify_time_window, TimeOutputs};
use crate::error::{ContextError, Result};
use crate::policy::{PolicyKey, PolicySnapshot, PolicySource};
use crate::proof::{CommitmentBackend, ProvingBackend, PublicStatement};
use crate::types::{Category, ChallengeNonce, ContextProof};
use crate::verifier;
use crate::witness::ContextWitness;

/// Prover-side view of one evaluation.
///
/// Holds per-check diagnostics that never leave the prover; only the
/// aggregate's artifact and signals are published.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub device: Option<DeviceOutputs>,
    pub time: Option<TimeOutputs>,
    pub location: Option<LocationOutputs>,
    pub pattern: Option<PatternOutputs>,
    pub aggregate: Aggregate,
}

/// The context verification engine.
#[derive(Clone, Debug, Default)]
pub struct ContextEngine<B: ProvingBackend = CommitmentBackend> {
    backend: B,
}

impl ContextEngine<CommitmentBackend> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: ProvingBackend> ContextEngine<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the circuits and the aggregator without producing a proof.
    ///
    /// Input errors are raised before any circuit runs. Unsatisfied policy
    /// is data, not an error.
    pub fn evaluate(
        &self,
        witness: &ContextWitness,
        snapshot: &PolicySnapshot,
        nonce: &ChallengeNonce,
    ) -> Result<Evaluation> {
        nonce.validate()?;

        if let Some(found) = witness.policy_version {
            if found != snapshot.version() {
                return Err(ContextError::PolicyVersionMismatch {
                    expected: snapshot.version(),
                    found,
                });
            }
        }

        let mask = snapshot.access.requirements;
        if let Some(missing) = Category::ALL
            .into_iter()
            .find(|c| mask.requires(*c) && !witness.has(*c))
        {
            return Err(ContextError::MissingContext(missing));
        }

        witness.validate()?;

        let device = witness
            .device
            .as_ref()
            .map(|w| verify_device(w, &snapshot.device, nonce))
            .transpose()?;
        let time = witness
            .time
            .as_ref()
            .map(|w| verify_time_window(w, &snapshot.time))
            .transpose()?;
        let location = witness
            .location
            .as_ref()
            .map(|w| verify_location(w, &snapshot.location))
            .transpose()?;
        let pattern = witness
            .behavior
            .as_ref()
            .map(|w| verify_behavior(w, &snapshot.pattern))
            .transpose()?;

        let verdicts = CategoryVerdicts {
            device: device.map_or(false, |o| o.device_verified),
            time: time.map_or(false, |o| o.overall_valid),
            location: location.map_or(false, |o| o.overall_valid),
            pattern: pattern.map_or(false, |o| o.overall_pattern_valid),
            pattern_risk: pattern.map_or(MAX_RISK, |o| o.risk_score),
        };
        let hashes = CategoryHashes {
            device: device.map_or_else(|| device_proof_hash(&snapshot.device, nonce, false), |o| o.proof_hash),
            time: time.map_or_else(|| time_proof_hash(&snapshot.time, false), |o| o.proof_hash),
            location: location.map_or_else(|| location_proof_hash(&snapshot.location, false), |o| o.proof_hash),
            pattern: pattern.map_or_else(
                || pattern_proof_hash(&snapshot.pattern, false, MAX_RISK),
                |o| o.proof_hash,
            ),
        };

        let aggregate = aggregate(&verdicts, &hashes, &snapshot.access, nonce, snapshot.version())?;
        Ok(Evaluation {
            device,
            time,
            location,
            pattern,
            aggregate,
        })
    }

    /// Evaluate and prove.
    ///
    /// # Arguments
    /// * `witness` - Private context for this request
    /// * `snapshot` - Pinned policy the witness is checked against
    /// * `nonce` - Challenge issued by the relying party
    ///
    /// # Returns
    /// The published artifact, its public signals and the backend proof.
    /// Unsatisfied policy still yields a proof of the negative decision;
    /// input, policy and backend failures return an error.
    #[instrument(skip_all, fields(policy_version = snapshot.version(), backend = self.backend.name()))]
    pub fn prove(
        &self,
        witness: &ContextWitness,
        snapshot: &PolicySnapshot,
        nonce: &ChallengeNonce,
    ) -> Result<ContextProof> {
        let evaluation = self.evaluate(witness, snapshot, nonce)?;
        let Aggregate { artifact, signals } = evaluation.aggregate;

        let statement = PublicStatement::new(snapshot, nonce.clone(), signals);
        let proof = self.backend.prove(&statement, witness)?;
        debug!(proof_size = proof.size(), "backend proof built");

        info!(
            device = artifact.device_verified,
            time = artifact.timestamp_verified,
            location = artifact.location_verified,
            pattern = artifact.pattern_verified,
            overall_valid = artifact.overall_valid,
            trust_score = artifact.trust_score,
            level = snapshot.access.level.as_u8(),
            level_met = artifact.verification_level_met,
            audit = %artifact.audit_id(),
            "context proof generated"
        );

        Ok(ContextProof {
            artifact,
            public_signals: signals.to_vec(),
            policy_version: snapshot.version(),
            proof,
        })
    }

    /// Fetch the current snapshot for `key`, then prove against it.
    ///
    /// The snapshot is pinned before any circuit runs; a policy published
    /// mid-request does not affect this proof.
    pub fn prove_for_key(
        &self,
        source: &dyn PolicySource,
        key: &PolicyKey,
        witness: &ContextWitness,
        nonce: &ChallengeNonce,
    ) -> Result<(PolicySnapshot, ContextProof)> {
        let snapshot = source.snapshot(key)?;
        let proof = self.prove(witness, &snapshot, nonce)?;
        Ok((snapshot, proof))
    }

    /// Verify with this engine's backend.
    pub fn verify(&self, proof: &ContextProof, snapshot: &PolicySnapshot, nonce: &ChallengeNonce) -> bool {
        verifier::check_with(&self.backend, proof, snapshot, nonce).is_ok()
    }
}
