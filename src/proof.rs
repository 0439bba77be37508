//! Proving backend seam.
//!
//! The engine treats zero-knowledge proving as a black box: a backend turns
//! a public statement plus the private witness into opaque proof bytes, and
//! checks those bytes against the statement later.
//!
//! # Backends
//! - [`CommitmentBackend`] (default): a trusted-prover integrity tag. It
//!   binds the public statement and a blinded witness commitment, but the
//!   verifier cannot tell whether any witness satisfied the policy. Anyone
//!   able to run the engine can tag any statement. Use it only where the
//!   prover is trusted and the relying party needs tamper evidence in transit.
//! - `NovaBackend` (feature `nova`, in `crate::nova`): a folding SNARK
//!   whose step circuit recomputes the time, location and behavior verdicts
//!   and the risk score from the witness, plus the aggregator arithmetic.

use merlin::Transcript;
use rand_core::{OsRng, RngCore};
use sha3::{Digest, Sha3_256};
use zeroize::Zeroizing;

use crate::error::{ContextError, Result};
use crate::policy::PolicySnapshot;
use crate::types::{ChallengeNonce, Commitment, PublicSignals, ZkProof, NUM_PUBLIC_SIGNALS};
use crate::utils::{commit, ct_eq};
use crate::witness::ContextWitness;

/// Current proof format version.
pub const PROOF_VERSION: u8 = 0x01;

/// version (1) + signal count (2) + witness commitment (32) + transcript tag (32) + inputs hash (32)
pub const PROOF_SIZE: usize = 1 + 2 + 32 + 32 + 32;

const PUBLIC_INPUTS_TAG: &[u8] = b"zkctx/public-inputs/v1";
const WITNESS_DIGEST_TAG: &[u8] = b"zkctx/witness-digest/v1";
const BLINDED_WITNESS_TAG: &[u8] = b"zkctx/blinded-witness/v1";
const TRANSCRIPT_LABEL: &[u8] = b"zkctx-commitment-backend";

/// Everything the relying party can see about one request.
#[derive(Clone, Debug)]
pub struct PublicStatement {
    pub snapshot: PolicySnapshot,
    pub nonce: ChallengeNonce,
    pub signals: PublicSignals,
}

impl PublicStatement {
    pub fn new(snapshot: &PolicySnapshot, nonce: ChallengeNonce, signals: PublicSignals) -> Self {
        Self {
            snapshot: snapshot.clone(),
            nonce,
            signals,
        }
    }

    pub fn policy_version(&self) -> u64 {
        self.snapshot.version()
    }

    pub fn policy_digest(&self) -> &Commitment {
        self.snapshot.digest()
    }

    /// Hash of every public input.
    pub fn inputs_hash(&self) -> Commitment {
        commit(
            PUBLIC_INPUTS_TAG,
            &[
                &self.policy_version().to_le_bytes(),
                self.policy_digest(),
                self.nonce.as_bytes(),
                &self.signals.to_bytes(),
            ],
        )
    }
}

/// Digest of the private witness. Never leaves the prover unblinded.
pub struct WitnessDigest(Zeroizing<[u8; 32]>);

impl WitnessDigest {
    pub fn of(witness: &ContextWitness) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(WITNESS_DIGEST_TAG);

        if let Some(d) = &witness.device {
            hasher.update([1u8]);
            hasher.update((d.fingerprint.len() as u64).to_le_bytes());
            hasher.update(d.fingerprint.as_bytes());
            hasher.update(d.salt);
            hasher.update(d.signature);
        } else {
            hasher.update([0u8]);
        }

        if let Some(t) = &witness.time {
            hasher.update([1u8]);
            hasher.update(t.current_timestamp.to_le_bytes());
            hasher.update(t.previous_timestamp.to_le_bytes());
            hasher.update(t.timezone_offset_secs.to_le_bytes());
            hasher.update(t.rolling_seed);
        } else {
            hasher.update([0u8]);
        }

        if let Some(l) = &witness.location {
            hasher.update([1u8]);
            hasher.update(l.current.to_bytes());
            hasher.update(l.previous.to_bytes());
            hasher.update(l.ip_derived.to_bytes());
            hasher.update(l.travel_time_hours.to_le_bytes());
        } else {
            hasher.update([0u8]);
        }

        if let Some(b) = &witness.behavior {
            hasher.update([1u8]);
            for a in b.actions {
                hasher.update(a.to_le_bytes());
            }
            for t in b.timing_intervals {
                hasher.update(t.to_le_bytes());
            }
            hasher.update(b.session_duration_secs.to_le_bytes());
            hasher.update(b.typing_speed.to_le_bytes());
            hasher.update(b.pointer_activity.to_le_bytes());
            hasher.update(b.access_frequency.to_le_bytes());
            hasher.update(b.salt);
        } else {
            hasher.update([0u8]);
        }

        Self(Zeroizing::new(hasher.finalize().into()))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Black-box proving primitive.
pub trait ProvingBackend: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Prove `statement` from `witness`. A backend that checks the relation
    /// fails here when the witness does not produce the claimed signals.
    fn prove(&self, statement: &PublicStatement, witness: &ContextWitness) -> Result<ZkProof>;

    fn verify(&self, statement: &PublicStatement, proof: &ZkProof) -> bool;
}

/// Commitment-based backend: an integrity tag, not a proof of knowledge.
///
/// The proof carries a randomly blinded witness commitment and a merlin
/// Fiat-Shamir tag binding it to the public-inputs hash. It reveals nothing
/// about the witness and fails for any change to the statement, but the tag
/// is computable from public data alone. The relying party must trust the
/// prover to have run the circuits honestly.
#[derive(Copy, Clone, Debug, Default)]
pub struct CommitmentBackend;

impl CommitmentBackend {
    pub fn new() -> Self {
        Self
    }

    fn transcript_tag(policy_version: u64, inputs_hash: &[u8; 32], witness_commitment: &[u8]) -> [u8; 32] {
        let mut t = Transcript::new(TRANSCRIPT_LABEL);
        t.append_u64(b"policy_version", policy_version);
        t.append_message(b"public_inputs", inputs_hash);
        t.append_message(b"witness_commitment", witness_commitment);
        let mut tag = [0u8; 32];
        t.challenge_bytes(b"tag", &mut tag);
        tag
    }
}

impl ProvingBackend for CommitmentBackend {
    fn name(&self) -> &'static str {
        "commitment"
    }

    fn prove(&self, statement: &PublicStatement, witness: &ContextWitness) -> Result<ZkProof> {
        let inputs_hash = statement.inputs_hash();
        let digest = WitnessDigest::of(witness);

        let mut blinding = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut *blinding);
        let witness_commitment = commit(BLINDED_WITNESS_TAG, &[digest.as_bytes(), &*blinding]);

        let tag = Self::transcript_tag(statement.policy_version(), &inputs_hash, &witness_commitment);

        let mut proof_bytes = Vec::with_capacity(PROOF_SIZE);
        proof_bytes.push(PROOF_VERSION);
        proof_bytes.extend_from_slice(&(NUM_PUBLIC_SIGNALS as u16).to_le_bytes());
        proof_bytes.extend_from_slice(&witness_commitment);
        proof_bytes.extend_from_slice(&tag);
        proof_bytes.extend_from_slice(&inputs_hash);

        if proof_bytes.len() != PROOF_SIZE {
            return Err(ContextError::MalformedProof {
                reason: format!("built {} proof bytes, expected {}", proof_bytes.len(), PROOF_SIZE),
            });
        }
        Ok(ZkProof::new(proof_bytes, inputs_hash))
    }

    fn verify(&self, statement: &PublicStatement, proof: &ZkProof) -> bool {
        if !validate_proof_structure(proof) {
            return false;
        }
        let bytes = proof.as_bytes();
        let (Some(witness_commitment), Some(tag), Some(embedded_inputs)) =
            (field32(bytes, 3), field32(bytes, 35), field32(bytes, 67))
        else {
            return false;
        };

        let expected_inputs = statement.inputs_hash();
        if !ct_eq(&expected_inputs, proof.public_inputs_hash()) || !ct_eq(&expected_inputs, &embedded_inputs) {
            return false;
        }

        let expected_tag = Self::transcript_tag(statement.policy_version(), &expected_inputs, &witness_commitment);
        ct_eq(&expected_tag, &tag)
    }
}

fn field32(bytes: &[u8], offset: usize) -> Option<[u8; 32]> {
    bytes.get(offset..offset + 32)?.try_into().ok()
}

/// Structural checks only: size, version and signal count.
pub fn validate_proof_structure(proof: &ZkProof) -> bool {
    let bytes = proof.as_bytes();
    if bytes.len() != PROOF_SIZE {
        return false;
    }
    if bytes[0] != PROOF_VERSION {
        return false;
    }
    u16::from_le_bytes([bytes[1], bytes[2]]) as usize == NUM_PUBLIC_SIGNALS
}
