//! Device attestation circuit.
//!
//! Proves the device fingerprint commits to the expected value, that the
//! identity service signed it for this request's nonce, and that the
//! device is whitelisted and not revoked. No partial credit: one failing
//! check clears `device_verified`.

use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use crate::circuit::gadgets::{all, commitment_eq, Bit};
use crate::error::Result;
use crate::policy::DevicePolicy;
use crate::types::{ChallengeNonce, Commitment};
use crate::utils::{commit, ct_contains, MerkleTree};
use crate::witness::DeviceWitness;

const DEVICE_COMMIT_TAG: &[u8] = b"zkctx/device-commit/v1";
const SIGNER_PK_TAG: &[u8] = b"zkctx/signer-pk/v1";
const DEVICE_SIG_TAG: &[u8] = b"zkctx/device-sig/v1";
const DEVICE_PROOF_TAG: &[u8] = b"zkctx/device-proof/v1";

/// `H(fingerprint || salt)`, the value policies pin.
pub fn device_commitment(fingerprint: &str, salt: &[u8; 32]) -> Commitment {
    commit(DEVICE_COMMIT_TAG, &[fingerprint.as_bytes(), salt])
}

/// Public half of the hash-based signer key.
pub fn signer_public_key(signer_secret: &[u8; 32]) -> Commitment {
    commit(SIGNER_PK_TAG, &[signer_secret])
}

/// Signature binding over fingerprint and nonce.
pub fn signature_binding(signer_secret: &[u8; 32], fingerprint: &str, nonce: &ChallengeNonce) -> Commitment {
    commit(DEVICE_SIG_TAG, &[signer_secret, fingerprint.as_bytes(), nonce.as_bytes()])
}

/// Signing key held by the identity service (or its HSM).
///
/// The engine only consumes its output; this type exists so callers and
/// tests can produce well-formed signatures.
pub struct DeviceSigningKey {
    secret: Zeroizing<[u8; 32]>,
}

impl DeviceSigningKey {
    pub fn generate() -> Self {
        let mut secret = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut *secret);
        Self { secret }
    }

    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self { secret: Zeroizing::new(secret) }
    }

    pub fn public_key(&self) -> Commitment {
        signer_public_key(&self.secret)
    }

    pub fn sign(&self, fingerprint: &str, nonce: &ChallengeNonce) -> [u8; 32] {
        signature_binding(&self.secret, fingerprint, nonce)
    }

    /// Raw secret for embedding in a witness.
    pub fn secret_bytes(&self) -> [u8; 32] {
        *self.secret
    }
}

/// Public outputs of the device circuit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceOutputs {
    pub commitment_ok: bool,
    pub signer_ok: bool,
    pub signature_ok: bool,
    pub not_revoked: bool,
    pub whitelisted: bool,
    pub device_verified: bool,
    pub proof_hash: Commitment,
}

/// Hash contribution binding the public device policy, nonce and verdict.
pub fn device_proof_hash(policy: &DevicePolicy, nonce: &ChallengeNonce, verified: bool) -> Commitment {
    let whitelist_root = policy.whitelist_root.unwrap_or([0u8; 32]);
    commit(
        DEVICE_PROOF_TAG,
        &[
            &policy.expected_commitment,
            &policy.signer_public_key,
            &whitelist_root,
            nonce.as_bytes(),
            &[verified as u8],
        ],
    )
}

/// Evaluate the device circuit.
pub fn verify_device(
    witness: &DeviceWitness,
    policy: &DevicePolicy,
    nonce: &ChallengeNonce,
) -> Result<DeviceOutputs> {
    witness.validate()?;

    let commitment = device_commitment(&witness.fingerprint, &witness.salt);
    let commitment_ok = commitment_eq(&commitment, &policy.expected_commitment);

    let signer_ok = commitment_eq(&signer_public_key(&witness.signer_secret), &policy.signer_public_key);
    let expected_sig = signature_binding(&witness.signer_secret, &witness.fingerprint, nonce);
    let signature_ok = commitment_eq(&expected_sig, &witness.signature);

    let not_revoked = Bit::from_bool(ct_contains(&policy.revoked_commitments, &commitment)).not();

    let whitelisted = match (&policy.whitelist_root, &witness.whitelist_proof) {
        (None, _) => Bit::ONE,
        (Some(root), Some(path)) => {
            commitment_eq(path.leaf_hash(), &commitment)
                .and(Bit::from_bool(MerkleTree::verify_proof(root, path)))
        }
        (Some(_), None) => Bit::ZERO,
    };

    let verified = all(&[commitment_ok, signer_ok, signature_ok, not_revoked, whitelisted]);
    debug!(verified = verified.is_set(), "device circuit evaluated");

    Ok(DeviceOutputs {
        commitment_ok: commitment_ok.is_set(),
        signer_ok: signer_ok.is_set(),
        signature_ok: signature_ok.is_set(),
        not_revoked: not_revoked.is_set(),
        whitelisted: whitelisted.is_set(),
        device_verified: verified.is_set(),
        proof_hash: device_proof_hash(policy, nonce, verified.is_set()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;

    const FINGERPRINT: &str = "tpm:ab12-cd34";

    fn setup(nonce: &ChallengeNonce) -> (DeviceWitness, DevicePolicy) {
        let key = DeviceSigningKey::from_bytes([7u8; 32]);
        let salt = [5u8; 32];
        let witness = DeviceWitness {
            fingerprint: FINGERPRINT.to_string(),
            salt,
            signature: key.sign(FINGERPRINT, nonce),
            signer_secret: key.secret_bytes(),
            whitelist_proof: None,
        };
        let policy = DevicePolicy {
            expected_commitment: device_commitment(FINGERPRINT, &salt),
            signer_public_key: key.public_key(),
            whitelist_root: None,
            revoked_commitments: Vec::new(),
        };
        (witness, policy)
    }

    #[test]
    fn test_valid_device() {
        let nonce = ChallengeNonce::new("req-1").unwrap();
        let (witness, policy) = setup(&nonce);
        let out = verify_device(&witness, &policy, &nonce).unwrap();
        assert!(out.device_verified);
    }

    #[test]
    fn test_replayed_signature_fails_for_new_nonce() {
        let old = ChallengeNonce::new("req-1").unwrap();
        let new = ChallengeNonce::new("req-2").unwrap();
        let (witness, policy) = setup(&old);
        let out = verify_device(&witness, &policy, &new).unwrap();
        assert!(!out.signature_ok);
        assert!(!out.device_verified);
        assert!(out.commitment_ok);
    }

    #[test]
    fn test_wrong_salt_breaks_commitment() {
        let nonce = ChallengeNonce::new("req-1").unwrap();
        let (mut witness, policy) = setup(&nonce);
        witness.salt = [6u8; 32];
        let out = verify_device(&witness, &policy, &nonce).unwrap();
        assert!(!out.commitment_ok);
        assert!(!out.device_verified);
    }

    #[test]
    fn test_foreign_signer_rejected() {
        let nonce = ChallengeNonce::new("req-1").unwrap();
        let (mut witness, policy) = setup(&nonce);
        let rogue = DeviceSigningKey::from_bytes([8u8; 32]);
        witness.signer_secret = rogue.secret_bytes();
        witness.signature = rogue.sign(FINGERPRINT, &nonce);
        let out = verify_device(&witness, &policy, &nonce).unwrap();
        assert!(out.signature_ok);
        assert!(!out.signer_ok);
        assert!(!out.device_verified);
    }

    #[test]
    fn test_revoked_device() {
        let nonce = ChallengeNonce::new("req-1").unwrap();
        let (witness, mut policy) = setup(&nonce);
        policy.revoked_commitments = vec![[0u8; 32], policy.expected_commitment];
        let out = verify_device(&witness, &policy, &nonce).unwrap();
        assert!(!out.not_revoked);
        assert!(!out.device_verified);
    }

    #[test]
    fn test_whitelist_membership() {
        let nonce = ChallengeNonce::new("req-1").unwrap();
        let (mut witness, mut policy) = setup(&nonce);
        let tree = MerkleTree::from_leaves(&[[1u8; 32], policy.expected_commitment, [2u8; 32]]);
        policy.whitelist_root = Some(tree.root());

        let out = verify_device(&witness, &policy, &nonce).unwrap();
        assert!(!out.whitelisted, "missing membership path must fail");

        witness.whitelist_proof = tree.prove(0);
        let out = verify_device(&witness, &policy, &nonce).unwrap();
        assert!(!out.whitelisted, "path for another leaf must fail");

        witness.whitelist_proof = tree.prove(1);
        let out = verify_device(&witness, &policy, &nonce).unwrap();
        assert!(out.whitelisted);
        assert!(out.device_verified);
    }

    #[test]
    fn test_empty_fingerprint_rejected_before_evaluation() {
        let nonce = ChallengeNonce::new("req-1").unwrap();
        let (mut witness, policy) = setup(&nonce);
        witness.fingerprint = "  ".to_string();
        assert!(matches!(
            verify_device(&witness, &policy, &nonce),
            Err(ContextError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_proof_hash_binds_verdict_not_witness() {
        let nonce = ChallengeNonce::new("req-1").unwrap();
        let (witness, policy) = setup(&nonce);
        let out = verify_device(&witness, &policy, &nonce).unwrap();
        assert_eq!(out.proof_hash, device_proof_hash(&policy, &nonce, true));
        assert_ne!(out.proof_hash, device_proof_hash(&policy, &nonce, false));
    }
}
