//! [`ProvingBackend`] over the context step circuit.
//!
//! The proof is one fold of [`ContextStepCircuit`] compressed with Spartan.
//! `z0` is rebuilt by the verifier from the statement alone, so a proof
//! exists for a statement only if some witness drives the circuit's time,
//! location and pattern verdicts and its risk score to the claimed signals.

use std::fmt;
use std::sync::Arc;

use nova_snark::{CompressedSNARK, ProverKey, RecursiveSNARK, VerifierKey};
use nova_snark::provider::{PallasEngine, VestaEngine};
use pasta_curves::pallas;
use tracing::{debug, info};

use crate::error::{ContextError, Result};
use crate::nova::context_circuit::{public_inputs, CircuitWitness};
use crate::nova::params::{gen_context_params, ContextParams, ContextPrimaryCircuit, SecondaryCircuit, S1, S2};
use crate::nova::prover::{nova_err, secondary_z0, FOLD_STEPS};
use crate::proof::{ProvingBackend, PublicStatement};
use crate::types::ZkProof;
use crate::utils::ct_eq;
use crate::witness::ContextWitness;

/// Proof format version for folding proofs.
pub const NOVA_PROOF_VERSION: u8 = 0x02;

pub type ContextSnark = CompressedSNARK<PallasEngine, VestaEngine, ContextPrimaryCircuit, SecondaryCircuit, S1, S2>;
pub type ContextProverKey = ProverKey<PallasEngine, VestaEngine, ContextPrimaryCircuit, SecondaryCircuit, S1, S2>;
pub type ContextVerifierKey = VerifierKey<PallasEngine, VestaEngine, ContextPrimaryCircuit, SecondaryCircuit, S1, S2>;

/// Folding-SNARK backend. Cloning shares the parameters and keys.
#[derive(Clone)]
pub struct NovaBackend {
    params: Arc<ContextParams>,
    pk: Arc<ContextProverKey>,
    vk: Arc<ContextVerifierKey>,
}

impl NovaBackend {
    /// Generate public parameters and the compressed-SNARK key pair.
    pub fn setup() -> Result<Self> {
        let params = gen_context_params()?;
        let (pk, vk) = CompressedSNARK::setup(&params).map_err(nova_err)?;
        info!("nova context backend ready");
        Ok(Self {
            params: Arc::new(params),
            pk: Arc::new(pk),
            vk: Arc::new(vk),
        })
    }

    fn decode(proof: &ZkProof) -> Option<ContextSnark> {
        let (version, body) = proof.as_bytes().split_first()?;
        if *version != NOVA_PROOF_VERSION {
            return None;
        }
        serde_json::from_slice(body).ok()
    }
}

impl fmt::Debug for NovaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NovaBackend").finish_non_exhaustive()
    }
}

impl ProvingBackend for NovaBackend {
    fn name(&self) -> &'static str {
        "nova"
    }

    /// Fails when the witness does not produce the statement's signals.
    fn prove(&self, statement: &PublicStatement, witness: &ContextWitness) -> Result<ZkProof> {
        let primary = ContextPrimaryCircuit::new(CircuitWitness::new(witness, statement.snapshot.params()));
        let secondary = SecondaryCircuit::default();
        let z0_primary: Vec<pallas::Scalar> = public_inputs(statement);
        let z0_secondary = secondary_z0();

        let mut recursive_snark =
            RecursiveSNARK::new(&self.params, &primary, &secondary, &z0_primary, &z0_secondary).map_err(nova_err)?;
        for _ in 0..FOLD_STEPS {
            recursive_snark
                .prove_step(&self.params, &primary, &secondary)
                .map_err(nova_err)?;
        }
        recursive_snark
            .verify(&self.params, FOLD_STEPS, &z0_primary, &z0_secondary)
            .map_err(nova_err)?;

        let snark = CompressedSNARK::<_, _, _, _, S1, S2>::prove(&self.params, &self.pk, &recursive_snark)
            .map_err(nova_err)?;
        let body = serde_json::to_vec(&snark).map_err(|e| ContextError::NovaError(e.to_string()))?;

        let mut proof_bytes = Vec::with_capacity(1 + body.len());
        proof_bytes.push(NOVA_PROOF_VERSION);
        proof_bytes.extend_from_slice(&body);
        debug!(size = proof_bytes.len(), "context relation folded and compressed");

        Ok(ZkProof::new(proof_bytes, statement.inputs_hash()))
    }

    fn verify(&self, statement: &PublicStatement, proof: &ZkProof) -> bool {
        if !ct_eq(&statement.inputs_hash(), proof.public_inputs_hash()) {
            return false;
        }
        let Some(snark) = Self::decode(proof) else {
            return false;
        };

        let z0_primary: Vec<pallas::Scalar> = public_inputs(statement);
        match snark.verify(&self.vk, FOLD_STEPS, &z0_primary, &secondary_z0()) {
            Ok((zn_primary, _)) => zn_primary == z0_primary,
            Err(err) => {
                debug!(error = %err, "nova proof rejected");
                false
            }
        }
    }
}
