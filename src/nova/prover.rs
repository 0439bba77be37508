//! Folding prover for the aggregator relation.
//!
//! One fold of [`AggregationStepCircuit`](crate::nova::circuit::AggregationStepCircuit)
//! over the public-signal vector, compressed with Spartan. The verifier
//! learns nothing but the signals it already holds.

use ff::Field;
use nova_snark::provider::{PallasEngine, VestaEngine};
use nova_snark::{CompressedSNARK, ProverKey, RecursiveSNARK, VerifierKey};
use pasta_curves::{pallas, vesta};
use tracing::debug;

use crate::error::{ContextError, Result};
use crate::nova::params::{AggregationParams, PrimaryCircuit, SecondaryCircuit, S1, S2};
use crate::types::PublicSignals;

/// Number of folding steps per proof.
pub const FOLD_STEPS: usize = 1;

pub type AggregationSnark = CompressedSNARK<PallasEngine, VestaEngine, PrimaryCircuit, SecondaryCircuit, S1, S2>;
pub type AggregationProverKey = ProverKey<PallasEngine, VestaEngine, PrimaryCircuit, SecondaryCircuit, S1, S2>;
pub type AggregationVerifierKey = VerifierKey<PallasEngine, VestaEngine, PrimaryCircuit, SecondaryCircuit, S1, S2>;

pub(crate) fn nova_err(e: nova_snark::errors::NovaError) -> ContextError {
    ContextError::NovaError(e.to_string())
}

/// Public signals as primary-curve scalars.
pub fn signals_to_scalars(signals: &PublicSignals) -> Vec<pallas::Scalar> {
    signals.to_vec().into_iter().map(pallas::Scalar::from).collect()
}

pub(crate) fn secondary_z0() -> Vec<vesta::Scalar> {
    vec![vesta::Scalar::ZERO]
}

/// Setup keys for the compressed SNARK.
pub fn setup_aggregation_keys(
    params: &AggregationParams,
) -> Result<(AggregationProverKey, AggregationVerifierKey)> {
    CompressedSNARK::setup(params).map_err(nova_err)
}

/// Prove that `signals` satisfy the aggregator relation.
///
/// Inconsistent signals fail here, before compression.
pub fn prove_aggregation(
    params: &AggregationParams,
    pk: &AggregationProverKey,
    signals: &PublicSignals,
) -> Result<AggregationSnark> {
    let primary = PrimaryCircuit::new();
    let secondary = SecondaryCircuit::default();
    let z0_primary = signals_to_scalars(signals);
    let z0_secondary = secondary_z0();

    let mut recursive_snark = RecursiveSNARK::new(params, &primary, &secondary, &z0_primary, &z0_secondary)
        .map_err(nova_err)?;
    for _ in 0..FOLD_STEPS {
        recursive_snark.prove_step(params, &primary, &secondary).map_err(nova_err)?;
    }
    recursive_snark
        .verify(params, FOLD_STEPS, &z0_primary, &z0_secondary)
        .map_err(nova_err)?;
    debug!(steps = FOLD_STEPS, "aggregation relation folded");

    CompressedSNARK::prove(params, pk, &recursive_snark).map_err(nova_err)
}

/// Verify a compressed aggregation proof against `signals`.
pub fn verify_aggregation(
    vk: &AggregationVerifierKey,
    proof: &AggregationSnark,
    signals: &PublicSignals,
) -> Result<bool> {
    let z0_primary = signals_to_scalars(signals);
    let (zn_primary, _) = proof
        .verify(vk, FOLD_STEPS, &z0_primary, &secondary_z0())
        .map_err(nova_err)?;
    Ok(zn_primary == z0_primary)
}
