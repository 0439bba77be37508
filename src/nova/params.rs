use nova_snark::{
    provider::{ipa_pc::EvaluationEngine, PallasEngine, VestaEngine},
    spartan::snark::RelaxedR1CSSNARK,
    traits::{circuit::TrivialCircuit, snark::RelaxedR1CSSNARKTrait},
    PublicParams,
};
use pasta_curves::{pallas, vesta};

use crate::error::{ContextError, Result};
use crate::nova::circuit::AggregationStepCircuit;
use crate::nova::context_circuit::ContextStepCircuit;

pub type EE1 = EvaluationEngine<PallasEngine>;
pub type EE2 = EvaluationEngine<VestaEngine>;

pub type S1 = RelaxedR1CSSNARK<PallasEngine, EE1>;
pub type S2 = RelaxedR1CSSNARK<VestaEngine, EE2>;

pub type PrimaryCircuit = AggregationStepCircuit<pallas::Scalar>;
pub type SecondaryCircuit = TrivialCircuit<vesta::Scalar>;

pub type AggregationParams = PublicParams<PallasEngine, VestaEngine, PrimaryCircuit, SecondaryCircuit>;

pub type ContextPrimaryCircuit = ContextStepCircuit<pallas::Scalar>;

pub type ContextParams = PublicParams<PallasEngine, VestaEngine, ContextPrimaryCircuit, SecondaryCircuit>;

/// Generate public parameters for the aggregation circuit.
pub fn gen_aggregation_params() -> Result<AggregationParams> {
    let circuit_primary = PrimaryCircuit::new();
    let circuit_secondary = SecondaryCircuit::default();

    let ck_primary = S1::ck_floor();
    let ck_secondary = S2::ck_floor();

    PublicParams::setup(&circuit_primary, &circuit_secondary, &*ck_primary, &*ck_secondary)
        .map_err(|e| ContextError::NovaError(e.to_string()))
}

/// Generate public parameters for the context circuit.
///
/// The shape does not depend on the policy, so one set serves every snapshot.
pub fn gen_context_params() -> Result<ContextParams> {
    let circuit_primary = ContextPrimaryCircuit::blank();
    let circuit_secondary = SecondaryCircuit::default();

    PublicParams::setup(&circuit_primary, &circuit_secondary, &*S1::ck_floor(), &*S2::ck_floor())
        .map_err(|e| ContextError::NovaError(e.to_string()))
}
