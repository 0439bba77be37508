//! Nova folding proofs.
//!
//! # Feature: `nova`
//! This module is only available when the `nova` feature is enabled.
//!
//! - [`AggregationStepCircuit`]: the aggregator's arithmetic alone (mask
//!   gating, AND, trust score, level gate) over public signals.
//! - [`ContextStepCircuit`](context_circuit::ContextStepCircuit): the same
//!   constraints plus the time, location and pattern relations recomputed
//!   from the private witness. [`NovaBackend`] proves with it and is the
//!   backend to use when the prover is not trusted.

#[cfg(feature = "nova")]
pub mod backend;

#[cfg(feature = "nova")]
pub mod circuit;

#[cfg(feature = "nova")]
pub mod context_circuit;

#[cfg(feature = "nova")]
pub mod gadgets;

#[cfg(feature = "nova")]
pub mod params;

#[cfg(feature = "nova")]
pub mod prover;

#[cfg(feature = "nova")]
pub use backend::NovaBackend;
#[cfg(feature = "nova")]
pub use circuit::AggregationStepCircuit;
#[cfg(feature = "nova")]
pub use params::{gen_aggregation_params, gen_context_params};
#[cfg(feature = "nova")]
pub use prover::{prove_aggregation, setup_aggregation_keys, verify_aggregation};
