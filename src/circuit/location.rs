//! Location-chain circuit.
//!
//! Every distance check compares squared Euclidean distance against a
//! squared radius, so no square root enters the relation. Regions are
//! closed disks: a point at exactly the radius is inside, which makes it
//! authorized for the authorized region and blacklisted for the blacklist.

use tracing::debug;

use crate::circuit::gadgets::{all, leq, lt, Bit};
use crate::error::Result;
use crate::policy::{LocationPolicy, Region};
use crate::types::{Commitment, GeoPoint};
use crate::utils::commit;
use crate::witness::LocationWitness;

const LOCATION_PROOF_TAG: &[u8] = b"zkctx/location-proof/v1";

/// Public outputs of the location circuit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LocationOutputs {
    pub location_authorized: bool,
    pub not_blacklisted: bool,
    pub travel_time_valid: bool,
    pub ip_consistency_ok: bool,
    pub overall_valid: bool,
    pub proof_hash: Commitment,
}

/// `d(point, center)² <= r²`
pub fn inside(point: &GeoPoint, region: &Region) -> Bit {
    leq(point.squared_distance(&region.center), region.radius_sq)
}

/// `d(current, previous)² <= (hours × speed)²`, saturating rather than
/// overflowing for absurd travel budgets.
pub fn travel_feasible(current: &GeoPoint, previous: &GeoPoint, hours: i64, max_speed: u64) -> Bit {
    let reach = (hours.max(0) as u128).saturating_mul(max_speed as u128);
    let reach_sq = reach.saturating_mul(reach);
    leq(current.squared_distance(previous) as u128, reach_sq)
}

/// Hash contribution binding the authorized region and the verdict.
pub fn location_proof_hash(policy: &LocationPolicy, verified: bool) -> Commitment {
    commit(
        LOCATION_PROOF_TAG,
        &[
            &policy.authorized.center.to_bytes(),
            &policy.authorized.radius_sq.to_le_bytes(),
            &[verified as u8],
        ],
    )
}

/// Evaluate the location circuit.
pub fn verify_location(witness: &LocationWitness, policy: &LocationPolicy) -> Result<LocationOutputs> {
    witness.validate()?;

    let location_authorized = inside(&witness.current, &policy.authorized);

    let not_blacklisted = match &policy.blacklisted {
        Some(region) => lt(region.radius_sq, witness.current.squared_distance(&region.center)),
        None => Bit::ONE,
    };

    let travel_time_valid = travel_feasible(
        &witness.current,
        &witness.previous,
        witness.travel_time_hours,
        policy.max_speed_per_hour,
    );

    let ip_close = leq(
        witness.current.squared_distance(&witness.ip_derived),
        policy.ip_tolerance_radius_sq,
    );
    let ip_consistency_ok = Bit::enforced_if(ip_close, policy.require_ip_consistency);

    let verified = all(&[location_authorized, not_blacklisted, travel_time_valid, ip_consistency_ok]);
    debug!(
        authorized = location_authorized.is_set(),
        travel_ok = travel_time_valid.is_set(),
        verified = verified.is_set(),
        "location circuit evaluated"
    );

    Ok(LocationOutputs {
        location_authorized: location_authorized.is_set(),
        not_blacklisted: not_blacklisted.is_set(),
        travel_time_valid: travel_time_valid.is_set(),
        ip_consistency_ok: ip_consistency_ok.is_set(),
        overall_valid: verified.is_set(),
        proof_hash: location_proof_hash(policy, verified.is_set()),
    })
}
