mod common;

use common::*;
use proptest::prelude::*;
use zk_context::circuit::location::{inside, travel_feasible};
use zk_context::{verify_location, ContextError, GeoPoint, Region};

#[test]
fn test_fixture_location_passes() {
    let out = verify_location(&location_witness(), &location_policy()).unwrap();
    assert!(out.location_authorized);
    assert!(out.not_blacklisted);
    assert!(out.travel_time_valid);
    assert!(out.ip_consistency_ok);
    assert!(out.overall_valid);
}

#[test]
fn test_authorized_boundary_is_inside() {
    // 60² + 80² = 100² = OFFICE_RADIUS_SQ
    let edge = GeoPoint::new(OFFICE.lat + 60, OFFICE.lon + 80);
    let past = GeoPoint::new(OFFICE.lat + 60, OFFICE.lon + 81);

    let mut witness = location_witness();
    witness.current = edge;
    witness.ip_derived = edge;
    assert!(verify_location(&witness, &location_policy()).unwrap().location_authorized);

    witness.current = past;
    witness.ip_derived = past;
    let out = verify_location(&witness, &location_policy()).unwrap();
    assert!(!out.location_authorized);
    assert!(!out.overall_valid);
}

#[test]
fn test_touching_regions_resolve_to_deny() {
    // Authorized disk of radius 100 and a blacklist disk of radius 50
    // that touch at exactly one point.
    let mut policy = location_policy();
    policy.authorized = Region::new(GeoPoint::new(0, 0), 10_000);
    policy.blacklisted = Some(Region::new(GeoPoint::new(150, 0), 2_500));
    policy.require_ip_consistency = false;

    let mut witness = location_witness();
    witness.previous = GeoPoint::new(0, 0);
    witness.current = GeoPoint::new(100, 0);

    let out = verify_location(&witness, &policy).unwrap();
    assert!(out.location_authorized);
    assert!(!out.not_blacklisted);
    assert!(!out.overall_valid);

    // One step back from the contact point is clear of the blacklist.
    witness.current = GeoPoint::new(99, 0);
    let out = verify_location(&witness, &policy).unwrap();
    assert!(out.location_authorized && out.not_blacklisted);
    assert!(out.overall_valid);
}

#[test]
fn test_blacklisted_region_fails() {
    let mut witness = location_witness();
    witness.current = BLOCKED;
    witness.previous = BLOCKED;
    witness.ip_derived = BLOCKED;

    let out = verify_location(&witness, &location_policy()).unwrap();
    assert!(!out.not_blacklisted);
    assert!(!out.location_authorized);
    assert!(!out.overall_valid);
}

#[test]
fn test_no_blacklist_configured() {
    let mut policy = location_policy();
    policy.blacklisted = None;
    let out = verify_location(&location_witness(), &policy).unwrap();
    assert!(out.not_blacklisted);
}

#[test]
fn test_impossible_travel_between_authorized_points() {
    let mut policy = location_policy();
    policy.max_speed_per_hour = 10;

    // Both endpoints sit inside the office region, yet 40 units in an hour
    // exceeds the speed bound.
    let mut witness = location_witness();
    witness.current = GeoPoint::new(OFFICE.lat + 20, OFFICE.lon);
    witness.previous = GeoPoint::new(OFFICE.lat - 20, OFFICE.lon);
    witness.ip_derived = witness.current;

    let out = verify_location(&witness, &policy).unwrap();
    assert!(out.location_authorized);
    assert!(!out.travel_time_valid);
    assert!(!out.overall_valid);

    witness.travel_time_hours = 4;
    assert!(verify_location(&witness, &policy).unwrap().travel_time_valid);
}

#[test]
fn test_ip_mismatch() {
    let mut witness = location_witness();
    witness.ip_derived = BLOCKED;

    let out = verify_location(&witness, &location_policy()).unwrap();
    assert!(!out.ip_consistency_ok);
    assert!(!out.overall_valid);

    let mut policy = location_policy();
    policy.require_ip_consistency = false;
    assert!(verify_location(&witness, &policy).unwrap().overall_valid);
}

#[test]
fn test_negative_travel_time_rejected() {
    let mut witness = location_witness();
    witness.travel_time_hours = -1;
    let err = verify_location(&witness, &location_policy()).unwrap_err();
    assert!(matches!(err, ContextError::InvalidInput { field: "location.travel_time_hours", .. }));
}

fn point() -> impl Strategy<Value = GeoPoint> {
    (-9_000i32..=9_000, -18_000i32..=18_000).prop_map(|(lat, lon)| GeoPoint::new(lat, lon))
}

proptest! {
    #[test]
    fn prop_blacklist_uses_same_boundary(current in point(), center in point(), radius_sq in 0u64..50_000_000) {
        let region = Region::new(center, radius_sq);
        let mut policy = location_policy();
        policy.authorized = region;
        policy.blacklisted = Some(region);

        let mut witness = location_witness();
        witness.current = current;
        witness.previous = current;
        witness.ip_derived = current;

        let out = verify_location(&witness, &policy).unwrap();
        // The same disk, used as both regions, never leaves a gap or an overlap.
        prop_assert_eq!(out.location_authorized, !out.not_blacklisted);
        prop_assert_eq!(out.location_authorized, inside(&current, &region).is_set());
        prop_assert!(!out.overall_valid);
    }

    #[test]
    fn prop_travel_feasibility_scales_with_time(a in point(), b in point(), hours in 0i64..48, speed in 0u64..5_000) {
        let ok = travel_feasible(&a, &b, hours, speed).is_set();
        if ok {
            prop_assert!(travel_feasible(&a, &b, hours + 1, speed).is_set());
        }
        prop_assert!(travel_feasible(&a, &a, hours, speed).is_set());
    }
}
