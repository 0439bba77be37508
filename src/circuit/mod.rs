//! The four category circuits and the aggregator that composes them.
//!
//! Each circuit is a pure function from (witness, public policy) to public
//! outputs, written as branch-free 0/1 algebra over [`gadgets::Bit`].
//! Circuits can be used on their own, e.g. device-only checks for
//! low-sensitivity operations.

pub mod aggregator;
pub mod behavior;
pub mod device;
pub mod gadgets;
pub mod location;
pub mod time_window;

pub use aggregator::{aggregate, trust_score, Aggregate, CategoryHashes, CategoryVerdicts};
pub use behavior::{behavior_commitment, verify_behavior, PatternOutputs};
pub use device::{device_commitment, verify_device, DeviceOutputs, DeviceSigningKey};
pub use location::{verify_location, LocationOutputs};
pub use time_window::{rolling_code, time_step, verify_time_window, TimeOutputs};
