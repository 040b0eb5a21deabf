//! # smartpark-domain
//!
//! Pure domain model for the smartpark car-park simulation.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, timestamps
//! - Define the **Car** lifecycle record (enter → park/unpark → exit)
//! - Define the **CarPark** aggregate that owns the present cars and the
//!   bay accounting
//! - Define the **ParkingPolicy** deciding which car takes a free bay and
//!   which car leaves
//! - Define **Topic** naming and the wire codecs (signal, snapshot, control)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod car;
pub mod carpark;
pub mod control;
pub mod policy;
pub mod signal;
pub mod snapshot;
pub mod topic;
