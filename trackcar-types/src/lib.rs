//! Domain model for TrackCar.
//!
//! Plain data types shared by the store and client crates:
//! - Principal (the authenticated identity)
//! - Vehicles, form validation and plate/RENAVAM formatting
//! - Ignition state machine and relay commands
//! - GPS samples, haversine distance, the "is moving" heuristic, geofences
//! - Stolen-vehicle records, sightings and owner notifications
//! - User profiles
//!
//! Nothing in this crate performs I/O.

pub mod ignition;
pub mod location;
pub mod principal;
pub mod profile;
pub mod stolen;
pub mod validation;
pub mod vehicle;

pub use ignition::*;
pub use location::*;
pub use principal::Principal;
pub use profile::*;
pub use stolen::*;
pub use vehicle::*;
