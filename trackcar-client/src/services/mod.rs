//! Domain services over the document store.
//!
//! Every operation needs a signed-in principal and fails fast with
//! `Unauthenticated` otherwise; every read and subscription is scoped to
//! that principal, except the public stolen-vehicle feed. Multi-document
//! writes are sequential and best-effort: there are no cross-document
//! transactions, and a failure part-way leaves the earlier writes in place.

pub mod ignition;
pub mod location;
pub mod notifications;
pub mod profile;
pub mod stolen;
pub mod vehicles;

pub use ignition::IgnitionService;
pub use location::LocationService;
pub use notifications::NotificationService;
pub use profile::ProfileService;
pub use stolen::StolenVehicleService;
pub use vehicles::VehicleService;

use crate::config::ClientConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::IdentityCell;
use crate::live::LiveQueries;
use crate::photo_client::PhotoClient;
use std::sync::Arc;
use trackcar_store::DocumentStore;

/// Collection names shared with the device firmware and other clients.
pub mod collections {
    pub const CARS: &str = "cars";
    pub const GPS_LOCATIONS: &str = "gps_locations";
    pub const CAR_COMMANDS: &str = "car_commands";
    pub const GEOFENCES: &str = "geofences";
    pub const STOLEN_CARS: &str = "stolen_cars";
    pub const SIGHTINGS: &str = "vehicle_sightings";
    pub const NOTIFICATIONS: &str = "sighting_notifications";
    pub const USERS: &str = "users";
}

/// Everything a service needs. Cheap to clone.
#[derive(Clone)]
pub struct ServiceContext {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) identity: IdentityCell,
    pub(crate) live: LiveQueries,
    pub(crate) photos: Arc<PhotoClient>,
    pub(crate) config: Arc<ClientConfig>,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: IdentityCell,
        live: LiveQueries,
        photos: Arc<PhotoClient>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            store,
            identity,
            live,
            photos,
            config,
        }
    }
}

/// Trimmed value, or `None` when blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Rejects coordinates outside the WGS84 ranges. NaN never falls inside a
/// range, so it is rejected too.
pub(crate) fn check_coordinates(latitude: f64, longitude: f64) -> ServiceResult<()> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(ServiceError::invalid("coordinates out of range"));
    }
    Ok(())
}
