//! Stolen-vehicle reports, crowd sightings and owner notifications.
//!
//! A [`StolenVehicle`] carries a point-in-time copy of the vehicle and owner
//! fields taken when the vehicle was reported. The copy is never refreshed,
//! so it can drift from the source records; feed readers get everything they
//! render without joins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reporter name used when the reporter has no profile.
pub const ANONYMOUS_REPORTER: &str = "Anonymous user";

/// Owner name used when the owner has no profile at report time.
pub const UNKNOWN_OWNER: &str = "User";

/// Location attached to a sighting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightingLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub accuracy: Option<f64>,
}

impl SightingLocation {
    /// Builds a location from a one-shot position fix, describing it with the
    /// reverse-geocoded address when one is available.
    pub fn resolve(
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
        geocoded: Option<&GeocodedAddress>,
    ) -> Self {
        let address = geocoded
            .map(GeocodedAddress::describe)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| format!("{latitude:.6}, {longitude:.6}"));
        Self {
            latitude,
            longitude,
            address,
            accuracy,
        }
    }
}

/// Reverse-geocoding result. All parts are optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodedAddress {
    pub street: Option<String>,
    pub street_number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
}

impl GeocodedAddress {
    /// `"<street> <number>, <district>, <city> - <region>"`, empty when no
    /// part is known.
    pub fn describe(&self) -> String {
        let part = |p: &Option<String>| p.as_deref().unwrap_or("").trim().to_string();
        let parts = [
            part(&self.street),
            part(&self.street_number),
            part(&self.district),
            part(&self.city),
            part(&self.region),
        ];
        if parts.iter().all(String::is_empty) {
            return String::new();
        }
        let [street, number, district, city, region] = parts;
        format!("{street} {number}, {district}, {city} - {region}")
            .trim()
            .to_string()
    }
}

/// Where a stolen vehicle was last reported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSeenLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// An entry in the public stolen-vehicles feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StolenVehicle {
    pub id: String,
    pub vehicle_id: String,
    pub owner_id: String,

    pub owner_name: String,
    pub owner_phone: Option<String>,
    pub owner_photo_url: Option<String>,

    pub brand: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    pub color: String,
    pub color_hex: String,
    pub photo_url: Option<String>,
    pub description: Option<String>,

    pub stolen_at: DateTime<Utc>,
    pub last_seen: Option<LastSeenLocation>,

    pub sightings_count: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub recovered_at: Option<DateTime<Utc>>,
}

/// Stolen flag as read from the vehicle record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StolenStatus {
    pub is_stolen: bool,
    pub reported_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reporter {
    pub user_id: String,
    pub name: String,
    pub photo_url: Option<String>,
}

/// A crowd report of a stolen vehicle. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    pub id: String,
    pub stolen_vehicle_id: String,
    pub reported_by: Reporter,
    pub location: SightingLocation,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_verified: bool,
}

/// Message addressed to the owner of a sighted vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightingNotification {
    pub id: String,
    pub vehicle_owner_id: String,
    pub stolen_vehicle_id: String,
    pub sighting_id: String,
    pub reported_by: Reporter,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// A notification with the records it points at, when they still exist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDetails {
    pub notification: SightingNotification,
    pub sighting: Option<Sighting>,
    pub stolen_vehicle: Option<StolenVehicle>,
}

/// What any signed-in user may see about a record's sightings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSightings {
    pub count: usize,
    pub descriptions: Vec<String>,
}

/// Notification body for a sighting.
pub fn sighting_message(brand: Option<&str>, address: &str) -> String {
    let subject = brand.filter(|b| !b.trim().is_empty()).unwrap_or("vehicle");
    format!("Your {subject} was spotted at {address}")
}

pub fn unread_count(notifications: &[SightingNotification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}
