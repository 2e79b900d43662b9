//! GPS samples and the geometry computed from them.
//!
//! Location history is an append-only log; "current location" is the most
//! recent sample by timestamp. Distances are great-circle (haversine) in
//! kilometres.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by [`haversine_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance between the two latest samples above which a vehicle is moving.
pub const MOVING_THRESHOLD_KM: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationStatus {
    #[default]
    Active,
    Inactive,
    Alert,
}

impl LocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Alert => "alert",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "inactive" => Self::Inactive,
            "alert" => Self::Alert,
            _ => Self::Active,
        }
    }
}

/// Which component produced a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// The in-vehicle tracker.
    #[default]
    Arduino,
    Manual,
    App,
}

impl LocationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arduino => "arduino",
            Self::Manual => "manual",
            Self::App => "app",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "manual" => Self::Manual,
            "app" => Self::App,
            _ => Self::Arduino,
        }
    }
}

/// One GPS reading for a vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub id: String,
    pub vehicle_id: String,
    pub owner_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub status: LocationStatus,
    pub source: LocationSource,
}

impl LocationSample {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Input for recording a sample; owner and timestamp are filled in on write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocationSample {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub status: LocationStatus,
    #[serde(default)]
    pub source: LocationSource,
}

/// Last known position, denormalized onto the vehicle record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastKnownPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// True iff the two most recent samples (by timestamp) are more than
/// `threshold_km` apart. Fewer than two samples is never moving.
pub fn is_moving(samples: &[LocationSample], threshold_km: f64) -> bool {
    if samples.len() < 2 {
        return false;
    }
    let mut latest: Vec<&LocationSample> = samples.iter().collect();
    latest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    haversine_km(latest[0].coordinates(), latest[1].coordinates()) > threshold_km
}

/// Aggregate statistics over a track, in chronological order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSummary {
    pub samples: Vec<LocationSample>,
    pub total_distance_km: f64,
    pub average_speed: f64,
    pub max_speed: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Sorts samples chronologically and sums leg distances.
///
/// Speed statistics only consider samples after the first that report a
/// speed, since the first sample has no incoming leg.
pub fn summarize_track(samples: &[LocationSample]) -> TrackingSummary {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let mut total_distance_km = 0.0;
    let mut speeds = Vec::new();
    for leg in sorted.windows(2) {
        total_distance_km += haversine_km(leg[0].coordinates(), leg[1].coordinates());
        if let Some(speed) = leg[1].speed {
            speeds.push(speed);
        }
    }

    let max_speed = speeds.iter().copied().fold(0.0, f64::max);
    let average_speed = if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    };

    TrackingSummary {
        start_time: sorted.first().map(|s| s.timestamp),
        end_time: sorted.last().map(|s| s.timestamp),
        samples: sorted,
        total_distance_km,
        average_speed,
        max_speed,
    }
}

/// A circular virtual fence around a point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub id: String,
    pub vehicle_id: String,
    pub owner_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    pub is_active: bool,
    pub alert_on_enter: bool,
    pub alert_on_exit: bool,
    pub created_at: DateTime<Utc>,
}

impl Geofence {
    pub fn center(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Inclusive of the boundary.
    pub fn contains(&self, point: Coordinates) -> bool {
        haversine_km(point, self.center()) * 1000.0 <= self.radius_m
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGeofence {
    pub vehicle_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    pub is_active: bool,
    pub alert_on_enter: bool,
    pub alert_on_exit: bool,
}

/// Link that opens the coordinates in a map viewer.
pub fn maps_url(at: Coordinates) -> String {
    format!("https://maps.google.com/maps/?q={},{}", at.latitude, at.longitude)
}
