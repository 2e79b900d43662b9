//! One-shot device position, used when reporting a sighting.

use async_trait::async_trait;
use thiserror::Error;
use trackcar_types::{GeocodedAddress, SightingLocation};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// A GPS fix plus whatever reverse geocoding produced.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub address: Option<GeocodedAddress>,
}

impl PositionFix {
    pub fn into_sighting_location(self) -> SightingLocation {
        SightingLocation::resolve(
            self.latitude,
            self.longitude,
            self.accuracy,
            self.address.as_ref(),
        )
    }
}

#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(&self) -> Result<PositionFix, PositionError>;
}

/// Always reports the same fix.
#[derive(Clone, Debug)]
pub struct FixedPosition(pub PositionFix);

#[async_trait]
impl PositionProvider for FixedPosition {
    async fn current_position(&self) -> Result<PositionFix, PositionError> {
        Ok(self.0.clone())
    }
}
