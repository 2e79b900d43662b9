//! GPS history, current position and geofences.

use super::{ServiceContext, check_coordinates};
use super::collections::{CARS, GEOFENCES, GPS_LOCATIONS};
use super::vehicles::VehicleService;
use crate::error::{ServiceError, ServiceResult, StoreResultExt};
use crate::guard::SubscriptionHandle;
use tracing::debug;
use trackcar_store::{Direction, Document, Fields, Query, ReadFields};
use trackcar_types::{
    Coordinates, Geofence, LocationSample, LocationSource, LocationStatus, NewGeofence,
    NewLocationSample, TrackingSummary, is_moving, summarize_track,
};

#[derive(Clone)]
pub struct LocationService {
    ctx: ServiceContext,
}

impl LocationService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Appends a sample and refreshes the vehicle's last known position.
    pub async fn record(&self, sample: &NewLocationSample) -> ServiceResult<String> {
        let principal = self.ctx.identity.require()?;
        check_coordinates(sample.latitude, sample.longitude)?;
        VehicleService::new(self.ctx.clone()).get(&sample.vehicle_id).await?;

        let id = self
            .ctx
            .store
            .add(
                GPS_LOCATIONS,
                Fields::new()
                    .set("carId", sample.vehicle_id.as_str())
                    .set("userId", principal.uid.as_str())
                    .set("latitude", sample.latitude)
                    .set("longitude", sample.longitude)
                    .set_opt("speed", sample.speed)
                    .set_opt("heading", sample.heading)
                    .set_opt("accuracy", sample.accuracy)
                    .set("status", sample.status.as_str())
                    .set("source", sample.source.as_str())
                    .server_timestamp("timestamp"),
            )
            .await
            .or_upstream("failed to save location")?;

        self.ctx
            .store
            .update(
                CARS,
                &sample.vehicle_id,
                Fields::new()
                    .set("lastLatitude", sample.latitude)
                    .set("lastLongitude", sample.longitude)
                    .server_timestamp("lastLocationUpdate")
                    .server_timestamp("updatedAt"),
            )
            .await
            .or_upstream("failed to update vehicle position")?;

        debug!(vehicle = %sample.vehicle_id, sample = %id, "location recorded");
        Ok(id)
    }

    /// Newest samples first, up to `limit` (default from config).
    pub async fn history(&self, vehicle_id: &str, limit: Option<usize>) -> ServiceResult<Vec<LocationSample>> {
        let principal = self.ctx.identity.require()?;
        let query = latest_samples(
            vehicle_id,
            &principal.uid,
            limit.unwrap_or(self.ctx.config.location_history_limit),
        );
        let snapshot = self
            .ctx
            .store
            .query(&query)
            .await
            .or_upstream("failed to load location history")?;
        Ok(snapshot.iter().filter_map(decode_sample).collect())
    }

    pub async fn current(&self, vehicle_id: &str) -> ServiceResult<Option<LocationSample>> {
        Ok(self.history(vehicle_id, Some(1)).await?.into_iter().next())
    }

    /// Live current location. `None` when there is no sample yet or the
    /// subscription could not continue.
    pub fn watch_current<F>(&self, vehicle_id: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(Option<LocationSample>) + Send + Sync + 'static,
    {
        let vehicle_id = vehicle_id.to_string();
        self.ctx.live.watch(
            "current_location",
            None,
            move |principal| latest_samples(&vehicle_id, &principal.uid, 1).into(),
            |snapshot| snapshot.first().and_then(decode_sample),
            callback,
        )
    }

    /// Whether the two latest samples are further apart than the configured
    /// threshold.
    pub async fn is_vehicle_moving(&self, vehicle_id: &str) -> ServiceResult<bool> {
        let latest = self.history(vehicle_id, Some(2)).await?;
        Ok(is_moving(&latest, self.ctx.config.moving_threshold_km))
    }

    pub async fn tracking_summary(&self, vehicle_id: &str, limit: Option<usize>) -> ServiceResult<TrackingSummary> {
        let samples = self.history(vehicle_id, limit).await?;
        Ok(summarize_track(&samples))
    }

    pub async fn create_geofence(&self, fence: &NewGeofence) -> ServiceResult<String> {
        let principal = self.ctx.identity.require()?;
        check_coordinates(fence.latitude, fence.longitude)?;
        if !(fence.radius_m > 0.0) {
            return Err(ServiceError::invalid("geofence radius must be positive"));
        }
        if fence.name.trim().is_empty() {
            return Err(ServiceError::invalid("geofence name is required"));
        }
        VehicleService::new(self.ctx.clone()).get(&fence.vehicle_id).await?;

        let fields = Fields::from_serialize(fence)
            .or_upstream("failed to create geofence")?
            .set("userId", principal.uid.as_str())
            .server_timestamp("createdAt");
        self.ctx
            .store
            .add(GEOFENCES, fields)
            .await
            .or_upstream("failed to create geofence")
    }

    /// Active geofences of a vehicle.
    pub async fn geofences(&self, vehicle_id: &str) -> ServiceResult<Vec<Geofence>> {
        let principal = self.ctx.identity.require()?;
        let query = Query::collection(GEOFENCES)
            .where_eq("vehicleId", vehicle_id)
            .where_eq("userId", principal.uid.as_str())
            .where_eq("isActive", true);
        let snapshot = self
            .ctx
            .store
            .query(&query)
            .await
            .or_upstream("failed to load geofences")?;
        Ok(snapshot.iter().map(decode_geofence).collect())
    }

    /// Active geofences of the vehicle that do not contain `point`.
    pub async fn geofences_left(&self, vehicle_id: &str, point: Coordinates) -> ServiceResult<Vec<Geofence>> {
        Ok(self
            .geofences(vehicle_id)
            .await?
            .into_iter()
            .filter(|fence| !fence.contains(point))
            .collect())
    }
}

fn latest_samples(vehicle_id: &str, owner: &str, limit: usize) -> Query {
    Query::collection(GPS_LOCATIONS)
        .where_eq("carId", vehicle_id)
        .where_eq("userId", owner)
        .order_by("timestamp", Direction::Descending)
        .limit(limit)
}

fn decode_sample(doc: &Document) -> Option<LocationSample> {
    Some(LocationSample {
        id: doc.id.clone(),
        vehicle_id: doc.string_field("carId"),
        owner_id: doc.string_field("userId"),
        latitude: doc.f64_field("latitude")?,
        longitude: doc.f64_field("longitude")?,
        speed: doc.f64_field("speed"),
        heading: doc.f64_field("heading"),
        accuracy: doc.f64_field("accuracy"),
        timestamp: doc.datetime_field("timestamp")?,
        status: LocationStatus::parse(doc.str_field("status").unwrap_or_default()),
        source: LocationSource::parse(doc.str_field("source").unwrap_or_default()),
    })
}

fn decode_geofence(doc: &Document) -> Geofence {
    Geofence {
        id: doc.id.clone(),
        vehicle_id: doc.string_field("vehicleId"),
        owner_id: doc.string_field("userId"),
        name: doc.string_field("name"),
        latitude: doc.f64_field("latitude").unwrap_or_default(),
        longitude: doc.f64_field("longitude").unwrap_or_default(),
        radius_m: doc.f64_field("radiusM").unwrap_or_default(),
        is_active: doc.bool_field("isActive").unwrap_or(false),
        alert_on_enter: doc.bool_field("alertOnEnter").unwrap_or(false),
        alert_on_exit: doc.bool_field("alertOnExit").unwrap_or(false),
        created_at: doc.datetime_field("createdAt").unwrap_or_default(),
    }
}
