//! Stolen-vehicle reports and crowd sightings.
//!
//! Marking a vehicle stolen writes the vehicle flag, then a separate record
//! in the public feed carrying a point-in-time copy of vehicle and owner
//! details. Recovery clears the flag and deactivates the records; nothing
//! is deleted.
//!
//! A sighting is four sequential writes: the sighting, the counter and
//! last-seen location on the record, the last-seen location on the vehicle,
//! and one notification for the owner. A failure part-way leaves the
//! earlier writes in place. Only the vehicle copy is best-effort; the
//! reporter usually has no write access to someone else's vehicle.

use super::collections::{CARS, NOTIFICATIONS, SIGHTINGS, STOLEN_CARS};
use super::profile::ProfileService;
use super::vehicles::VehicleService;
use super::{ServiceContext, check_coordinates, non_blank};
use crate::error::{ServiceError, ServiceResult, StoreResultExt};
use crate::guard::SubscriptionHandle;
use crate::position::{PositionError, PositionProvider};
use chrono::Utc;
use tracing::{info, warn};
use trackcar_store::{Direction, Document, Fields, ListenTarget, Query, ReadFields, Value, ValueMap};
use trackcar_types::{
    ANONYMOUS_REPORTER, LastSeenLocation, PublicSightings, Reporter, Sighting, SightingLocation,
    StolenStatus, StolenVehicle, UNKNOWN_OWNER, sighting_message,
};

#[derive(Clone)]
pub struct StolenVehicleService {
    ctx: ServiceContext,
}

impl StolenVehicleService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Flags the vehicle stolen and publishes it to the feed. Returns the
    /// feed record id; an already active record is reused.
    pub async fn mark_stolen(&self, vehicle_id: &str) -> ServiceResult<String> {
        let principal = self.ctx.identity.require()?;
        let vehicle = VehicleService::new(self.ctx.clone()).get(vehicle_id).await?;

        self.ctx
            .store
            .update(
                CARS,
                vehicle_id,
                Fields::new()
                    .set("isStolen", true)
                    .set("stolenReportedAt", Utc::now())
                    .server_timestamp("updatedAt"),
            )
            .await
            .or_upstream("failed to update vehicle status")?;

        if let Some(existing) = self.active_records_for(vehicle_id, &principal.uid).await?.first() {
            return Ok(existing.id.clone());
        }

        let owner = ProfileService::new(self.ctx.clone())
            .get_by_uid(&principal.uid)
            .await?;
        let owner_name = owner
            .as_ref()
            .and_then(|p| non_blank(Some(p.name.as_str())))
            .unwrap_or_else(|| UNKNOWN_OWNER.to_string());

        let fields = Fields::new()
            .set("carId", vehicle_id)
            .set("userId", principal.uid.as_str())
            .set("ownerName", owner_name)
            .set_opt("ownerPhone", owner.as_ref().and_then(|p| non_blank(Some(p.phone.as_str()))))
            .set_opt("ownerPhotoURL", owner.as_ref().and_then(|p| p.photo_url.clone()))
            .set("brand", vehicle.brand.as_str())
            .set("model", vehicle.model.as_str())
            .set("year", vehicle.year)
            .set("licensePlate", vehicle.license_plate.as_str())
            .set("color", vehicle.color.as_str())
            .set("colorHex", vehicle.color_hex.as_str())
            .set_opt("photoURL", vehicle.photo_url.clone())
            .set_opt("description", vehicle.description.clone())
            .server_timestamp("stolenAt")
            .set("sightingsCount", 0)
            .set("isActive", true)
            .server_timestamp("createdAt");

        let id = self
            .ctx
            .store
            .add(STOLEN_CARS, fields)
            .await
            .or_upstream("failed to report stolen vehicle")?;
        info!(vehicle = %vehicle_id, record = %id, "vehicle reported stolen");
        Ok(id)
    }

    /// Clears the stolen flag and deactivates every active record for the
    /// vehicle. Returns how many records were deactivated.
    pub async fn mark_recovered(&self, vehicle_id: &str) -> ServiceResult<usize> {
        let principal = self.ctx.identity.require()?;
        VehicleService::new(self.ctx.clone()).get(vehicle_id).await?;

        self.ctx
            .store
            .update(
                CARS,
                vehicle_id,
                Fields::new()
                    .set("isStolen", false)
                    .delete("stolenReportedAt")
                    .server_timestamp("updatedAt"),
            )
            .await
            .or_upstream("failed to update vehicle status")?;

        let records = self.active_records_for(vehicle_id, &principal.uid).await?;
        for record in &records {
            self.ctx
                .store
                .update(
                    STOLEN_CARS,
                    &record.id,
                    Fields::new()
                        .set("isActive", false)
                        .server_timestamp("recoveredAt")
                        .server_timestamp("updatedAt"),
                )
                .await
                .or_upstream("failed to close stolen report")?;
        }
        info!(vehicle = %vehicle_id, records = records.len(), "vehicle recovered");
        Ok(records.len())
    }

    async fn active_records_for(&self, vehicle_id: &str, owner: &str) -> ServiceResult<Vec<Document>> {
        let query = Query::collection(STOLEN_CARS)
            .where_eq("carId", vehicle_id)
            .where_eq("userId", owner)
            .where_eq("isActive", true);
        Ok(self
            .ctx
            .store
            .query(&query)
            .await
            .or_upstream("failed to load stolen reports")?
            .documents)
    }

    /// Every active report, most recently stolen first. Visible to any
    /// signed-in user.
    pub async fn active_feed(&self) -> ServiceResult<Vec<StolenVehicle>> {
        self.ctx.identity.require()?;
        let snapshot = self
            .ctx
            .store
            .query(&feed_query())
            .await
            .or_upstream("failed to load stolen vehicles")?;
        Ok(snapshot.iter().map(decode_stolen).collect())
    }

    pub fn watch_feed<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(Vec<StolenVehicle>) + Send + Sync + 'static,
    {
        self.ctx.live.watch(
            "stolen_feed",
            Vec::new(),
            |_| feed_query().into(),
            |snapshot| snapshot.iter().map(decode_stolen).collect(),
            callback,
        )
    }

    /// Live stolen flag of one of the signed-in owner's vehicles.
    pub fn watch_status<F>(&self, vehicle_id: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(StolenStatus) + Send + Sync + 'static,
    {
        let vehicle_id = vehicle_id.to_string();
        let identity = self.ctx.identity.clone();
        self.ctx.live.watch(
            "stolen_status",
            StolenStatus::default(),
            move |_| ListenTarget::document(CARS, vehicle_id),
            move |snapshot| {
                let owner = identity.current().map(|p| p.uid);
                snapshot
                    .first()
                    .filter(|doc| doc.str_field("userId") == owner.as_deref())
                    .map(|doc| StolenStatus {
                        is_stolen: doc.bool_field("isStolen").unwrap_or(false),
                        reported_at: doc.datetime_field("stolenReportedAt"),
                    })
                    .unwrap_or_default()
            },
            callback,
        )
    }

    pub async fn get(&self, stolen_id: &str) -> ServiceResult<StolenVehicle> {
        self.ctx.identity.require()?;
        self.ctx
            .store
            .get(STOLEN_CARS, stolen_id)
            .await
            .or_upstream("failed to load stolen vehicle")?
            .map(|doc| decode_stolen(&doc))
            .ok_or_else(|| ServiceError::not_found("stolen vehicle"))
    }

    /// All sightings of a record, newest first. Owner only.
    pub async fn sightings(&self, stolen_id: &str) -> ServiceResult<Vec<Sighting>> {
        let principal = self.ctx.identity.require()?;
        let record = self.get(stolen_id).await?;
        if record.owner_id != principal.uid {
            return Err(ServiceError::not_found("stolen vehicle"));
        }
        self.load_sightings(stolen_id).await
    }

    /// Count and free-text descriptions of a record's sightings, without
    /// reporter identities. Visible to any signed-in user.
    pub async fn public_sightings(&self, stolen_id: &str) -> ServiceResult<PublicSightings> {
        self.ctx.identity.require()?;
        let sightings = self.load_sightings(stolen_id).await?;
        Ok(PublicSightings {
            count: sightings.len(),
            descriptions: sightings.into_iter().filter_map(|s| s.description).collect(),
        })
    }

    async fn load_sightings(&self, stolen_id: &str) -> ServiceResult<Vec<Sighting>> {
        let query = Query::collection(SIGHTINGS)
            .where_eq("stolenVehicleId", stolen_id)
            .order_by("timestamp", Direction::Descending);
        let snapshot = self
            .ctx
            .store
            .query(&query)
            .await
            .or_upstream("failed to load sightings")?;
        Ok(snapshot.iter().filter_map(decode_sighting).collect())
    }

    /// Reports a sighting at `location` and notifies the owner. Returns the
    /// sighting id.
    pub async fn report_sighting(
        &self,
        stolen_id: &str,
        location: &SightingLocation,
        description: Option<&str>,
    ) -> ServiceResult<String> {
        let principal = self.ctx.identity.require()?;
        check_coordinates(location.latitude, location.longitude)?;
        if location.address.trim().is_empty() {
            return Err(ServiceError::invalid("sighting address is required"));
        }
        let record = self
            .ctx
            .store
            .get(STOLEN_CARS, stolen_id)
            .await
            .or_upstream("failed to load stolen vehicle")?
            .filter(|doc| doc.bool_field("isActive").unwrap_or(false))
            .ok_or_else(|| ServiceError::not_found("stolen vehicle"))?;

        let profile = ProfileService::new(self.ctx.clone())
            .get_by_uid(&principal.uid)
            .await?;
        let reporter = Reporter {
            user_id: principal.uid.clone(),
            name: profile
                .as_ref()
                .and_then(|p| non_blank(Some(p.name.as_str())))
                .unwrap_or_else(|| ANONYMOUS_REPORTER.to_string()),
            photo_url: profile.and_then(|p| p.photo_url),
        };
        let description = non_blank(description);

        let sighting_id = self
            .ctx
            .store
            .add(
                SIGHTINGS,
                Fields::new()
                    .set("stolenVehicleId", stolen_id)
                    .set("reportedBy", encode_reporter(&reporter))
                    .set("location", encode_location(location))
                    .set_opt("description", description)
                    .server_timestamp("timestamp")
                    .set("isVerified", false),
            )
            .await
            .or_upstream("failed to report sighting")?;

        let last_seen = Value::map([
            ("latitude", Value::from(location.latitude)),
            ("longitude", Value::from(location.longitude)),
            ("address", Value::from(location.address.as_str())),
            ("timestamp", Value::from(Utc::now())),
        ]);

        self.ctx
            .store
            .update(
                STOLEN_CARS,
                stolen_id,
                Fields::new()
                    .increment("sightingsCount", 1)
                    .set("lastSeenLocation", last_seen.clone())
                    .server_timestamp("updatedAt"),
            )
            .await
            .or_upstream("failed to update stolen vehicle")?;

        let vehicle_id = record.string_field("carId");
        if let Err(err) = self
            .ctx
            .store
            .update(CARS, &vehicle_id, Fields::new().set("lastSeenLocation", last_seen))
            .await
        {
            warn!(vehicle = %vehicle_id, error = %err, "could not copy last seen location to vehicle");
        }

        self.ctx
            .store
            .add(
                NOTIFICATIONS,
                Fields::new()
                    .set("vehicleOwnerId", record.string_field("userId"))
                    .set("stolenVehicleId", stolen_id)
                    .set("sightingId", sighting_id.as_str())
                    .set("reportedBy", encode_reporter(&reporter))
                    .set(
                        "message",
                        sighting_message(record.str_field("brand"), &location.address),
                    )
                    .set("isRead", false)
                    .server_timestamp("createdAt"),
            )
            .await
            .or_upstream("failed to notify vehicle owner")?;

        info!(record = %stolen_id, sighting = %sighting_id, "sighting reported");
        Ok(sighting_id)
    }

    /// Reports a sighting at the device's current position.
    pub async fn report_sighting_here(
        &self,
        stolen_id: &str,
        position: &dyn PositionProvider,
        description: Option<&str>,
    ) -> ServiceResult<String> {
        self.ctx.identity.require()?;
        let fix = position.current_position().await.map_err(|err| match err {
            PositionError::PermissionDenied => {
                ServiceError::invalid("location permission is required to report a sighting")
            }
            other => ServiceError::upstream("failed to get current location", other),
        })?;
        self.report_sighting(stolen_id, &fix.into_sighting_location(), description)
            .await
    }
}

fn feed_query() -> Query {
    Query::collection(STOLEN_CARS)
        .where_eq("isActive", true)
        .order_by("stolenAt", Direction::Descending)
}

pub(crate) fn encode_reporter(reporter: &Reporter) -> Value {
    let mut map = ValueMap::new();
    map.insert("userId".into(), reporter.user_id.as_str().into());
    map.insert("name".into(), reporter.name.as_str().into());
    if let Some(url) = &reporter.photo_url {
        map.insert("photoURL".into(), url.into());
    }
    Value::Map(map)
}

fn encode_location(location: &SightingLocation) -> Value {
    let mut map = ValueMap::new();
    map.insert("latitude".into(), location.latitude.into());
    map.insert("longitude".into(), location.longitude.into());
    map.insert("address".into(), location.address.as_str().into());
    if let Some(accuracy) = location.accuracy {
        map.insert("accuracy".into(), accuracy.into());
    }
    Value::Map(map)
}

pub(crate) fn decode_reporter(map: &ValueMap) -> Reporter {
    Reporter {
        user_id: map.string_field("userId"),
        name: map
            .opt_string("name")
            .unwrap_or_else(|| ANONYMOUS_REPORTER.to_string()),
        photo_url: map.opt_string("photoURL"),
    }
}

pub(crate) fn decode_last_seen(map: &ValueMap) -> Option<LastSeenLocation> {
    Some(LastSeenLocation {
        latitude: map.f64_field("latitude")?,
        longitude: map.f64_field("longitude")?,
        address: map.string_field("address"),
        timestamp: map.datetime_field("timestamp"),
    })
}

pub(crate) fn decode_stolen(doc: &Document) -> StolenVehicle {
    StolenVehicle {
        id: doc.id.clone(),
        vehicle_id: doc.string_field("carId"),
        owner_id: doc.string_field("userId"),
        owner_name: doc
            .opt_string("ownerName")
            .unwrap_or_else(|| UNKNOWN_OWNER.to_string()),
        owner_phone: doc.opt_string("ownerPhone"),
        owner_photo_url: doc.opt_string("ownerPhotoURL"),
        brand: doc.string_field("brand"),
        model: doc.string_field("model"),
        year: doc
            .i64_field("year")
            .and_then(|y| i32::try_from(y).ok())
            .unwrap_or_default(),
        license_plate: doc.string_field("licensePlate"),
        color: doc.string_field("color"),
        color_hex: doc.string_field("colorHex"),
        photo_url: doc.opt_string("photoURL"),
        description: doc.opt_string("description"),
        stolen_at: doc.datetime_field("stolenAt").unwrap_or_else(Utc::now),
        last_seen: doc.map_field("lastSeenLocation").and_then(decode_last_seen),
        sightings_count: doc
            .i64_field("sightingsCount")
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
        is_active: doc.bool_field("isActive").unwrap_or(false),
        created_at: doc.datetime_field("createdAt").unwrap_or_else(Utc::now),
        updated_at: doc.datetime_field("updatedAt"),
        recovered_at: doc.datetime_field("recoveredAt"),
    }
}

pub(crate) fn decode_sighting(doc: &Document) -> Option<Sighting> {
    let location = doc.map_field("location")?;
    Some(Sighting {
        id: doc.id.clone(),
        stolen_vehicle_id: doc.string_field("stolenVehicleId"),
        reported_by: doc
            .map_field("reportedBy")
            .map(decode_reporter)
            .unwrap_or_else(|| Reporter {
                user_id: String::new(),
                name: ANONYMOUS_REPORTER.to_string(),
                photo_url: None,
            }),
        location: SightingLocation {
            latitude: location.f64_field("latitude")?,
            longitude: location.f64_field("longitude")?,
            address: location.string_field("address"),
            accuracy: location.f64_field("accuracy"),
        },
        description: doc.opt_string("description"),
        timestamp: doc.datetime_field("timestamp").unwrap_or_else(Utc::now),
        is_verified: doc.bool_field("isVerified").unwrap_or(false),
    })
}
