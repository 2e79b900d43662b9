//! Vehicle records: registration, edits, soft delete, plate uniqueness.
//!
//! Plate uniqueness is a read-then-write check scoped to the owner's active
//! vehicles. Two concurrent registrations of the same plate can both pass.

use super::collections::CARS;
use super::stolen::decode_last_seen;
use super::{ServiceContext, non_blank};
use crate::error::{ServiceError, ServiceResult, StoreResultExt};
use chrono::{Datelike, Utc};
use tracing::{info, warn};
use trackcar_store::{Direction, Document, Fields, Query, ReadFields};
use trackcar_types::{
    IgnitionState, LastKnownPosition, Vehicle, VehicleForm, VehicleUpdate, digits_only,
    format_license_plate, is_valid_license_plate, validate_vehicle_form, validate_year,
};

#[derive(Clone)]
pub struct VehicleService {
    ctx: ServiceContext,
}

impl VehicleService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Registers a vehicle for the signed-in owner and returns its id.
    ///
    /// Optional fields that are blank are not written at all.
    pub async fn create(&self, form: &VehicleForm, photo_url: Option<String>) -> ServiceResult<String> {
        let principal = self.ctx.identity.require()?;

        let errors = validate_vehicle_form(form);
        if let Some(message) = errors.first_message() {
            return Err(ServiceError::invalid(message));
        }
        let year = validate_year(&form.year, Utc::now().year()).map_err(ServiceError::InvalidInput)?;
        let plate = format_license_plate(&form.license_plate);
        if self.is_plate_taken(&plate, None).await? {
            return Err(ServiceError::DuplicatePlate(plate));
        }

        let fields = Fields::new()
            .set("userId", principal.uid.as_str())
            .set("brand", form.brand.trim())
            .set("model", form.model.trim())
            .set("year", year)
            .set("licensePlate", plate.as_str())
            .set("color", form.color.trim())
            .set("colorHex", form.color_hex.trim())
            .set_opt("engine", non_blank(form.engine.as_deref()))
            .set_opt("renavam", clean_renavam(form.renavam.as_deref()))
            .set_opt("chassi", clean_chassis(form.chassis.as_deref()))
            .set_opt("fuel", non_blank(form.fuel.as_deref()))
            .set_opt("description", non_blank(form.description.as_deref()))
            .set_opt("photoURL", photo_url)
            .set("ignitionState", IgnitionState::Unknown.as_str())
            .set("isStolen", false)
            .set("isActive", true)
            .server_timestamp("createdAt");

        let id = self
            .ctx
            .store
            .add(CARS, fields)
            .await
            .or_upstream("failed to register vehicle")?;
        info!(vehicle = %id, plate = %plate, "vehicle registered");
        Ok(id)
    }

    /// Active vehicles of the signed-in owner, newest first.
    pub async fn list(&self) -> ServiceResult<Vec<Vehicle>> {
        let principal = self.ctx.identity.require()?;
        let query = Query::collection(CARS)
            .where_eq("userId", principal.uid.as_str())
            .where_eq("isActive", true)
            .order_by("createdAt", Direction::Descending);
        let snapshot = self
            .ctx
            .store
            .query(&query)
            .await
            .or_upstream("failed to load vehicles")?;
        Ok(snapshot.iter().map(decode_vehicle).collect())
    }

    /// A vehicle owned by the signed-in principal. Other owners' vehicles
    /// read as not found.
    pub async fn get(&self, vehicle_id: &str) -> ServiceResult<Vehicle> {
        let principal = self.ctx.identity.require()?;
        let doc = self
            .ctx
            .store
            .get(CARS, vehicle_id)
            .await
            .or_upstream("failed to load vehicle")?
            .filter(|d| d.str_field("userId") == Some(principal.uid.as_str()))
            .ok_or_else(|| ServiceError::not_found("vehicle"))?;
        Ok(decode_vehicle(&doc))
    }

    /// Applies a partial edit. Blank optional fields are removed.
    pub async fn update(
        &self,
        vehicle_id: &str,
        update: &VehicleUpdate,
        photo_url: Option<String>,
    ) -> ServiceResult<()> {
        self.get(vehicle_id).await?;

        let mut fields = Fields::new().server_timestamp("updatedAt");

        for (key, value) in [
            ("brand", &update.brand),
            ("model", &update.model),
            ("color", &update.color),
            ("colorHex", &update.color_hex),
        ] {
            if let Some(value) = value {
                let value = value.trim();
                if value.is_empty() {
                    return Err(ServiceError::invalid(format!("{key} cannot be empty")));
                }
                fields = fields.set(key, value);
            }
        }
        if let Some(model) = &update.model
            && model.trim().chars().count() < 2
        {
            return Err(ServiceError::invalid("model must have at least 2 characters"));
        }
        if let Some(year) = &update.year {
            let year = validate_year(year, Utc::now().year()).map_err(ServiceError::InvalidInput)?;
            fields = fields.set("year", year);
        }
        if let Some(plate) = &update.license_plate {
            if !is_valid_license_plate(plate) {
                return Err(ServiceError::invalid(
                    "invalid license plate (use ABC-1234 or ABC1D23)",
                ));
            }
            let plate = format_license_plate(plate);
            if self.is_plate_taken(&plate, Some(vehicle_id)).await? {
                return Err(ServiceError::DuplicatePlate(plate));
            }
            fields = fields.set("licensePlate", plate);
        }

        // Outer `None`: untouched. Inner `None`: cleared by the user.
        let optional = [
            ("engine", update.engine.as_deref().map(|v| non_blank(Some(v)))),
            ("renavam", update.renavam.as_deref().map(|v| clean_renavam(Some(v)))),
            ("chassi", update.chassis.as_deref().map(|v| clean_chassis(Some(v)))),
            ("fuel", update.fuel.as_deref().map(|v| non_blank(Some(v)))),
            ("description", update.description.as_deref().map(|v| non_blank(Some(v)))),
        ];
        for (key, value) in optional {
            fields = match value {
                Some(Some(v)) => fields.set(key, v),
                Some(None) => fields.delete(key),
                None => fields,
            };
        }
        fields = fields.set_opt("photoURL", photo_url);

        self.ctx
            .store
            .update(CARS, vehicle_id, fields)
            .await
            .or_upstream("failed to update vehicle")
    }

    /// Whether another active vehicle of the signed-in owner already uses
    /// `plate`. Plates are compared in display format.
    pub async fn is_plate_taken(&self, plate: &str, exclude_id: Option<&str>) -> ServiceResult<bool> {
        let principal = self.ctx.identity.require()?;
        let wanted = format_license_plate(plate);
        let query = Query::collection(CARS)
            .where_eq("userId", principal.uid.as_str())
            .where_eq("isActive", true);
        let snapshot = self
            .ctx
            .store
            .query(&query)
            .await
            .or_upstream("failed to check license plate")?;

        Ok(snapshot.iter().any(|doc| {
            Some(doc.id.as_str()) != exclude_id
                && doc
                    .str_field("licensePlate")
                    .is_some_and(|p| format_license_plate(p) == wanted)
        }))
    }

    /// Marks the vehicle inactive. History and commands are kept. The photo
    /// is removed from the file server on a best-effort basis.
    pub async fn soft_delete(&self, vehicle_id: &str) -> ServiceResult<()> {
        let vehicle = self.get(vehicle_id).await?;

        if let Some(url) = &vehicle.photo_url
            && let Err(err) = self.ctx.photos.delete(url).await
        {
            warn!(vehicle = %vehicle_id, error = %err, "could not remove vehicle photo");
        }

        self.ctx
            .store
            .update(
                CARS,
                vehicle_id,
                Fields::new()
                    .set("isActive", false)
                    .server_timestamp("updatedAt"),
            )
            .await
            .or_upstream("failed to remove vehicle")?;
        info!(vehicle = %vehicle_id, "vehicle removed");
        Ok(())
    }

    /// Uploads a vehicle photo and returns its URL.
    pub async fn upload_photo(&self, jpeg: Vec<u8>) -> ServiceResult<String> {
        self.ctx.identity.require()?;
        self.ctx.photos.upload_jpeg("car", jpeg).await
    }
}

fn clean_renavam(raw: Option<&str>) -> Option<String> {
    raw.map(digits_only).filter(|d| !d.is_empty())
}

fn clean_chassis(raw: Option<&str>) -> Option<String> {
    non_blank(raw).map(|c| c.to_uppercase())
}

pub(crate) fn decode_vehicle(doc: &Document) -> Vehicle {
    let last_known_position = match (doc.f64_field("lastLatitude"), doc.f64_field("lastLongitude")) {
        (Some(latitude), Some(longitude)) => Some(LastKnownPosition {
            latitude,
            longitude,
            updated_at: doc.datetime_field("lastLocationUpdate"),
        }),
        _ => None,
    };

    Vehicle {
        id: doc.id.clone(),
        owner_id: doc.string_field("userId"),
        brand: doc.string_field("brand"),
        model: doc.string_field("model"),
        year: doc
            .i64_field("year")
            .and_then(|y| i32::try_from(y).ok())
            .unwrap_or_default(),
        license_plate: doc.string_field("licensePlate"),
        color: doc.string_field("color"),
        color_hex: doc.string_field("colorHex"),
        engine: doc.opt_string("engine"),
        chassis: doc.opt_string("chassi"),
        renavam: doc.opt_string("renavam"),
        fuel: doc.opt_string("fuel"),
        description: doc.opt_string("description"),
        photo_url: doc.opt_string("photoURL"),
        ignition_state: IgnitionState::parse(doc.str_field("ignitionState").unwrap_or_default()),
        last_ignition_update: doc.datetime_field("lastIgnitionUpdate"),
        is_stolen: doc.bool_field("isStolen").unwrap_or(false),
        stolen_reported_at: doc.datetime_field("stolenReportedAt"),
        last_known_position,
        last_seen: doc.map_field("lastSeenLocation").and_then(decode_last_seen),
        is_active: doc.bool_field("isActive").unwrap_or(false),
        created_at: doc.datetime_field("createdAt").unwrap_or_else(Utc::now),
        updated_at: doc.datetime_field("updatedAt"),
    }
}
