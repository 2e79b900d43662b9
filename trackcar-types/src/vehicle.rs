//! Vehicle records, the registration form, and plate formatting.
//!
//! Plates are persisted in their display format: the old pattern gets a
//! separator after the third character (`ABC-1234`), the Mercosul pattern
//! is stored as-is (`ABC1D23`).

use crate::ignition::IgnitionState;
use crate::location::LastKnownPosition;
use crate::stolen::LastSeenLocation;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Oldest model year accepted by the registration form.
pub const MIN_MODEL_YEAR: i32 = 1900;

/// A registered vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub owner_id: String,

    pub brand: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    pub color: String,
    pub color_hex: String,

    pub engine: Option<String>,
    pub chassis: Option<String>,
    pub renavam: Option<String>,
    pub fuel: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,

    pub ignition_state: IgnitionState,
    pub last_ignition_update: Option<DateTime<Utc>>,

    pub is_stolen: bool,
    pub stolen_reported_at: Option<DateTime<Utc>>,

    /// Denormalized copy of the most recent GPS sample.
    pub last_known_position: Option<LastKnownPosition>,
    /// Denormalized copy of the most recent sighting while stolen.
    pub last_seen: Option<LastSeenLocation>,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for registering a vehicle, as typed into the form.
///
/// `year` stays textual here; it is parsed when persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleForm {
    pub brand: String,
    pub model: String,
    pub year: String,
    pub license_plate: String,
    pub color: String,
    pub color_hex: String,

    pub engine: Option<String>,
    pub chassis: Option<String>,
    pub renavam: Option<String>,
    pub fuel: Option<String>,
    pub description: Option<String>,
}

/// Partial edit of a vehicle. `None` leaves the stored field untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpdate {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub license_plate: Option<String>,
    pub color: Option<String>,
    pub color_hex: Option<String>,
    pub engine: Option<String>,
    pub chassis: Option<String>,
    pub renavam: Option<String>,
    pub fuel: Option<String>,
    pub description: Option<String>,
}

/// Per-field validation messages. Only required fields can fail.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFormErrors {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub license_plate: Option<String>,
    pub color: Option<String>,
    pub color_hex: Option<String>,
}

impl VehicleFormErrors {
    pub fn is_empty(&self) -> bool {
        self.first_message().is_none()
    }

    /// First message in form order, for single-line display.
    pub fn first_message(&self) -> Option<&str> {
        [
            &self.brand,
            &self.model,
            &self.year,
            &self.license_plate,
            &self.color,
            &self.color_hex,
        ]
        .into_iter()
        .find_map(|m| m.as_deref())
    }
}

/// Validates the required fields of a registration form against the
/// current calendar year.
pub fn validate_vehicle_form(form: &VehicleForm) -> VehicleFormErrors {
    validate_vehicle_form_at(form, Utc::now().year())
}

/// Same as [`validate_vehicle_form`] with an explicit reference year.
pub fn validate_vehicle_form_at(form: &VehicleForm, current_year: i32) -> VehicleFormErrors {
    let mut errors = VehicleFormErrors::default();

    if form.brand.trim().is_empty() {
        errors.brand = Some("brand is required".into());
    }

    let model = form.model.trim();
    if model.is_empty() {
        errors.model = Some("model is required".into());
    } else if model.chars().count() < 2 {
        errors.model = Some("model must have at least 2 characters".into());
    }

    errors.year = validate_year(&form.year, current_year).err();

    if form.license_plate.trim().is_empty() {
        errors.license_plate = Some("license plate is required".into());
    } else if !is_valid_license_plate(&form.license_plate) {
        errors.license_plate = Some("invalid license plate (use ABC-1234 or ABC1D23)".into());
    }

    if form.color.trim().is_empty() {
        errors.color = Some("color is required".into());
    }
    if form.color_hex.trim().is_empty() {
        errors.color_hex = Some("color code is required".into());
    }

    errors
}

/// Parses a model year, accepting `MIN_MODEL_YEAR..=current_year + 1`.
pub fn validate_year(raw: &str, current_year: i32) -> Result<i32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("year is required".into());
    }
    let max = current_year + 1;
    match raw.parse::<i32>() {
        Ok(year) if (MIN_MODEL_YEAR..=max).contains(&year) => Ok(year),
        _ => Err(format!("year must be between {MIN_MODEL_YEAR} and {max}")),
    }
}

/// Returns true for the old (`ABC-1234`, `ABC1234`) and Mercosul
/// (`ABC1D23`) plate patterns. Whitespace and case are ignored.
pub fn is_valid_license_plate(plate: &str) -> bool {
    let normalized: String = plate
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let bytes = normalized.as_bytes();

    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_uppercase) {
        return false;
    }
    let tail = match &bytes[3..] {
        [b'-', rest @ ..] => rest,
        rest => rest,
    };
    match tail {
        [a, b, c, d] => {
            a.is_ascii_digit()
                && (b.is_ascii_digit() || b.is_ascii_uppercase())
                && c.is_ascii_digit()
                && d.is_ascii_digit()
        }
        _ => false,
    }
}

/// Formats raw plate input into the display (and persisted) form.
///
/// Non-alphanumerics are dropped and letters uppercased. Three letters
/// followed by up to four digits get a `-` separator; anything else is
/// returned as the cleaned string.
pub fn format_license_plate(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() <= 3 || cleaned.len() > 7 {
        return cleaned;
    }

    let (letters, rest) = cleaned.split_at(3);
    if letters.bytes().all(|b| b.is_ascii_uppercase()) && rest.bytes().all(|b| b.is_ascii_digit()) {
        format!("{letters}-{rest}")
    } else {
        cleaned
    }
}

/// Formats a RENAVAM as `1234.5678.901`.
///
/// Fewer than eight digits are returned unformatted; more than eleven are
/// truncated to eleven without separators.
pub fn format_renavam(input: &str) -> String {
    let digits = digits_only(input);
    if digits.len() > 11 {
        return digits[..11].to_string();
    }
    if digits.len() < 8 {
        return digits;
    }
    let (head, tail) = digits.split_at(4);
    let (mid, last) = tail.split_at(4);
    if last.is_empty() {
        format!("{head}.{mid}")
    } else {
        format!("{head}.{mid}.{last}")
    }
}

/// Strips everything except ASCII digits.
pub fn digits_only(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}
