//! User profiles and profile-form validation.
//!
//! A profile is keyed by the principal's uid. Email is copied from the
//! account at registration and never edited afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Registration details collected alongside the account credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Editable profile fields. `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl From<NewProfile> for ProfileUpdate {
    fn from(p: NewProfile) -> Self {
        Self {
            name: Some(p.name),
            phone: Some(p.phone),
            address: Some(p.address),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFormErrors {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ProfileFormErrors {
    pub fn is_empty(&self) -> bool {
        self.first_message().is_none()
    }

    pub fn first_message(&self) -> Option<&str> {
        [&self.name, &self.phone, &self.address]
            .into_iter()
            .find_map(|m| m.as_deref())
    }
}

/// Validates whichever fields are present in `update`.
pub fn validate_profile(update: &ProfileUpdate) -> ProfileFormErrors {
    ProfileFormErrors {
        name: update.name.as_deref().and_then(validate_name),
        phone: update.phone.as_deref().and_then(validate_phone),
        address: update.address.as_deref().and_then(validate_address),
    }
}

fn validate_name(name: &str) -> Option<String> {
    let len = name.trim().chars().count();
    match len {
        0 => Some("name is required".into()),
        1 => Some("name must have at least 2 characters".into()),
        n if n > 50 => Some("name must have at most 50 characters".into()),
        _ => None,
    }
}

fn validate_phone(phone: &str) -> Option<String> {
    if phone.trim().is_empty() {
        Some("phone is required".into())
    } else if !is_masked_phone(phone) {
        Some("phone must be in the format (XX) XXXXX-XXXX".into())
    } else {
        None
    }
}

fn validate_address(address: &str) -> Option<String> {
    let len = address.trim().chars().count();
    match len {
        0 => Some("address is required".into()),
        n if n < 10 => Some("address must have at least 10 characters".into()),
        n if n > 100 => Some("address must have at most 100 characters".into()),
        _ => None,
    }
}

/// Matches `(DD) DDDD-DDDD` and `(DD) DDDDD-DDDD`.
fn is_masked_phone(phone: &str) -> bool {
    let Some(rest) = phone.strip_prefix('(') else {
        return false;
    };
    let (area, rest) = rest.split_at_checked(2).unwrap_or(("", ""));
    let Some(rest) = rest.strip_prefix(") ") else {
        return false;
    };
    let Some((prefix, line)) = rest.split_once('-') else {
        return false;
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    area.len() == 2
        && all_digits(area)
        && (4..=5).contains(&prefix.len())
        && all_digits(prefix)
        && line.len() == 4
        && all_digits(line)
}

/// Applies the `(XX) XXXXX-XXXX` mask (or `(XX) XXXX-XXXX` for ten digits).
///
/// Inputs too short to fill the area code and prefix come back as digits.
pub fn format_phone_number(input: &str) -> String {
    let digits = clean_phone_number(input);
    let prefix_len = if digits.len() <= 10 { 4 } else { 5 };
    if digits.len() < 2 + prefix_len {
        return digits;
    }
    let (area, rest) = digits.split_at(2);
    let (prefix, line) = rest.split_at(prefix_len);
    let line = &line[..line.len().min(4)];
    format!("({area}) {prefix}-{line}")
}

pub fn clean_phone_number(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}
