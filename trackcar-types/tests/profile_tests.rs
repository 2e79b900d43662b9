use pretty_assertions::assert_eq;
use trackcar_types::validation::{check_password, check_password_change, is_valid_email};
use trackcar_types::{
    clean_phone_number, format_phone_number, sighting_message, unread_count, validate_profile,
    GeocodedAddress, ProfileUpdate, SightingLocation,
};

#[test]
fn phone_mask_for_mobile_and_landline() {
    assert_eq!(format_phone_number("11987654321"), "(11) 98765-4321");
    assert_eq!(format_phone_number("1123456789"), "(11) 2345-6789");
    assert_eq!(format_phone_number("(11) 98765-4321"), "(11) 98765-4321");
    assert_eq!(format_phone_number("119"), "119");
}

#[test]
fn clean_phone_strips_mask() {
    assert_eq!(clean_phone_number("(11) 98765-4321"), "11987654321");
}

#[test]
fn profile_validation_only_checks_present_fields() {
    assert!(validate_profile(&ProfileUpdate::default()).is_empty());

    let update = ProfileUpdate {
        name: Some("A".into()),
        phone: Some("11987654321".into()),
        address: Some("short".into()),
    };
    let errors = validate_profile(&update);
    assert_eq!(errors.name.as_deref(), Some("name must have at least 2 characters"));
    assert_eq!(errors.phone.as_deref(), Some("phone must be in the format (XX) XXXXX-XXXX"));
    assert_eq!(errors.address.as_deref(), Some("address must have at least 10 characters"));
}

#[test]
fn well_formed_profile_passes() {
    let update = ProfileUpdate {
        name: Some("Maria Silva".into()),
        phone: Some("(11) 98765-4321".into()),
        address: Some("Av. Paulista, 1578 - Bela Vista".into()),
    };
    assert!(validate_profile(&update).is_empty());
}

#[test]
fn email_syntax() {
    assert!(is_valid_email("owner@example.com"));
    assert!(!is_valid_email("owner@example"));
    assert!(!is_valid_email("owner example@x.com"));
    assert!(!is_valid_email("@example.com"));
}

#[test]
fn password_policy() {
    assert_eq!(check_password("abc12"), Err("password must have at least 6 characters"));
    assert_eq!(check_password("ABCDEF1"), Err("password must contain a lowercase letter"));
    assert_eq!(check_password("abcdefg"), Err("password must contain a digit"));
    assert_eq!(check_password("abcdef1"), Ok(()));
}

#[test]
fn password_change_requires_confirmation() {
    assert_eq!(check_password_change("secret1", "secret2"), Err("passwords do not match"));
    assert_eq!(check_password_change("secret1", "secret1"), Ok(()));
    assert!(check_password_change("", "").is_err());
}

#[test]
fn sighting_location_prefers_geocoded_address() {
    let geocoded = GeocodedAddress {
        street: Some("Av. Paulista".into()),
        street_number: Some("1578".into()),
        district: Some("Bela Vista".into()),
        city: Some("São Paulo".into()),
        region: Some("SP".into()),
    };
    let loc = SightingLocation::resolve(-23.5, -46.6, Some(5.0), Some(&geocoded));
    assert_eq!(loc.address, "Av. Paulista 1578, Bela Vista, São Paulo - SP");
}

#[test]
fn sighting_location_falls_back_to_coordinates() {
    let loc = SightingLocation::resolve(-23.5505, -46.6333, None, Some(&GeocodedAddress::default()));
    assert_eq!(loc.address, "-23.550500, -46.633300");

    let loc = SightingLocation::resolve(1.0, 2.0, None, None);
    assert_eq!(loc.address, "1.000000, 2.000000");
}

#[test]
fn message_uses_brand_or_generic_subject() {
    assert_eq!(sighting_message(Some("Toyota"), "Rua A"), "Your Toyota was spotted at Rua A");
    assert_eq!(sighting_message(None, "Rua A"), "Your vehicle was spotted at Rua A");
    assert_eq!(unread_count(&[]), 0);
}
