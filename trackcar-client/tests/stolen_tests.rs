mod support;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use support::{Harness, PASSWORD, recorder, signed_in};
use trackcar_client::position::{FixedPosition, PositionError, PositionFix, PositionProvider};
use trackcar_client::{AuthProvider, ServiceError};
use trackcar_store::{DocumentStore, Query, ReadFields};
use trackcar_types::{
    ANONYMOUS_REPORTER, GeocodedAddress, SightingLocation, StolenStatus, UNKNOWN_OWNER,
};

fn paulista() -> SightingLocation {
    SightingLocation {
        latitude: -23.5614,
        longitude: -46.6559,
        address: "Av. Paulista, 1000".into(),
        accuracy: Some(8.0),
    }
}

/// Owner reports a vehicle stolen, then a second user signs in.
async fn stolen_vehicle() -> (Harness, String, String) {
    let h = signed_in().await;
    let vehicle = h.create_vehicle("ABC-1234").await;
    let record = h.session.stolen().mark_stolen(&vehicle).await.unwrap();
    h.register("witness@example.com", "Joao Souza").await;
    (h, vehicle, record)
}

struct DeniedPosition;

#[async_trait]
impl PositionProvider for DeniedPosition {
    async fn current_position(&self) -> Result<PositionFix, PositionError> {
        Err(PositionError::PermissionDenied)
    }
}

// --- Marking stolen / recovered ---

#[tokio::test]
async fn mark_stolen_flags_vehicle_and_publishes_snapshot() {
    let h = signed_in().await;
    let vehicle = h.create_vehicle("ABC-1234").await;
    let record = h.session.stolen().mark_stolen(&vehicle).await.unwrap();

    let v = h.session.vehicles().get(&vehicle).await.unwrap();
    assert!(v.is_stolen);
    assert!(v.stolen_reported_at.is_some());

    let stolen = h.session.stolen().get(&record).await.unwrap();
    assert_eq!(stolen.vehicle_id, vehicle);
    assert_eq!(stolen.owner_id, v.owner_id);
    assert_eq!(stolen.owner_name, "Maria Silva");
    assert_eq!(stolen.owner_phone.as_deref(), Some("(11) 98765-4321"));
    assert_eq!(stolen.license_plate, "ABC-1234");
    assert_eq!(stolen.brand, "Toyota");
    assert_eq!(stolen.year, 2020);
    assert_eq!(stolen.sightings_count, 0);
    assert!(stolen.is_active);
    assert!(stolen.last_seen.is_none());
}

#[tokio::test]
async fn marking_twice_reuses_the_active_record() {
    let h = signed_in().await;
    let vehicle = h.create_vehicle("ABC-1234").await;
    let first = h.session.stolen().mark_stolen(&vehicle).await.unwrap();
    let second = h.session.stolen().mark_stolen(&vehicle).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.store.document_count("stolen_cars"), 1);
}

#[tokio::test]
async fn owner_without_profile_is_published_with_placeholder_name() {
    let h = Harness::new();
    h.auth.create_account("bare@example.com", PASSWORD).await.unwrap();
    h.sign_in("bare@example.com").await;
    let vehicle = h.create_vehicle("ABC-1234").await;

    let record = h.session.stolen().mark_stolen(&vehicle).await.unwrap();
    let stolen = h.session.stolen().get(&record).await.unwrap();
    assert_eq!(stolen.owner_name, UNKNOWN_OWNER);
    assert_eq!(stolen.owner_phone, None);
}

#[tokio::test]
async fn snapshot_does_not_follow_later_vehicle_edits() {
    let h = signed_in().await;
    let vehicle = h.create_vehicle("ABC-1234").await;
    let record = h.session.stolen().mark_stolen(&vehicle).await.unwrap();

    let update = trackcar_types::VehicleUpdate {
        color: Some("Vermelho".into()),
        ..Default::default()
    };
    h.session.vehicles().update(&vehicle, &update, None).await.unwrap();
    assert_eq!(h.session.stolen().get(&record).await.unwrap().color, "Preto");
}

#[tokio::test]
async fn recovery_deactivates_records_without_deleting() {
    let h = signed_in().await;
    let vehicle = h.create_vehicle("ABC-1234").await;
    let record = h.session.stolen().mark_stolen(&vehicle).await.unwrap();

    assert_eq!(h.session.stolen().mark_recovered(&vehicle).await.unwrap(), 1);

    let v = h.session.vehicles().get(&vehicle).await.unwrap();
    assert!(!v.is_stolen);
    assert_eq!(v.stolen_reported_at, None);
    assert!(h.session.stolen().active_feed().await.unwrap().is_empty());

    let closed = h.session.stolen().get(&record).await.unwrap();
    assert!(!closed.is_active);
    assert!(closed.recovered_at.is_some());

    // A later theft opens a fresh record.
    let again = h.session.stolen().mark_stolen(&vehicle).await.unwrap();
    assert_ne!(again, record);
    assert_eq!(h.store.document_count("stolen_cars"), 2);
}

#[tokio::test]
async fn only_the_owner_can_mark_a_vehicle() {
    let (h, vehicle, _) = stolen_vehicle().await;
    let err = h.session.stolen().mark_recovered(&vehicle).await.unwrap_err();
    assert_eq!(err, ServiceError::NotFound("vehicle".into()));
}

// --- Feed ---

#[tokio::test]
async fn feed_is_visible_to_every_signed_in_user() {
    let (h, vehicle, record) = stolen_vehicle().await;
    let feed = h.session.stolen().active_feed().await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, record);
    assert_eq!(feed[0].vehicle_id, vehicle);
}

#[tokio::test]
async fn live_feed_tracks_reports_and_recoveries() {
    let h = signed_in().await;
    let vehicle = h.create_vehicle("ABC-1234").await;

    let (callback, seen) = recorder();
    let _handle = h.session.stolen().watch_feed(callback);
    h.session.stolen().mark_stolen(&vehicle).await.unwrap();
    h.session.stolen().mark_recovered(&vehicle).await.unwrap();

    let sizes: Vec<usize> = seen.lock().unwrap().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![0, 1, 0]);
}

#[tokio::test]
async fn status_subscription_follows_the_vehicle_flag() {
    let h = signed_in().await;
    let vehicle = h.create_vehicle("ABC-1234").await;

    let (callback, seen) = recorder();
    let _handle = h.session.stolen().watch_status(&vehicle, callback);
    h.session.stolen().mark_stolen(&vehicle).await.unwrap();
    h.session.stolen().mark_recovered(&vehicle).await.unwrap();

    let flags: Vec<bool> = seen.lock().unwrap().iter().map(|s| s.is_stolen).collect();
    assert_eq!(flags, vec![false, true, false]);
    assert_eq!(seen.lock().unwrap()[0], StolenStatus::default());
}

// --- Sightings ---

#[tokio::test]
async fn sighting_writes_record_counter_last_seen_and_one_notification() {
    let (h, vehicle, record) = stolen_vehicle().await;
    let witness = h.session.principal().unwrap().uid;

    let sighting = h
        .session
        .stolen()
        .report_sighting(&record, &paulista(), Some("parked near the metro"))
        .await
        .unwrap();

    let stored = h.store.get("vehicle_sightings", &sighting).await.unwrap().unwrap();
    assert_eq!(stored.str_field("stolenVehicleId"), Some(record.as_str()));
    assert_eq!(stored.bool_field("isVerified"), Some(false));
    let reporter = stored.map_field("reportedBy").unwrap();
    assert_eq!(reporter.str_field("userId"), Some(witness.as_str()));
    assert_eq!(reporter.str_field("name"), Some("Joao Souza"));

    let stolen = h.session.stolen().get(&record).await.unwrap();
    assert_eq!(stolen.sightings_count, 1);
    let last_seen = stolen.last_seen.unwrap();
    assert_eq!(last_seen.address, "Av. Paulista, 1000");
    assert_eq!(last_seen.latitude, -23.5614);

    let car = h.store.get("cars", &vehicle).await.unwrap().unwrap();
    let car_last_seen = car.map_field("lastSeenLocation").unwrap();
    assert_eq!(car_last_seen.str_field("address"), Some("Av. Paulista, 1000"));

    let notifications = h
        .store
        .query(&Query::collection("sighting_notifications"))
        .await
        .unwrap();
    assert_eq!(notifications.len(), 1);
    let n = notifications.first().unwrap();
    assert_eq!(n.str_field("sightingId"), Some(sighting.as_str()));
    assert_eq!(n.str_field("vehicleOwnerId"), Some(stolen.owner_id.as_str()));
    assert_eq!(n.str_field("message"), Some("Your Toyota was spotted at Av. Paulista, 1000"));
    assert_eq!(n.bool_field("isRead"), Some(false));
}

#[tokio::test]
async fn reporter_without_profile_is_anonymous() {
    let (h, _, record) = stolen_vehicle().await;
    h.auth.create_account("bare@example.com", PASSWORD).await.unwrap();
    h.sign_in("bare@example.com").await;

    let sighting = h
        .session
        .stolen()
        .report_sighting(&record, &paulista(), None)
        .await
        .unwrap();
    let stored = h.store.get("vehicle_sightings", &sighting).await.unwrap().unwrap();
    let reporter = stored.map_field("reportedBy").unwrap();
    assert_eq!(reporter.str_field("name"), Some(ANONYMOUS_REPORTER));
    assert!(stored.field("description").is_none());
}

#[tokio::test]
async fn recovered_vehicles_cannot_be_sighted() {
    let h = signed_in().await;
    let vehicle = h.create_vehicle("ABC-1234").await;
    let record = h.session.stolen().mark_stolen(&vehicle).await.unwrap();
    h.session.stolen().mark_recovered(&vehicle).await.unwrap();

    let err = h
        .session
        .stolen()
        .report_sighting(&record, &paulista(), None)
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::NotFound("stolen vehicle".into()));
    assert_eq!(h.store.document_count("vehicle_sightings"), 0);
    assert_eq!(h.store.document_count("sighting_notifications"), 0);
}

#[tokio::test]
async fn sighting_needs_a_resolved_location() {
    let (h, vehicle, record) = stolen_vehicle().await;
    let bad = [
        SightingLocation {
            latitude: f64::NAN,
            longitude: 999.0,
            address: String::new(),
            accuracy: None,
        },
        SightingLocation {
            latitude: 91.0,
            ..paulista()
        },
        SightingLocation {
            address: "   ".into(),
            ..paulista()
        },
    ];
    for location in &bad {
        let err = h
            .session
            .stolen()
            .report_sighting(&record, location, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)), "{location:?}: {err:?}");
    }

    let stolen = h.session.stolen().get(&record).await.unwrap();
    assert_eq!(stolen.sightings_count, 0);
    assert_eq!(stolen.last_seen, None);
    let car = h.store.get("cars", &vehicle).await.unwrap().unwrap();
    assert!(car.field("lastSeenLocation").is_none());
    assert_eq!(h.store.document_count("vehicle_sightings"), 0);
    assert_eq!(h.store.document_count("sighting_notifications"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sightings_count_exactly() {
    const N: usize = 24;
    let (h, vehicle, record) = stolen_vehicle().await;
    let stolen = h.session.stolen();

    let mut tasks = Vec::new();
    for i in 0..N {
        let stolen = stolen.clone();
        let record = record.clone();
        tasks.push(tokio::spawn(async move {
            let description = format!("sighting {i}");
            stolen
                .report_sighting(&record, &paulista(), Some(&description))
                .await
        }));
    }
    // Unrelated writes to the same records while sightings land.
    let writer = {
        let store = h.store.clone();
        let record = record.clone();
        tokio::spawn(async move {
            for _ in 0..N {
                store
                    .update(
                        "stolen_cars",
                        &record,
                        trackcar_store::Fields::new().server_timestamp("updatedAt"),
                    )
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    writer.await.unwrap();

    assert_eq!(stolen.get(&record).await.unwrap().sightings_count, N as u64);
    assert_eq!(h.store.document_count("vehicle_sightings"), N);
    assert_eq!(h.store.document_count("sighting_notifications"), N);
    let car = h.store.get("cars", &vehicle).await.unwrap().unwrap();
    assert!(car.map_field("lastSeenLocation").is_some());

    let public = stolen.public_sightings(&record).await.unwrap();
    assert_eq!(public.count, N);
    assert_eq!(public.descriptions.len(), N);
}

#[tokio::test]
async fn sighting_here_uses_the_device_position() {
    let (h, _, record) = stolen_vehicle().await;

    let with_address = FixedPosition(PositionFix {
        latitude: -23.5614,
        longitude: -46.6559,
        accuracy: Some(12.0),
        address: Some(GeocodedAddress {
            street: Some("Av. Paulista".into()),
            street_number: Some("1000".into()),
            district: Some("Bela Vista".into()),
            city: Some("São Paulo".into()),
            region: Some("SP".into()),
        }),
    });
    let id = h
        .session
        .stolen()
        .report_sighting_here(&record, &with_address, None)
        .await
        .unwrap();
    let stored = h.store.get("vehicle_sightings", &id).await.unwrap().unwrap();
    assert_eq!(
        stored.map_field("location").unwrap().str_field("address"),
        Some("Av. Paulista 1000, Bela Vista, São Paulo - SP")
    );

    let without_address = FixedPosition(PositionFix {
        latitude: -23.5614,
        longitude: -46.6559,
        accuracy: None,
        address: None,
    });
    let id = h
        .session
        .stolen()
        .report_sighting_here(&record, &without_address, None)
        .await
        .unwrap();
    let stored = h.store.get("vehicle_sightings", &id).await.unwrap().unwrap();
    assert_eq!(
        stored.map_field("location").unwrap().str_field("address"),
        Some("-23.561400, -46.655900")
    );
}

#[tokio::test]
async fn sighting_here_without_location_permission() {
    let (h, _, record) = stolen_vehicle().await;
    let provider: Arc<dyn PositionProvider> = Arc::new(DeniedPosition);
    let err = h
        .session
        .stolen()
        .report_sighting_here(&record, provider.as_ref(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
    assert_eq!(h.store.document_count("vehicle_sightings"), 0);
}

#[tokio::test]
async fn sightings_list_is_for_the_owner_only() {
    let (h, _, record) = stolen_vehicle().await;
    h.session
        .stolen()
        .report_sighting(&record, &paulista(), Some("white sticker on the rear window"))
        .await
        .unwrap();
    h.session
        .stolen()
        .report_sighting(&record, &paulista(), None)
        .await
        .unwrap();

    let err = h.session.stolen().sightings(&record).await.unwrap_err();
    assert_eq!(err, ServiceError::NotFound("stolen vehicle".into()));

    let public = h.session.stolen().public_sightings(&record).await.unwrap();
    assert_eq!(public.count, 2);
    assert_eq!(public.descriptions, vec!["white sticker on the rear window".to_string()]);

    h.sign_in("owner@example.com").await;
    let sightings = h.session.stolen().sightings(&record).await.unwrap();
    assert_eq!(sightings.len(), 2);
    assert!(sightings.iter().all(|s| s.reported_by.name == "Joao Souza"));
}
