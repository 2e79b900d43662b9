use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use trackcar_store::*;

type Seen = Arc<Mutex<Vec<StoreResult<QuerySnapshot>>>>;

fn recorder() -> (SnapshotSink, Seen) {
    let seen: Seen = Arc::default();
    let sink_seen = Arc::clone(&seen);
    let sink: SnapshotSink = Arc::new(move |r| sink_seen.lock().unwrap().push(r));
    (sink, seen)
}

fn ids(snapshot: &QuerySnapshot) -> Vec<String> {
    snapshot.iter().map(|d| d.id.clone()).collect()
}

async fn seed_car(store: &MemoryStore, id: &str, owner: &str, plate: &str, active: bool) {
    store
        .set(
            "cars",
            id,
            Fields::new()
                .set("userId", owner)
                .set("licensePlate", plate)
                .set("isActive", active)
                .server_timestamp("createdAt"),
        )
        .await
        .unwrap();
}

// ── CRUD ─────────────────────────────────────────────────────────

#[tokio::test]
async fn add_generates_id_and_get_reads_back() {
    let store = MemoryStore::new();
    let id = store
        .add("cars", Fields::new().set("brand", "Toyota").set("year", 2020))
        .await
        .unwrap();

    let doc = store.get("cars", &id).await.unwrap().unwrap();
    assert_eq!(doc.str_field("brand"), Some("Toyota"));
    assert_eq!(doc.i64_field("year"), Some(2020));
    assert_eq!(doc.collection, "cars");
}

#[tokio::test]
async fn get_missing_is_none() {
    let store = MemoryStore::new();
    assert!(store.get("cars", "nope").await.unwrap().is_none());
}

#[tokio::test]
async fn update_merges_and_requires_existing_document() {
    let store = MemoryStore::new();
    seed_car(&store, "v1", "u1", "ABC-1234", true).await;

    store
        .update("cars", "v1", Fields::new().set("isActive", false).delete("createdAt"))
        .await
        .unwrap();
    let doc = store.get("cars", "v1").await.unwrap().unwrap();
    assert_eq!(doc.bool_field("isActive"), Some(false));
    assert_eq!(doc.str_field("licensePlate"), Some("ABC-1234"));
    assert!(doc.field("createdAt").is_none());

    let err = store.update("cars", "ghost", Fields::new().set("a", 1)).await.unwrap_err();
    assert_eq!(err, StoreError::NotFound("cars/ghost".into()));
}

#[tokio::test]
async fn set_replaces_whole_document() {
    let store = MemoryStore::new();
    seed_car(&store, "v1", "u1", "ABC-1234", true).await;
    store.set("cars", "v1", Fields::new().set("brand", "Fiat")).await.unwrap();

    let doc = store.get("cars", "v1").await.unwrap().unwrap();
    assert!(doc.field("licensePlate").is_none());
    assert_eq!(doc.str_field("brand"), Some("Fiat"));
}

#[tokio::test]
async fn invalid_path_is_rejected() {
    let store = MemoryStore::new();
    let err = store.get("cars", "").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
    let err = store.set("cars", "a/b", Fields::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

// ── Queries ──────────────────────────────────────────────────────

#[tokio::test]
async fn query_filters_by_equality() {
    let store = MemoryStore::new();
    seed_car(&store, "v1", "u1", "ABC-1234", true).await;
    seed_car(&store, "v2", "u1", "XYZ-9876", false).await;
    seed_car(&store, "v3", "u2", "ABC-1234", true).await;

    let q = Query::collection("cars")
        .where_eq("userId", "u1")
        .where_eq("isActive", true);
    let snap = store.query(&q).await.unwrap();
    assert_eq!(ids(&snap), vec!["v1"]);
}

#[tokio::test]
async fn order_by_excludes_documents_missing_the_field() {
    let store = MemoryStore::new();
    for (id, ts) in [("a", Some(3)), ("b", Some(1)), ("c", None), ("d", Some(2))] {
        let fields = Fields::new()
            .set("carId", "v1")
            .set_opt("timestamp", ts.map(|s| Timestamp::new(s, 0)));
        store.set("gps_locations", id, fields).await.unwrap();
    }

    let q = Query::collection("gps_locations")
        .where_eq("carId", "v1")
        .order_by("timestamp", Direction::Descending)
        .limit(2);
    let snap = store.query(&q).await.unwrap();
    assert_eq!(ids(&snap), vec!["a", "d"]);

    let all = store
        .query(&Query::collection("gps_locations").order_by("timestamp", Direction::Ascending))
        .await
        .unwrap();
    assert_eq!(ids(&all), vec!["b", "d", "a"]);
}

#[tokio::test]
async fn integer_and_double_filters_match_numerically() {
    let store = MemoryStore::new();
    store.set("cars", "v1", Fields::new().set("year", 2020)).await.unwrap();
    let snap = store
        .query(&Query::collection("cars").where_eq("year", 2020.0))
        .await
        .unwrap();
    assert_eq!(snap.len(), 1);
}

// ── Atomic increment ─────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_not_lost() {
    let store = MemoryStore::new();
    store
        .set("stolen_cars", "s1", Fields::new().set("sightingsCount", 0))
        .await
        .unwrap();

    let tasks = (0..64).map(|_| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .update("stolen_cars", "s1", Fields::new().increment("sightingsCount", 1))
                .await
        })
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let doc = store.get("stolen_cars", "s1").await.unwrap().unwrap();
    assert_eq!(doc.i64_field("sightingsCount"), Some(64));
}

// ── Timestamps ───────────────────────────────────────────────────

#[tokio::test]
async fn timestamp_round_trip_keeps_microseconds() {
    let store = MemoryStore::new();
    let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
    store.set("cars", "v1", Fields::new().set("createdAt", at)).await.unwrap();

    let read = store.get("cars", "v1").await.unwrap().unwrap().datetime_field("createdAt").unwrap();
    assert_eq!(read, Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap());
}

#[tokio::test]
async fn server_timestamp_is_resolved_on_write() {
    let store = MemoryStore::new();
    let before = Utc::now() - chrono::Duration::seconds(1);
    seed_car(&store, "v1", "u1", "ABC-1234", true).await;
    let created = store.get("cars", "v1").await.unwrap().unwrap().datetime_field("createdAt").unwrap();
    assert!(created >= before);
}

// ── Live listeners ───────────────────────────────────────────────

#[tokio::test]
async fn listener_gets_initial_snapshot_then_changes() {
    let store = MemoryStore::new();
    seed_car(&store, "v1", "u1", "ABC-1234", true).await;

    let (sink, seen) = recorder();
    let _reg = store
        .listen(Query::collection("cars").where_eq("userId", "u1").into(), sink)
        .unwrap();
    seed_car(&store, "v2", "u1", "XYZ-9876", true).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(ids(seen[0].as_ref().unwrap()), vec!["v1"]);
    assert_eq!(ids(seen[1].as_ref().unwrap()), vec!["v1", "v2"]);
}

#[tokio::test]
async fn unrelated_writes_are_not_redelivered() {
    let store = MemoryStore::new();
    let (sink, seen) = recorder();
    let _reg = store
        .listen(Query::collection("cars").where_eq("userId", "u1").into(), sink)
        .unwrap();

    seed_car(&store, "v9", "someone-else", "AAA-0000", true).await;
    store.set("users", "u1", Fields::new().set("name", "Ana")).await.unwrap();

    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn document_listener_sees_creation_and_updates() {
    let store = MemoryStore::new();
    let (sink, seen) = recorder();
    let _reg = store.listen(ListenTarget::document("cars", "v1"), sink).unwrap();

    seed_car(&store, "v1", "u1", "ABC-1234", true).await;
    store
        .update("cars", "v1", Fields::new().set("ignitionState", "on"))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].as_ref().unwrap().is_empty());
    let last = seen[2].as_ref().unwrap().first().unwrap();
    assert_eq!(last.str_field("ignitionState"), Some("on"));
}

#[tokio::test]
async fn removed_listener_receives_nothing() {
    let store = MemoryStore::new();
    let (sink, seen) = recorder();
    let reg = store.listen(Query::collection("cars").into(), sink).unwrap();
    assert_eq!(store.listener_count(), 1);

    reg.remove();
    assert_eq!(store.listener_count(), 0);
    seed_car(&store, "v1", "u1", "ABC-1234", true).await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn dropping_registration_detaches() {
    let store = MemoryStore::new();
    let (sink, _seen) = recorder();
    drop(store.listen(Query::collection("cars").into(), sink).unwrap());
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn revoke_pushes_permission_denied_once_and_detaches() {
    let store = MemoryStore::new();
    let (sink, seen) = recorder();
    let _reg = store.listen(Query::collection("cars").into(), sink).unwrap();

    store.revoke_listeners();
    seed_car(&store, "v1", "u1", "ABC-1234", true).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[1].as_ref().unwrap_err().is_permission_denied());
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn offline_store_fails_requests_and_new_listeners() {
    let store = MemoryStore::new();
    store.set_offline(true);

    let err = store.get("cars", "v1").await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    let (sink, seen) = recorder();
    assert!(store.listen(Query::collection("cars").into(), sink).is_err());
    assert!(seen.lock().unwrap().is_empty());

    store.set_offline(false);
    assert!(store.get("cars", "v1").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_never_rewind_a_listener() {
    let store = MemoryStore::new();
    let (sink, seen) = recorder();
    let _reg = store
        .listen(Query::collection("gps_locations").into(), sink)
        .unwrap();

    let tasks = (0..32).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .set("gps_locations", &format!("p{i:02}"), Fields::new().set("n", i))
                .await
        })
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let seen = seen.lock().unwrap();
    let sizes: Vec<usize> = seen.iter().map(|s| s.as_ref().unwrap().len()).collect();
    assert!(sizes.windows(2).all(|w| w[0] < w[1]), "{sizes:?}");
    assert_eq!(sizes.last(), Some(&32));
}
