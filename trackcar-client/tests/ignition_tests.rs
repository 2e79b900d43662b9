mod support;

use pretty_assertions::assert_eq;
use support::{recorder, signed_in};
use trackcar_client::ServiceError;
use trackcar_store::{DocumentStore, Query, ReadFields};
use trackcar_types::{CommandStatus, IgnitionAction, IgnitionState, IgnitionStatus, RelayCommand};

#[tokio::test]
async fn start_from_unknown_queues_unlock_and_stores_on() {
    let h = signed_in().await;
    let id = h.create_vehicle("ABC-1234").await;

    let outcome = h.session.ignition().send(&id, IgnitionAction::Start).await.unwrap();
    assert_eq!(outcome.new_state, IgnitionState::On);
    assert_eq!(outcome.message, "ignition turned on");

    let command = h
        .store
        .get("car_commands", &outcome.command_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(command.str_field("carId"), Some(id.as_str()));
    assert_eq!(command.str_field("command"), Some("unlock"));
    assert_eq!(command.str_field("requestedState"), Some("on"));
    assert_eq!(command.str_field("status"), Some("pending"));
    assert!(command.datetime_field("timestamp").is_some());

    let vehicle = h.session.vehicles().get(&id).await.unwrap();
    assert_eq!(vehicle.ignition_state, IgnitionState::On);
    assert!(vehicle.last_ignition_update.is_some());
}

#[tokio::test]
async fn toggle_flips_the_commanded_state() {
    let h = signed_in().await;
    let id = h.create_vehicle("ABC-1234").await;
    let ignition = h.session.ignition();

    let states: Vec<IgnitionState> = {
        let mut states = Vec::new();
        for action in [
            IgnitionAction::Toggle,
            IgnitionAction::Toggle,
            IgnitionAction::Stop,
            IgnitionAction::Toggle,
        ] {
            states.push(ignition.send(&id, action).await.unwrap().new_state);
        }
        states
    };
    assert_eq!(
        states,
        vec![
            IgnitionState::On,
            IgnitionState::Off,
            IgnitionState::Off,
            IgnitionState::On
        ]
    );
    assert_eq!(h.store.document_count("car_commands"), 4);
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
    let h = signed_in().await;
    let id = h.create_vehicle("ABC-1234").await;
    let ignition = h.session.ignition();
    for action in [IgnitionAction::Start, IgnitionAction::Stop, IgnitionAction::Start] {
        ignition.send(&id, action).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let history = ignition.history(&id, Some(2)).await.unwrap();
    let commands: Vec<RelayCommand> = history.iter().map(|c| c.command).collect();
    assert_eq!(commands, vec![RelayCommand::Unlock, RelayCommand::Lock]);
    assert!(history.iter().all(|c| c.status == CommandStatus::Pending));
    assert_eq!(ignition.history(&id, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn commands_for_foreign_vehicles_are_refused() {
    let h = signed_in().await;
    let id = h.create_vehicle("ABC-1234").await;

    h.register("other@example.com", "Joao Souza").await;
    let err = h.session.ignition().send(&id, IgnitionAction::Start).await.unwrap_err();
    assert_eq!(err, ServiceError::NotFound("vehicle".into()));

    let pending = h
        .store
        .query(&Query::collection("car_commands"))
        .await
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn watch_follows_the_stored_state() {
    let h = signed_in().await;
    let id = h.create_vehicle("ABC-1234").await;

    let (callback, seen) = recorder();
    let _handle = h.session.ignition().watch(&id, callback);
    h.session.ignition().send(&id, IgnitionAction::Start).await.unwrap();

    let seen = seen.lock().unwrap();
    let states: Vec<IgnitionState> = seen.iter().map(|s| s.state).collect();
    assert_eq!(states, vec![IgnitionState::Unknown, IgnitionState::On]);
    assert!(seen[1].last_update.is_some());
}

#[tokio::test]
async fn watch_reports_unknown_for_missing_or_foreign_vehicles() {
    let h = signed_in().await;
    let id = h.create_vehicle("ABC-1234").await;
    h.session.ignition().send(&id, IgnitionAction::Start).await.unwrap();

    let (callback, seen) = recorder();
    let _missing = h.session.ignition().watch("no-such-car", callback);
    assert_eq!(*seen.lock().unwrap(), vec![IgnitionStatus::unknown()]);

    h.register("other@example.com", "Joao Souza").await;
    let (callback, seen) = recorder();
    let _foreign = h.session.ignition().watch(&id, callback);
    assert_eq!(*seen.lock().unwrap(), vec![IgnitionStatus::unknown()]);
}

#[tokio::test]
async fn signal_loss_reads_as_unknown() {
    let h = signed_in().await;
    let id = h.create_vehicle("ABC-1234").await;
    h.session.ignition().send(&id, IgnitionAction::Start).await.unwrap();

    let (callback, seen) = recorder();
    let handle = h.session.ignition().watch(&id, callback);
    h.store.fail_listeners(trackcar_store::StoreError::Unavailable("stream closed".into()));

    let states: Vec<IgnitionState> = seen.lock().unwrap().iter().map(|s| s.state).collect();
    assert_eq!(states, vec![IgnitionState::On, IgnitionState::Unknown]);
    assert!(!handle.is_active());
}
