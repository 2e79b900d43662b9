//! Remote ignition control.
//!
//! A request writes a `pending` command to the outbox the in-vehicle module
//! polls, then optimistically stores the target state on the vehicle. No
//! acknowledgement flows back, so the stored state is what was commanded.

use super::ServiceContext;
use super::collections::{CAR_COMMANDS, CARS};
use super::vehicles::VehicleService;
use crate::error::{ServiceResult, StoreResultExt};
use crate::guard::SubscriptionHandle;
use tracing::info;
use trackcar_store::{Direction, Document, Fields, ListenTarget, Query, ReadFields};
use trackcar_types::{
    CommandStatus, IgnitionAction, IgnitionCommand, IgnitionOutcome, IgnitionState, IgnitionStatus,
    RelayCommand,
};

#[derive(Clone)]
pub struct IgnitionService {
    ctx: ServiceContext,
}

impl IgnitionService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Sends `action` to the vehicle.
    pub async fn send(&self, vehicle_id: &str, action: IgnitionAction) -> ServiceResult<IgnitionOutcome> {
        let principal = self.ctx.identity.require()?;
        let vehicle = VehicleService::new(self.ctx.clone()).get(vehicle_id).await?;

        let target = vehicle.ignition_state.apply(action);
        let command = RelayCommand::for_target(target);

        let command_id = self
            .ctx
            .store
            .add(
                CAR_COMMANDS,
                Fields::new()
                    .set("carId", vehicle_id)
                    .set("userId", principal.uid.as_str())
                    .set("command", command.as_str())
                    .set("requestedState", target.as_str())
                    .set("status", CommandStatus::Pending.as_str())
                    .server_timestamp("timestamp"),
            )
            .await
            .or_upstream("failed to send ignition command")?;

        self.ctx
            .store
            .update(
                CARS,
                vehicle_id,
                Fields::new()
                    .set("ignitionState", target.as_str())
                    .server_timestamp("lastIgnitionUpdate")
                    .server_timestamp("updatedAt"),
            )
            .await
            .or_upstream("failed to update ignition state")?;

        info!(
            vehicle = %vehicle_id,
            from = vehicle.ignition_state.as_str(),
            to = target.as_str(),
            command = command.as_str(),
            "ignition command queued"
        );
        Ok(IgnitionOutcome::new(target, command_id))
    }

    /// Most recent commands for a vehicle, newest first.
    pub async fn history(&self, vehicle_id: &str, limit: Option<usize>) -> ServiceResult<Vec<IgnitionCommand>> {
        let principal = self.ctx.identity.require()?;
        let query = Query::collection(CAR_COMMANDS)
            .where_eq("carId", vehicle_id)
            .where_eq("userId", principal.uid.as_str())
            .order_by("timestamp", Direction::Descending)
            .limit(limit.unwrap_or(self.ctx.config.ignition_history_limit));
        let snapshot = self
            .ctx
            .store
            .query(&query)
            .await
            .or_upstream("failed to load ignition history")?;
        Ok(snapshot.iter().filter_map(decode_command).collect())
    }

    /// Live ignition state. Delivers `unknown` when the vehicle is missing,
    /// not owned, or the signal is lost.
    pub fn watch<F>(&self, vehicle_id: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(IgnitionStatus) + Send + Sync + 'static,
    {
        let vehicle_id = vehicle_id.to_string();
        let identity = self.ctx.identity.clone();
        self.ctx.live.watch(
            "ignition",
            IgnitionStatus::unknown(),
            move |_| ListenTarget::document(CARS, vehicle_id),
            move |snapshot| {
                let owner = identity.current().map(|p| p.uid);
                snapshot
                    .first()
                    .filter(|doc| doc.str_field("userId") == owner.as_deref())
                    .map(|doc| IgnitionStatus {
                        state: IgnitionState::parse(doc.str_field("ignitionState").unwrap_or_default()),
                        last_update: doc.datetime_field("lastIgnitionUpdate"),
                    })
                    .unwrap_or_default()
            },
            callback,
        )
    }
}

fn decode_command(doc: &Document) -> Option<IgnitionCommand> {
    let command = RelayCommand::parse(doc.str_field("command")?)?;
    Some(IgnitionCommand {
        id: doc.id.clone(),
        vehicle_id: doc.string_field("carId"),
        owner_id: doc.opt_string("userId"),
        command,
        requested_state: doc
            .str_field("requestedState")
            .map(IgnitionState::parse)
            .unwrap_or_else(|| command.target_state()),
        timestamp: doc.datetime_field("timestamp")?,
        status: CommandStatus::parse(doc.str_field("status").unwrap_or_default()),
    })
}
