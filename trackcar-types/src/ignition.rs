//! Ignition state machine and relay commands.
//!
//! States are `unknown`, `on` and `off`. Transitions are driven only by an
//! explicit user action; `unknown` is never a target, it is what a vehicle
//! starts in and what a reader shows when the live signal is lost.
//!
//! The stored state is the *commanded* state. No acknowledgement from the
//! device is tracked, so `on` means "start was requested", not "the relay
//! confirmed".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ignition state as stored on the vehicle record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnitionState {
    On,
    Off,
    #[default]
    Unknown,
}

impl IgnitionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse: anything unrecognised reads as `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "on" => Self::On,
            "off" => Self::Off,
            _ => Self::Unknown,
        }
    }

    /// Target state for `action` taken from this state. Always `On` or `Off`.
    pub fn apply(self, action: IgnitionAction) -> IgnitionState {
        match action {
            IgnitionAction::Start => Self::On,
            IgnitionAction::Stop => Self::Off,
            IgnitionAction::Toggle => match self {
                Self::On => Self::Off,
                Self::Off | Self::Unknown => Self::On,
            },
        }
    }
}

/// A user-requested ignition action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnitionAction {
    Start,
    Stop,
    Toggle,
}

/// Relay instruction understood by the in-vehicle module.
///
/// `unlock` energises the ignition line, `lock` cuts it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayCommand {
    Unlock,
    Lock,
}

impl RelayCommand {
    pub fn for_target(target: IgnitionState) -> Self {
        match target {
            IgnitionState::On => Self::Unlock,
            IgnitionState::Off | IgnitionState::Unknown => Self::Lock,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unlock => "unlock",
            Self::Lock => "lock",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unlock" => Some(Self::Unlock),
            "lock" => Some(Self::Lock),
            _ => None,
        }
    }

    pub fn target_state(self) -> IgnitionState {
        match self {
            Self::Unlock => IgnitionState::On,
            Self::Lock => IgnitionState::Off,
        }
    }
}

/// Delivery status of an outbox command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    #[default]
    Pending,
    Delivered,
    Failed,
}

impl CommandStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "delivered" => Self::Delivered,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A command record in the write-only outbox.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnitionCommand {
    pub id: String,
    pub vehicle_id: String,
    pub owner_id: Option<String>,
    pub command: RelayCommand,
    pub requested_state: IgnitionState,
    pub timestamp: DateTime<Utc>,
    pub status: CommandStatus,
}

/// Live ignition reading delivered to subscribers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnitionStatus {
    pub state: IgnitionState,
    pub last_update: Option<DateTime<Utc>>,
}

impl IgnitionStatus {
    /// The "signal lost" reading.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Result of a successful ignition request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnitionOutcome {
    pub new_state: IgnitionState,
    pub command_id: String,
    pub message: String,
}

impl IgnitionOutcome {
    pub fn new(new_state: IgnitionState, command_id: String) -> Self {
        let message = match new_state {
            IgnitionState::On => "ignition turned on",
            _ => "ignition turned off",
        };
        Self {
            new_state,
            command_id,
            message: message.to_string(),
        }
    }
}
