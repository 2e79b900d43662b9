//! Service layer for TrackCar.
//!
//! Provides:
//! - Identity cell holding the signed-in principal
//! - Guarded live subscriptions and a process-wide registry to cancel them
//! - Vehicle, location, ignition, stolen-vehicle, notification and profile services
//! - REST auth provider and photo upload client
//! - Session facade tying auth state to subscription lifecycle

pub mod auth;
pub mod auth_client;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod live;
pub mod logging;
pub mod photo_client;
pub mod position;
pub mod registry;
pub mod services;
pub mod session;

pub use auth::{AuthProvider, AuthTokens};
pub use config::ClientConfig;
pub use error::{AuthFailure, ListenFailure, ServiceError, ServiceResult};
pub use guard::SubscriptionHandle;
pub use identity::IdentityCell;
pub use registry::SubscriptionRegistry;
pub use session::Session;
