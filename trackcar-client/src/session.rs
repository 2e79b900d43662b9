//! Session facade: auth state plus the services bound to it.
//!
//! The session is the only writer of the identity cell. Sign-out cancels
//! every registered subscription before the provider is called, so no
//! callback fires for the departing principal once `sign_out` resolves.

use crate::auth::{AuthProvider, AuthTokens};
use crate::config::ClientConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::IdentityCell;
use crate::live::LiveQueries;
use crate::photo_client::PhotoClient;
use crate::registry::SubscriptionRegistry;
use crate::services::profile::check_profile;
use crate::services::{
    IgnitionService, LocationService, NotificationService, ProfileService, ServiceContext,
    StolenVehicleService, VehicleService,
};
use std::sync::Arc;
use tracing::{info, warn};
use trackcar_store::DocumentStore;
use trackcar_types::validation::{check_password, check_password_change, is_valid_email};
use trackcar_types::{NewProfile, Principal, ProfileUpdate};

pub struct Session {
    auth: Arc<dyn AuthProvider>,
    identity: IdentityCell,
    registry: SubscriptionRegistry,
    ctx: ServiceContext,
}

impl Session {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> ServiceResult<Self> {
        let identity = IdentityCell::new();
        let registry = SubscriptionRegistry::new();
        let live = LiveQueries::new(Arc::clone(&store), identity.clone(), registry.clone());
        let photos = Arc::new(PhotoClient::new(&config)?);
        let ctx = ServiceContext::new(store, identity.clone(), live, photos, Arc::new(config));
        Ok(Self {
            auth,
            identity,
            registry,
            ctx,
        })
    }

    pub fn identity(&self) -> &IdentityCell {
        &self.identity
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn principal(&self) -> Option<Principal> {
        self.identity.current()
    }

    pub fn live(&self) -> &LiveQueries {
        &self.ctx.live
    }

    pub fn vehicles(&self) -> VehicleService {
        VehicleService::new(self.ctx.clone())
    }

    pub fn location(&self) -> LocationService {
        LocationService::new(self.ctx.clone())
    }

    pub fn ignition(&self) -> IgnitionService {
        IgnitionService::new(self.ctx.clone())
    }

    pub fn stolen(&self) -> StolenVehicleService {
        StolenVehicleService::new(self.ctx.clone())
    }

    pub fn notifications(&self) -> NotificationService {
        NotificationService::new(self.ctx.clone())
    }

    pub fn profile(&self) -> ProfileService {
        ProfileService::new(self.ctx.clone())
    }

    /// Creates an account, signs it in and writes its profile.
    ///
    /// Everything is validated before the provider is called. If the
    /// profile write fails the account stays signed in and the error is
    /// returned; the profile can be written again with `profile().update`.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        profile: &NewProfile,
    ) -> ServiceResult<AuthTokens> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(ServiceError::invalid("invalid e-mail address"));
        }
        check_password(password).map_err(ServiceError::invalid)?;
        check_profile(&ProfileUpdate::from(profile.clone()))?;

        let tokens = self.auth.create_account(email, password).await?;
        let principal = self.adopt(&tokens);
        self.profile().create(&principal, profile).await?;
        info!(uid = %principal.uid, "account registered");
        Ok(tokens)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<AuthTokens> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::invalid("e-mail and password are required"));
        }
        let tokens = self.auth.sign_in(email, password).await?;
        let principal = self.adopt(&tokens);
        info!(uid = %principal.uid, "signed in");
        Ok(tokens)
    }

    /// Resumes a persisted session after the provider confirms the tokens.
    pub async fn restore(&self, saved: &AuthTokens) -> ServiceResult<AuthTokens> {
        let tokens = self.auth.restore(saved).await?;
        let principal = self.adopt(&tokens);
        info!(uid = %principal.uid, "session restored");
        Ok(tokens)
    }

    /// Cancels every subscription, signs out of the provider and clears the
    /// identity. The identity is cleared even when the provider fails; its
    /// error is still returned.
    pub async fn sign_out(&self) -> ServiceResult<()> {
        let cancelled = self.registry.cancel_all();
        let result = self.auth.sign_out().await;
        self.identity.set(None);
        match result {
            Ok(()) => {
                info!(cancelled, "signed out");
                Ok(())
            }
            Err(err) => {
                warn!(cancelled, error = %err, "provider sign-out failed, local session cleared");
                Err(err.into())
            }
        }
    }

    pub async fn update_password(&self, new_password: &str, confirmation: &str) -> ServiceResult<()> {
        self.identity.require()?;
        check_password_change(new_password, confirmation).map_err(ServiceError::invalid)?;
        self.auth.update_password(new_password).await?;
        info!("password updated");
        Ok(())
    }

    pub async fn send_password_reset(&self, email: &str) -> ServiceResult<()> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(ServiceError::invalid("invalid e-mail address"));
        }
        self.auth.send_password_reset(email).await?;
        Ok(())
    }

    /// Publishes a new principal. Subscriptions opened for a different
    /// principal are cancelled first.
    fn adopt(&self, tokens: &AuthTokens) -> Principal {
        let principal = tokens.principal();
        if self
            .identity
            .current()
            .is_some_and(|current| current.uid != principal.uid)
        {
            self.registry.cancel_all();
        }
        self.identity.set(Some(principal.clone()));
        principal
    }
}
