//! User profiles, keyed directly by the principal's uid.

use super::ServiceContext;
use super::collections::USERS;
use crate::error::{ServiceError, ServiceResult, StoreResultExt};
use crate::guard::SubscriptionHandle;
use chrono::Utc;
use tracing::{info, warn};
use trackcar_store::{Document, Fields, ListenTarget, ReadFields, StoreError};
use trackcar_types::{
    NewProfile, Principal, ProfileUpdate, UserProfile, format_phone_number, validate_profile,
};

#[derive(Clone)]
pub struct ProfileService {
    ctx: ServiceContext,
}

impl ProfileService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Writes the profile for a freshly created account. The e-mail comes
    /// from the principal and is never edited afterwards.
    ///
    /// `principal` must be the one signed in; anything else is
    /// `Unauthenticated` and nothing is written.
    pub async fn create(&self, principal: &Principal, profile: &NewProfile) -> ServiceResult<()> {
        let current = self.ctx.identity.require()?;
        if current.uid != principal.uid {
            warn!(uid = %principal.uid, "refusing to write another account's profile");
            return Err(ServiceError::Unauthenticated);
        }
        let profile = check_profile(&ProfileUpdate::from(profile.clone()))?;

        let fields = Fields::new()
            .set("uid", principal.uid.as_str())
            .set_opt("name", profile.name.as_deref().map(str::trim))
            .set("email", principal.email.clone().unwrap_or_default())
            .set_opt("phone", profile.phone)
            .set_opt("address", profile.address.as_deref().map(str::trim))
            .server_timestamp("createdAt")
            .server_timestamp("updatedAt");

        self.ctx
            .store
            .set(USERS, &principal.uid, fields)
            .await
            .or_upstream("failed to create profile")?;
        info!(uid = %principal.uid, "profile created");
        Ok(())
    }

    /// The signed-in user's profile.
    pub async fn get(&self) -> ServiceResult<UserProfile> {
        let principal = self.ctx.identity.require()?;
        self.get_by_uid(&principal.uid)
            .await?
            .ok_or_else(|| ServiceError::not_found("profile"))
    }

    pub(crate) async fn get_by_uid(&self, uid: &str) -> ServiceResult<Option<UserProfile>> {
        Ok(self
            .ctx
            .store
            .get(USERS, uid)
            .await
            .or_upstream("failed to load profile")?
            .map(|doc| decode_profile(&doc)))
    }

    /// Applies the provided fields after validating them.
    pub async fn update(&self, update: &ProfileUpdate) -> ServiceResult<()> {
        let principal = self.ctx.identity.require()?;
        let update = check_profile(update)?;

        let fields = Fields::new()
            .set_opt("name", update.name.as_deref().map(str::trim))
            .set_opt("phone", update.phone)
            .set_opt("address", update.address.as_deref().map(str::trim))
            .server_timestamp("updatedAt");

        self.ctx
            .store
            .update(USERS, &principal.uid, fields)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(_) => ServiceError::not_found("profile"),
                other => ServiceError::upstream("failed to update profile", other),
            })
    }

    /// Live profile of the signed-in user; `None` while it does not exist.
    pub fn watch<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(Option<UserProfile>) + Send + Sync + 'static,
    {
        self.ctx.live.watch(
            "profile",
            None,
            |principal| ListenTarget::document(USERS, principal.uid.as_str()),
            |snapshot| snapshot.first().map(decode_profile),
            callback,
        )
    }

    /// Uploads a new profile photo and points the profile at it. The old
    /// photo is removed from the file server on a best-effort basis.
    pub async fn upload_photo(&self, jpeg: Vec<u8>) -> ServiceResult<String> {
        let current = self.get().await?;
        let url = self.ctx.photos.upload_jpeg("profile", jpeg).await?;

        self.ctx
            .store
            .update(
                USERS,
                &current.uid,
                Fields::new()
                    .set("photoURL", url.as_str())
                    .server_timestamp("updatedAt"),
            )
            .await
            .or_upstream("failed to update profile photo")?;

        if let Some(old) = current.photo_url.filter(|old| *old != url) {
            self.delete_photo_quietly(&old).await;
        }
        Ok(url)
    }

    pub async fn remove_photo(&self) -> ServiceResult<()> {
        let current = self.get().await?;
        let Some(old) = current.photo_url else {
            return Ok(());
        };
        self.ctx
            .store
            .update(
                USERS,
                &current.uid,
                Fields::new().delete("photoURL").server_timestamp("updatedAt"),
            )
            .await
            .or_upstream("failed to remove profile photo")?;
        self.delete_photo_quietly(&old).await;
        Ok(())
    }

    async fn delete_photo_quietly(&self, url: &str) {
        if let Err(err) = self.ctx.photos.delete(url).await {
            warn!(url = %url, error = %err, "could not remove profile photo");
        }
    }
}

/// Masks the phone, then validates whichever fields are present. Raw
/// digits are accepted for the phone.
pub(crate) fn check_profile(update: &ProfileUpdate) -> ServiceResult<ProfileUpdate> {
    let update = ProfileUpdate {
        phone: update.phone.as_deref().map(format_phone_number),
        ..update.clone()
    };
    if let Some(message) = validate_profile(&update).first_message() {
        return Err(ServiceError::invalid(message));
    }
    Ok(update)
}

fn decode_profile(doc: &Document) -> UserProfile {
    UserProfile {
        uid: doc.opt_string("uid").unwrap_or_else(|| doc.id.clone()),
        name: doc.string_field("name"),
        email: doc.string_field("email"),
        phone: doc.string_field("phone"),
        address: doc.string_field("address"),
        photo_url: doc.opt_string("photoURL"),
        created_at: doc.datetime_field("createdAt").unwrap_or_else(Utc::now),
        updated_at: doc.datetime_field("updatedAt"),
    }
}
