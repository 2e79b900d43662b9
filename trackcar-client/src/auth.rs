//! Authentication provider seam.

use crate::error::AuthFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trackcar_types::Principal;

/// Tokens issued by the provider, persisted to restore a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub uid: String,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
}

impl AuthTokens {
    pub fn principal(&self) -> Principal {
        Principal::new(self.uid.clone(), self.email.clone())
    }
}

/// Remote identity provider. Issues principals; never touches the document
/// store.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthTokens, AuthFailure>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthFailure>;

    /// Checks that persisted tokens are still valid and adopts them.
    async fn restore(&self, saved: &AuthTokens) -> Result<AuthTokens, AuthFailure>;

    async fn sign_out(&self) -> Result<(), AuthFailure>;

    /// Changes the signed-in account's password.
    async fn update_password(&self, new_password: &str) -> Result<(), AuthFailure>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthFailure>;
}
