//! REST client for the identity toolkit API.
//!
//! Every call is `POST {base}/accounts:{method}?key={api_key}` with a JSON
//! body. Failures come back as `{"error": {"message": "CODE : detail"}}`
//! and are mapped through [`AuthFailure::from_code`].

use crate::auth::{AuthProvider, AuthTokens};
use crate::config::ClientConfig;
use crate::error::AuthFailure;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

pub struct RestAuthProvider {
    client: Client,
    config: ClientConfig,
    tokens: Arc<RwLock<Option<AuthTokens>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl From<SignInResponse> for AuthTokens {
    fn from(r: SignInResponse) -> Self {
        Self {
            uid: r.local_id,
            email: r.email,
            id_token: r.id_token,
            refresh_token: r.refresh_token,
        }
    }
}

impl RestAuthProvider {
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            tokens: Arc::new(RwLock::new(None)),
        })
    }

    /// Tokens of the signed-in account, for persistence.
    pub async fn current_tokens(&self) -> Option<AuthTokens> {
        self.tokens.read().await.clone()
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}?key={}",
            self.config.auth_api_base_url, method, self.config.auth_api_key
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, AuthFailure> {
        let resp = self
            .client
            .post(self.endpoint(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(method, error = %e, "auth request failed");
                AuthFailure::Network
            })?;

        let status = resp.status();
        if !status.is_success() {
            let code = resp
                .json::<ErrorEnvelope>()
                .await
                .map(|env| env.error.message)
                .unwrap_or_default();
            debug!(method, %status, code = %code, "auth request rejected");
            return Err(AuthFailure::from_code(&code));
        }

        resp.json().await.map_err(|e| {
            error!(method, error = %e, "unexpected auth response");
            AuthFailure::Unknown
        })
    }

    async fn adopt(&self, tokens: AuthTokens) -> AuthTokens {
        *self.tokens.write().await = Some(tokens.clone());
        tokens
    }
}

#[async_trait]
impl AuthProvider for RestAuthProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthTokens, AuthFailure> {
        let resp: SignInResponse = self
            .call(
                "signUp",
                serde_json::json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(self.adopt(resp.into()).await)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthFailure> {
        let resp: SignInResponse = self
            .call(
                "signInWithPassword",
                serde_json::json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(self.adopt(resp.into()).await)
    }

    async fn restore(&self, saved: &AuthTokens) -> Result<AuthTokens, AuthFailure> {
        let resp: LookupResponse = self
            .call("lookup", serde_json::json!({ "idToken": saved.id_token }))
            .await?;
        let user = resp
            .users
            .into_iter()
            .next()
            .ok_or(AuthFailure::RequiresRecentLogin)?;
        let tokens = AuthTokens {
            uid: user.local_id,
            email: user.email,
            ..saved.clone()
        };
        Ok(self.adopt(tokens).await)
    }

    async fn sign_out(&self) -> Result<(), AuthFailure> {
        self.tokens.write().await.take();
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthFailure> {
        let id_token = self
            .tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.id_token.clone())
            .ok_or(AuthFailure::RequiresRecentLogin)?;

        let resp: UpdateResponse = self
            .call(
                "update",
                serde_json::json!({
                    "idToken": id_token,
                    "password": new_password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        // The provider rotates tokens on password change.
        if let Some(tokens) = self.tokens.write().await.as_mut() {
            if let Some(id_token) = resp.id_token {
                tokens.id_token = id_token;
            }
            if let Some(refresh_token) = resp.refresh_token {
                tokens.refresh_token = refresh_token;
            }
        }
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthFailure> {
        let _: serde_json::Value = self
            .call(
                "sendOobCode",
                serde_json::json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        Ok(())
    }
}
