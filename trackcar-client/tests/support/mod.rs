//! Shared harness for service-level tests: an in-memory store, a scripted
//! auth provider and a session wired to both.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trackcar_client::{AuthFailure, AuthProvider, AuthTokens, ClientConfig, Session};
use trackcar_store::MemoryStore;
use trackcar_types::{NewProfile, VehicleForm};

pub const PASSWORD: &str = "secret1";

struct Account {
    uid: String,
    password: String,
}

/// Auth provider backed by a map of accounts.
#[derive(Default)]
pub struct MockAuth {
    accounts: Mutex<HashMap<String, Account>>,
    next_uid: AtomicUsize,
    pub sign_out_fails: AtomicBool,
    pub sign_out_calls: AtomicUsize,
    pub password_updates: Mutex<Vec<String>>,
    pub reset_requests: Mutex<Vec<String>>,
}

impl MockAuth {
    fn tokens(uid: &str, email: &str) -> AuthTokens {
        AuthTokens {
            uid: uid.to_string(),
            email: Some(email.to_string()),
            id_token: format!("id-{uid}"),
            refresh_token: format!("refresh-{uid}"),
        }
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthTokens, AuthFailure> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(AuthFailure::EmailInUse);
        }
        let uid = format!("user-{}", self.next_uid.fetch_add(1, Ordering::SeqCst) + 1);
        accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        Ok(Self::tokens(&uid, email))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthFailure> {
        let accounts = self.accounts.lock().unwrap();
        let account = accounts.get(email).ok_or(AuthFailure::UserNotFound)?;
        if account.password != password {
            return Err(AuthFailure::WrongPassword);
        }
        Ok(Self::tokens(&account.uid, email))
    }

    async fn restore(&self, saved: &AuthTokens) -> Result<AuthTokens, AuthFailure> {
        let accounts = self.accounts.lock().unwrap();
        if accounts.values().any(|a| a.uid == saved.uid) {
            Ok(saved.clone())
        } else {
            Err(AuthFailure::RequiresRecentLogin)
        }
    }

    async fn sign_out(&self) -> Result<(), AuthFailure> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.sign_out_fails.load(Ordering::SeqCst) {
            Err(AuthFailure::Network)
        } else {
            Ok(())
        }
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthFailure> {
        self.password_updates.lock().unwrap().push(new_password.to_string());
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthFailure> {
        self.reset_requests.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub auth: Arc<MockAuth>,
    pub session: Session,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let store = MemoryStore::new();
        let auth = Arc::new(MockAuth::default());
        let session = Session::new(config, Arc::new(store.clone()), auth.clone()).unwrap();
        Self {
            store,
            auth,
            session,
        }
    }

    /// Registers `email` with a valid profile named `name` and leaves it
    /// signed in. Returns the uid.
    pub async fn register(&self, email: &str, name: &str) -> String {
        self.session
            .register(email, PASSWORD, &profile(name))
            .await
            .unwrap()
            .uid
    }

    pub async fn sign_in(&self, email: &str) -> String {
        self.session.sign_in(email, PASSWORD).await.unwrap().uid
    }

    pub async fn create_vehicle(&self, plate: &str) -> String {
        self.session
            .vehicles()
            .create(&vehicle_form(plate), None)
            .await
            .unwrap()
    }
}

pub async fn signed_in() -> Harness {
    let h = Harness::new();
    h.register("owner@example.com", "Maria Silva").await;
    h
}

pub fn profile(name: &str) -> NewProfile {
    NewProfile {
        name: name.to_string(),
        phone: "11987654321".to_string(),
        address: "Rua das Flores, 123".to_string(),
    }
}

pub fn vehicle_form(plate: &str) -> VehicleForm {
    VehicleForm {
        brand: "Toyota".into(),
        model: "Corolla".into(),
        year: "2020".into(),
        license_plate: plate.into(),
        color: "Preto".into(),
        color_hex: "#000000".into(),
        ..Default::default()
    }
}

/// Callback that records every delivery.
pub fn recorder<T: Send + 'static>() -> (impl Fn(T) + Send + Sync + 'static, Arc<Mutex<Vec<T>>>) {
    let seen: Arc<Mutex<Vec<T>>> = Arc::default();
    let sink = Arc::clone(&seen);
    (move |value| sink.lock().unwrap().push(value), seen)
}
