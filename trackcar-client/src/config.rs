//! Client configuration.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the identity REST API, without trailing slash.
    pub auth_api_base_url: String,

    /// API key appended to every auth request as `?key=`.
    pub auth_api_key: String,

    /// Base URL of the photo server. Relative URLs it returns are resolved
    /// against this.
    pub upload_base_url: String,

    /// Timeout for every HTTP request (seconds).
    pub request_timeout_secs: u64,

    /// Default number of GPS samples returned by history reads.
    pub location_history_limit: usize,

    /// Default number of ignition commands returned by history reads.
    pub ignition_history_limit: usize,

    /// Distance between the two latest samples above which a vehicle is
    /// reported as moving.
    pub moving_threshold_km: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_api_base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            auth_api_key: String::new(),
            upload_base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 30,
            location_history_limit: 50,
            ignition_history_limit: 20,
            moving_threshold_km: trackcar_types::MOVING_THRESHOLD_KM,
        }
    }
}
