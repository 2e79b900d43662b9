use serde::{Deserialize, Serialize};

/// The authenticated identity making requests.
///
/// `uid` is stable for the lifetime of the account and is the owner
/// reference written into every owned document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
        }
    }
}
