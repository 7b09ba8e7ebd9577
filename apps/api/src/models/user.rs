use serde::{Deserialize, Serialize};

use crate::models::null_as_default;

/// Stored under the username in `users.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    /// PHC-format salted hash. Kept under the on-disk key `password`.
    #[serde(rename = "password")]
    pub password_hash: String,
}
