use serde::{Deserialize, Serialize};

use crate::models::null_as_default;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub experience: String,
    #[serde(deserialize_with = "null_as_default")]
    pub company: String,
    /// Stored resume filename, empty when none was attached.
    #[serde(deserialize_with = "null_as_default")]
    pub resume: String,
}
