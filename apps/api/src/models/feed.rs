use serde::{Deserialize, Serialize};

use crate::models::null_as_default;

/// An idea shared to a user's feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    #[serde(default, deserialize_with = "null_as_default")]
    pub idea: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sector: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<String>,
}
