use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::null_as_default;

/// One project upload batch. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Count-based: `records.len() + 1` at insert time.
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<String>,
    pub created_at: DateTime<Utc>,
}
