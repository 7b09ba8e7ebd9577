use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::null_as_default;
use crate::store::{Identified, RecordId};

pub const DEFAULT_LANGUAGE: &str = "English";

/// A user-submitted project concept plus its generated recommendations.
/// Fields older files may lack, or hold as `null`, default explicitly here rather
/// than at call sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaRecord {
    #[serde(default = "default_id", deserialize_with = "id_or_default")]
    pub id: RecordId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub idea: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sector: String,
    #[serde(default = "default_language", deserialize_with = "language_or_default")]
    pub language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl IdeaRecord {
    pub fn new(
        id: u64,
        user: &str,
        idea: &str,
        recommendations: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::Number(id),
            user: user.to_string(),
            idea: idea.to_string(),
            sector: String::new(),
            language: default_language(),
            recommendations,
            created_at: Some(created_at),
            updated_at: None,
        }
    }

    /// The collaboration step: attach sector/language, keep everything else.
    pub fn apply_collaboration(&mut self, sector: &str, language: &str, at: DateTime<Utc>) {
        self.sector = sector.to_string();
        self.language = language.to_string();
        self.updated_at = Some(at);
    }
}

impl Identified for IdeaRecord {
    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

fn default_id() -> RecordId {
    RecordId::Number(0)
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn id_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RecordId, D::Error> {
    Ok(Option::<RecordId>::deserialize(deserializer)?.unwrap_or_else(default_id))
}

fn language_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_language))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_record_gets_defaults() {
        let record: IdeaRecord = serde_json::from_str(r#"{"id": "3", "idea": "Chess bot"}"#).unwrap();
        assert_eq!(record.id.as_number(), Some(3));
        assert_eq!(record.language, "English");
        assert!(record.sector.is_empty());
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let record: IdeaRecord = serde_json::from_str(
            r#"{"id": null, "user": null, "idea": "Chess bot", "sector": null, "language": null,
                "recommendations": null, "created_at": null}"#,
        )
        .unwrap();
        assert_eq!(record.id, RecordId::Number(0));
        assert_eq!(record.idea, "Chess bot");
        assert!(record.sector.is_empty());
        assert!(record.user.is_empty());
        assert_eq!(record.language, "English");
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_updated_at_omitted_until_set() {
        let record = IdeaRecord::new(1, "bob", "x", "r".into(), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("updated_at").is_none());
        assert_eq!(json["language"], "English");
    }
}
