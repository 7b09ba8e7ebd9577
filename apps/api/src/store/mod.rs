//! JSON-file record stores.
//!
//! Every store is one JSON document holding the whole collection. Reads decode the
//! full file, writes replace it through a temp-file rename, and all writers of one
//! store are serialized through an in-process mutex so concurrent requests cannot
//! drop each other's records. Nothing coordinates separate processes.

pub mod ids;

use std::collections::BTreeMap;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::application::ApplicationRecord;
use crate::models::feed::FeedPost;
use crate::models::idea::IdeaRecord;
use crate::models::upload::UploadRecord;
use crate::models::user::UserRecord;

pub use ids::{next_id, Identified, RecordId};

pub const IDEAS_FILE: &str = "ideas.json";
pub const USERS_FILE: &str = "users.json";
pub const UPLOAD_HISTORY_FILE: &str = "uploads_history.json";
pub const APPLICATIONS_FILE: &str = "applications.json";
pub const FEED_FILE: &str = "feed.json";

/// Envelope key of the legacy `{"ideas": [...]}` layout.
const IDEAS_ENVELOPE: &str = "ideas";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode collection: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Task(String),

    /// Refuses to rewrite a file whose records could not all be read back.
    #[error("{path} holds {count} unreadable record(s); not overwriting it")]
    UnreadableRecords { path: PathBuf, count: usize },
}

/// Anything a store can hold: a `Vec` of records or a name-keyed map.
///
/// Records are decoded one at a time so a single record the schema rejects does
/// not take its neighbours down with it.
pub trait Collection: Serialize + Default + Send + 'static {
    /// `None` when the top-level JSON has the wrong shape for this collection.
    fn decode_records(value: Value) -> Option<Decoded<Self>>;
}

/// A decoded collection plus the errors of any records that had to be left out.
pub struct Decoded<C> {
    pub collection: C,
    pub rejected: Vec<serde_json::Error>,
}

impl<T> Collection for Vec<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn decode_records(value: Value) -> Option<Decoded<Self>> {
        let Value::Array(items) = value else {
            return None;
        };
        let mut rejected = Vec::new();
        let collection = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).map_err(|e| rejected.push(e)).ok())
            .collect();
        Some(Decoded {
            collection,
            rejected,
        })
    }
}

impl<V> Collection for BTreeMap<String, V>
where
    V: Serialize + DeserializeOwned + Send + 'static,
{
    fn decode_records(value: Value) -> Option<Decoded<Self>> {
        let Value::Object(entries) = value else {
            return None;
        };
        let mut rejected = Vec::new();
        let collection = entries
            .into_iter()
            .filter_map(|(key, item)| match serde_json::from_value(item) {
                Ok(record) => Some((key, record)),
                Err(e) => {
                    rejected.push(e);
                    None
                }
            })
            .collect();
        Some(Decoded {
            collection,
            rejected,
        })
    }
}

struct StoreInner {
    path: PathBuf,
    envelope: Option<&'static str>,
    write_lock: Mutex<()>,
}

/// A file-backed collection accessed via whole-document load/save.
pub struct JsonStore<C> {
    inner: Arc<StoreInner>,
    _collection: PhantomData<fn() -> C>,
}

impl<C> Clone for JsonStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _collection: PhantomData,
        }
    }
}

impl<C: Collection> JsonStore<C> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                envelope: None,
                write_lock: Mutex::new(()),
            }),
            _collection: PhantomData,
        }
    }

    /// Store whose file may still carry the collection inside `{"<key>": ...}`.
    /// The envelope is only ever read; the next save writes the bare collection.
    pub fn with_legacy_envelope(path: impl Into<PathBuf>, key: &'static str) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                envelope: Some(key),
                write_lock: Mutex::new(()),
            }),
            _collection: PhantomData,
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Reads the whole collection.
    /// Missing, empty, malformed or wrongly shaped files all load as empty.
    /// Individual records that fail to decode are skipped with a warning.
    pub async fn load(&self) -> Result<C, StoreError> {
        Ok(self.read().await?.collection)
    }

    /// Like `load`, but fails instead of skipping records, so a following write
    /// cannot drop what it could not read.
    async fn load_for_write(&self) -> Result<C, StoreError> {
        let decoded = self.read().await?;
        if decoded.rejected.is_empty() {
            Ok(decoded.collection)
        } else {
            Err(StoreError::UnreadableRecords {
                path: self.inner.path.clone(),
                count: decoded.rejected.len(),
            })
        }
    }

    async fn read(&self) -> Result<Decoded<C>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.inner.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(empty()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!("{} is not valid UTF-8, treating as empty", self.inner.path.display());
                return Ok(empty());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.inner.path.clone(),
                    source,
                })
            }
        };
        Ok(self.decode(&text))
    }

    /// Replaces the file with `collection`.
    pub async fn save(&self, collection: &C) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        self.write(collection).await
    }

    /// Load, mutate, save as one serialized step.
    /// When `mutate` fails nothing is written and the error is returned as-is.
    pub async fn update<T, E, F>(&self, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut C) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut collection = self.load_for_write().await?;
        let result = mutate(&mut collection)?;
        self.write(&collection).await?;
        Ok(result)
    }

    /// Writes an empty collection unless the file already exists.
    pub async fn ensure_exists(&self) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        match tokio::fs::try_exists(&self.inner.path).await {
            Ok(true) => Ok(()),
            Ok(false) => self.write(&C::default()).await,
            Err(source) => Err(StoreError::Io {
                path: self.inner.path.clone(),
                source,
            }),
        }
    }

    fn decode(&self, text: &str) -> Decoded<C> {
        if text.trim().is_empty() {
            return empty();
        }

        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!("{} holds invalid JSON ({e}), treating as empty", self.inner.path.display());
                return empty();
            }
        };

        let Some(decoded) = C::decode_records(self.unwrap_envelope(value)) else {
            warn!("{} has an unexpected shape, treating as empty", self.inner.path.display());
            return empty();
        };
        for e in &decoded.rejected {
            warn!("Skipping unreadable record in {}: {e}", self.inner.path.display());
        }
        decoded
    }

    fn unwrap_envelope(&self, value: Value) -> Value {
        let Some(key) = self.inner.envelope else {
            return value;
        };
        match value {
            Value::Object(mut map) => match map.remove(key) {
                Some(inner) => {
                    info!("Unwrapping legacy '{key}' envelope in {}", self.inner.path.display());
                    inner
                }
                None => Value::Object(map),
            },
            other => other,
        }
    }

    /// Callers must hold `write_lock`.
    async fn write(&self, collection: &C) -> Result<(), StoreError> {
        let bytes = encode_pretty(collection)?;
        let path = self.inner.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;
        debug!("Saved {}", self.inner.path.display());
        Ok(())
    }
}

fn empty<C: Default>() -> Decoded<C> {
    Decoded {
        collection: C::default(),
        rejected: Vec::new(),
    }
}

/// 4-space indented JSON; serde_json keeps non-ASCII characters literal.
fn encode_pretty<C: Serialize>(collection: &C) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    collection.serialize(&mut serializer)?;
    Ok(buf)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

pub type UserMap = BTreeMap<String, UserRecord>;
pub type FeedMap = BTreeMap<String, Vec<FeedPost>>;

/// Every store the service uses, rooted at one data directory.
#[derive(Clone)]
pub struct Stores {
    pub ideas: JsonStore<Vec<IdeaRecord>>,
    pub users: JsonStore<UserMap>,
    pub uploads: JsonStore<Vec<UploadRecord>>,
    pub applications: JsonStore<Vec<ApplicationRecord>>,
    pub feed: JsonStore<FeedMap>,
}

impl Stores {
    pub fn open(data_dir: &Path) -> Self {
        Self {
            ideas: JsonStore::with_legacy_envelope(data_dir.join(IDEAS_FILE), IDEAS_ENVELOPE),
            users: JsonStore::new(data_dir.join(USERS_FILE)),
            uploads: JsonStore::new(data_dir.join(UPLOAD_HISTORY_FILE)),
            applications: JsonStore::new(data_dir.join(APPLICATIONS_FILE)),
            feed: JsonStore::new(data_dir.join(FEED_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn idea(id: u64, text: &str) -> IdeaRecord {
        IdeaRecord::new(id, "alice", text, String::new(), Utc::now())
    }

    fn ideas_store(dir: &TempDir) -> JsonStore<Vec<IdeaRecord>> {
        JsonStore::with_legacy_envelope(dir.path().join(IDEAS_FILE), IDEAS_ENVELOPE)
    }

    #[tokio::test]
    async fn test_missing_empty_and_invalid_files_load_empty() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);
        assert!(store.load().await.unwrap().is_empty());

        for contents in ["", "   \n", "{not json", "42", "\"text\"", "{\"other\": []}"] {
            std::fs::write(store.path(), contents).unwrap();
            assert!(store.load().await.unwrap().is_empty(), "contents: {contents:?}");
        }

        let users: JsonStore<UserMap> = JsonStore::new(dir.path().join(USERS_FILE));
        std::fs::write(users.path(), "[1, 2]").unwrap();
        assert!(users.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_records() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);
        let mut second = idea(2, "Café finder ☕");
        second.sector = "Food".to_string();
        second.updated_at = Some(Utc::now());
        let ideas = vec![idea(1, "Budget tracker"), second];

        store.save(&ideas).await.unwrap();
        assert_eq!(store.load().await.unwrap(), ideas);
    }

    #[tokio::test]
    async fn test_save_is_pretty_printed_with_literal_unicode() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);
        store.save(&vec![idea(1, "Café")]).await.unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("[\n    {\n        \"id\": 1,"));
        assert!(text.contains("Café"));
        assert!(!text.contains("\\u"));
    }

    #[tokio::test]
    async fn test_legacy_envelope_is_unwrapped() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);
        std::fs::write(
            store.path(),
            r#"{"ideas": [{"id": 7, "user": "bob", "idea": "Old", "recommendations": "r", "created_at": "2024-03-01T10:00:00.000000Z"}]}"#,
        )
        .unwrap();

        let ideas = store.load().await.unwrap();
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].id, RecordId::Number(7));
        assert_eq!(ideas[0].language, "English");
        assert_eq!(ideas[0].sector, "");

        store.save(&ideas).await.unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.trim_start().starts_with('['));
    }

    #[tokio::test]
    async fn test_null_field_keeps_record_and_append_preserves_all() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);
        std::fs::write(
            store.path(),
            r#"[
                {"id": 1, "user": "alice", "idea": "Budget tracker", "recommendations": "r"},
                {"id": 2, "user": "bob", "idea": "Plant app", "sector": null, "recommendations": "r"}
            ]"#,
        )
        .unwrap();

        let ideas = store.load().await.unwrap();
        assert_eq!(ideas.len(), 2);
        assert_eq!(ideas[1].sector, "");

        let id = store
            .update(|ideas| {
                let id = next_id(ideas);
                ideas.push(idea(id, "New"));
                Ok::<_, StoreError>(id)
            })
            .await
            .unwrap();
        assert_eq!(id, 3);

        let ideas = store.load().await.unwrap();
        let ids: Vec<_> = ideas.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec![1.into(), 2.into(), 3.into()]);
    }

    #[tokio::test]
    async fn test_unreadable_record_is_skipped_on_load_but_blocks_writes() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);
        let original = r#"[{"id": 1, "idea": "Good"}, {"id": 2, "idea": ["not", "text"]}]"#;
        std::fs::write(store.path(), original).unwrap();

        let ideas = store.load().await.unwrap();
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].idea, "Good");

        let err = store
            .update(|ideas| {
                ideas.push(idea(3, "New"));
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnreadableRecords { count: 1, .. }));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), original);
    }

    #[tokio::test]
    async fn test_map_store_skips_only_the_bad_entry() {
        let dir = TempDir::new().unwrap();
        let feed: JsonStore<FeedMap> = JsonStore::new(dir.path().join(FEED_FILE));
        std::fs::write(
            feed.path(),
            r#"{"alice": [{"idea": "A", "comments": null}], "bob": 5}"#,
        )
        .unwrap();

        let posts = feed.load().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts["alice"][0].comments.is_empty());
    }

    #[tokio::test]
    async fn test_update_skips_save_on_error() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);
        store.save(&vec![idea(1, "Keep me")]).await.unwrap();

        let result: Result<(), crate::errors::AppError> = store
            .update(|ideas| {
                ideas.clear();
                Err(crate::errors::AppError::Validation("nope".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_leaves_empty_collection() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);
        store.save(&vec![idea(1, "a"), idea(2, "b")]).await.unwrap();

        store.save(&Vec::new()).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_exists_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);
        store.ensure_exists().await.unwrap();
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "[]");

        store.save(&vec![idea(1, "a")]).await.unwrap();
        store.ensure_exists().await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let store = ideas_store(&dir);

        let handles: Vec<_> = (0..32)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update(|ideas| {
                            let id = next_id(ideas);
                            ideas.push(idea(id, &format!("idea {n}")));
                            Ok::<_, StoreError>(id)
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let ideas = store.load().await.unwrap();
        assert_eq!(ideas.len(), 32);
        let mut ids: Vec<u64> = ideas.iter().filter_map(|i| i.id.as_number()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=32).collect::<Vec<_>>());
    }
}
