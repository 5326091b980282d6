//! File-backed local cache.
//!
//! Three whole-collection JSON blobs live under one directory, one file per
//! key. Every write materializes the full collection. Writes through one
//! [`LocalCache`] are serialized; separate caches over the same directory
//! are last-write-wins and can lose each other's updates.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use explorer_core::comments::Comment;
use explorer_core::entity::EntityStatus;
use explorer_core::error::CoreError;
use explorer_core::merge::ListFilters;
use explorer_core::normalize::{normalize, to_raw, SourceKind, LOCAL_RECORD_KEYS};
use explorer_core::source::EntitySource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

/// Mirror of locally created entities, in the local record shape.
pub const ENTITIES_KEY: &str = "bali_entities";

/// Ordered list of favorited entity ids.
pub const FAVORITES_KEY: &str = "bali-explorer-favorites";

/// User comments keyed by entity id.
pub const COMMENTS_KEY: &str = "bali-explorer-comments";

type CommentMap = BTreeMap<String, Vec<Comment>>;

pub struct LocalCache {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read one blob. A missing file is an empty collection.
    async fn read_key<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, CoreError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => {
                return Err(CoreError::Upstream(format!(
                    "local cache read {}: {e}",
                    path.display()
                )))
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::Parse(format!("local cache key '{key}': {e}")))
    }

    /// Replace one blob via a temporary file and rename.
    async fn write_key<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CoreError> {
        let io_err = |e: std::io::Error| CoreError::Upstream(format!("local cache write: {e}"));
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| CoreError::Internal(format!("local cache encode '{key}': {e}")))?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    pub async fn entities(&self) -> Result<Vec<Value>, CoreError> {
        self.read_key(ENTITIES_KEY).await
    }

    /// Overwrite the whole entity mirror.
    pub async fn replace_entities(&self, records: Vec<Value>) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_key(ENTITIES_KEY, &records).await
    }

    // -----------------------------------------------------------------------
    // Favorites
    // -----------------------------------------------------------------------

    pub async fn favorites(&self) -> Result<Vec<String>, CoreError> {
        self.read_key(FAVORITES_KEY).await
    }

    /// Add or remove a favorite. Returns whether the id is now a favorite.
    pub async fn toggle_favorite(&self, entity_id: &str) -> Result<bool, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut favorites: Vec<String> = self.read_key(FAVORITES_KEY).await?;
        let now_favorite = match favorites.iter().position(|f| f == entity_id) {
            Some(index) => {
                favorites.remove(index);
                false
            }
            None => {
                favorites.push(entity_id.to_string());
                true
            }
        };
        self.write_key(FAVORITES_KEY, &favorites).await?;
        Ok(now_favorite)
    }

    // -----------------------------------------------------------------------
    // User comments
    // -----------------------------------------------------------------------

    pub async fn user_comments(&self, entity_id: &str) -> Result<Vec<Comment>, CoreError> {
        let mut map: CommentMap = self.read_key(COMMENTS_KEY).await?;
        Ok(map.remove(entity_id).unwrap_or_default())
    }

    /// Store a validated comment under its entity.
    pub async fn add_comment(&self, comment: Comment) -> Result<Comment, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map: CommentMap = self.read_key(COMMENTS_KEY).await?;
        map.entry(comment.entity_id.clone())
            .or_default()
            .push(comment.clone());
        self.write_key(COMMENTS_KEY, &map).await?;
        Ok(comment)
    }

    /// Remove one user comment. `false` when it does not exist.
    pub async fn delete_comment(&self, entity_id: &str, comment_id: &str) -> Result<bool, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map: CommentMap = self.read_key(COMMENTS_KEY).await?;
        let Some(comments) = map.get_mut(entity_id) else {
            return Ok(false);
        };
        let before = comments.len();
        comments.retain(|c| c.id != comment_id);
        let removed = comments.len() < before;
        if comments.is_empty() {
            map.remove(entity_id);
        }
        if removed {
            self.write_key(COMMENTS_KEY, &map).await?;
        }
        Ok(removed)
    }
}

/// Record id as text; numeric ids are accepted.
fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Apply a remote-shaped patch to a local record.
///
/// The record goes through the canonical entity so the patch is validated
/// the same way as any other input. Every key the local adapter reads is
/// rewritten from the patched entity; keys it does not know, such as scraped
/// `reviews`, survive.
fn patch_record(record: &Value, patch: Value) -> Result<Value, CoreError> {
    let Value::Object(patch) = patch else {
        return Err(CoreError::Validation("entity patch must be an object".to_string()));
    };
    if let Some(status) = patch.get("status") {
        status
            .as_str()
            .and_then(EntityStatus::parse)
            .ok_or_else(|| CoreError::Validation(format!("unknown status {status}")))?;
    }
    if patch.contains_key("id") {
        return Err(CoreError::Validation("entity id cannot be changed".to_string()));
    }

    let entity = normalize(record, SourceKind::Local)?;
    let mut remote = to_raw(&entity, SourceKind::Remote);
    if let Value::Object(fields) = &mut remote {
        fields.extend(patch);
        fields.insert("updated_at".to_string(), serde_json::json!(Utc::now()));
    }
    let patched = normalize(&remote, SourceKind::Remote)?;

    let mut merged = record.clone();
    if let (Value::Object(target), Value::Object(fresh)) =
        (&mut merged, to_raw(&patched, SourceKind::Local))
    {
        target.retain(|key, _| !LOCAL_RECORD_KEYS.contains(&key.as_str()));
        target.extend(fresh);
    }
    Ok(merged)
}

#[async_trait]
impl EntitySource for LocalCache {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    async fn list(&self, _filters: &ListFilters) -> Result<Vec<Value>, CoreError> {
        self.entities().await
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, CoreError> {
        Ok(self
            .entities()
            .await?
            .into_iter()
            .find(|r| record_id(r).as_deref() == Some(id)))
    }

    async fn create(&self, raw: Value) -> Result<Value, CoreError> {
        let id = record_id(&raw)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CoreError::Validation("record has no id".to_string()))?;
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<Value> = self.read_key(ENTITIES_KEY).await?;
        if records.iter().any(|r| record_id(r).as_deref() == Some(id.as_str())) {
            return Err(CoreError::Conflict(format!("entity '{id}' already exists")));
        }
        records.push(raw.clone());
        self.write_key(ENTITIES_KEY, &records).await?;
        tracing::info!(entity_id = %id, "Entity cached locally");
        Ok(raw)
    }

    async fn update(&self, id: &str, patch: Value) -> Result<Option<Value>, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<Value> = self.read_key(ENTITIES_KEY).await?;
        let Some(slot) = records
            .iter_mut()
            .find(|r| record_id(r).as_deref() == Some(id))
        else {
            return Ok(None);
        };
        let updated = patch_record(slot, patch)?;
        *slot = updated.clone();
        self.write_key(ENTITIES_KEY, &records).await?;
        Ok(Some(updated))
    }

    /// Removes the record together with its user comments.
    async fn delete(&self, id: &str) -> Result<bool, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<Value> = self.read_key(ENTITIES_KEY).await?;
        let before = records.len();
        records.retain(|r| record_id(r).as_deref() != Some(id));
        if records.len() == before {
            return Ok(false);
        }
        self.write_key(ENTITIES_KEY, &records).await?;

        let mut comments: CommentMap = self.read_key(COMMENTS_KEY).await?;
        if comments.remove(id).is_some() {
            self.write_key(COMMENTS_KEY, &comments).await?;
        }
        Ok(true)
    }

    async fn imported_reviews(&self, id: &str) -> Result<Vec<Value>, CoreError> {
        Ok(self
            .get(id)
            .await?
            .and_then(|record| record.get("reviews").and_then(Value::as_array).cloned())
            .unwrap_or_default())
    }
}
