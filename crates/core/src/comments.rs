//! Comment feed aggregation.
//!
//! Three kinds of comment coexist per entity: reviews imported with the
//! scrape (read-only), comments left by users (deletable by moderators) and
//! at most one curated seed comment (read-only). The feed merges all three
//! newest first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};

/// Author shown when a review carries no name.
pub const DEFAULT_AUTHOR: &str = "Anonymous";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Imported,
    User,
    Seed,
}

impl Provenance {
    pub fn is_deletable(self) -> bool {
        self == Provenance::User
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub entity_id: EntityId,
    pub rating: u8,
    pub text: String,
    pub author: String,
    /// Imported reviews may lack a date; those sort last.
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub comment: Comment,
    pub provenance: Provenance,
}

/// Synthesized id for the `index`-th imported review of an entity.
pub fn imported_review_id(entity_id: &str, index: usize) -> String {
    format!("review-{entity_id}-{index}")
}

/// Map a scraped review into a [`Comment`].
///
/// Field preferences: `stars` over `rating`, `text` over `textTranslated`,
/// `name` over `author_name`, `publishedAtDate` over `created_at`.
pub fn imported_review(entity_id: &str, index: usize, raw: &Value) -> Comment {
    let text_field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| raw.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let rating = ["stars", "rating"]
        .iter()
        .find_map(|k| raw.get(*k).and_then(Value::as_f64))
        .filter(|r| r.is_finite())
        .map(|r| r.round().clamp(0.0, f64::from(u8::MAX)) as u8)
        .unwrap_or(0);
    let created_at = ["publishedAtDate", "created_at", "published_at"]
        .iter()
        .find_map(|k| raw.get(*k).and_then(Value::as_str))
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));

    Comment {
        id: imported_review_id(entity_id, index),
        entity_id: entity_id.to_string(),
        rating,
        text: text_field(&["text", "textTranslated"]).unwrap_or_default(),
        author: text_field(&["name", "author_name", "author"])
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        created_at,
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommentFeed {
    entries: Vec<FeedEntry>,
}

/// Build the combined feed for one entity, newest first.
///
/// The sort is stable, so equal timestamps keep imported, user, seed order.
pub fn aggregate_comments(
    entity_id: &str,
    imported: &[Value],
    user: &[Comment],
    seed: Option<&Comment>,
) -> CommentFeed {
    let mut entries: Vec<FeedEntry> = imported
        .iter()
        .enumerate()
        .map(|(index, raw)| FeedEntry {
            comment: imported_review(entity_id, index, raw),
            provenance: Provenance::Imported,
        })
        .collect();
    entries.extend(user.iter().cloned().map(|comment| FeedEntry {
        comment,
        provenance: Provenance::User,
    }));
    entries.extend(seed.cloned().map(|comment| FeedEntry {
        comment,
        provenance: Provenance::Seed,
    }));

    entries.sort_by(|a, b| b.comment.created_at.cmp(&a.comment.created_at));
    CommentFeed { entries }
}

impl CommentFeed {
    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove a user comment from the feed and return it.
    ///
    /// Imported and seed comments are refused with `Forbidden` and the feed
    /// is left unchanged.
    pub fn delete(&mut self, comment_id: &str) -> Result<Comment, CoreError> {
        let position = self
            .entries
            .iter()
            .position(|e| e.comment.id == comment_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "comment",
                id: comment_id.to_string(),
            })?;

        match self.entries[position].provenance {
            Provenance::User => Ok(self.entries.remove(position).comment),
            Provenance::Imported => Err(CoreError::Forbidden(
                "imported reviews cannot be deleted".to_string(),
            )),
            Provenance::Seed => Err(CoreError::Forbidden(
                "curated comments cannot be deleted".to_string(),
            )),
        }
    }

    pub fn distribution(&self) -> RatingDistribution {
        RatingDistribution::from_ratings(self.entries.iter().map(|e| e.comment.rating))
    }
}

// ---------------------------------------------------------------------------
// Rating distribution
// ---------------------------------------------------------------------------

/// Count of ratings per star value. `counts[0]` holds five-star ratings,
/// `counts[4]` one-star ratings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RatingDistribution {
    pub counts: [u32; 5],
}

impl RatingDistribution {
    /// Ratings outside `1..=5` are skipped, not clamped.
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let mut counts = [0u32; 5];
        for stars in ratings {
            if (1..=5).contains(&stars) {
                counts[5 - stars as usize] += 1;
            }
        }
        Self { counts }
    }

    pub fn count(&self, stars: u8) -> u32 {
        if (1..=5).contains(&stars) {
            self.counts[5 - stars as usize]
        } else {
            0
        }
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn average(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let weighted: u32 = (1..=5u8).map(|s| u32::from(s) * self.count(s)).sum();
        Some(f64::from(weighted) / f64::from(total))
    }
}

// ---------------------------------------------------------------------------
// New user comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewComment {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(min = 1, max = 2000, message = "text must be 1-2000 characters"))]
    pub text: String,
    #[validate(length(max = 80, message = "author must be at most 80 characters"))]
    pub author: Option<String>,
}

impl NewComment {
    /// Validate and stamp a new user comment.
    pub fn into_comment(self, entity_id: &str, now: Timestamp) -> Result<Comment, CoreError> {
        self.validate().map_err(CoreError::from_validation)?;
        let text = self.text.trim();
        if text.is_empty() {
            return Err(CoreError::Validation("text must not be blank".to_string()));
        }
        let author = self
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_AUTHOR);
        Ok(Comment {
            id: format!("comment-{}", uuid::Uuid::new_v4()),
            entity_id: entity_id.to_string(),
            rating: self.rating,
            text: text.to_string(),
            author: author.to_string(),
            created_at: Some(now),
        })
    }
}

// ---------------------------------------------------------------------------
// Seed comments
// ---------------------------------------------------------------------------

/// Curated comments, at most one per entity.
#[derive(Debug, Clone, Default)]
pub struct SeedComments(HashMap<EntityId, Comment>);

impl SeedComments {
    /// Build from a list; the first comment for an entity wins.
    pub fn from_comments(comments: Vec<Comment>) -> Self {
        let mut map = HashMap::new();
        for comment in comments {
            map.entry(comment.entity_id.clone()).or_insert(comment);
        }
        Self(map)
    }

    /// Parse a JSON array of comments.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let comments: Vec<Comment> = serde_json::from_str(json)
            .map_err(|e| CoreError::Parse(format!("seed comments: {e}")))?;
        Ok(Self::from_comments(comments))
    }

    pub fn get(&self, entity_id: &str) -> Option<&Comment> {
        self.0.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
