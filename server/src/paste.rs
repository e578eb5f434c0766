use chrono::{DateTime, Duration, Utc};
use fleeting_common::PasteId;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_MAX_CONTENT_BYTES: usize = 1024 * 1024;

/// A paste that passed validation but has no id yet. The store only accepts
/// this type, so nothing unvalidated can be persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPaste {
    content: String,
    ttl_seconds: Option<i64>,
    max_views: Option<u32>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl NewPaste {
    pub fn new(
        content: String,
        ttl_seconds: Option<i64>,
        max_views: Option<i64>,
        now: DateTime<Utc>,
        max_content_bytes: usize,
    ) -> Result<Self, ValidationError> {
        if content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }

        if content.len() > max_content_bytes {
            return Err(ValidationError::ContentTooLarge {
                len: content.len(),
                limit: max_content_bytes,
            });
        }

        let expires_at = match ttl_seconds {
            None => None,
            Some(ttl) if ttl < 1 => return Err(ValidationError::NonPositiveTtl(ttl)),
            // Duration::seconds panics past this bound
            Some(ttl) if ttl > i64::MAX / 1_000 => {
                return Err(ValidationError::TtlTooLarge(ttl))
            }
            Some(ttl) => Some(
                now.checked_add_signed(Duration::seconds(ttl))
                    .ok_or(ValidationError::TtlTooLarge(ttl))?,
            ),
        };

        let max_views = match max_views {
            None => None,
            Some(views) if views < 1 => return Err(ValidationError::NonPositiveMaxViews(views)),
            Some(views) => Some(
                u32::try_from(views).map_err(|_| ValidationError::MaxViewsTooLarge(views))?,
            ),
        };

        Ok(Self {
            content,
            ttl_seconds,
            max_views,
            created_at: now,
            expires_at,
        })
    }

    pub fn into_paste(self, id: PasteId) -> Paste {
        Paste {
            id,
            content: self.content,
            ttl_seconds: self.ttl_seconds,
            max_views: self.max_views,
            view_count: 0,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// A stored paste. Everything but `view_count` is fixed at creation;
/// `expires_at` in particular is never recomputed from `created_at`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Paste {
    pub id: PasteId,
    pub content: String,
    pub ttl_seconds: Option<i64>,
    pub max_views: Option<u32>,
    pub view_count: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Paste {
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }

    pub fn exhausted(&self) -> bool {
        self.max_views.is_some_and(|max| self.view_count >= max)
    }

    /// The guard of the conditional increment. A paste that fails it never
    /// passes it again: time only moves forward and views only go up.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        !self.expired(now) && !self.exhausted()
    }
}
