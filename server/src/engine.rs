//! Availability and consumption rules on top of a [`PasteStore`].
//!
//! Reading a paste goes through [`Engine::try_consume`], which is a single
//! conditional increment in the store. Do not replace it with "check, then
//! increment": two readers racing for the last view would both pass the
//! check.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleeting_common::{PasteId, Unavailability};
use tokio::task;

use crate::error::{CreateError, StoreError};
use crate::paste::{NewPaste, Paste};
use crate::store::PasteStore;

/// Whether `paste` may be read at `now`. Pure; a missing paste is never
/// available.
pub fn is_available(paste: Option<&Paste>, now: DateTime<Utc>) -> bool {
    paste.is_some_and(|paste| paste.is_available(now))
}

/// `None` when the paste has no view limit.
pub fn remaining_views(paste: &Paste) -> Option<u32> {
    paste
        .max_views
        .map(|max| max.saturating_sub(paste.view_count))
}

/// Picks the reason to report for an unavailable paste. Expiry wins over the
/// view limit when both hold.
pub fn diagnose(paste: Option<&Paste>, now: DateTime<Utc>) -> Unavailability {
    match paste {
        Some(paste) if paste.expired(now) => Unavailability::Expired,
        Some(paste) if paste.exhausted() => Unavailability::MaxViewsReached,
        _ => Unavailability::NotFound,
    }
}

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn PasteStore>,
    max_content_bytes: usize,
}

impl Engine {
    pub fn new(store: Arc<dyn PasteStore>, max_content_bytes: usize) -> Self {
        Self {
            store,
            max_content_bytes,
        }
    }

    pub const fn max_content_bytes(&self) -> usize {
        self.max_content_bytes
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PasteStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || op(store.as_ref())).await?
    }

    /// Validates and stores a new paste created at `now`. Invalid input is
    /// rejected before the store is touched.
    pub async fn create(
        &self,
        content: String,
        ttl_seconds: Option<i64>,
        max_views: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Paste, CreateError> {
        let paste = NewPaste::new(content, ttl_seconds, max_views, now, self.max_content_bytes)?;
        Ok(self.blocking(move |store| store.insert(paste)).await?)
    }

    pub async fn find(&self, id: PasteId) -> Result<Option<Paste>, StoreError> {
        self.blocking(move |store| store.find(&id)).await
    }

    /// Consumes one view. `Some` carries the record with the view already
    /// counted; `None` means the paste is missing, expired or used up.
    pub async fn try_consume(
        &self,
        id: PasteId,
        now: DateTime<Utc>,
    ) -> Result<Option<Paste>, StoreError> {
        self.blocking(move |store| store.conditionally_increment_view(&id, now))
            .await
    }

    /// Explains a `None` from [`Engine::try_consume`].
    ///
    /// This is a second, separate read. Another request may have changed the
    /// paste in between, so the answer can be slightly stale. That only
    /// affects the wording of the error; the access decision was already
    /// made by `try_consume`. Keep the two steps apart.
    pub async fn diagnose_unavailability(
        &self,
        id: PasteId,
        now: DateTime<Utc>,
    ) -> Result<Unavailability, StoreError> {
        let paste = self.find(id).await?;
        Ok(diagnose(paste.as_ref(), now))
    }

    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.blocking(move |store| store.sweep_expired(now)).await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.blocking(|store| store.ping()).await
    }
}
