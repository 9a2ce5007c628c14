// Warn tracking - persistent records with an in-memory count cache.
//
// The persistent store is the source of truth; the cache only accelerates
// threshold checks. Every mutation updates both layers, or invalidates the
// cache entry so the next read reloads it. Threshold policy is the
// caller's job: `issue` returns the new total, nothing here kicks anyone.

use super::moderation_models::{ModerationError, WarnRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Trait for persisting warn records.
#[async_trait]
pub trait WarnStore: Send + Sync {
    /// Append one warn record, assigning its id.
    async fn insert(
        &self,
        scope_id: &str,
        subject_id: &str,
        issued_by: &str,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> Result<WarnRecord, ModerationError>;

    /// Warns for one subject, newest first.
    async fn list_for(
        &self,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<Vec<WarnRecord>, ModerationError>;

    /// Persisted warn count for one subject.
    async fn count_for(&self, scope_id: &str, subject_id: &str) -> Result<u32, ModerationError>;

    /// Remove one warn by id, returning it when it existed.
    async fn remove(&self, warn_id: i64) -> Result<Option<WarnRecord>, ModerationError>;

    /// Remove every warn for one subject.
    async fn clear_subject(&self, scope_id: &str, subject_id: &str)
        -> Result<(), ModerationError>;

    /// Remove every warn in a scope (scope teardown).
    async fn clear_scope(&self, scope_id: &str) -> Result<(), ModerationError>;

    /// Delete warns in a scope older than `cutoff`, returning how many went.
    async fn delete_older_than(
        &self,
        scope_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, ModerationError>;

    /// The full persisted set, for the startup cache rebuild.
    async fn load_all(&self) -> Result<Vec<WarnRecord>, ModerationError>;
}

type SubjectKey = (String, String);

/// Per-subject warn counter backed by a [`WarnStore`].
pub struct WarnTracker<S: WarnStore> {
    store: S,
    counts: DashMap<SubjectKey, u32>,
}

impl<S: WarnStore> WarnTracker<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            counts: DashMap::new(),
        }
    }

    fn key(scope_id: &str, subject_id: &str) -> SubjectKey {
        (scope_id.to_string(), subject_id.to_string())
    }

    /// Load the full persisted set exactly once and group it by subject.
    /// Called at startup and after destructive sweeps when needed.
    pub async fn rebuild_cache(&self) -> Result<(), ModerationError> {
        let all = self.store.load_all().await?;
        self.counts.clear();
        for record in all {
            *self
                .counts
                .entry((record.scope_id, record.subject_id))
                .or_insert(0) += 1;
        }
        Ok(())
    }

    /// Persist one warn and return it with the subject's new total.
    pub async fn issue(
        &self,
        scope_id: &str,
        subject_id: &str,
        issued_by: &str,
        reason: &str,
    ) -> Result<(WarnRecord, u32), ModerationError> {
        let record = self
            .store
            .insert(scope_id, subject_id, issued_by, reason, Utc::now())
            .await?;

        let key = Self::key(scope_id, subject_id);
        let cached = self.counts.get_mut(&key).map(|mut c| {
            *c += 1;
            *c
        });
        let count = match cached {
            Some(count) => count,
            None => {
                // Cache miss: the store count already includes this record.
                let total = self.store.count_for(scope_id, subject_id).await?;
                self.counts.insert(key, total);
                total
            }
        };
        Ok((record, count))
    }

    /// Cache-first count, falling back to the store on a miss.
    pub async fn count(&self, scope_id: &str, subject_id: &str) -> Result<u32, ModerationError> {
        let key = Self::key(scope_id, subject_id);
        if let Some(count) = self.counts.get(&key) {
            return Ok(*count);
        }
        let total = self.store.count_for(scope_id, subject_id).await?;
        self.counts.insert(key, total);
        Ok(total)
    }

    /// Warn records for one subject, newest first.
    pub async fn list(
        &self,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<Vec<WarnRecord>, ModerationError> {
        self.store.list_for(scope_id, subject_id).await
    }

    /// Remove one warn by id. Returns false when no such warn exists.
    /// The touched cache entry is invalidated, not decremented, so a
    /// concurrent `issue` cannot leave it skewed.
    pub async fn revoke(&self, warn_id: i64) -> Result<bool, ModerationError> {
        match self.store.remove(warn_id).await? {
            Some(removed) => {
                self.counts
                    .remove(&(removed.scope_id, removed.subject_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reset one subject to zero warns.
    pub async fn clear(&self, scope_id: &str, subject_id: &str) -> Result<(), ModerationError> {
        self.store.clear_subject(scope_id, subject_id).await?;
        self.counts.insert(Self::key(scope_id, subject_id), 0);
        Ok(())
    }

    /// Drop every warn in a scope.
    pub async fn clear_scope(&self, scope_id: &str) -> Result<(), ModerationError> {
        self.store.clear_scope(scope_id).await?;
        self.counts.retain(|(scope, _), _| scope != scope_id);
        Ok(())
    }

    /// Sweep warns older than `days` out of one scope. Cache entries for the
    /// scope are invalidated only after the delete succeeded.
    pub async fn expire_older_than(
        &self,
        scope_id: &str,
        days: u32,
    ) -> Result<u64, ModerationError> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        let deleted = self.store.delete_older_than(scope_id, cutoff).await?;
        if deleted > 0 {
            self.counts.retain(|(scope, _), _| scope != scope_id);
        }
        Ok(deleted)
    }
}
