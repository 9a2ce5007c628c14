// In-memory implementation of the moderation storage ports.
//
// Useful for tests and for running the core without any persistence; state
// is lost on restart. DashMap keeps each backend safe under concurrent
// access from multiple scopes without a global lock.

use crate::core::moderation::{
    normalize_word, ModerationError, PolicyConfig, PolicyPatch, PolicyStore, PolicyType,
    WarnRecord, WarnStore, WordEntry, WordListStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// One store, all three ports. Cloning shares the underlying maps.
#[derive(Clone)]
pub struct InMemoryModerationStore {
    configs: Arc<DashMap<(PolicyType, String), PolicyConfig>>,
    warns: Arc<DashMap<i64, WarnRecord>>,
    next_warn_id: Arc<AtomicI64>,
    words: Arc<DashMap<(Option<String>, String), WordEntry>>,
}

impl InMemoryModerationStore {
    pub fn new() -> Self {
        Self {
            configs: Arc::new(DashMap::new()),
            warns: Arc::new(DashMap::new()),
            next_warn_id: Arc::new(AtomicI64::new(0)),
            words: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryModerationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for InMemoryModerationStore {
    async fn get_or_create(
        &self,
        policy: PolicyType,
        scope_id: &str,
    ) -> Result<PolicyConfig, ModerationError> {
        let config = self
            .configs
            .entry((policy, scope_id.to_string()))
            .or_insert_with(|| PolicyConfig::default_for(policy, scope_id));
        Ok(config.clone())
    }

    async fn update(
        &self,
        policy: PolicyType,
        scope_id: &str,
        patch: &PolicyPatch,
    ) -> Result<PolicyConfig, ModerationError> {
        let mut config = self
            .configs
            .entry((policy, scope_id.to_string()))
            .or_insert_with(|| PolicyConfig::default_for(policy, scope_id));
        patch.apply(&mut config);
        Ok(config.clone())
    }

    async fn list_enabled(&self, policy: PolicyType) -> Result<Vec<PolicyConfig>, ModerationError> {
        let mut configs: Vec<PolicyConfig> = self
            .configs
            .iter()
            .filter(|entry| entry.key().0 == policy && entry.enabled)
            .map(|entry| entry.clone())
            .collect();
        configs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(configs)
    }

    async fn delete(&self, policy: PolicyType, scope_id: &str) -> Result<bool, ModerationError> {
        Ok(self
            .configs
            .remove(&(policy, scope_id.to_string()))
            .is_some())
    }
}

#[async_trait]
impl WarnStore for InMemoryModerationStore {
    async fn insert(
        &self,
        scope_id: &str,
        subject_id: &str,
        issued_by: &str,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> Result<WarnRecord, ModerationError> {
        let id = self.next_warn_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = WarnRecord {
            id,
            scope_id: scope_id.to_string(),
            subject_id: subject_id.to_string(),
            issued_by: issued_by.to_string(),
            reason: reason.to_string(),
            created_at,
        };
        self.warns.insert(id, record.clone());
        Ok(record)
    }

    async fn list_for(
        &self,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<Vec<WarnRecord>, ModerationError> {
        let mut records: Vec<WarnRecord> = self
            .warns
            .iter()
            .filter(|r| r.scope_id == scope_id && r.subject_id == subject_id)
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn count_for(&self, scope_id: &str, subject_id: &str) -> Result<u32, ModerationError> {
        Ok(self
            .warns
            .iter()
            .filter(|r| r.scope_id == scope_id && r.subject_id == subject_id)
            .count() as u32)
    }

    async fn remove(&self, warn_id: i64) -> Result<Option<WarnRecord>, ModerationError> {
        Ok(self.warns.remove(&warn_id).map(|(_, record)| record))
    }

    async fn clear_subject(
        &self,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<(), ModerationError> {
        self.warns
            .retain(|_, r| !(r.scope_id == scope_id && r.subject_id == subject_id));
        Ok(())
    }

    async fn clear_scope(&self, scope_id: &str) -> Result<(), ModerationError> {
        self.warns.retain(|_, r| r.scope_id != scope_id);
        Ok(())
    }

    async fn delete_older_than(
        &self,
        scope_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, ModerationError> {
        let before = self.warns.len();
        self.warns
            .retain(|_, r| !(r.scope_id == scope_id && r.created_at < cutoff));
        Ok((before - self.warns.len()) as u64)
    }

    async fn load_all(&self) -> Result<Vec<WarnRecord>, ModerationError> {
        Ok(self.warns.iter().map(|r| r.clone()).collect())
    }
}

#[async_trait]
impl WordListStore for InMemoryModerationStore {
    async fn add_word(
        &self,
        scope_id: Option<&str>,
        word: &str,
        added_by: &str,
    ) -> Result<bool, ModerationError> {
        let word = normalize_word(word);
        if word.is_empty() {
            return Ok(false);
        }
        let key = (scope_id.map(str::to_string), word.clone());
        if self.words.contains_key(&key) {
            return Ok(false);
        }
        self.words.insert(
            key,
            WordEntry {
                scope_id: scope_id.map(str::to_string),
                word,
                added_by: added_by.to_string(),
                added_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn remove_word(
        &self,
        scope_id: Option<&str>,
        word: &str,
    ) -> Result<bool, ModerationError> {
        let key = (scope_id.map(str::to_string), normalize_word(word));
        Ok(self.words.remove(&key).is_some())
    }

    async fn list_entries(
        &self,
        scope_id: Option<&str>,
    ) -> Result<Vec<WordEntry>, ModerationError> {
        let scope = scope_id.map(str::to_string);
        Ok(self
            .words
            .iter()
            .filter(|entry| entry.key().0 == scope)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = InMemoryModerationStore::new();

        let first = store.get_or_create(PolicyType::Link, "g1").await.unwrap();
        let second = store.get_or_create(PolicyType::Link, "g1").await.unwrap();
        assert_eq!(first, second);
        assert!(!first.enabled);
    }

    #[tokio::test]
    async fn list_enabled_orders_by_most_recent_update() {
        let store = InMemoryModerationStore::new();
        let enable = PolicyPatch::enabled(true);

        store.update(PolicyType::Link, "g1", &enable).await.unwrap();
        store.update(PolicyType::Link, "g2", &enable).await.unwrap();
        // Touch g1 again so it becomes the most recent.
        store
            .update(PolicyType::Link, "g1", &PolicyPatch::enabled(true))
            .await
            .unwrap();

        let enabled = store.list_enabled(PolicyType::Link).await.unwrap();
        let scopes: Vec<&str> = enabled.iter().map(|c| c.scope_id.as_str()).collect();
        assert_eq!(scopes, vec!["g1", "g2"]);
    }

    #[tokio::test]
    async fn word_list_normalizes_and_deduplicates() {
        let store = InMemoryModerationStore::new();

        assert!(store.add_word(Some("g1"), "  Plant ", "mod").await.unwrap());
        assert!(!store.add_word(Some("g1"), "plant", "mod").await.unwrap());
        assert!(!store.add_word(Some("g1"), "", "mod").await.unwrap());

        let entries = store.list_entries(Some("g1")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].word, "plant");

        assert!(store.remove_word(Some("g1"), "PLANT").await.unwrap());
        assert!(!store.remove_word(Some("g1"), "plant").await.unwrap());
    }

    #[tokio::test]
    async fn words_for_merges_scope_and_global() {
        let store = InMemoryModerationStore::new();
        store.add_word(Some("g1"), "alpha", "mod").await.unwrap();
        store.add_word(None, "beta", "mod").await.unwrap();
        store.add_word(None, "alpha", "mod").await.unwrap();

        let mut words = store.words_for("g1").await.unwrap();
        words.sort();
        assert_eq!(words, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn delete_reports_missing_records() {
        let store = InMemoryModerationStore::new();
        assert!(!store.delete(PolicyType::Spam, "g1").await.unwrap());

        store.get_or_create(PolicyType::Spam, "g1").await.unwrap();
        assert!(store.delete(PolicyType::Spam, "g1").await.unwrap());
    }
}
