// Storage ports for policy configuration and word lists.
//
// The core defines WHAT it needs from persistence, not HOW. The infra layer
// provides the implementations (SQLite, JSON file, in-memory), and every
// backend failure surfaces as `ModerationError::StorageUnavailable`.

use super::moderation_models::{ModerationError, PolicyConfig, PolicyPatch, PolicyType, WordEntry};
use async_trait::async_trait;

/// Trait for persisting per-(policy, scope) configuration records.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetch the config for (policy, scope), creating it with the
    /// per-policy defaults on first access. Idempotent: a second call
    /// returns the same record.
    async fn get_or_create(
        &self,
        policy: PolicyType,
        scope_id: &str,
    ) -> Result<PolicyConfig, ModerationError>;

    /// Apply a partial-field update and return the updated record.
    /// Creates the record first if it does not exist yet.
    async fn update(
        &self,
        policy: PolicyType,
        scope_id: &str,
        patch: &PolicyPatch,
    ) -> Result<PolicyConfig, ModerationError>;

    /// All enabled configs for one policy type, most recently updated first.
    async fn list_enabled(&self, policy: PolicyType) -> Result<Vec<PolicyConfig>, ModerationError>;

    /// Remove the record (scope teardown). Returns false when absent.
    async fn delete(&self, policy: PolicyType, scope_id: &str) -> Result<bool, ModerationError>;
}

/// Trait for persisting trigger-word lists, scoped or global.
#[async_trait]
pub trait WordListStore: Send + Sync {
    /// Add a word to a scope's list (`None` = the global list). The word is
    /// case-folded and trimmed before storage. Returns false on duplicate.
    async fn add_word(
        &self,
        scope_id: Option<&str>,
        word: &str,
        added_by: &str,
    ) -> Result<bool, ModerationError>;

    /// Remove a word. Returns false when it was not present.
    async fn remove_word(&self, scope_id: Option<&str>, word: &str)
        -> Result<bool, ModerationError>;

    /// Full entries for one list (scope or global).
    async fn list_entries(&self, scope_id: Option<&str>)
        -> Result<Vec<WordEntry>, ModerationError>;

    /// The normalized words a scope is matched against: its own list plus
    /// the global list.
    async fn words_for(&self, scope_id: &str) -> Result<Vec<String>, ModerationError> {
        let mut words: Vec<String> = self
            .list_entries(Some(scope_id))
            .await?
            .into_iter()
            .map(|e| e.word)
            .collect();
        for entry in self.list_entries(None).await? {
            if !words.contains(&entry.word) {
                words.push(entry.word);
            }
        }
        Ok(words)
    }
}

/// Normalization applied to every word before storage or lookup.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}
