// JSON-file moderation store. An alternate persistence backend satisfying
// the same ports - for deployments without a database, or as an offline
// backup target. One file holds everything; a RwLock-guarded cache fronts
// it and the file is rewritten after each mutation. Never run this beside
// another backend as a dual-write.

use crate::core::moderation::{
    normalize_word, ModerationError, PolicyConfig, PolicyPatch, PolicyStore, PolicyType,
    WarnRecord, WarnStore, WordEntry, WordListStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Serialize, Deserialize, Default)]
struct JsonStoreData {
    /// Keyed by "policy_type|scope_id"
    configs: HashMap<String, PolicyConfig>,
    warns: Vec<WarnRecord>,
    next_warn_id: i64,
    words: Vec<WordEntry>,
}

struct Inner {
    path: PathBuf,
    cache: RwLock<JsonStoreData>,
}

#[derive(Clone)]
pub struct JsonModerationStore {
    inner: Arc<Inner>,
}

fn config_key(policy: PolicyType, scope_id: &str) -> String {
    format!("{}|{}", policy.as_str(), scope_id)
}

impl JsonModerationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache: JsonStoreData = if path.exists() {
            let file = File::open(&path).expect("Failed to open moderation JSON file");
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).unwrap_or_default()
        } else {
            JsonStoreData::default()
        };

        Self {
            inner: Arc::new(Inner {
                path,
                cache: RwLock::new(cache),
            }),
        }
    }

    async fn persist(&self) -> Result<(), ModerationError> {
        let cache = self.inner.cache.read().await;
        let file = File::create(&self.inner.path)
            .map_err(|e| ModerationError::StorageUnavailable(e.to_string()))?;
        serde_json::to_writer_pretty(file, &*cache)
            .map_err(|e| ModerationError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for JsonModerationStore {
    async fn get_or_create(
        &self,
        policy: PolicyType,
        scope_id: &str,
    ) -> Result<PolicyConfig, ModerationError> {
        {
            let cache = self.inner.cache.read().await;
            if let Some(config) = cache.configs.get(&config_key(policy, scope_id)) {
                return Ok(config.clone());
            }
        }

        let stored = {
            let mut cache = self.inner.cache.write().await;
            cache
                .configs
                .entry(config_key(policy, scope_id))
                .or_insert_with(|| PolicyConfig::default_for(policy, scope_id))
                .clone()
        };
        self.persist().await?;
        Ok(stored)
    }

    async fn update(
        &self,
        policy: PolicyType,
        scope_id: &str,
        patch: &PolicyPatch,
    ) -> Result<PolicyConfig, ModerationError> {
        let updated = {
            let mut cache = self.inner.cache.write().await;
            let config = cache
                .configs
                .entry(config_key(policy, scope_id))
                .or_insert_with(|| PolicyConfig::default_for(policy, scope_id));
            patch.apply(config);
            config.clone()
        };
        self.persist().await?;
        Ok(updated)
    }

    async fn list_enabled(&self, policy: PolicyType) -> Result<Vec<PolicyConfig>, ModerationError> {
        let cache = self.inner.cache.read().await;
        let mut configs: Vec<PolicyConfig> = cache
            .configs
            .values()
            .filter(|c| c.policy == policy && c.enabled)
            .cloned()
            .collect();
        configs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(configs)
    }

    async fn delete(&self, policy: PolicyType, scope_id: &str) -> Result<bool, ModerationError> {
        let removed = {
            let mut cache = self.inner.cache.write().await;
            cache.configs.remove(&config_key(policy, scope_id)).is_some()
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl WarnStore for JsonModerationStore {
    async fn insert(
        &self,
        scope_id: &str,
        subject_id: &str,
        issued_by: &str,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> Result<WarnRecord, ModerationError> {
        let record = {
            let mut cache = self.inner.cache.write().await;
            cache.next_warn_id += 1;
            let record = WarnRecord {
                id: cache.next_warn_id,
                scope_id: scope_id.to_string(),
                subject_id: subject_id.to_string(),
                issued_by: issued_by.to_string(),
                reason: reason.to_string(),
                created_at,
            };
            cache.warns.push(record.clone());
            record
        };
        self.persist().await?;
        Ok(record)
    }

    async fn list_for(
        &self,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<Vec<WarnRecord>, ModerationError> {
        let cache = self.inner.cache.read().await;
        let mut records: Vec<WarnRecord> = cache
            .warns
            .iter()
            .filter(|r| r.scope_id == scope_id && r.subject_id == subject_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn count_for(&self, scope_id: &str, subject_id: &str) -> Result<u32, ModerationError> {
        let cache = self.inner.cache.read().await;
        Ok(cache
            .warns
            .iter()
            .filter(|r| r.scope_id == scope_id && r.subject_id == subject_id)
            .count() as u32)
    }

    async fn remove(&self, warn_id: i64) -> Result<Option<WarnRecord>, ModerationError> {
        let removed = {
            let mut cache = self.inner.cache.write().await;
            let pos = cache.warns.iter().position(|r| r.id == warn_id);
            pos.map(|i| cache.warns.remove(i))
        };
        if removed.is_some() {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn clear_subject(
        &self,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<(), ModerationError> {
        {
            let mut cache = self.inner.cache.write().await;
            cache
                .warns
                .retain(|r| !(r.scope_id == scope_id && r.subject_id == subject_id));
        }
        self.persist().await
    }

    async fn clear_scope(&self, scope_id: &str) -> Result<(), ModerationError> {
        {
            let mut cache = self.inner.cache.write().await;
            cache.warns.retain(|r| r.scope_id != scope_id);
        }
        self.persist().await
    }

    async fn delete_older_than(
        &self,
        scope_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, ModerationError> {
        let deleted = {
            let mut cache = self.inner.cache.write().await;
            let before = cache.warns.len();
            cache
                .warns
                .retain(|r| !(r.scope_id == scope_id && r.created_at < cutoff));
            (before - cache.warns.len()) as u64
        };
        if deleted > 0 {
            self.persist().await?;
        }
        Ok(deleted)
    }

    async fn load_all(&self) -> Result<Vec<WarnRecord>, ModerationError> {
        let cache = self.inner.cache.read().await;
        Ok(cache.warns.clone())
    }
}

#[async_trait]
impl WordListStore for JsonModerationStore {
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
        let scope = scope_id.map(str::to_string);
        let added = {
            let mut cache = self.inner.cache.write().await;
            if cache
                .words
                .iter()
                .any(|e| e.scope_id == scope && e.word == word)
            {
                false
            } else {
                cache.words.push(WordEntry {
                    scope_id: scope,
                    word,
                    added_by: added_by.to_string(),
                    added_at: Utc::now(),
                });
                true
            }
        };
        if added {
            self.persist().await?;
        }
        Ok(added)
    }

    async fn remove_word(
        &self,
        scope_id: Option<&str>,
        word: &str,
    ) -> Result<bool, ModerationError> {
        let word = normalize_word(word);
        let scope = scope_id.map(str::to_string);
        let removed = {
            let mut cache = self.inner.cache.write().await;
            let before = cache.words.len();
            cache
                .words
                .retain(|e| !(e.scope_id == scope && e.word == word));
            before != cache.words.len()
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn list_entries(
        &self,
        scope_id: Option<&str>,
    ) -> Result<Vec<WordEntry>, ModerationError> {
        let scope = scope_id.map(str::to_string);
        let cache = self.inner.cache.read().await;
        Ok(cache
            .words
            .iter()
            .filter(|e| e.scope_id == scope)
            .cloned()
            .collect())
    }
}
