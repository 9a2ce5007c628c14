// SQLite-backed moderation store.
//
// Tables:
// - policy_config: one row per (policy_type, scope_id)
// - warns: append-only warn records
// - word_list: scoped and global trigger words ('' scope = global)

use crate::core::moderation::{
    normalize_word, MatchStrictness, ModerationError, PolicyAction, PolicyConfig, PolicyPatch,
    PolicyStore, PolicyType, WarnRecord, WarnStore, WordEntry, WordListStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

#[derive(Clone)]
pub struct SqliteModerationStore {
    pool: Pool<Sqlite>,
}

fn storage_err(e: impl std::fmt::Display) -> ModerationError {
    ModerationError::StorageUnavailable(e.to_string())
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteModerationStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS policy_config (
                policy_type TEXT NOT NULL,
                scope_id TEXT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT 0,
                action TEXT NOT NULL,
                strictness TEXT NOT NULL DEFAULT 'normal',
                warn_limit INTEGER NOT NULL DEFAULT 3,
                message_limit INTEGER NOT NULL DEFAULT 5,
                time_window_secs INTEGER NOT NULL DEFAULT 5,
                allowed_mentions INTEGER NOT NULL DEFAULT 5,
                auto_reset_days INTEGER NOT NULL DEFAULT 0,
                exempt_admins BOOLEAN NOT NULL DEFAULT 1,
                show_promotions BOOLEAN NOT NULL DEFAULT 0,
                welcome_message TEXT,
                goodbye_message TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (policy_type, scope_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scope_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                issued_by TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_warns_scope_subject
                ON warns(scope_id, subject_id, created_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        // '' scope = the global list; sqlite treats NULLs as distinct in
        // unique constraints, so the sentinel keeps (scope, word) unique.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS word_list (
                scope_id TEXT NOT NULL DEFAULT '',
                word TEXT NOT NULL,
                added_by TEXT NOT NULL,
                added_at TEXT NOT NULL,
                PRIMARY KEY (scope_id, word)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    fn row_to_config(row: &SqliteRow) -> PolicyConfig {
        let policy_raw: String = row.get("policy_type");
        let action_raw: String = row.get("action");
        let strictness_raw: String = row.get("strictness");
        let updated_raw: String = row.get("updated_at");

        PolicyConfig {
            policy: PolicyType::from_str_key(&policy_raw).unwrap_or(PolicyType::Link),
            scope_id: row.get("scope_id"),
            enabled: row.get("enabled"),
            action: PolicyAction::from_str_key(&action_raw).unwrap_or(PolicyAction::Delete),
            strictness: MatchStrictness::from_str_key(&strictness_raw)
                .unwrap_or(MatchStrictness::Normal),
            warn_limit: row.get::<i64, _>("warn_limit") as u32,
            message_limit: row.get::<i64, _>("message_limit") as u32,
            time_window_secs: row.get::<i64, _>("time_window_secs") as u64,
            allowed_mentions: row.get::<i64, _>("allowed_mentions") as u32,
            auto_reset_days: row.get::<i64, _>("auto_reset_days") as u32,
            exempt_admins: row.get("exempt_admins"),
            show_promotions: row.get("show_promotions"),
            welcome_message: row.get("welcome_message"),
            goodbye_message: row.get("goodbye_message"),
            updated_at: parse_timestamp(&updated_raw),
        }
    }

    fn row_to_warn(row: &SqliteRow) -> WarnRecord {
        let created_raw: String = row.get("created_at");
        WarnRecord {
            id: row.get("id"),
            scope_id: row.get("scope_id"),
            subject_id: row.get("subject_id"),
            issued_by: row.get("issued_by"),
            reason: row.get("reason"),
            created_at: parse_timestamp(&created_raw),
        }
    }

    async fn upsert_config(&self, config: &PolicyConfig) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO policy_config (
                policy_type, scope_id, enabled, action, strictness,
                warn_limit, message_limit, time_window_secs, allowed_mentions,
                auto_reset_days, exempt_admins, show_promotions,
                welcome_message, goodbye_message, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(policy_type, scope_id) DO UPDATE SET
                enabled = excluded.enabled,
                action = excluded.action,
                strictness = excluded.strictness,
                warn_limit = excluded.warn_limit,
                message_limit = excluded.message_limit,
                time_window_secs = excluded.time_window_secs,
                allowed_mentions = excluded.allowed_mentions,
                auto_reset_days = excluded.auto_reset_days,
                exempt_admins = excluded.exempt_admins,
                show_promotions = excluded.show_promotions,
                welcome_message = excluded.welcome_message,
                goodbye_message = excluded.goodbye_message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(config.policy.as_str())
        .bind(&config.scope_id)
        .bind(config.enabled)
        .bind(config.action.as_str())
        .bind(config.strictness.as_str())
        .bind(config.warn_limit as i64)
        .bind(config.message_limit as i64)
        .bind(config.time_window_secs as i64)
        .bind(config.allowed_mentions as i64)
        .bind(config.auto_reset_days as i64)
        .bind(config.exempt_admins)
        .bind(config.show_promotions)
        .bind(config.welcome_message.as_deref())
        .bind(config.goodbye_message.as_deref())
        .bind(config.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for SqliteModerationStore {
    async fn get_or_create(
        &self,
        policy: PolicyType,
        scope_id: &str,
    ) -> Result<PolicyConfig, ModerationError> {
        let row = sqlx::query(
            "SELECT * FROM policy_config WHERE policy_type = ? AND scope_id = ?",
        )
        .bind(policy.as_str())
        .bind(scope_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        if let Some(row) = row {
            return Ok(Self::row_to_config(&row));
        }

        let config = PolicyConfig::default_for(policy, scope_id);
        self.upsert_config(&config).await?;
        Ok(config)
    }

    async fn update(
        &self,
        policy: PolicyType,
        scope_id: &str,
        patch: &PolicyPatch,
    ) -> Result<PolicyConfig, ModerationError> {
        let mut config = self.get_or_create(policy, scope_id).await?;
        patch.apply(&mut config);
        self.upsert_config(&config).await?;
        Ok(config)
    }

    async fn list_enabled(&self, policy: PolicyType) -> Result<Vec<PolicyConfig>, ModerationError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM policy_config
            WHERE policy_type = ? AND enabled = 1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(policy.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.iter().map(Self::row_to_config).collect())
    }

    async fn delete(&self, policy: PolicyType, scope_id: &str) -> Result<bool, ModerationError> {
        let result =
            sqlx::query("DELETE FROM policy_config WHERE policy_type = ? AND scope_id = ?")
                .bind(policy.as_str())
                .bind(scope_id)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl WarnStore for SqliteModerationStore {
    async fn insert(
        &self,
        scope_id: &str,
        subject_id: &str,
        issued_by: &str,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> Result<WarnRecord, ModerationError> {
        let result = sqlx::query(
            r#"
            INSERT INTO warns (scope_id, subject_id, issued_by, reason, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(scope_id)
        .bind(subject_id)
        .bind(issued_by)
        .bind(reason)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(WarnRecord {
            id: result.last_insert_rowid(),
            scope_id: scope_id.to_string(),
            subject_id: subject_id.to_string(),
            issued_by: issued_by.to_string(),
            reason: reason.to_string(),
            created_at,
        })
    }

    async fn list_for(
        &self,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<Vec<WarnRecord>, ModerationError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM warns
            WHERE scope_id = ? AND subject_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(scope_id)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.iter().map(Self::row_to_warn).collect())
    }

    async fn count_for(&self, scope_id: &str, subject_id: &str) -> Result<u32, ModerationError> {
        let row =
            sqlx::query("SELECT COUNT(*) AS n FROM warns WHERE scope_id = ? AND subject_id = ?")
                .bind(scope_id)
                .bind(subject_id)
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(row.get::<i64, _>("n") as u32)
    }

    async fn remove(&self, warn_id: i64) -> Result<Option<WarnRecord>, ModerationError> {
        let row = sqlx::query("SELECT * FROM warns WHERE id = ?")
            .bind(warn_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record = Self::row_to_warn(&row);

        sqlx::query("DELETE FROM warns WHERE id = ?")
            .bind(warn_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(Some(record))
    }

    async fn clear_subject(
        &self,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<(), ModerationError> {
        sqlx::query("DELETE FROM warns WHERE scope_id = ? AND subject_id = ?")
            .bind(scope_id)
            .bind(subject_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn clear_scope(&self, scope_id: &str) -> Result<(), ModerationError> {
        sqlx::query("DELETE FROM warns WHERE scope_id = ?")
            .bind(scope_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete_older_than(
        &self,
        scope_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, ModerationError> {
        let result = sqlx::query("DELETE FROM warns WHERE scope_id = ? AND created_at < ?")
            .bind(scope_id)
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn load_all(&self) -> Result<Vec<WarnRecord>, ModerationError> {
        let rows = sqlx::query("SELECT * FROM warns")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows.iter().map(Self::row_to_warn).collect())
    }
}

#[async_trait]
impl WordListStore for SqliteModerationStore {
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
        let result = sqlx::query(
            r#"
            INSERT INTO word_list (scope_id, word, added_by, added_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(scope_id, word) DO NOTHING
            "#,
        )
        .bind(scope_id.unwrap_or(""))
        .bind(&word)
        .bind(added_by)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_word(
        &self,
        scope_id: Option<&str>,
        word: &str,
    ) -> Result<bool, ModerationError> {
        let result = sqlx::query("DELETE FROM word_list WHERE scope_id = ? AND word = ?")
            .bind(scope_id.unwrap_or(""))
            .bind(normalize_word(word))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_entries(
        &self,
        scope_id: Option<&str>,
    ) -> Result<Vec<WordEntry>, ModerationError> {
        let rows = sqlx::query("SELECT * FROM word_list WHERE scope_id = ? ORDER BY word")
            .bind(scope_id.unwrap_or(""))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let scope: String = row.get("scope_id");
                let added_raw: String = row.get("added_at");
                WordEntry {
                    scope_id: (!scope.is_empty()).then_some(scope),
                    word: row.get("word"),
                    added_by: row.get("added_by"),
                    added_at: parse_timestamp(&added_raw),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteModerationStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteModerationStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = store().await;

        let first = store.get_or_create(PolicyType::Spam, "g1").await.unwrap();
        let second = store.get_or_create(PolicyType::Spam, "g1").await.unwrap();

        assert_eq!(first.scope_id, second.scope_id);
        assert_eq!(first.action, second.action);
        assert_eq!(first.message_limit, second.message_limit);
    }

    #[tokio::test]
    async fn update_persists_patched_fields() {
        let store = store().await;

        let patch = PolicyPatch {
            enabled: Some(true),
            action: Some(PolicyAction::Warn),
            warn_limit: Some(5),
            ..Default::default()
        };
        store.update(PolicyType::Link, "g1", &patch).await.unwrap();

        let config = store.get_or_create(PolicyType::Link, "g1").await.unwrap();
        assert!(config.enabled);
        assert_eq!(config.action, PolicyAction::Warn);
        assert_eq!(config.warn_limit, 5);
    }

    #[tokio::test]
    async fn list_enabled_filters_and_orders() {
        let store = store().await;
        store
            .update(PolicyType::Link, "g1", &PolicyPatch::enabled(true))
            .await
            .unwrap();
        store
            .update(PolicyType::Link, "g2", &PolicyPatch::enabled(true))
            .await
            .unwrap();
        store.get_or_create(PolicyType::Link, "g3").await.unwrap();
        store
            .update(PolicyType::Link, "g1", &PolicyPatch::enabled(true))
            .await
            .unwrap();

        let enabled = store.list_enabled(PolicyType::Link).await.unwrap();
        let scopes: Vec<&str> = enabled.iter().map(|c| c.scope_id.as_str()).collect();
        assert_eq!(scopes, vec!["g1", "g2"]);
    }

    #[tokio::test]
    async fn warn_lifecycle() {
        let store = store().await;

        let first = store
            .insert("g1", "u1", "admin", "flood", Utc::now())
            .await
            .unwrap();
        store
            .insert("g1", "u1", "admin", "links", Utc::now())
            .await
            .unwrap();
        assert_eq!(store.count_for("g1", "u1").await.unwrap(), 2);

        let list = store.list_for("g1", "u1").await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].reason, "links");

        let removed = store.remove(first.id).await.unwrap();
        assert_eq!(removed.map(|r| r.id), Some(first.id));
        assert!(store.remove(first.id).await.unwrap().is_none());
        assert_eq!(store.count_for("g1", "u1").await.unwrap(), 1);

        store.clear_subject("g1", "u1").await.unwrap();
        assert_eq!(store.count_for("g1", "u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_older_than_scoped_sweep() {
        let store = store().await;
        let old = Utc::now() - chrono::Duration::days(30);

        store.insert("g1", "u1", "admin", "old", old).await.unwrap();
        store
            .insert("g1", "u1", "admin", "fresh", Utc::now())
            .await
            .unwrap();
        store.insert("g2", "u1", "admin", "old", old).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::days(7);
        let deleted = store.delete_older_than("g1", cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count_for("g1", "u1").await.unwrap(), 1);
        assert_eq!(store.count_for("g2", "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn word_list_global_sentinel_round_trips() {
        let store = store().await;

        assert!(store.add_word(None, "  SPOILER ", "mod").await.unwrap());
        assert!(!store.add_word(None, "spoiler", "mod").await.unwrap());
        assert!(store.add_word(Some("g1"), "plant", "mod").await.unwrap());

        let global = store.list_entries(None).await.unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].scope_id, None);
        assert_eq!(global[0].word, "spoiler");

        let mut words = store.words_for("g1").await.unwrap();
        words.sort();
        assert_eq!(words, vec!["plant".to_string(), "spoiler".to_string()]);
    }
}
