// Moderation facade - composes the policy store, word lists, warn tracker
// and rate window to turn one incoming event into a `Decision`.
//
// NO chat-platform dependencies here - just domain logic. The facade never
// performs a side effect; the transport collaborator enacts what it decides.
//
// Failure posture: a configuration read that fails means "do not enforce"
// (log and decide `None`), never a crash. Warn persistence failures do
// propagate, because silently losing a warning would skew escalation.

use super::moderation_models::{
    Decision, GroupEventKind, MessageEvent, ModerationError, PolicyAction, PolicyConfig,
    PolicyType,
};
use super::policy_store::{PolicyStore, WordListStore};
use super::rate_window::RateWindow;
use super::text_matcher;
use super::warn_tracker::{WarnStore, WarnTracker};
use chrono::Utc;

/// One moderation context: constructed once at process start and handed to
/// the transport layer. Owns all transient state - no module-level globals.
pub struct ModerationService<P: PolicyStore, W: WarnStore, L: WordListStore> {
    policies: P,
    words: L,
    warns: WarnTracker<W>,
    rates: RateWindow,
}

impl<P: PolicyStore, W: WarnStore, L: WordListStore> ModerationService<P, W, L> {
    pub fn new(policies: P, words: L, warn_store: W) -> Self {
        Self {
            policies,
            words,
            warns: WarnTracker::new(warn_store),
            rates: RateWindow::new(),
        }
    }

    /// Startup: rebuild the warn-count cache from the persistent store.
    pub async fn init(&self) -> Result<(), ModerationError> {
        self.warns.rebuild_cache().await
    }

    /// Policy configuration access, for admin/settings commands.
    pub fn policies(&self) -> &P {
        &self.policies
    }

    /// Word-list access, for moderator add/remove commands.
    pub fn words(&self) -> &L {
        &self.words
    }

    /// Warn bookkeeping (manual warns, listing, revoking).
    pub fn warns(&self) -> &WarnTracker<W> {
        &self.warns
    }

    /// Evaluate one message against one policy.
    pub async fn check_message(
        &self,
        policy: PolicyType,
        event: &MessageEvent,
    ) -> Result<Decision, ModerationError> {
        let Some(config) = self.load_config(policy, &event.scope_id).await else {
            return Ok(Decision::None);
        };

        if !config.enabled {
            return Ok(Decision::None);
        }
        if config.exempt_admins && event.is_admin && policy.supports_admin_exemption() {
            return Ok(Decision::None);
        }

        let violated = match policy {
            PolicyType::Link => event.has_link,
            PolicyType::Sticker => event.is_sticker,
            PolicyType::StatusMention => event.mentions_status,
            PolicyType::Tag => event.mention_count > config.allowed_mentions,
            PolicyType::Spam => {
                // message_limit is the allowance inside the window; the
                // message that pushes the count past it is the violation.
                let now = Utc::now();
                self.rates.record(&event.scope_id, &event.subject_id, now);
                let count = self.rates.count_within(
                    &event.scope_id,
                    &event.subject_id,
                    config.time_window_secs,
                    now,
                );
                count > config.message_limit as usize
            }
            PolicyType::BadWord => {
                let words = match self.words.words_for(&event.scope_id).await {
                    Ok(words) => words,
                    Err(err) => {
                        tracing::warn!(scope = %event.scope_id, "word list unavailable, not enforcing: {err}");
                        return Ok(Decision::None);
                    }
                };
                text_matcher::matches(&event.text, &words, config.strictness)
            }
            // Not message policies; nothing to match on.
            PolicyType::Call | PolicyType::Warn | PolicyType::GroupEvents => false,
        };

        if !violated {
            return Ok(Decision::None);
        }

        self.enforce(&config, &event.scope_id, &event.subject_id)
            .await
    }

    /// Evaluate an incoming call against the anti-call policy. Call counts
    /// live only in the rate window: best-effort, reset on restart.
    pub async fn check_call(
        &self,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<Decision, ModerationError> {
        let Some(config) = self.load_config(PolicyType::Call, scope_id).await else {
            return Ok(Decision::None);
        };
        if !config.enabled {
            return Ok(Decision::None);
        }

        self.rates.record(scope_id, subject_id, Utc::now());
        self.enforce(&config, scope_id, subject_id).await
    }

    /// Welcome/goodbye template for a membership event, when the
    /// group-events policy is enabled and a template is set.
    pub async fn event_reply(&self, scope_id: &str, kind: GroupEventKind) -> Option<String> {
        let config = self.load_config(PolicyType::GroupEvents, scope_id).await?;
        if !config.enabled {
            return None;
        }
        match kind {
            GroupEventKind::MemberJoined => config.welcome_message,
            GroupEventKind::MemberLeft => config.goodbye_message,
        }
    }

    /// Periodic sweep: expire warns older than each scope's configured age.
    /// Failures are logged and skipped; the sweep never takes the process
    /// down or touches the cache before a delete has succeeded.
    pub async fn sweep_expired_warns(&self) -> u64 {
        let configs = match self.policies.list_enabled(PolicyType::Warn).await {
            Ok(configs) => configs,
            Err(err) => {
                tracing::warn!("warn expiry sweep skipped, store unavailable: {err}");
                return 0;
            }
        };

        let mut total = 0;
        for config in configs.iter().filter(|c| c.auto_reset_days > 0) {
            match self
                .warns
                .expire_older_than(&config.scope_id, config.auto_reset_days)
                .await
            {
                Ok(deleted) => {
                    if deleted > 0 {
                        tracing::debug!(scope = %config.scope_id, deleted, "expired old warns");
                    }
                    total += deleted;
                }
                Err(err) => {
                    tracing::warn!(scope = %config.scope_id, "warn expiry failed: {err}");
                }
            }
        }
        total
    }

    /// Scope teardown (bot removed from the group): drop every policy
    /// config, all warns and all transient windows for the scope.
    pub async fn teardown_scope(&self, scope_id: &str) -> Result<(), ModerationError> {
        for policy in PolicyType::ALL {
            self.policies.delete(policy, scope_id).await?;
        }
        self.warns.clear_scope(scope_id).await?;
        self.rates.clear_scope(scope_id);
        Ok(())
    }

    /// Resolve a config, treating storage failure as "do not enforce".
    async fn load_config(&self, policy: PolicyType, scope_id: &str) -> Option<PolicyConfig> {
        match self.policies.get_or_create(policy, scope_id).await {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!(%policy, scope = %scope_id, "config unavailable, not enforcing: {err}");
                None
            }
        }
    }

    /// Map a triggered policy to its decision. Warn actions escalate
    /// through the tracker; direct actions return immediately.
    async fn enforce(
        &self,
        config: &PolicyConfig,
        scope_id: &str,
        subject_id: &str,
    ) -> Result<Decision, ModerationError> {
        match config.action {
            PolicyAction::Warn => {
                let issued_by = format!("auto:{}", config.policy);
                let (_, count) = self
                    .warns
                    .issue(scope_id, subject_id, &issued_by, violation_reason(config.policy))
                    .await?;

                if count >= config.warn_limit {
                    self.warns.clear(scope_id, subject_id).await?;
                    Ok(Decision::Kick)
                } else {
                    Ok(Decision::Warned {
                        count,
                        limit: config.warn_limit,
                    })
                }
            }
            PolicyAction::Delete => Ok(Decision::Delete),
            PolicyAction::Remove => Ok(Decision::Remove),
            PolicyAction::Block => Ok(Decision::Block),
            PolicyAction::Kick => Ok(Decision::Kick),
        }
    }
}

/// Human-readable reason recorded on auto-issued warns.
fn violation_reason(policy: PolicyType) -> &'static str {
    match policy {
        PolicyType::Link => "Posting links is not allowed",
        PolicyType::Spam => "Sending messages too quickly",
        PolicyType::Tag => "Too many mentions in one message",
        PolicyType::Sticker => "Stickers are not allowed",
        PolicyType::BadWord => "Message contained a forbidden word",
        PolicyType::Call => "Calling the bot is not allowed",
        PolicyType::StatusMention => "Status mentions are not allowed",
        PolicyType::Warn => "Manual warning",
        PolicyType::GroupEvents => "Group event",
    }
}
