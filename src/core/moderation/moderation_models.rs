// Moderation domain models - data structures shared by every policy.
//
// These are pure domain types with no chat-platform dependencies.
// The transport layer converts these to platform-specific actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    /// The persistence backend failed or timed out. Callers must treat a
    /// failed configuration lookup as "do not enforce", never as a crash.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// ============================================================================
// POLICY TYPES
// ============================================================================

/// Every moderation feature is one instance of the same config shape,
/// parameterized by this type. Never duplicate a module per policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    /// Delete/punish messages containing links
    Link,
    /// Message-rate flooding
    Spam,
    /// Mass-mention messages
    Tag,
    /// Sticker messages
    Sticker,
    /// Trigger-word / profanity matching
    BadWord,
    /// Incoming calls to the bot
    Call,
    /// Messages that mention the bot's status broadcast
    StatusMention,
    /// Manual warn system (limits, auto-expiry)
    Warn,
    /// Welcome/goodbye announcements on member join/leave
    GroupEvents,
}

impl PolicyType {
    /// All policy types, in the order scope teardown walks them.
    pub const ALL: [PolicyType; 9] = [
        PolicyType::Link,
        PolicyType::Spam,
        PolicyType::Tag,
        PolicyType::Sticker,
        PolicyType::BadWord,
        PolicyType::Call,
        PolicyType::StatusMention,
        PolicyType::Warn,
        PolicyType::GroupEvents,
    ];

    /// Stable key used by storage backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::Link => "link",
            PolicyType::Spam => "spam",
            PolicyType::Tag => "tag",
            PolicyType::Sticker => "sticker",
            PolicyType::BadWord => "bad_word",
            PolicyType::Call => "call",
            PolicyType::StatusMention => "status_mention",
            PolicyType::Warn => "warn",
            PolicyType::GroupEvents => "group_events",
        }
    }

    pub fn from_str_key(s: &str) -> Option<PolicyType> {
        PolicyType::ALL.iter().copied().find(|p| p.as_str() == s)
    }

    /// Whether the `exempt_admins` flag applies to this policy.
    /// Call and group-event policies have no per-sender admin concept.
    pub fn supports_admin_exemption(&self) -> bool {
        !matches!(self, PolicyType::Call | PolicyType::GroupEvents)
    }
}

impl std::fmt::Display for PolicyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ACTIONS & DECISIONS
// ============================================================================

/// What a policy is configured to do when it triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    /// Delete the offending message
    Delete,
    /// Remove the member from the group
    Remove,
    /// Issue a warning; escalates to a kick at the warn limit
    Warn,
    /// Block the sender bot-wide
    Block,
    /// Kick the member (removable, may rejoin)
    Kick,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::Delete => "delete",
            PolicyAction::Remove => "remove",
            PolicyAction::Warn => "warn",
            PolicyAction::Block => "block",
            PolicyAction::Kick => "kick",
        }
    }

    pub fn from_str_key(s: &str) -> Option<PolicyAction> {
        match s {
            "delete" => Some(PolicyAction::Delete),
            "remove" => Some(PolicyAction::Remove),
            "warn" => Some(PolicyAction::Warn),
            "block" => Some(PolicyAction::Block),
            "kick" => Some(PolicyAction::Kick),
            _ => None,
        }
    }
}

/// What the facade decided for one incoming event. Always a value, never a
/// side effect - the transport collaborator enacts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No violation, or policy disabled/exempt - do nothing
    None,
    /// Warning issued; `count` of `limit` warns used
    Warned { count: u32, limit: u32 },
    Delete,
    Remove,
    Block,
    Kick,
}

impl Decision {
    pub fn is_violation(&self) -> bool {
        !matches!(self, Decision::None)
    }
}

// ============================================================================
// MATCH STRICTNESS
// ============================================================================

/// How aggressively the text matcher hunts for trigger words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrictness {
    /// Word-boundary match only - no partial-word false positives
    Strict,
    /// Boundary-ish match, plus single-letter leetspeak variants
    Normal,
    /// Case-insensitive substring - matches inside unrelated words too
    Loose,
}

impl MatchStrictness {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrictness::Strict => "strict",
            MatchStrictness::Normal => "normal",
            MatchStrictness::Loose => "loose",
        }
    }

    pub fn from_str_key(s: &str) -> Option<MatchStrictness> {
        match s {
            "strict" => Some(MatchStrictness::Strict),
            "normal" => Some(MatchStrictness::Normal),
            "loose" => Some(MatchStrictness::Loose),
            _ => None,
        }
    }
}

// ============================================================================
// POLICY CONFIG
// ============================================================================

/// Per-(policy, scope) configuration record.
///
/// One shape for every policy type; fields a given policy does not use keep
/// their defaults. Created lazily on first access, mutated via
/// [`PolicyPatch`], deleted only on scope teardown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub policy: PolicyType,
    /// Group id, or a bot-wide scope key for global policies
    pub scope_id: String,
    pub enabled: bool,
    pub action: PolicyAction,
    /// Bad-word matching strictness
    pub strictness: MatchStrictness,
    /// Warnings before the warn action escalates to a kick
    pub warn_limit: u32,
    /// Messages allowed inside the spam window
    pub message_limit: u32,
    /// Spam window length in seconds
    pub time_window_secs: u64,
    /// Mentions allowed in a single message before anti-tag triggers
    pub allowed_mentions: u32,
    /// Warns older than this many days are swept; 0 = never expire
    pub auto_reset_days: u32,
    pub exempt_admins: bool,
    /// Whether welcome messages mention promotions/links (group events)
    pub show_promotions: bool,
    pub welcome_message: Option<String>,
    pub goodbye_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyConfig {
    /// The hard-coded defaults a record is created with on first access.
    pub fn default_for(policy: PolicyType, scope_id: &str) -> Self {
        let mut config = Self {
            policy,
            scope_id: scope_id.to_string(),
            enabled: false,
            action: PolicyAction::Delete,
            strictness: MatchStrictness::Normal,
            warn_limit: 3,
            message_limit: 5,
            time_window_secs: 5,
            allowed_mentions: 5,
            auto_reset_days: 0,
            exempt_admins: true,
            show_promotions: false,
            welcome_message: None,
            goodbye_message: None,
            updated_at: Utc::now(),
        };

        match policy {
            PolicyType::Link => config.action = PolicyAction::Delete,
            PolicyType::Spam => {
                config.action = PolicyAction::Warn;
            }
            PolicyType::Tag => config.action = PolicyAction::Delete,
            PolicyType::Sticker => config.action = PolicyAction::Delete,
            PolicyType::BadWord => config.action = PolicyAction::Delete,
            PolicyType::Call => {
                config.action = PolicyAction::Block;
                config.exempt_admins = false;
            }
            PolicyType::StatusMention => config.action = PolicyAction::Delete,
            PolicyType::Warn => {
                config.action = PolicyAction::Warn;
                config.auto_reset_days = 0;
            }
            PolicyType::GroupEvents => {
                config.action = PolicyAction::Warn; // unused by this policy
                config.exempt_admins = false;
            }
        }

        config
    }
}

/// Partial-field update for a [`PolicyConfig`]. `None` fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyPatch {
    pub enabled: Option<bool>,
    pub action: Option<PolicyAction>,
    pub strictness: Option<MatchStrictness>,
    pub warn_limit: Option<u32>,
    pub message_limit: Option<u32>,
    pub time_window_secs: Option<u64>,
    pub allowed_mentions: Option<u32>,
    pub auto_reset_days: Option<u32>,
    pub exempt_admins: Option<bool>,
    pub show_promotions: Option<bool>,
    pub welcome_message: Option<Option<String>>,
    pub goodbye_message: Option<Option<String>>,
}

impl PolicyPatch {
    /// Apply this patch to a config, bumping `updated_at`.
    pub fn apply(&self, config: &mut PolicyConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(action) = self.action {
            config.action = action;
        }
        if let Some(strictness) = self.strictness {
            config.strictness = strictness;
        }
        if let Some(warn_limit) = self.warn_limit {
            config.warn_limit = warn_limit;
        }
        if let Some(message_limit) = self.message_limit {
            config.message_limit = message_limit;
        }
        if let Some(time_window_secs) = self.time_window_secs {
            config.time_window_secs = time_window_secs;
        }
        if let Some(allowed_mentions) = self.allowed_mentions {
            config.allowed_mentions = allowed_mentions;
        }
        if let Some(auto_reset_days) = self.auto_reset_days {
            config.auto_reset_days = auto_reset_days;
        }
        if let Some(exempt_admins) = self.exempt_admins {
            config.exempt_admins = exempt_admins;
        }
        if let Some(show_promotions) = self.show_promotions {
            config.show_promotions = show_promotions;
        }
        if let Some(ref welcome) = self.welcome_message {
            config.welcome_message = welcome.clone();
        }
        if let Some(ref goodbye) = self.goodbye_message {
            config.goodbye_message = goodbye.clone();
        }
        config.updated_at = Utc::now();
    }

    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// A persisted warning. Append-only; removable by id, subject or scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarnRecord {
    pub id: i64,
    pub scope_id: String,
    pub subject_id: String,
    pub issued_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// One trigger word in a scoped or global word list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    /// `None` = global list shared by every scope
    pub scope_id: Option<String>,
    /// Case-folded and trimmed before storage
    pub word: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

// ============================================================================
// EVENTS
// ============================================================================

/// One incoming message as the transport layer describes it.
///
/// Link/sticker/status-mention presence are simple booleans the caller
/// supplies; the core never parses platform message formats.
#[derive(Debug, Clone, Default)]
pub struct MessageEvent {
    pub scope_id: String,
    pub subject_id: String,
    pub is_admin: bool,
    pub text: String,
    pub mention_count: u32,
    pub has_link: bool,
    pub is_sticker: bool,
    pub mentions_status: bool,
}

/// Membership events the group-events policy can announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEventKind {
    MemberJoined,
    MemberLeft,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_type_keys_round_trip() {
        for policy in PolicyType::ALL {
            assert_eq!(PolicyType::from_str_key(policy.as_str()), Some(policy));
        }
        assert_eq!(PolicyType::from_str_key("nonsense"), None);
    }

    #[test]
    fn defaults_differ_per_policy() {
        let link = PolicyConfig::default_for(PolicyType::Link, "g1");
        let call = PolicyConfig::default_for(PolicyType::Call, "g1");

        assert_eq!(link.action, PolicyAction::Delete);
        assert_eq!(call.action, PolicyAction::Block);
        assert!(link.exempt_admins);
        assert!(!call.exempt_admins);
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut config = PolicyConfig::default_for(PolicyType::Spam, "g1");
        let before = config.clone();

        let patch = PolicyPatch {
            enabled: Some(true),
            message_limit: Some(10),
            ..Default::default()
        };
        patch.apply(&mut config);

        assert!(config.enabled);
        assert_eq!(config.message_limit, 10);
        assert_eq!(config.action, before.action);
        assert_eq!(config.warn_limit, before.warn_limit);
        assert!(config.updated_at >= before.updated_at);
    }

    #[test]
    fn patch_can_clear_welcome_message() {
        let mut config = PolicyConfig::default_for(PolicyType::GroupEvents, "g1");
        config.welcome_message = Some("hi {user}".to_string());

        let patch = PolicyPatch {
            welcome_message: Some(None),
            ..Default::default()
        };
        patch.apply(&mut config);

        assert_eq!(config.welcome_message, None);
    }

    #[test]
    fn admin_exemption_support_per_policy() {
        assert!(PolicyType::Link.supports_admin_exemption());
        assert!(PolicyType::BadWord.supports_admin_exemption());
        assert!(!PolicyType::Call.supports_admin_exemption());
        assert!(!PolicyType::GroupEvents.supports_admin_exemption());
    }
}
