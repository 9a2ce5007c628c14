// Moderation-policy core for group-chat bots.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases, files, memory)
//
// The crate never talks to a chat platform. A transport adapter feeds it
// incoming events and enacts the `Decision` values it returns (send a
// warning, delete the message, remove the member, block the sender).

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;

pub use crate::core::moderation::{
    Decision, GroupEventKind, MatchStrictness, MessageEvent, ModerationError, ModerationService,
    PolicyAction, PolicyConfig, PolicyPatch, PolicyStore, PolicyType, RateWindow, WarnRecord,
    WarnStore, WarnTracker, WordEntry, WordListStore,
};
