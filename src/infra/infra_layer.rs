// The infra module contains implementations of core traits.
// Each backend goes in its own submodule.

#[path = "moderation/mod.rs"]
pub mod moderation;
