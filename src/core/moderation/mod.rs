// Core moderation module - policy configuration, warn tracking, rate
// windows and text matching, all platform-agnostic.

pub mod moderation_models;
pub mod moderation_service;
pub mod policy_store;
pub mod rate_window;
pub mod text_matcher;
pub mod warn_tracker;

pub use moderation_models::*;
pub use moderation_service::*;
pub use policy_store::*;
pub use rate_window::*;
pub use warn_tracker::*;
