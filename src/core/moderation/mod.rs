// Core moderation module - the content-safety gate business logic.
// Following the same pattern as the classifier module.

pub mod moderation_models;
pub mod moderation_service;

pub use moderation_models::*;
pub use moderation_service::*;
