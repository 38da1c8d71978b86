// Core classifier module - image classification business logic.
// Following the same pattern as the moderation module.

pub mod classifier_models;
pub mod classifier_service;

pub use classifier_models::*;
pub use classifier_service::*;
