// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "classifier/mod.rs"]
pub mod classifier;

#[path = "moderation/mod.rs"]
pub mod moderation;
