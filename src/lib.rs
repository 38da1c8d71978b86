// message_guard - AI content-safety moderation gate.
//
// **Architecture Overview:**
// - `core/` = Business logic (transport- and storage-agnostic)
// - `infra/` = Implementations of core traits (SQLite stores, HTTP clients)
//
// Every outbound image attachment passes through the `ModerationGate`
// before the messaging path may deliver it: the classifier produces a
// verdict, flagged content is blocked and recorded in the violation ledger,
// and repeated violations inside a rolling 24-hour window trigger a
// one-shot escalation notice.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pair of mod.rs files that both look the same.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;
