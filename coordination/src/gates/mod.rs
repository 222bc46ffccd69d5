//! Safety Gates — deterministic checks that only ever reduce automation
//!
//! ```text
//!   investigation ──▶ PreActionGate ──proceed──▶ remediation
//!                          │
//!                          └─skip──▶ escalate / human_review
//!
//!   policy decision ──▶ PreCloseGate ──proceed──▶ finalize
//!                          │
//!                          └─violation──▶ human_review
//! ```
//!
//! Both gates are pure functions of their inputs: evaluating twice on the
//! same inputs yields the same `GateDecision`.

pub mod pre_action;
pub mod pre_close;
pub mod report;

pub use pre_action::PreActionGate;
pub use pre_close::PreCloseGate;
pub use report::{GateConfig, GateDecision, GateKind, GateOutcome, GateRule, Guardrail};
