//! Policy Engine
//!
//! Turns classification confidence, investigation quality and remediation
//! outcomes into one of four decisions. Weights and thresholds are
//! configuration, never constants.

pub mod engine;

pub use engine::{PolicyConfig, PolicyDecision, PolicyEngine, PolicyWeights, ScoreBreakdown};
