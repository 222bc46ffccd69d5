//! Pipeline agents: classifier, investigator and action executor.
//!
//! The investigator and executor are two execution strategies over the same
//! capability interface; the taxonomy decides what each may call.

pub mod classifier;
pub mod executor;
pub mod investigator;

pub use classifier::{CapabilityClassifier, IntentClassifier, KeywordClassifier, CLASSIFY_CAPABILITY};
pub use executor::{permanent_failure_indicator, ActionExecutor, INTERRUPTED_DETAIL};
pub use investigator::Investigator;
