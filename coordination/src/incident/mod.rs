//! Incident model
//!
//! The raw ticket record and the classifier's verdict on it.

pub mod types;

pub use types::{parse_incidents, ClassificationResult, ClassificationSource, Incident};
