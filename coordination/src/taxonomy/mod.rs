//! Intent Taxonomy — static authorization table
//!
//! Maps an intent name to the investigation capabilities it authorizes, the
//! remediation capabilities it authorizes, and an optional forced decision.
//! Model-driven tool selection reduces to a lookup here: a capability that is
//! not listed for the classified intent is never invoked.
//!
//! ```text
//! intent ──▶ IntentEntry
//!              ├─ investigation_capabilities  (concurrent, best-effort)
//!              ├─ remediation_capabilities    (sequential, fail-fast)
//!              └─ forced_override             (bypasses scoring)
//! ```

pub mod decision;
pub mod table;

pub use decision::Decision;
pub use table::{IntentEntry, IntentTaxonomy, RemediationCapability, TaxonomyFile, UNKNOWN_INTENT};
