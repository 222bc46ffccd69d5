//! Investigator — concurrent, best-effort evidence gathering.
//!
//! ```text
//!   IntentEntry.investigation_capabilities
//!        │
//!        ├─ JoinSet::spawn(invoke_timed(cap_0))  ┐
//!        ├─ JoinSet::spawn(invoke_timed(cap_1))  ├─ Semaphore(max_concurrent)
//!        └─ JoinSet::spawn(invoke_timed(cap_n))  ┘
//!        │
//!        ▼
//!   InvestigationReport (taxonomy order, not completion order)
//! ```
//!
//! A failed, timed-out or panicked call is recorded as a failed result.
//! Investigation never fails the pipeline.

use std::sync::Arc;
use std::time::Duration;

use coordination::{CapabilityResult, ErrorKind, Incident, IntentEntry, InvestigationReport};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::capabilities::{invoke_timed, AuthorizedProvider, CapabilityProvider, Scope};

pub struct Investigator {
    provider: Arc<dyn CapabilityProvider>,
    timeout: Duration,
    max_concurrent: usize,
}

impl Investigator {
    pub fn new(provider: Arc<dyn CapabilityProvider>, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            provider,
            timeout,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn investigate(&self, entry: &IntentEntry, incident: &Incident) -> InvestigationReport {
        if entry.skip_investigation {
            info!(
                incident_id = %incident.id,
                intent = %entry.intent,
                "investigation skipped for intent"
            );
            return InvestigationReport::skipped(
                &entry.intent,
                format!("investigation is skipped for intent `{}`", entry.intent),
            );
        }

        let capabilities = &entry.investigation_capabilities;
        let mut report = InvestigationReport::new(&entry.intent);
        if capabilities.is_empty() {
            return report;
        }

        let provider: Arc<dyn CapabilityProvider> = Arc::new(AuthorizedProvider::new(
            self.provider.clone(),
            entry,
            Scope::Investigation,
        ));
        let params = Arc::new(incident.capability_parameters(&entry.intent));
        let sem = Arc::new(Semaphore::new(self.max_concurrent));
        let timeout = self.timeout;

        // Slots default to a failure so a panicked task still leaves a record.
        let mut slots: Vec<CapabilityResult> = capabilities
            .iter()
            .map(|name| {
                CapabilityResult::failed(name, ErrorKind::Panicked, "invocation task aborted", 0)
            })
            .collect();

        let mut join_set: JoinSet<(usize, CapabilityResult)> = JoinSet::new();
        for (index, name) in capabilities.iter().cloned().enumerate() {
            let provider = provider.clone();
            let params = params.clone();
            let sem = sem.clone();
            join_set.spawn(async move {
                let _permit = sem.acquire().await.ok();
                let result = invoke_timed(provider.as_ref(), &name, &params, timeout).await;
                (index, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = result,
                Err(e) => warn!(incident_id = %incident.id, error = %e, "investigation task panicked"),
            }
        }

        for result in slots {
            report.push(result);
        }
        info!(
            incident_id = %incident.id,
            intent = %entry.intent,
            succeeded = report.successful_count(),
            failed = report.failed_count(),
            "investigation complete"
        );
        report
    }
}
