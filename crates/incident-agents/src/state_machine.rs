//! Pipeline State Machine — explicit stages and legal transition guards.
//!
//! Every incident run walks the stage graph below. Each `advance()` call
//! validates the edge and appends it to the transition log, which is copied
//! into the RCA document so a reader can see how far the run got.
//!
//! ```text
//! Received → Classifying → Investigating → GatingAction ─┬→ Remediating ─┐
//!                                                        └───────────────┴→ Deciding
//! Deciding → GatingClose → Recording → Completed
//!
//! any non-terminal → Recording   (early exit)
//! any non-terminal → Aborted     (deadline / cancellation)
//! ```

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use coordination::StageTransition;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Classifying,
    Investigating,
    GatingAction,
    Remediating,
    Deciding,
    GatingClose,
    Recording,
    /// Terminal: RCA recorded.
    Completed,
    /// Terminal: run interrupted before it could finish.
    Aborted,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Classifying => "classifying",
            Self::Investigating => "investigating",
            Self::GatingAction => "gating_action",
            Self::Remediating => "remediating",
            Self::Deciding => "deciding",
            Self::GatingClose => "gating_close",
            Self::Recording => "recording",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_legal_transition(from: PipelineStage, to: PipelineStage) -> bool {
    use PipelineStage::*;

    if from.is_terminal() {
        return false;
    }
    if matches!(to, Recording | Aborted) && from != Recording {
        return true;
    }

    matches!(
        (from, to),
        (Received, Classifying)
            | (Classifying, Investigating)
            | (Investigating, GatingAction)
            | (GatingAction, Remediating)
            | (GatingAction, Deciding)
            | (Remediating, Deciding)
            | (Deciding, GatingClose)
            | (Recording, Completed)
            | (Recording, Aborted)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: PipelineStage,
    pub to: PipelineStage,
    /// Milliseconds since the run started
    pub elapsed_ms: u64,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IllegalTransition {
    pub from: PipelineStage,
    pub to: PipelineStage,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal stage transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Stage tracker for one incident run.
pub struct StateMachine {
    current: PipelineStage,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: PipelineStage::Received,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.current
    }

    /// Move to `to`, or fail if the edge is not in the stage graph.
    pub fn advance(&mut self, to: PipelineStage, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, "stage transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            at: Utc::now(),
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// Jump to `Aborted` from any non-terminal stage.
    pub fn abort(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(PipelineStage::Aborted, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Transition log in the form stored on RCA documents
    pub fn to_stage_transitions(&self) -> Vec<StageTransition> {
        self.transitions
            .iter()
            .map(|t| StageTransition {
                from: t.from.to_string(),
                to: t.to.to_string(),
                reason: t.reason.clone().unwrap_or_default(),
                at: t.at,
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        let path: Vec<&str> = self.transitions.iter().map(|t| t.to.as_str()).collect();
        let mut out = format!(
            "{} → {} ({}ms, {} transitions)",
            PipelineStage::Received,
            self.current,
            self.created_at.elapsed().as_millis(),
            self.transitions.len(),
        );
        if !path.is_empty() {
            out.push_str(&format!(" [{}]", path.join(" → ")));
        }
        out
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineStage::*;

    #[test]
    fn test_happy_path_with_remediation() {
        let mut sm = StateMachine::new();
        for stage in [
            Classifying,
            Investigating,
            GatingAction,
            Remediating,
            Deciding,
            GatingClose,
            Recording,
            Completed,
        ] {
            sm.advance(stage, None).unwrap();
        }
        assert!(sm.is_terminal());
        assert_eq!(sm.transitions().len(), 8);
    }

    #[test]
    fn test_gate_skip_bypasses_remediation() {
        let mut sm = StateMachine::new();
        sm.advance(Classifying, None).unwrap();
        sm.advance(Investigating, None).unwrap();
        sm.advance(GatingAction, None).unwrap();
        sm.advance(Deciding, Some("skip_to_escalate")).unwrap();
        assert_eq!(sm.current(), Deciding);
    }

    #[test]
    fn test_early_exit_to_recording() {
        let mut sm = StateMachine::new();
        sm.advance(Recording, Some("invalid incident")).unwrap();
        sm.advance(Completed, None).unwrap();
        assert_eq!(sm.to_stage_transitions()[0].reason, "invalid incident");
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut sm = StateMachine::new();
        let err = sm.advance(Remediating, None).unwrap_err();
        assert_eq!(err.from, Received);
        assert_eq!(err.to, Remediating);
        assert_eq!(sm.current(), Received);

        sm.advance(Classifying, None).unwrap();
        assert!(sm.advance(Classifying, None).is_err());
    }

    #[test]
    fn test_recording_cannot_loop() {
        let mut sm = StateMachine::new();
        sm.advance(Recording, None).unwrap();
        assert!(sm.advance(Recording, None).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut sm = StateMachine::new();
        sm.advance(Classifying, None).unwrap();
        sm.abort("deadline exceeded").unwrap();
        assert!(sm.is_terminal());
        assert!(sm.advance(Recording, None).is_err());
        assert!(sm.abort("again").is_err());
    }

    #[test]
    fn test_summary_lists_path() {
        let mut sm = StateMachine::new();
        sm.advance(Classifying, None).unwrap();
        sm.advance(Investigating, None).unwrap();
        let summary = sm.summary();
        assert!(summary.contains("[classifying → investigating]"), "{summary}");
    }

    #[test]
    fn test_stage_serde_snake_case() {
        assert_eq!(serde_json::to_string(&GatingAction).unwrap(), "\"gating_action\"");
    }
}
