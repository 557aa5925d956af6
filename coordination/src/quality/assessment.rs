//! Quality assessment entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::AgentId;

/// Identifier of a task under quality review.
pub type TaskId = String;

/// Assessment lifecycle.
///
/// `validating → {approved, refining}`, `refining → {approved, validating,
/// awaiting_human, failed}`, `awaiting_human → {approved, refining, failed}`.
/// Approved and failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Validating,
    Refining,
    AwaitingHuman,
    Approved,
    Failed,
}

impl AssessmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Failed)
    }
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validating => write!(f, "validating"),
            Self::Refining => write!(f, "refining"),
            Self::AwaitingHuman => write!(f, "awaiting_human"),
            Self::Approved => write!(f, "approved"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One validator's submitted agreement score and feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub validator: AgentId,
    /// Agreement with the output, 0.0–1.0.
    pub agreement: f64,
    pub feedback: String,
    pub submitted_at: DateTime<Utc>,
}

/// A task output under quality review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub task_id: TaskId,
    pub producer: AgentId,
    /// Latest output; refined submissions replace it.
    pub output: Value,
    /// Producer-declared confidence of the latest output.
    pub confidence: f64,
    pub status: AssessmentStatus,
    /// Refinement iterations consumed so far.
    pub iteration: u32,
    /// Validators selected for the current validation cycle.
    pub validators: Vec<AgentId>,
    /// Results submitted during the current validation cycle.
    pub validations: Vec<ValidationRecord>,
    /// True when the conclusion came from fail-open auto-approval.
    pub fail_open: bool,
    pub registered_at: DateTime<Utc>,
    pub concluded_at: Option<DateTime<Utc>>,
}

impl QualityAssessment {
    pub fn new(
        task_id: impl Into<TaskId>,
        producer: AgentId,
        output: Value,
        confidence: f64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            producer,
            output,
            confidence,
            status: AssessmentStatus::Validating,
            iteration: 0,
            validators: Vec::new(),
            validations: Vec::new(),
            fail_open: false,
            registered_at: Utc::now(),
            concluded_at: None,
        }
    }

    /// Mean of the submitted agreement scores. `None` with zero results,
    /// which the pipeline treats as fail-open approval.
    pub fn average_agreement(&self) -> Option<f64> {
        if self.validations.is_empty() {
            return None;
        }
        let sum: f64 = self.validations.iter().map(|v| v.agreement).sum();
        Some(sum / self.validations.len() as f64)
    }

    /// Whether every selected validator has submitted a result.
    pub fn validation_complete(&self) -> bool {
        !self.validators.is_empty() && self.validations.len() >= self.validators.len()
    }

    pub fn is_validator(&self, agent: &AgentId) -> bool {
        self.validators.contains(agent)
    }

    pub(crate) fn conclude(&mut self, status: AssessmentStatus, fail_open: bool) {
        self.status = status;
        self.fail_open = fail_open;
        self.concluded_at = Some(Utc::now());
    }
}
