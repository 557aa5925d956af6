//! Event types emitted by the coordination components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::types::{ResolutionStrategy, Severity};
use crate::quality::assessment::AssessmentStatus;
use crate::registry::AgentId;
use crate::workflow::phase::AnalysisPhase;

/// All events emitted by the coordination core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinationEvent {
    /// The workflow moved to a new phase.
    PhaseTransitioned {
        from: Option<AnalysisPhase>,
        to: AnalysisPhase,
        participants: Vec<AgentId>,
        timestamp: DateTime<Utc>,
    },

    /// A consensus topic was opened for voting.
    ConsensusInitiated {
        topic_id: String,
        initiator: AgentId,
        participants: Vec<AgentId>,
        timestamp: DateTime<Utc>,
    },

    /// A round ended below threshold with budget remaining.
    ConsensusRoundAdvanced {
        topic_id: String,
        round: u32,
        agreement_level: f64,
        timestamp: DateTime<Utc>,
    },

    /// The proposal reached the agreement threshold.
    ConsensusAchieved {
        topic_id: String,
        agreement_level: f64,
        rounds_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// Round budget exhausted without reaching the threshold.
    ConsensusFailed {
        topic_id: String,
        rounds_used: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Contradictory claims were detected between two agents.
    ConflictDetected {
        conflict_id: String,
        severity: Severity,
        parties: Vec<AgentId>,
        timestamp: DateTime<Utc>,
    },

    /// Structured dialogue started on a conflict.
    DialogueStarted {
        conflict_id: String,
        strategy: ResolutionStrategy,
        timestamp: DateTime<Utc>,
    },

    /// A conflict closed with an accepted resolution.
    ConflictResolved {
        conflict_id: String,
        strategy: ResolutionStrategy,
        timestamp: DateTime<Utc>,
    },

    /// A conflict closed through automated reconciliation.
    ConflictReconciled {
        conflict_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A conflict was handed to a human reviewer.
    ConflictEscalated {
        conflict_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A human decision closed an escalated conflict.
    HumanDecisionRecorded {
        conflict_id: String,
        accepted: bool,
        timestamp: DateTime<Utc>,
    },

    /// An agent output entered quality review.
    AssessmentRegistered {
        task_id: String,
        producer: AgentId,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// Cross-validation was requested from the given validators.
    ValidationRequested {
        task_id: String,
        validators: Vec<AgentId>,
        timestamp: DateTime<Utc>,
    },

    /// The producer was asked to refine its output.
    RefinementRequested {
        task_id: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// The assessment reached a terminal status.
    AssessmentConcluded {
        task_id: String,
        status: AssessmentStatus,
        /// True when the conclusion came from fail-open auto-approval.
        fail_open: bool,
        timestamp: DateTime<Utc>,
    },

    /// The assessment was handed to a human reviewer.
    AssessmentEscalated {
        task_id: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },
}

impl CoordinationEvent {
    /// Event timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::PhaseTransitioned { timestamp, .. }
            | Self::ConsensusInitiated { timestamp, .. }
            | Self::ConsensusRoundAdvanced { timestamp, .. }
            | Self::ConsensusAchieved { timestamp, .. }
            | Self::ConsensusFailed { timestamp, .. }
            | Self::ConflictDetected { timestamp, .. }
            | Self::DialogueStarted { timestamp, .. }
            | Self::ConflictResolved { timestamp, .. }
            | Self::ConflictReconciled { timestamp, .. }
            | Self::ConflictEscalated { timestamp, .. }
            | Self::HumanDecisionRecorded { timestamp, .. }
            | Self::AssessmentRegistered { timestamp, .. }
            | Self::ValidationRequested { timestamp, .. }
            | Self::RefinementRequested { timestamp, .. }
            | Self::AssessmentConcluded { timestamp, .. }
            | Self::AssessmentEscalated { timestamp, .. } => *timestamp,
        }
    }

    /// Event type as a string, matching the wire tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PhaseTransitioned { .. } => "phase_transitioned",
            Self::ConsensusInitiated { .. } => "consensus_initiated",
            Self::ConsensusRoundAdvanced { .. } => "consensus_round_advanced",
            Self::ConsensusAchieved { .. } => "consensus_achieved",
            Self::ConsensusFailed { .. } => "consensus_failed",
            Self::ConflictDetected { .. } => "conflict_detected",
            Self::DialogueStarted { .. } => "dialogue_started",
            Self::ConflictResolved { .. } => "conflict_resolved",
            Self::ConflictReconciled { .. } => "conflict_reconciled",
            Self::ConflictEscalated { .. } => "conflict_escalated",
            Self::HumanDecisionRecorded { .. } => "human_decision_recorded",
            Self::AssessmentRegistered { .. } => "assessment_registered",
            Self::ValidationRequested { .. } => "validation_requested",
            Self::RefinementRequested { .. } => "refinement_requested",
            Self::AssessmentConcluded { .. } => "assessment_concluded",
            Self::AssessmentEscalated { .. } => "assessment_escalated",
        }
    }
}
