//! Analysis phases and per-phase records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::AgentId;

/// Fixed, ordered phases of a transcript-analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    /// Agents receive the transcript and the session goal.
    Preparation,
    /// Each agent produces claims independently.
    IndependentAnalysis,
    /// Agents review each other's claims.
    CrossValidation,
    /// Contradictions are worked through dialogue.
    ConflictResolution,
    /// Remaining proposals go through bounded-round voting.
    ConsensusBuilding,
    /// The trusted result is assembled.
    Synthesis,
    /// The session is finished.
    Completed,
}

impl AnalysisPhase {
    /// Declared traversal order.
    pub const ORDER: [AnalysisPhase; 7] = [
        Self::Preparation,
        Self::IndependentAnalysis,
        Self::CrossValidation,
        Self::ConflictResolution,
        Self::ConsensusBuilding,
        Self::Synthesis,
        Self::Completed,
    ];

    /// Position within the declared order.
    pub fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|p| *p == self)
            .unwrap_or(usize::MAX)
    }

    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<AnalysisPhase> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    /// Instructions broadcast to agents when this phase starts.
    pub fn instructions(self) -> &'static str {
        match self {
            Self::Preparation => "Load the transcript and confirm readiness.",
            Self::IndependentAnalysis => {
                "Analyze the transcript independently and submit your claims."
            }
            Self::CrossValidation => "Review the claims submitted by other agents.",
            Self::ConflictResolution => {
                "Participate in dialogues for conflicts you are a party to."
            }
            Self::ConsensusBuilding => "Vote on the open proposals before each round deadline.",
            Self::Synthesis => "Submit your final contributions for the combined result.",
            Self::Completed => "The session is complete. No further submissions are accepted.",
        }
    }
}

impl std::fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preparation => write!(f, "preparation"),
            Self::IndependentAnalysis => write!(f, "independent_analysis"),
            Self::CrossValidation => write!(f, "cross_validation"),
            Self::ConflictResolution => write!(f, "conflict_resolution"),
            Self::ConsensusBuilding => write!(f, "consensus_building"),
            Self::Synthesis => write!(f, "synthesis"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Status of a single phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Audit record for one phase of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: AnalysisPhase,
    pub status: PhaseStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Agents active when the phase started.
    pub participants: Vec<AgentId>,
}

impl PhaseRecord {
    pub fn pending(phase: AnalysisPhase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Pending,
            started_at: None,
            ended_at: None,
            participants: Vec::new(),
        }
    }

    pub(crate) fn begin(&mut self, participants: Vec<AgentId>) {
        self.status = PhaseStatus::InProgress;
        self.started_at = Some(Utc::now());
        self.participants = participants;
    }

    pub(crate) fn complete(&mut self) {
        self.status = PhaseStatus::Completed;
        self.ended_at = Some(Utc::now());
    }
}
