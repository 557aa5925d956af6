//! Conflict entities and their status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::AgentId;

/// Identifier of a detected conflict.
pub type ConflictId = String;

/// Confidence an agent declared for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Uncertain,
}

impl ConfidenceLevel {
    /// Fixed numeric anchor used in severity scoring.
    pub fn anchor(self) -> f64 {
        match self {
            Self::High => 1.0,
            Self::Medium => 0.7,
            Self::Low => 0.4,
            Self::Uncertain => 0.2,
        }
    }
}

/// What kind of contradiction was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Factual,
    Temporal,
    Methodological,
    Scope,
    Interpretive,
}

impl ConflictKind {
    /// Weight applied to the confidence score. Factual contradictions
    /// rank highest, interpretive disagreements lowest.
    pub fn weight(self) -> f64 {
        match self {
            Self::Factual => 1.0,
            Self::Temporal => 0.9,
            Self::Methodological => 0.8,
            Self::Scope => 0.7,
            Self::Interpretive => 0.5,
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Factual => write!(f, "factual"),
            Self::Temporal => write!(f, "temporal"),
            Self::Methodological => write!(f, "methodological"),
            Self::Scope => write!(f, "scope"),
            Self::Interpretive => write!(f, "interpretive"),
        }
    }
}

/// Four-band conflict severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Strategy for closing a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Parties ground their claims in transcript evidence.
    EvidenceBased,
    /// Both views are merged into a combined position.
    Integration,
    /// Parties meet in the middle.
    Compromise,
    /// A human decides.
    HumanDecision,
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EvidenceBased => write!(f, "evidence_based"),
            Self::Integration => write!(f, "integration"),
            Self::Compromise => write!(f, "compromise"),
            Self::HumanDecision => write!(f, "human_decision"),
        }
    }
}

/// Status machine: detected → in_dialogue → {resolved, reconciled,
/// escalated}; escalated → resolved via human decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Detected,
    InDialogue,
    Resolved,
    Reconciled,
    Escalated,
}

impl ConflictStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Reconciled)
    }
}

/// One side's claim in a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub agent: AgentId,
    /// Opaque claim payload; never interpreted by the core.
    pub payload: Value,
    pub confidence: ConfidenceLevel,
}

/// One entry in the append-only dialogue log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueEntry {
    /// "coordinator" for instruction entries.
    pub author: AgentId,
    pub body: Value,
    pub timestamp: DateTime<Utc>,
}

/// Accepted resolution of a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    pub outcome: Value,
    pub accepted_by: Vec<AgentId>,
    pub documentation: String,
}

/// A human reviewer's verdict on an escalated conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanDecision {
    pub reviewer: String,
    pub accepted: bool,
    pub outcome: Value,
    pub rationale: String,
    pub decided_at: DateTime<Utc>,
}

/// A detected contradiction between two agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    pub kind: ConflictKind,
    pub topic: String,
    /// Ordered claims; detection always records exactly two.
    pub claims: Vec<Claim>,
    /// Derived deterministically from the claims at detection time.
    pub severity: Severity,
    pub status: ConflictStatus,
    /// Strategy chosen when dialogue starts.
    pub strategy: Option<ResolutionStrategy>,
    /// Append-only ordered dialogue log.
    pub dialogue: Vec<DialogueEntry>,
    pub resolution: Option<Resolution>,
    pub human_decision: Option<HumanDecision>,
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    pub fn parties(&self) -> Vec<AgentId> {
        self.claims.iter().map(|c| c.agent.clone()).collect()
    }

    pub fn is_party(&self, agent: &AgentId) -> bool {
        self.claims.iter().any(|c| &c.agent == agent)
    }

    /// Dialogue entries authored by participants (instructions excluded).
    pub fn proposal_count(&self) -> usize {
        self.dialogue
            .iter()
            .filter(|e| self.is_party(&e.author))
            .count()
    }
}
