//! Wire envelope and protocol sub-messages.
//!
//! Every message exchanged with agents travels in a uniform [`Envelope`];
//! `content` discriminates the protocol sub-message. Claim, proposal, and
//! output payloads are opaque `serde_json::Value`s — the core never
//! interprets them, only its own envelope fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conflict::types::{ResolutionStrategy, Severity};
use crate::consensus::topic::{ConsensusStatus, VoteChoice};
use crate::registry::AgentId;

/// Unique identifier assigned to each message by the substrate.
pub type MessageId = String;

/// Delivery priority honored by the substrate, not the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

/// Uniform message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Message id, assigned at construction.
    pub id: MessageId,
    /// Sending party ("coordinator" for core-originated messages).
    pub sender: AgentId,
    /// Direct recipients; empty for broadcasts and topic publishes.
    pub recipients: Vec<AgentId>,
    /// The protocol sub-message.
    pub content: ProtocolMessage,
    /// When the envelope was created.
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Build an envelope from the coordinator to the given recipients.
    pub fn from_coordinator(recipients: Vec<AgentId>, content: ProtocolMessage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: "coordinator".to_string(),
            recipients,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Build an envelope from an agent.
    pub fn from_agent(sender: impl Into<AgentId>, content: ProtocolMessage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipients: Vec::new(),
            content,
            timestamp: Utc::now(),
        }
    }
}

/// Protocol sub-messages, discriminated by `content.type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    /// The workflow entered a new phase; carries phase instructions.
    PhaseTransition {
        phase: String,
        instructions: String,
        participants: Vec<AgentId>,
    },

    /// A proposal is open for voting this round. On rounds after the
    /// first, the previous round's votes are included for transparency.
    ConsensusProposal {
        topic_id: String,
        topic: String,
        proposal: Value,
        round: u32,
        previous_votes: Vec<(AgentId, VoteChoice)>,
    },

    /// An agent's vote on an open proposal.
    ConsensusVote {
        topic_id: String,
        choice: VoteChoice,
        confidence: f64,
        reasoning: Option<String>,
    },

    /// Terminal consensus outcome broadcast to participants.
    ConsensusResult {
        topic_id: String,
        status: ConsensusStatus,
        proposal: Option<Value>,
        reason: Option<String>,
    },

    /// Both parties of a detected conflict are notified.
    ConflictNotification {
        conflict_id: String,
        topic: String,
        severity: Severity,
    },

    /// Dialogue instructions for the participants of a conflict.
    DialogueInstruction {
        conflict_id: String,
        strategy: ResolutionStrategy,
        instructions: String,
    },

    /// A participant's proposal within a conflict dialogue.
    ResolutionProposal {
        conflict_id: String,
        proposal: Value,
    },

    /// Terminal conflict outcome sent to the involved parties.
    ConflictResolution {
        conflict_id: String,
        strategy: ResolutionStrategy,
        outcome: Value,
        documentation: String,
    },

    /// Request for independent cross-validation of an output.
    ValidationRequest {
        task_id: String,
        output: Value,
        producer: AgentId,
    },

    /// A validator's agreement score and feedback.
    ValidationResult {
        task_id: String,
        agreement: f64,
        feedback: String,
    },

    /// The producer is asked to refine its output.
    RefinementRequest {
        task_id: String,
        iteration: u32,
        reasons: Vec<String>,
    },

    /// A refined output resubmitted by the producer.
    RefinedOutput {
        task_id: String,
        output: Value,
        confidence: f64,
    },

    /// A human reviewer's verdict on an escalated assessment.
    HumanFeedback {
        task_id: String,
        accepted: bool,
        notes: Option<String>,
    },
}

impl ProtocolMessage {
    /// Wire discriminator for this sub-message.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::PhaseTransition { .. } => "phase_transition",
            Self::ConsensusProposal { .. } => "consensus_proposal",
            Self::ConsensusVote { .. } => "consensus_vote",
            Self::ConsensusResult { .. } => "consensus_result",
            Self::ConflictNotification { .. } => "conflict_notification",
            Self::DialogueInstruction { .. } => "dialogue_instruction",
            Self::ResolutionProposal { .. } => "resolution_proposal",
            Self::ConflictResolution { .. } => "conflict_resolution",
            Self::ValidationRequest { .. } => "validation_request",
            Self::ValidationResult { .. } => "validation_result",
            Self::RefinementRequest { .. } => "refinement_request",
            Self::RefinedOutput { .. } => "refined_output",
            Self::HumanFeedback { .. } => "human_feedback",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = Envelope::from_coordinator(
            vec!["agent-a".to_string()],
            ProtocolMessage::RefinementRequest {
                task_id: "task-1".to_string(),
                iteration: 2,
                reasons: vec!["low agreement".to_string()],
            },
        );

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"type\":\"refinement_request\""));

        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sender, "coordinator");
        assert_eq!(parsed.content.message_type(), "refinement_request");
    }

    #[test]
    fn test_vote_message_tagging() {
        let msg = ProtocolMessage::ConsensusVote {
            topic_id: "t-1".to_string(),
            choice: VoteChoice::Agree,
            confidence: 0.9,
            reasoning: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"consensus_vote\""));
        assert!(json.contains("\"choice\":\"agree\""));
    }
}
