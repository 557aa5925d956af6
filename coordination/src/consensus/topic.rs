//! Consensus topics, votes, and round tallies.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::AgentId;

/// Identifier of a proposal under vote.
pub type TopicId = String;

/// An agent's position on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Agree,
    Disagree,
    Abstain,
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agree => write!(f, "agree"),
            Self::Disagree => write!(f, "disagree"),
            Self::Abstain => write!(f, "abstain"),
        }
    }
}

/// A single vote within the current round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub choice: VoteChoice,
    /// Voter's confidence in its choice, 0.0–1.0.
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub cast_at: DateTime<Utc>,
}

/// Lifecycle status of a topic. Terminal statuses are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStatus {
    Pending,
    Achieved,
    Failed,
}

impl ConsensusStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Achieved | Self::Failed)
    }
}

/// A proposal under bounded-round voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusTopic {
    pub id: TopicId,
    pub topic: String,
    /// Opaque proposal payload; never interpreted by the core.
    pub proposal: Value,
    pub initiator: AgentId,
    pub participants: Vec<AgentId>,
    /// Current round, 1-indexed. Never exceeds the configured maximum.
    pub round: u32,
    /// Votes for the current round only; cleared on round advance.
    pub votes: HashMap<AgentId, Vote>,
    pub status: ConsensusStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ConsensusTopic {
    pub fn new(
        topic: impl Into<String>,
        proposal: Value,
        initiator: AgentId,
        participants: Vec<AgentId>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            proposal,
            initiator,
            participants,
            round: 1,
            votes: HashMap::new(),
            status: ConsensusStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    pub fn is_participant(&self, agent: &AgentId) -> bool {
        self.participants.contains(agent)
    }

    /// Agreement level for the current round: agree / total votes cast.
    /// Abstentions count toward the denominator. Zero votes is 0.0 —
    /// never trivially achieved.
    pub fn agreement_level(&self) -> f64 {
        if self.votes.is_empty() {
            return 0.0;
        }
        let agree = self
            .votes
            .values()
            .filter(|v| v.choice == VoteChoice::Agree)
            .count();
        agree as f64 / self.votes.len() as f64
    }

    /// Drain the current round's votes, returning (agent, choice) pairs
    /// for re-broadcast. No per-agent history is retained across rounds.
    pub(crate) fn take_round_votes(&mut self) -> Vec<(AgentId, VoteChoice)> {
        let mut votes: Vec<(AgentId, VoteChoice)> = self
            .votes
            .drain()
            .map(|(agent, vote)| (agent, vote.choice))
            .collect();
        votes.sort_by(|a, b| a.0.cmp(&b.0));
        votes
    }

    pub(crate) fn decide(&mut self, status: ConsensusStatus) {
        self.status = status;
        self.decided_at = Some(Utc::now());
    }
}
