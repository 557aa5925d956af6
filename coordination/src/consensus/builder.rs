//! Consensus builder — proposal rounds, vote collection, and deadlines.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::topic::{ConsensusStatus, ConsensusTopic, TopicId, Vote, VoteChoice};
use crate::config::ConsensusConfig;
use crate::error::{CoordinationError, CoordinationResult};
use crate::events::{CoordinationEvent, SharedEventBus};
use crate::messaging::{Envelope, MessageTransport, Priority, ProtocolMessage, SendOptions};
use crate::registry::{AgentId, AgentRegistry};
use crate::timer::DeadlineTimer;

/// Runs bounded-round voting on proposals.
///
/// Topics are owned exclusively by this component; votes and deadline
/// evaluations are the only mutations. A deadline evaluation re-checks
/// both the topic's status and its round number before acting, so a timer
/// that fires after termination (or after its round already advanced) is
/// a no-op.
pub struct ConsensusBuilder {
    config: ConsensusConfig,
    transport: Arc<dyn MessageTransport>,
    registry: Arc<dyn AgentRegistry>,
    bus: SharedEventBus,
    timer: DeadlineTimer,
    topics: RwLock<HashMap<TopicId, ConsensusTopic>>,
}

impl ConsensusBuilder {
    pub fn new(
        config: ConsensusConfig,
        transport: Arc<dyn MessageTransport>,
        registry: Arc<dyn AgentRegistry>,
        bus: SharedEventBus,
    ) -> Self {
        Self {
            config,
            transport,
            registry,
            bus,
            timer: DeadlineTimer::new(),
            topics: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Open a proposal for voting at round 1, send the timed proposal to
    /// every participant, and schedule the round deadline.
    ///
    /// When `participants` is omitted, all registered agents except the
    /// initiator take part.
    pub async fn initiate(
        self: &Arc<Self>,
        initiator: AgentId,
        topic: impl Into<String>,
        proposal: serde_json::Value,
        participants: Option<Vec<AgentId>>,
    ) -> CoordinationResult<TopicId> {
        let participants = match participants {
            Some(list) => list,
            None => self
                .registry
                .list_agents()
                .into_iter()
                .map(|a| a.id)
                .filter(|id| *id != initiator)
                .collect(),
        };

        let entry = ConsensusTopic::new(topic, proposal, initiator.clone(), participants.clone());
        let topic_id = entry.id.clone();

        {
            let mut topics = self.topics.write().await;
            topics.insert(topic_id.clone(), entry);
        }

        info!(
            topic_id = %topic_id,
            participants = participants.len(),
            "consensus initiated"
        );

        self.bus.publish(CoordinationEvent::ConsensusInitiated {
            topic_id: topic_id.clone(),
            initiator,
            participants: participants.clone(),
            timestamp: Utc::now(),
        });

        self.send_proposal(&topic_id, 1, Vec::new()).await?;
        self.schedule_deadline(topic_id.clone(), 1);

        Ok(topic_id)
    }

    /// Record or overwrite the agent's vote for the current round.
    pub async fn submit_vote(
        &self,
        topic_id: &str,
        agent: AgentId,
        choice: VoteChoice,
        confidence: f64,
        reasoning: Option<String>,
    ) -> CoordinationResult<()> {
        let mut topics = self.topics.write().await;
        let topic = topics
            .get_mut(topic_id)
            .ok_or_else(|| CoordinationError::not_found("consensus topic", topic_id))?;

        if topic.status.is_terminal() {
            return Err(CoordinationError::invalid_state(
                "consensus topic",
                topic_id,
                format!("voting closed: status is {:?}", topic.status),
            ));
        }
        if !topic.is_participant(&agent) {
            return Err(CoordinationError::invalid_state(
                "consensus topic",
                topic_id,
                format!("{agent} is not a participant"),
            ));
        }

        debug!(topic_id, agent = %agent, choice = %choice, round = topic.round, "vote recorded");
        // Last vote wins within the round.
        topic.votes.insert(
            agent,
            Vote {
                choice,
                confidence,
                reasoning,
                cast_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Evaluate the round deadline for `round`. Stale invocations — a
    /// terminal topic or a round that already advanced — do nothing.
    pub async fn evaluate_round(self: &Arc<Self>, topic_id: &str, round: u32) {
        enum Outcome {
            Achieved {
                agreement: f64,
                proposal: serde_json::Value,
                participants: Vec<AgentId>,
            },
            Failed {
                agreement: f64,
                participants: Vec<AgentId>,
            },
            NextRound {
                agreement: f64,
                next_round: u32,
                previous_votes: Vec<(AgentId, VoteChoice)>,
            },
        }

        let outcome = {
            let mut topics = self.topics.write().await;
            let topic = match topics.get_mut(topic_id) {
                Some(t) => t,
                None => return,
            };
            if topic.status.is_terminal() || topic.round != round {
                debug!(topic_id, round, "stale round deadline ignored");
                return;
            }

            let agreement = topic.agreement_level();
            if agreement >= self.config.threshold {
                topic.decide(ConsensusStatus::Achieved);
                Outcome::Achieved {
                    agreement,
                    proposal: topic.proposal.clone(),
                    participants: topic.participants.clone(),
                }
            } else if topic.round >= self.config.max_rounds {
                topic.decide(ConsensusStatus::Failed);
                Outcome::Failed {
                    agreement,
                    participants: topic.participants.clone(),
                }
            } else {
                let previous_votes = topic.take_round_votes();
                topic.round += 1;
                Outcome::NextRound {
                    agreement,
                    next_round: topic.round,
                    previous_votes,
                }
            }
        };

        match outcome {
            Outcome::Achieved {
                agreement,
                proposal,
                participants,
            } => {
                info!(topic_id, round, agreement, "consensus achieved");
                self.bus.publish(CoordinationEvent::ConsensusAchieved {
                    topic_id: topic_id.to_string(),
                    agreement_level: agreement,
                    rounds_used: round,
                    timestamp: Utc::now(),
                });
                self.broadcast_result(
                    topic_id,
                    participants,
                    ConsensusStatus::Achieved,
                    Some(proposal),
                    None,
                )
                .await;
            }
            Outcome::Failed {
                agreement,
                participants,
            } => {
                let reason = format!(
                    "agreement {agreement:.3} below threshold {} after {round} rounds",
                    self.config.threshold
                );
                info!(topic_id, round, agreement, "consensus failed");
                self.bus.publish(CoordinationEvent::ConsensusFailed {
                    topic_id: topic_id.to_string(),
                    rounds_used: round,
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                });
                self.broadcast_result(
                    topic_id,
                    participants,
                    ConsensusStatus::Failed,
                    None,
                    Some(reason),
                )
                .await;
            }
            Outcome::NextRound {
                agreement,
                next_round,
                previous_votes,
            } => {
                info!(topic_id, round, agreement, next_round, "round advanced");
                self.bus.publish(CoordinationEvent::ConsensusRoundAdvanced {
                    topic_id: topic_id.to_string(),
                    round: next_round,
                    agreement_level: agreement,
                    timestamp: Utc::now(),
                });
                if let Err(e) = self.send_proposal(topic_id, next_round, previous_votes).await {
                    warn!(topic_id, error = %e, "re-broadcast failed; round continues");
                }
                self.schedule_deadline(topic_id.to_string(), next_round);
            }
        }
    }

    /// Current state of a topic. Stable across repeated calls once the
    /// topic is terminal.
    pub async fn topic(&self, topic_id: &str) -> CoordinationResult<ConsensusTopic> {
        self.topics
            .read()
            .await
            .get(topic_id)
            .cloned()
            .ok_or_else(|| CoordinationError::not_found("consensus topic", topic_id))
    }

    /// All topics tracked by this builder.
    pub async fn topics(&self) -> Vec<ConsensusTopic> {
        self.topics.read().await.values().cloned().collect()
    }

    fn schedule_deadline(self: &Arc<Self>, topic_id: TopicId, round: u32) {
        let builder = Arc::clone(self);
        self.timer.schedule(
            "consensus_round",
            Duration::from_secs(self.config.round_timeout_secs),
            async move {
                builder.evaluate_round(&topic_id, round).await;
            },
        );
    }

    async fn send_proposal(
        &self,
        topic_id: &str,
        round: u32,
        previous_votes: Vec<(AgentId, VoteChoice)>,
    ) -> CoordinationResult<()> {
        let (participants, topic_text, proposal) = {
            let topics = self.topics.read().await;
            let topic = topics
                .get(topic_id)
                .ok_or_else(|| CoordinationError::not_found("consensus topic", topic_id))?;
            (
                topic.participants.clone(),
                topic.topic.clone(),
                topic.proposal.clone(),
            )
        };

        let envelope = Envelope::from_coordinator(
            participants,
            ProtocolMessage::ConsensusProposal {
                topic_id: topic_id.to_string(),
                topic: topic_text,
                proposal,
                round,
                previous_votes,
            },
        );
        self.transport
            .send_message(envelope, SendOptions::priority(Priority::High))
            .await?;
        Ok(())
    }

    async fn broadcast_result(
        &self,
        topic_id: &str,
        participants: Vec<AgentId>,
        status: ConsensusStatus,
        proposal: Option<serde_json::Value>,
        reason: Option<String>,
    ) {
        let envelope = Envelope::from_coordinator(
            participants,
            ProtocolMessage::ConsensusResult {
                topic_id: topic_id.to_string(),
                status,
                proposal,
                reason,
            },
        );
        // Best-effort: the topic already reached its terminal status.
        if let Err(e) = self
            .transport
            .send_message(envelope, SendOptions::priority(Priority::High))
            .await
        {
            warn!(topic_id, error = %e, "result broadcast failed");
        }
    }
}
