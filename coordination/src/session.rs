//! Session facade wiring the four components together.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CoordinationConfig;
use crate::conflict::{Conflict, ConflictEngine};
use crate::consensus::{ConsensusBuilder, ConsensusTopic};
use crate::error::{CoordinationError, CoordinationResult};
use crate::events::{CoordinationEvent, EventBus, SharedEventBus};
use crate::messaging::{Envelope, MessageTransport, ProtocolMessage};
use crate::quality::{QualityAssessment, QualityPipeline};
use crate::reasoning::ReasoningService;
use crate::registry::{AgentId, AgentRegistry};
use crate::workflow::{WorkflowController, WorkflowSnapshot};

/// Summary of everything a session produced, for the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub workflow: WorkflowSnapshot,
    pub consensus_topics: Vec<ConsensusTopic>,
    pub active_conflicts: Vec<Conflict>,
    pub escalated_conflicts: Vec<Conflict>,
    pub resolved_conflicts: Vec<Conflict>,
    pub assessments: Vec<QualityAssessment>,
    pub generated_at: DateTime<Utc>,
}

/// One coordinated analysis session.
///
/// Owns a shared event bus and the four protocol components, all wired to
/// the same transport and registry. External collaborators (transport,
/// registry, reasoning) are injected; nothing here is a process-wide
/// singleton.
pub struct CoordinationSession {
    bus: SharedEventBus,
    workflow: Arc<WorkflowController>,
    consensus: Arc<ConsensusBuilder>,
    conflicts: Arc<ConflictEngine>,
    quality: Arc<QualityPipeline>,
}

impl CoordinationSession {
    pub fn new(
        config: CoordinationConfig,
        transport: Arc<dyn MessageTransport>,
        registry: Arc<dyn AgentRegistry>,
        reasoning: Arc<dyn ReasoningService>,
    ) -> Self {
        let bus = EventBus::new().shared();
        let workflow = WorkflowController::new(transport.clone(), bus.clone()).shared();
        let consensus = ConsensusBuilder::new(
            config.consensus,
            transport.clone(),
            registry.clone(),
            bus.clone(),
        )
        .shared();
        let conflicts = ConflictEngine::new(
            config.conflict,
            transport.clone(),
            reasoning,
            bus.clone(),
        )
        .shared();
        let quality =
            QualityPipeline::new(config.quality, transport, registry, bus.clone()).shared();

        Self {
            bus,
            workflow,
            consensus,
            conflicts,
            quality,
        }
    }

    pub fn workflow(&self) -> &Arc<WorkflowController> {
        &self.workflow
    }

    pub fn consensus(&self) -> &Arc<ConsensusBuilder> {
        &self.consensus
    }

    pub fn conflicts(&self) -> &Arc<ConflictEngine> {
        &self.conflicts
    }

    pub fn quality(&self) -> &Arc<QualityPipeline> {
        &self.quality
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CoordinationEvent> {
        self.bus.subscribe()
    }

    /// Register an agent with the workflow (joins all protocol channels).
    pub async fn register_agent(
        &self,
        agent_id: AgentId,
        capabilities: Vec<String>,
    ) -> CoordinationResult<()> {
        self.workflow.register_agent(agent_id, capabilities).await
    }

    /// Start the phased workflow toward `goal`.
    pub async fn start(&self, goal: impl Into<String>) -> CoordinationResult<()> {
        self.workflow.start_workflow(goal).await
    }

    /// Route an inbound envelope to the component owning its sub-message.
    ///
    /// Delivery is at-least-once, so late or duplicate protocol traffic is
    /// expected: messages for unknown or already-settled entities are
    /// logged and dropped rather than surfaced as faults. Transport and
    /// reasoning failures still propagate.
    pub async fn dispatch(&self, envelope: Envelope) -> CoordinationResult<()> {
        let sender = envelope.sender.clone();
        let result = match envelope.content {
            ProtocolMessage::ConsensusVote {
                topic_id,
                choice,
                confidence,
                reasoning,
            } => {
                self.consensus
                    .submit_vote(&topic_id, sender, choice, confidence, reasoning)
                    .await
            }
            ProtocolMessage::ResolutionProposal {
                conflict_id,
                proposal,
            } => {
                self.conflicts
                    .submit_proposal(&conflict_id, sender, proposal)
                    .await
            }
            ProtocolMessage::ValidationResult {
                task_id,
                agreement,
                feedback,
            } => {
                self.quality
                    .submit_validation(&task_id, sender, agreement, feedback)
                    .await
            }
            ProtocolMessage::RefinedOutput {
                task_id,
                output,
                confidence,
            } => {
                self.quality
                    .submit_refined_output(&task_id, output, confidence)
                    .await
            }
            ProtocolMessage::HumanFeedback {
                task_id,
                accepted,
                notes,
            } => {
                self.quality
                    .submit_human_feedback(&task_id, accepted, notes)
                    .await
            }
            other => {
                debug!(
                    message_type = other.message_type(),
                    sender = %sender,
                    "outbound-only message ignored by dispatch"
                );
                Ok(())
            }
        };

        match result {
            Err(e @ (CoordinationError::NotFound { .. } | CoordinationError::InvalidState { .. })) => {
                debug!(error = %e, "stale or invalid protocol message dropped");
                Ok(())
            }
            other => other,
        }
    }

    /// Summarize phases, topics, conflicts, and assessments.
    pub async fn session_result(&self) -> SessionResult {
        SessionResult {
            workflow: self.workflow.snapshot().await,
            consensus_topics: self.consensus.topics().await,
            active_conflicts: self.conflicts.active_conflicts().await,
            escalated_conflicts: self.conflicts.escalated_conflicts().await,
            resolved_conflicts: self.conflicts.resolved_conflicts().await,
            assessments: self.quality.assessments().await,
            generated_at: Utc::now(),
        }
    }
}
