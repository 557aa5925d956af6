//! Workflow controller — phase state and transition broadcasts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::phase::{AnalysisPhase, PhaseRecord, PhaseStatus};
use crate::error::{CoordinationError, CoordinationResult};
use crate::events::{CoordinationEvent, SharedEventBus};
use crate::messaging::{Envelope, MessageTransport, Priority, ProtocolMessage, SendOptions};
use crate::registry::AgentId;

/// Protocol channels an agent joins on registration.
const PROTOCOL_CHANNELS: [&str; 4] = ["workflow", "consensus", "conflict", "quality"];

/// Point-in-time view of the workflow, for queries and the session result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub goal: Option<String>,
    pub current_phase: Option<AnalysisPhase>,
    pub records: Vec<PhaseRecord>,
    pub registered_agents: Vec<AgentId>,
}

struct WorkflowState {
    goal: Option<String>,
    current: Option<AnalysisPhase>,
    records: HashMap<AnalysisPhase, PhaseRecord>,
    agents: HashMap<AgentId, Vec<String>>,
}

impl WorkflowState {
    fn fresh() -> Self {
        Self {
            goal: None,
            current: None,
            records: AnalysisPhase::ORDER
                .iter()
                .map(|p| (*p, PhaseRecord::pending(*p)))
                .collect(),
            agents: HashMap::new(),
        }
    }
}

/// Drives the session through its declared phase order.
///
/// Phase state is authoritative locally: if the broadcast fails, the
/// transition is still recorded and the transport error is surfaced to the
/// caller without rollback. Agents that missed a notification are expected
/// to poll phase instructions on resume.
pub struct WorkflowController {
    transport: Arc<dyn MessageTransport>,
    bus: SharedEventBus,
    state: RwLock<WorkflowState>,
}

impl WorkflowController {
    pub fn new(transport: Arc<dyn MessageTransport>, bus: SharedEventBus) -> Self {
        Self {
            transport,
            bus,
            state: RwLock::new(WorkflowState::fresh()),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Register an agent and join it to all protocol channels.
    pub async fn register_agent(
        &self,
        agent_id: AgentId,
        capabilities: Vec<String>,
    ) -> CoordinationResult<()> {
        for channel in PROTOCOL_CHANNELS {
            self.transport
                .add_participant_to_channel(channel, &agent_id)
                .await?;
        }

        let mut state = self.state.write().await;
        state.agents.insert(agent_id.clone(), capabilities);
        info!(agent_id = %agent_id, "agent registered");
        Ok(())
    }

    /// Reset phase state and enter the first working phase.
    pub async fn start_workflow(&self, goal: impl Into<String>) -> CoordinationResult<()> {
        let goal = goal.into();
        {
            let mut state = self.state.write().await;
            let agents = std::mem::take(&mut state.agents);
            *state = WorkflowState::fresh();
            state.agents = agents;
            state.goal = Some(goal.clone());
        }
        info!(goal = %goal, "workflow started");
        self.transition_to_phase(AnalysisPhase::Preparation).await
    }

    /// Complete the current phase and enter `next`.
    ///
    /// Traversal follows the declared order; a caller may express a skip by
    /// transitioning directly to a later phase, but re-entering a completed
    /// phase or the current phase is rejected.
    pub async fn transition_to_phase(&self, next: AnalysisPhase) -> CoordinationResult<()> {
        let (previous, participants) = {
            let mut state = self.state.write().await;

            if state.goal.is_none() {
                return Err(CoordinationError::invalid_state(
                    "workflow",
                    next.to_string(),
                    "workflow not started",
                ));
            }

            if state.current == Some(next) {
                return Err(CoordinationError::invalid_state(
                    "workflow",
                    next.to_string(),
                    "phase already in progress",
                ));
            }

            let target_status = state
                .records
                .get(&next)
                .map(|r| r.status)
                .unwrap_or(PhaseStatus::Pending);
            if target_status == PhaseStatus::Completed {
                return Err(CoordinationError::invalid_state(
                    "workflow",
                    next.to_string(),
                    "phase already completed",
                ));
            }

            if let Some(current) = state.current {
                if next.index() < current.index() {
                    return Err(CoordinationError::invalid_state(
                        "workflow",
                        next.to_string(),
                        format!("cannot move backwards from {current}"),
                    ));
                }
                if let Some(record) = state.records.get_mut(&current) {
                    record.complete();
                }
            }

            let participants: Vec<AgentId> = state.agents.keys().cloned().collect();
            if let Some(record) = state.records.get_mut(&next) {
                record.begin(participants.clone());
            }
            let previous = state.current;
            state.current = Some(next);
            (previous, participants)
        };

        info!(phase = %next, participants = participants.len(), "phase transition recorded");

        self.bus.publish(CoordinationEvent::PhaseTransitioned {
            from: previous,
            to: next,
            participants: participants.clone(),
            timestamp: Utc::now(),
        });

        // Broadcast after the local record: delivery is at-least-once, and
        // phase state stays authoritative even if agents miss this message.
        let envelope = Envelope::from_coordinator(
            Vec::new(),
            ProtocolMessage::PhaseTransition {
                phase: next.to_string(),
                instructions: next.instructions().to_string(),
                participants,
            },
        );
        if let Err(e) = self
            .transport
            .broadcast_message(envelope, SendOptions::priority(Priority::High))
            .await
        {
            warn!(phase = %next, error = %e, "phase broadcast failed; local state kept");
            return Err(e.into());
        }

        Ok(())
    }

    /// Instructions for the phase currently in progress. Agents poll this
    /// on resume when they may have missed a transition broadcast.
    pub async fn current_instructions(&self) -> Option<(AnalysisPhase, &'static str)> {
        let state = self.state.read().await;
        state.current.map(|p| (p, p.instructions()))
    }

    /// Snapshot of goal, phase records, and registered agents.
    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let state = self.state.read().await;
        let mut records: Vec<PhaseRecord> = AnalysisPhase::ORDER
            .iter()
            .filter_map(|p| state.records.get(p).cloned())
            .collect();
        // Defensive: keep declared order even if the map grew oddly.
        records.sort_by_key(|r| r.phase.index());
        WorkflowSnapshot {
            goal: state.goal.clone(),
            current_phase: state.current,
            records,
            registered_agents: {
                let mut ids: Vec<AgentId> = state.agents.keys().cloned().collect();
                ids.sort();
                ids
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::messaging::InMemoryTransport;

    fn setup() -> (Arc<InMemoryTransport>, WorkflowController) {
        let transport = InMemoryTransport::new().shared();
        let bus = EventBus::new().shared();
        let controller = WorkflowController::new(transport.clone(), bus);
        (transport, controller)
    }

    #[tokio::test]
    async fn test_register_joins_all_channels() {
        let (transport, controller) = setup();
        controller
            .register_agent("agent-a".to_string(), vec!["summarize".to_string()])
            .await
            .unwrap();

        for channel in PROTOCOL_CHANNELS {
            assert_eq!(
                transport.channel_members(channel).await,
                vec!["agent-a".to_string()],
                "missing from {channel}"
            );
        }
    }

    #[tokio::test]
    async fn test_start_enters_preparation() {
        let (transport, controller) = setup();
        controller
            .register_agent("agent-a".to_string(), vec![])
            .await
            .unwrap();
        controller.start_workflow("analyze standup").await.unwrap();

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.current_phase, Some(AnalysisPhase::Preparation));
        assert_eq!(snapshot.goal.as_deref(), Some("analyze standup"));

        let broadcasts = transport.sent_of_type("phase_transition").await;
        assert_eq!(broadcasts.len(), 1);
    }

    #[tokio::test]
    async fn test_transition_completes_previous_phase() {
        let (_, controller) = setup();
        controller.start_workflow("goal").await.unwrap();
        controller
            .transition_to_phase(AnalysisPhase::IndependentAnalysis)
            .await
            .unwrap();

        let snapshot = controller.snapshot().await;
        let prep = &snapshot.records[AnalysisPhase::Preparation.index()];
        assert_eq!(prep.status, PhaseStatus::Completed);
        assert!(prep.ended_at.is_some());

        let analysis = &snapshot.records[AnalysisPhase::IndependentAnalysis.index()];
        assert_eq!(analysis.status, PhaseStatus::InProgress);
        assert!(analysis.started_at.is_some());
    }

    #[tokio::test]
    async fn test_exactly_one_phase_in_progress() {
        let (_, controller) = setup();
        controller.start_workflow("goal").await.unwrap();
        controller
            .transition_to_phase(AnalysisPhase::IndependentAnalysis)
            .await
            .unwrap();
        controller
            .transition_to_phase(AnalysisPhase::CrossValidation)
            .await
            .unwrap();

        let snapshot = controller.snapshot().await;
        let in_progress = snapshot
            .records
            .iter()
            .filter(|r| r.status == PhaseStatus::InProgress)
            .count();
        assert_eq!(in_progress, 1);
    }

    #[tokio::test]
    async fn test_rejects_backwards_transition() {
        let (_, controller) = setup();
        controller.start_workflow("goal").await.unwrap();
        controller
            .transition_to_phase(AnalysisPhase::CrossValidation)
            .await
            .unwrap();

        let err = controller
            .transition_to_phase(AnalysisPhase::Preparation)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_rejects_reentering_current_phase() {
        let (_, controller) = setup();
        controller.start_workflow("goal").await.unwrap();
        let err = controller
            .transition_to_phase(AnalysisPhase::Preparation)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_transition_requires_started_workflow() {
        let (_, controller) = setup();
        let err = controller
            .transition_to_phase(AnalysisPhase::Synthesis)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_explicit_skip_is_allowed() {
        let (_, controller) = setup();
        controller.start_workflow("goal").await.unwrap();
        // Caller decision: jump straight to consensus building.
        controller
            .transition_to_phase(AnalysisPhase::ConsensusBuilding)
            .await
            .unwrap();

        let snapshot = controller.snapshot().await;
        assert_eq!(
            snapshot.current_phase,
            Some(AnalysisPhase::ConsensusBuilding)
        );
        // Skipped phases stay pending in the audit trail.
        let skipped = &snapshot.records[AnalysisPhase::IndependentAnalysis.index()];
        assert_eq!(skipped.status, PhaseStatus::Pending);
    }

    #[tokio::test]
    async fn test_current_instructions() {
        let (_, controller) = setup();
        assert!(controller.current_instructions().await.is_none());
        controller.start_workflow("goal").await.unwrap();
        let (phase, instructions) = controller.current_instructions().await.unwrap();
        assert_eq!(phase, AnalysisPhase::Preparation);
        assert!(!instructions.is_empty());
    }
}
