//! Conflict engine — detection, dialogue, and terminal transitions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::severity::{severity_for, strategy_for};
use super::types::{
    Claim, ConfidenceLevel, Conflict, ConflictId, ConflictKind, ConflictStatus, DialogueEntry,
    HumanDecision, Resolution, ResolutionStrategy, Severity,
};
use crate::config::ConflictConfig;
use crate::error::{CoordinationError, CoordinationResult};
use crate::events::{CoordinationEvent, SharedEventBus};
use crate::messaging::{Envelope, MessageTransport, Priority, ProtocolMessage, SendOptions};
use crate::reasoning::{DialogueAnalysis, ReasoningService};
use crate::registry::AgentId;

/// Author recorded for instruction and reconciliation dialogue entries.
const COORDINATOR: &str = "coordinator";

/// Owns every conflict from detection to its terminal collection.
///
/// Active conflicts live in `active`; terminal ones are archived into
/// `resolved` (resolved and reconciled) or parked in `escalated` while a
/// human decision is pending. Entries are never deleted.
pub struct ConflictEngine {
    config: ConflictConfig,
    transport: Arc<dyn MessageTransport>,
    reasoning: Arc<dyn ReasoningService>,
    bus: SharedEventBus,
    timer: crate::timer::DeadlineTimer,
    active: RwLock<HashMap<ConflictId, Conflict>>,
    resolved: RwLock<HashMap<ConflictId, Conflict>>,
    escalated: RwLock<HashMap<ConflictId, Conflict>>,
}

impl ConflictEngine {
    pub fn new(
        config: ConflictConfig,
        transport: Arc<dyn MessageTransport>,
        reasoning: Arc<dyn ReasoningService>,
        bus: SharedEventBus,
    ) -> Self {
        Self {
            config,
            transport,
            reasoning,
            bus,
            timer: crate::timer::DeadlineTimer::new(),
            active: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
            escalated: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Record a contradiction between two agents, notify both parties, and
    /// asynchronously start the dialogue.
    ///
    /// Severity is derived deterministically from the claims at detection
    /// time and is not retroactively mutated.
    #[allow(clippy::too_many_arguments)]
    pub async fn detect(
        self: &Arc<Self>,
        topic: impl Into<String>,
        agent_a: AgentId,
        claim_a: Value,
        confidence_a: ConfidenceLevel,
        agent_b: AgentId,
        claim_b: Value,
        confidence_b: ConfidenceLevel,
        kind: ConflictKind,
    ) -> CoordinationResult<ConflictId> {
        let severity = severity_for(confidence_a, confidence_b, kind);
        let conflict = Conflict {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            topic: topic.into(),
            claims: vec![
                Claim {
                    agent: agent_a,
                    payload: claim_a,
                    confidence: confidence_a,
                },
                Claim {
                    agent: agent_b,
                    payload: claim_b,
                    confidence: confidence_b,
                },
            ],
            severity,
            status: ConflictStatus::Detected,
            strategy: None,
            dialogue: Vec::new(),
            resolution: None,
            human_decision: None,
            detected_at: Utc::now(),
        };

        let id = conflict.id.clone();
        let parties = conflict.parties();
        let topic_text = conflict.topic.clone();
        self.active.write().await.insert(id.clone(), conflict);

        info!(conflict_id = %id, severity = %severity, kind = %kind, "conflict detected");
        self.bus.publish(CoordinationEvent::ConflictDetected {
            conflict_id: id.clone(),
            severity,
            parties: parties.clone(),
            timestamp: Utc::now(),
        });

        // The conflict is already persisted; a notification failure
        // surfaces to the caller without unwinding the entity.
        let envelope = Envelope::from_coordinator(
            parties,
            ProtocolMessage::ConflictNotification {
                conflict_id: id.clone(),
                topic: topic_text,
                severity,
            },
        );
        self.transport
            .send_message(envelope, SendOptions::priority(Priority::Urgent))
            .await?;

        let engine = Arc::clone(self);
        let dialogue_id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.initiate_dialogue(&dialogue_id).await {
                warn!(conflict_id = %dialogue_id, error = %e, "dialogue initiation failed");
            }
        });

        Ok(id)
    }

    /// Select the resolution strategy, move to in-dialogue, and send
    /// instructions to both parties.
    pub async fn initiate_dialogue(&self, id: &str) -> CoordinationResult<()> {
        let (strategy, parties, instructions) = {
            let mut active = self.active.write().await;
            let conflict = active
                .get_mut(id)
                .ok_or_else(|| CoordinationError::not_found("conflict", id))?;
            if conflict.status != ConflictStatus::Detected {
                return Err(CoordinationError::invalid_state(
                    "conflict",
                    id,
                    format!("dialogue cannot start from {:?}", conflict.status),
                ));
            }

            let strategy = strategy_for(
                conflict.severity,
                conflict.kind,
                self.config.require_human_approval,
            );
            let instructions = format!(
                "Resolve the {} conflict on '{}' using the {} strategy. \
                 Submit proposals until the dialogue closes.",
                conflict.kind, conflict.topic, strategy
            );
            conflict.status = ConflictStatus::InDialogue;
            conflict.strategy = Some(strategy);
            conflict.dialogue.push(DialogueEntry {
                author: COORDINATOR.to_string(),
                body: Value::String(instructions.clone()),
                timestamp: Utc::now(),
            });
            (strategy, conflict.parties(), instructions)
        };

        info!(conflict_id = %id, strategy = %strategy, "dialogue started");
        self.bus.publish(CoordinationEvent::DialogueStarted {
            conflict_id: id.to_string(),
            strategy,
            timestamp: Utc::now(),
        });

        let envelope = Envelope::from_coordinator(
            parties,
            ProtocolMessage::DialogueInstruction {
                conflict_id: id.to_string(),
                strategy,
                instructions,
            },
        );
        self.transport
            .send_message(envelope, SendOptions::priority(Priority::High))
            .await?;
        Ok(())
    }

    /// Append a participant's proposal to the dialogue. When the log
    /// reaches `max_dialogue_rounds × participant_count` proposals,
    /// outcome processing triggers automatically.
    pub async fn submit_proposal(
        self: &Arc<Self>,
        id: &str,
        agent: AgentId,
        proposal: Value,
    ) -> CoordinationResult<()> {
        let budget_reached = {
            let mut active = self.active.write().await;
            let conflict = active
                .get_mut(id)
                .ok_or_else(|| CoordinationError::not_found("conflict", id))?;
            if conflict.status != ConflictStatus::InDialogue {
                return Err(CoordinationError::invalid_state(
                    "conflict",
                    id,
                    format!("proposals not accepted in {:?}", conflict.status),
                ));
            }
            if !conflict.is_party(&agent) {
                return Err(CoordinationError::invalid_state(
                    "conflict",
                    id,
                    format!("{agent} is not a party to this conflict"),
                ));
            }

            conflict.dialogue.push(DialogueEntry {
                author: agent,
                body: proposal,
                timestamp: Utc::now(),
            });

            let budget =
                self.config.max_dialogue_rounds as usize * conflict.claims.len();
            conflict.proposal_count() >= budget
        };

        if budget_reached {
            debug!(conflict_id = %id, "dialogue budget reached; processing outcome");
            self.process_outcome(id).await?;
        }
        Ok(())
    }

    /// Analyze the dialogue and drive the conflict to auto-resolution,
    /// escalation, or automated reconciliation.
    pub async fn process_outcome(self: &Arc<Self>, id: &str) -> CoordinationResult<()> {
        let snapshot = {
            let active = self.active.read().await;
            let conflict = active
                .get(id)
                .ok_or_else(|| CoordinationError::not_found("conflict", id))?;
            if conflict.status != ConflictStatus::InDialogue {
                return Err(CoordinationError::invalid_state(
                    "conflict",
                    id,
                    format!("outcome processing requires in_dialogue, got {:?}", conflict.status),
                ));
            }
            conflict.clone()
        };

        // External call; a failure leaves the conflict in dialogue.
        let analysis = self
            .reasoning
            .analyze_dialogue(&snapshot)
            .await
            .map_err(|e| CoordinationError::Reasoning(e.to_string()))?;

        debug!(
            conflict_id = %id,
            agreement = analysis.agreement_level,
            strategy = %analysis.recommended_strategy,
            "dialogue analyzed"
        );

        let auto_resolvable = (analysis.agreement_level >= self.config.auto_resolve_threshold
            && !self.config.require_human_approval)
            || snapshot.severity == Severity::Low;

        if auto_resolvable {
            let resolution = Resolution {
                strategy: analysis.recommended_strategy,
                outcome: analysis.proposed_resolution.clone(),
                accepted_by: snapshot.parties(),
                documentation: analysis.documentation.clone(),
            };
            return self.resolve(id, resolution).await;
        }

        if snapshot.severity == Severity::Critical || self.config.require_human_approval {
            return self
                .escalate_to_human(id, format!("severity {} requires review", snapshot.severity))
                .await;
        }

        self.start_reconciliation(id, &snapshot, &analysis).await
    }

    /// Close the conflict with an accepted resolution and archive it.
    pub async fn resolve(&self, id: &str, resolution: Resolution) -> CoordinationResult<()> {
        let conflict = {
            let mut active = self.active.write().await;
            let mut conflict = active
                .remove(id)
                .ok_or_else(|| CoordinationError::not_found("conflict", id))?;
            conflict.status = ConflictStatus::Resolved;
            conflict.resolution = Some(resolution);
            conflict
        };
        let strategy = conflict
            .resolution
            .as_ref()
            .map(|r| r.strategy)
            .unwrap_or(ResolutionStrategy::Compromise);

        info!(conflict_id = %id, strategy = %strategy, "conflict resolved");
        self.notify_closure(&conflict).await;
        self.bus.publish(CoordinationEvent::ConflictResolved {
            conflict_id: id.to_string(),
            strategy,
            timestamp: Utc::now(),
        });
        self.resolved.write().await.insert(id.to_string(), conflict);
        Ok(())
    }

    /// Hand the conflict to a human reviewer.
    pub async fn escalate_to_human(&self, id: &str, reason: String) -> CoordinationResult<()> {
        let conflict = {
            let mut active = self.active.write().await;
            let mut conflict = active
                .remove(id)
                .ok_or_else(|| CoordinationError::not_found("conflict", id))?;
            conflict.status = ConflictStatus::Escalated;
            conflict
        };

        info!(conflict_id = %id, reason = %reason, "conflict escalated");
        self.bus.publish(CoordinationEvent::ConflictEscalated {
            conflict_id: id.to_string(),
            reason,
            timestamp: Utc::now(),
        });
        self.escalated
            .write()
            .await
            .insert(id.to_string(), conflict);
        Ok(())
    }

    /// Record a human decision on an escalated conflict, closing it.
    pub async fn submit_human_decision(
        &self,
        id: &str,
        decision: HumanDecision,
    ) -> CoordinationResult<()> {
        let conflict = {
            let mut escalated = self.escalated.write().await;
            let mut conflict = escalated
                .remove(id)
                .ok_or_else(|| CoordinationError::not_found("escalated conflict", id))?;
            conflict.resolution = Some(Resolution {
                strategy: ResolutionStrategy::HumanDecision,
                outcome: decision.outcome.clone(),
                accepted_by: conflict.parties(),
                documentation: decision.rationale.clone(),
            });
            conflict.human_decision = Some(decision.clone());
            conflict.status = ConflictStatus::Resolved;
            conflict
        };

        info!(conflict_id = %id, accepted = decision.accepted, "human decision recorded");
        self.notify_closure(&conflict).await;
        self.bus.publish(CoordinationEvent::HumanDecisionRecorded {
            conflict_id: id.to_string(),
            accepted: decision.accepted,
            timestamp: Utc::now(),
        });
        self.bus.publish(CoordinationEvent::ConflictResolved {
            conflict_id: id.to_string(),
            strategy: ResolutionStrategy::HumanDecision,
            timestamp: Utc::now(),
        });
        self.resolved.write().await.insert(id.to_string(), conflict);
        Ok(())
    }

    /// Look up a conflict in any collection. Terminal entries answer the
    /// same status across repeated calls.
    pub async fn get(&self, id: &str) -> CoordinationResult<Conflict> {
        if let Some(c) = self.active.read().await.get(id) {
            return Ok(c.clone());
        }
        if let Some(c) = self.escalated.read().await.get(id) {
            return Ok(c.clone());
        }
        if let Some(c) = self.resolved.read().await.get(id) {
            return Ok(c.clone());
        }
        Err(CoordinationError::not_found("conflict", id))
    }

    /// Conflicts still being worked.
    pub async fn active_conflicts(&self) -> Vec<Conflict> {
        self.active.read().await.values().cloned().collect()
    }

    /// Conflicts awaiting a human decision.
    pub async fn escalated_conflicts(&self) -> Vec<Conflict> {
        self.escalated.read().await.values().cloned().collect()
    }

    /// Archived terminal conflicts (resolved and reconciled).
    pub async fn resolved_conflicts(&self) -> Vec<Conflict> {
        self.resolved.read().await.values().cloned().collect()
    }

    /// Request a reconciliation proposal and schedule the feedback window.
    /// The window closes the conflict regardless of feedback received.
    async fn start_reconciliation(
        self: &Arc<Self>,
        id: &str,
        snapshot: &Conflict,
        analysis: &DialogueAnalysis,
    ) -> CoordinationResult<()> {
        let reconciliation = self
            .reasoning
            .propose_reconciliation(snapshot, analysis)
            .await
            .map_err(|e| CoordinationError::Reasoning(e.to_string()))?;

        {
            let mut active = self.active.write().await;
            if let Some(conflict) = active.get_mut(id) {
                conflict.dialogue.push(DialogueEntry {
                    author: COORDINATOR.to_string(),
                    body: reconciliation.proposed_resolution.clone(),
                    timestamp: Utc::now(),
                });
            }
        }

        let envelope = Envelope::from_coordinator(
            snapshot.parties(),
            ProtocolMessage::ConflictResolution {
                conflict_id: id.to_string(),
                strategy: reconciliation.recommended_strategy,
                outcome: reconciliation.proposed_resolution.clone(),
                documentation: reconciliation.documentation.clone(),
            },
        );
        if let Err(e) = self
            .transport
            .send_message(envelope, SendOptions::priority(Priority::High))
            .await
        {
            warn!(conflict_id = %id, error = %e, "reconciliation proposal delivery failed");
        }

        info!(
            conflict_id = %id,
            window_secs = self.config.feedback_window_secs,
            "reconciliation window opened"
        );

        let engine = Arc::clone(self);
        let conflict_id = id.to_string();
        self.timer.schedule(
            "reconciliation_window",
            Duration::from_secs(self.config.feedback_window_secs),
            async move {
                engine.finalize_reconciliation(&conflict_id, reconciliation).await;
            },
        );
        Ok(())
    }

    /// Timer callback: finalize a pending reconciliation. No-ops when the
    /// conflict already left the dialogue (terminal race in §timers).
    async fn finalize_reconciliation(&self, id: &str, reconciliation: DialogueAnalysis) {
        let conflict = {
            let mut active = self.active.write().await;
            match active.get(id) {
                Some(c) if c.status == ConflictStatus::InDialogue => {}
                _ => {
                    debug!(conflict_id = %id, "reconciliation window fired on closed conflict");
                    return;
                }
            }
            let mut conflict = match active.remove(id) {
                Some(c) => c,
                None => return,
            };
            conflict.status = ConflictStatus::Reconciled;
            conflict.resolution = Some(Resolution {
                strategy: reconciliation.recommended_strategy,
                outcome: reconciliation.proposed_resolution,
                accepted_by: conflict.parties(),
                documentation: reconciliation.documentation,
            });
            conflict
        };

        info!(conflict_id = %id, "conflict reconciled");
        self.notify_closure(&conflict).await;
        self.bus.publish(CoordinationEvent::ConflictReconciled {
            conflict_id: id.to_string(),
            timestamp: Utc::now(),
        });
        self.resolved.write().await.insert(id.to_string(), conflict);
    }

    /// Best-effort closure notification to the conflict's parties.
    async fn notify_closure(&self, conflict: &Conflict) {
        let Some(resolution) = &conflict.resolution else {
            return;
        };
        let envelope = Envelope::from_coordinator(
            conflict.parties(),
            ProtocolMessage::ConflictResolution {
                conflict_id: conflict.id.clone(),
                strategy: resolution.strategy,
                outcome: resolution.outcome.clone(),
                documentation: resolution.documentation.clone(),
            },
        );
        if let Err(e) = self
            .transport
            .send_message(envelope, SendOptions::priority(Priority::High))
            .await
        {
            warn!(conflict_id = %conflict.id, error = %e, "closure notification failed");
        }
    }
}
