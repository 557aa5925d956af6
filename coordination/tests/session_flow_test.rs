//! End-to-end session flow — a full coordinated analysis run over the
//! in-memory transport: workflow phases, a consensus vote driven through
//! inbound dispatch, a conflict taken through dialogue to resolution, and
//! a quality assessment through validation to approval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use scribe_coordination::{
    AnalysisPhase, AssessmentStatus, ConfidenceLevel, Conflict, ConflictKind, ConflictStatus,
    ConsensusStatus, CoordinationConfig, CoordinationSession, DialogueAnalysis, Envelope,
    InMemoryTransport, PhaseStatus, ProtocolMessage, ReasoningService, ResolutionStrategy,
    StaticRegistry, VoteChoice,
};

struct ConvergingReasoner;

#[async_trait]
impl ReasoningService for ConvergingReasoner {
    async fn analyze_dialogue(&self, _: &Conflict) -> anyhow::Result<DialogueAnalysis> {
        Ok(DialogueAnalysis {
            agreement_level: 0.9,
            recommended_strategy: ResolutionStrategy::Integration,
            proposed_resolution: json!({"position": "both action items stand"}),
            documentation: "parties converged on a combined reading".to_string(),
        })
    }

    async fn propose_reconciliation(
        &self,
        _: &Conflict,
        analysis: &DialogueAnalysis,
    ) -> anyhow::Result<DialogueAnalysis> {
        Ok(analysis.clone())
    }
}

fn build_session() -> (Arc<InMemoryTransport>, CoordinationSession) {
    scribe_coordination::telemetry::init_tracing();
    let transport = InMemoryTransport::new().shared();
    let registry = Arc::new(StaticRegistry::new());
    for id in ["summarizer", "fact-checker", "action-tracker"] {
        registry.register(scribe_coordination::AgentInfo::new(id, vec![]));
    }
    let session = CoordinationSession::new(
        CoordinationConfig::default(),
        transport.clone(),
        registry,
        Arc::new(ConvergingReasoner),
    );
    (transport, session)
}

// ─── Workflow ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn full_phase_progression() {
    let (transport, session) = build_session();
    for id in ["summarizer", "fact-checker", "action-tracker"] {
        session.register_agent(id.to_string(), vec![]).await.unwrap();
    }
    session.start("analyze the Q3 planning meeting").await.unwrap();

    for phase in [
        AnalysisPhase::IndependentAnalysis,
        AnalysisPhase::CrossValidation,
        AnalysisPhase::ConflictResolution,
        AnalysisPhase::ConsensusBuilding,
        AnalysisPhase::Synthesis,
        AnalysisPhase::Completed,
    ] {
        session.workflow().transition_to_phase(phase).await.unwrap();
    }

    let snapshot = session.workflow().snapshot().await;
    assert_eq!(snapshot.current_phase, Some(AnalysisPhase::Completed));
    let completed = snapshot
        .records
        .iter()
        .filter(|r| r.status == PhaseStatus::Completed)
        .count();
    assert_eq!(completed, 6, "all phases before the last are completed");

    // One broadcast per transition, start included.
    assert_eq!(transport.sent_of_type("phase_transition").await.len(), 7);
}

// ─── Consensus via dispatch ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn consensus_achieved_through_dispatched_votes() {
    let (_, session) = build_session();
    let topic_id = session
        .consensus()
        .initiate(
            "summarizer".to_string(),
            "final summary wording",
            json!({"summary": "three decisions, two action items"}),
            None,
        )
        .await
        .unwrap();

    // The two non-initiating agents vote through the inbound path.
    for agent in ["fact-checker", "action-tracker"] {
        session
            .dispatch(Envelope::from_agent(
                agent,
                ProtocolMessage::ConsensusVote {
                    topic_id: topic_id.clone(),
                    choice: VoteChoice::Agree,
                    confidence: 0.85,
                    reasoning: None,
                },
            ))
            .await
            .unwrap();
    }

    // Let the round deadline register its sleep, then evaluate on virtual time.
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(31)).await;
    tokio::task::yield_now().await;

    let topic = session.consensus().topic(&topic_id).await.unwrap();
    assert_eq!(topic.status, ConsensusStatus::Achieved);
    assert_eq!(topic.round, 1);
}

// ─── Conflict lifecycle ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn conflict_runs_dialogue_and_resolves() {
    let (transport, session) = build_session();
    let conflict_id = session
        .conflicts()
        .detect(
            "who owns the migration task",
            "summarizer".to_string(),
            json!("assigned to dana"),
            ConfidenceLevel::Medium,
            "action-tracker".to_string(),
            json!("assigned to priya"),
            ConfidenceLevel::Medium,
            ConflictKind::Scope,
        )
        .await
        .unwrap();
    tokio::task::yield_now().await;

    assert_eq!(
        session.conflicts().get(&conflict_id).await.unwrap().status,
        ConflictStatus::InDialogue
    );

    // Fill the dialogue budget (3 rounds x 2 parties) via dispatch.
    for i in 0..6 {
        let author = if i % 2 == 0 { "summarizer" } else { "action-tracker" };
        session
            .dispatch(Envelope::from_agent(
                author,
                ProtocolMessage::ResolutionProposal {
                    conflict_id: conflict_id.clone(),
                    proposal: json!(format!("proposal {i}")),
                },
            ))
            .await
            .unwrap();
    }

    let conflict = session.conflicts().get(&conflict_id).await.unwrap();
    assert_eq!(conflict.status, ConflictStatus::Resolved);
    let resolution = conflict.resolution.unwrap();
    assert_eq!(resolution.strategy, ResolutionStrategy::Integration);
    assert!(!transport.sent_of_type("conflict_resolution").await.is_empty());
}

// ─── Quality via dispatch ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn quality_validation_approves_through_dispatch() {
    let (_, session) = build_session();
    session
        .quality()
        .register(
            "summary-task",
            "summarizer".to_string(),
            json!({"summary": "draft"}),
            0.8,
        )
        .await
        .unwrap();

    // Validators answer; the assessment includes non-producer agents only.
    let assessment = session.quality().assessment("summary-task").await.unwrap();
    assert!(!assessment.validators.contains(&"summarizer".to_string()));

    for validator in assessment.validators {
        session
            .dispatch(Envelope::from_agent(
                validator,
                ProtocolMessage::ValidationResult {
                    task_id: "summary-task".to_string(),
                    agreement: 0.9,
                    feedback: "accurate".to_string(),
                },
            ))
            .await
            .unwrap();
    }

    assert_eq!(
        session.quality().status("summary-task").await.unwrap(),
        AssessmentStatus::Approved
    );
}

// ─── Session result ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn session_result_collects_all_outcomes() {
    let (_, session) = build_session();
    session
        .register_agent("summarizer".to_string(), vec![])
        .await
        .unwrap();
    session.start("analyze standup").await.unwrap();

    session
        .consensus()
        .initiate("summarizer".to_string(), "topic", json!(null), None)
        .await
        .unwrap();
    session
        .conflicts()
        .detect(
            "date of the release",
            "summarizer".to_string(),
            json!("june 3"),
            ConfidenceLevel::Low,
            "fact-checker".to_string(),
            json!("june 5"),
            ConfidenceLevel::Low,
            ConflictKind::Temporal,
        )
        .await
        .unwrap();
    session
        .quality()
        .register("t", "summarizer".to_string(), json!({}), 0.9)
        .await
        .unwrap();
    tokio::task::yield_now().await;

    let result = session.session_result().await;
    assert_eq!(result.consensus_topics.len(), 1);
    assert_eq!(
        result.active_conflicts.len()
            + result.resolved_conflicts.len()
            + result.escalated_conflicts.len(),
        1
    );
    assert_eq!(result.assessments.len(), 1);
    assert_eq!(result.workflow.goal.as_deref(), Some("analyze standup"));
}
