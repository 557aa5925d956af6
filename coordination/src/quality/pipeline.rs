//! Quality control pipeline — validation, refinement, and escalation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::assessment::{AssessmentStatus, QualityAssessment, TaskId, ValidationRecord};
use crate::config::QualityConfig;
use crate::error::{CoordinationError, CoordinationResult};
use crate::events::{CoordinationEvent, SharedEventBus};
use crate::messaging::{Envelope, MessageTransport, Priority, ProtocolMessage, SendOptions};
use crate::registry::{AgentId, AgentRegistry};

/// What register/validation processing decided, computed under the lock
/// and acted on after it is released.
enum Disposition {
    Validate { validators: Vec<AgentId> },
    Refine { reasons: Vec<String> },
    Approve { fail_open: bool },
    Escalate,
    Fail,
}

/// Drives every task output through validation and refinement until it is
/// approved, failed, or handed to a human.
///
/// Assessments are never deleted; terminal entries keep answering status
/// queries with the same result.
pub struct QualityPipeline {
    config: QualityConfig,
    transport: Arc<dyn MessageTransport>,
    registry: Arc<dyn AgentRegistry>,
    bus: SharedEventBus,
    timer: crate::timer::DeadlineTimer,
    assessments: RwLock<HashMap<TaskId, QualityAssessment>>,
}

impl QualityPipeline {
    pub fn new(
        config: QualityConfig,
        transport: Arc<dyn MessageTransport>,
        registry: Arc<dyn AgentRegistry>,
        bus: SharedEventBus,
    ) -> Self {
        Self {
            config,
            transport,
            registry,
            bus,
            timer: crate::timer::DeadlineTimer::new(),
            assessments: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Enter an output into quality review.
    ///
    /// Low-confidence outputs skip validation and go straight to
    /// refinement. Otherwise up to `max_validators` non-producer agents
    /// are asked to cross-validate; with none available the output is
    /// auto-approved fail-open.
    pub async fn register(
        self: &Arc<Self>,
        task_id: impl Into<TaskId>,
        producer: AgentId,
        output: Value,
        confidence: f64,
    ) -> CoordinationResult<()> {
        let task_id = task_id.into();
        let assessment =
            QualityAssessment::new(task_id.clone(), producer.clone(), output, confidence);

        {
            let mut assessments = self.assessments.write().await;
            if assessments.contains_key(&task_id) {
                return Err(CoordinationError::invalid_state(
                    "assessment",
                    &task_id,
                    "task is already under review",
                ));
            }
            assessments.insert(task_id.clone(), assessment);
        }

        info!(task_id = %task_id, producer = %producer, confidence, "assessment registered");
        self.bus.publish(CoordinationEvent::AssessmentRegistered {
            task_id: task_id.clone(),
            producer,
            confidence,
            timestamp: Utc::now(),
        });

        if confidence < self.config.minimum_confidence {
            debug!(task_id = %task_id, "confidence below minimum; refining before validation");
            return self.request_refinement(&task_id, vec![format!(
                "producer confidence {confidence:.2} below minimum {:.2}",
                self.config.minimum_confidence
            )])
            .await;
        }

        let validators = self.select_validators(&task_id).await?;
        if validators.is_empty() {
            // No one can cross-validate. Approving here is a deliberate
            // fail-open tradeoff rather than blocking the workflow.
            warn!(task_id = %task_id, "no validators available; auto-approving");
            return self.conclude(&task_id, AssessmentStatus::Approved, true).await;
        }
        self.start_validation(&task_id, validators).await
    }

    /// Record one validator's result. Processing triggers as soon as every
    /// selected validator has answered; otherwise the deadline timer will.
    pub async fn submit_validation(
        self: &Arc<Self>,
        task_id: &str,
        validator: AgentId,
        agreement: f64,
        feedback: impl Into<String>,
    ) -> CoordinationResult<()> {
        let complete = {
            let mut assessments = self.assessments.write().await;
            let assessment = assessments
                .get_mut(task_id)
                .ok_or_else(|| CoordinationError::not_found("assessment", task_id))?;
            if assessment.status != AssessmentStatus::Validating {
                return Err(CoordinationError::invalid_state(
                    "assessment",
                    task_id,
                    format!("validation not accepted in {}", assessment.status),
                ));
            }
            if !assessment.is_validator(&validator) {
                return Err(CoordinationError::invalid_state(
                    "assessment",
                    task_id,
                    format!("{validator} was not asked to validate this task"),
                ));
            }

            // One result per validator; a resubmission replaces the first.
            assessment.validations.retain(|v| v.validator != validator);
            assessment.validations.push(ValidationRecord {
                validator,
                agreement,
                feedback: feedback.into(),
                submitted_at: Utc::now(),
            });
            assessment.validation_complete()
        };

        if complete {
            self.process_validation_results(task_id).await?;
        }
        Ok(())
    }

    /// Average the submitted agreement scores and approve or refine.
    pub async fn process_validation_results(self: &Arc<Self>, task_id: &str) -> CoordinationResult<()> {
        let disposition = {
            let assessments = self.assessments.read().await;
            let assessment = assessments
                .get(task_id)
                .ok_or_else(|| CoordinationError::not_found("assessment", task_id))?;
            if assessment.status != AssessmentStatus::Validating {
                return Err(CoordinationError::invalid_state(
                    "assessment",
                    task_id,
                    format!("no validation in progress, status is {}", assessment.status),
                ));
            }

            match assessment.average_agreement() {
                // Deadline passed with nothing submitted: fail-open.
                None => Disposition::Approve { fail_open: true },
                Some(avg) if avg >= self.config.validation_threshold => {
                    Disposition::Approve { fail_open: false }
                }
                Some(avg) => {
                    debug!(task_id, average = avg, "validation below threshold");
                    Disposition::Refine {
                        reasons: assessment
                            .validations
                            .iter()
                            .map(|v| v.feedback.clone())
                            .collect(),
                    }
                }
            }
        };

        match disposition {
            Disposition::Approve { fail_open } => {
                self.conclude(task_id, AssessmentStatus::Approved, fail_open).await
            }
            Disposition::Refine { reasons } => self.request_refinement(task_id, reasons).await,
            _ => Ok(()),
        }
    }

    /// Ask the producer for an improved output, or close out the
    /// assessment when the iteration budget is spent.
    pub async fn request_refinement(
        self: &Arc<Self>,
        task_id: &str,
        reasons: Vec<String>,
    ) -> CoordinationResult<()> {
        enum Next {
            Escalate(u32),
            AutoApprove,
            Request { iteration: u32, producer: AgentId },
        }

        let next = {
            let mut assessments = self.assessments.write().await;
            let assessment = assessments
                .get_mut(task_id)
                .ok_or_else(|| CoordinationError::not_found("assessment", task_id))?;
            if assessment.status.is_terminal() {
                return Err(CoordinationError::invalid_state(
                    "assessment",
                    task_id,
                    format!("assessment already concluded as {}", assessment.status),
                ));
            }

            if assessment.iteration >= self.config.max_refinement_iterations {
                if self.config.human_review_enabled {
                    Next::Escalate(assessment.iteration)
                } else {
                    // Budget spent and no human in the loop: fail-open.
                    Next::AutoApprove
                }
            } else {
                assessment.iteration += 1;
                assessment.status = AssessmentStatus::Refining;
                assessment.validators.clear();
                assessment.validations.clear();
                Next::Request {
                    iteration: assessment.iteration,
                    producer: assessment.producer.clone(),
                }
            }
        };

        match next {
            Next::Escalate(iteration) => self.escalate(task_id, iteration).await,
            Next::AutoApprove => {
                warn!(task_id, "refinement budget spent without human review; auto-approving");
                self.conclude(task_id, AssessmentStatus::Approved, true).await
            }
            Next::Request { iteration, producer } => {
                info!(task_id, iteration, "refinement requested");
                self.bus.publish(CoordinationEvent::RefinementRequested {
                    task_id: task_id.to_string(),
                    iteration,
                    timestamp: Utc::now(),
                });
                let envelope = Envelope::from_coordinator(
                    vec![producer],
                    ProtocolMessage::RefinementRequest {
                        task_id: task_id.to_string(),
                        iteration,
                        reasons,
                    },
                );
                self.transport
                    .send_message(envelope, SendOptions::priority(Priority::High))
                    .await?;
                Ok(())
            }
        }
    }

    /// Accept the producer's improved output.
    pub async fn submit_refined_output(
        self: &Arc<Self>,
        task_id: &str,
        output: Value,
        confidence: f64,
    ) -> CoordinationResult<()> {
        let disposition = {
            let mut assessments = self.assessments.write().await;
            let assessment = assessments
                .get_mut(task_id)
                .ok_or_else(|| CoordinationError::not_found("assessment", task_id))?;
            if assessment.status != AssessmentStatus::Refining {
                return Err(CoordinationError::invalid_state(
                    "assessment",
                    task_id,
                    format!("no refinement pending, status is {}", assessment.status),
                ));
            }

            assessment.output = output;
            assessment.confidence = confidence;

            if confidence >= self.config.minimum_confidence {
                Disposition::Approve { fail_open: false }
            } else if assessment.iteration >= self.config.max_refinement_iterations {
                if self.config.human_review_enabled {
                    Disposition::Escalate
                } else {
                    Disposition::Approve { fail_open: true }
                }
            } else {
                Disposition::Validate {
                    validators: Vec::new(),
                }
            }
        };

        match disposition {
            Disposition::Approve { fail_open } => {
                self.conclude(task_id, AssessmentStatus::Approved, fail_open).await
            }
            Disposition::Escalate => {
                let iteration = self.assessment(task_id).await?.iteration;
                self.escalate(task_id, iteration).await
            }
            Disposition::Validate { .. } => {
                let validators = self.select_validators(task_id).await?;
                if validators.is_empty() {
                    warn!(task_id, "no validators for refined output; auto-approving");
                    return self.conclude(task_id, AssessmentStatus::Approved, true).await;
                }
                self.start_validation(task_id, validators).await
            }
            _ => Ok(()),
        }
    }

    /// Record the human verdict on an escalated assessment.
    ///
    /// Accepted approves. Rejected re-enters refinement when budget
    /// remains, otherwise the task is failed.
    pub async fn submit_human_feedback(
        self: &Arc<Self>,
        task_id: &str,
        accepted: bool,
        notes: Option<String>,
    ) -> CoordinationResult<()> {
        let disposition = {
            let assessments = self.assessments.read().await;
            let assessment = assessments
                .get(task_id)
                .ok_or_else(|| CoordinationError::not_found("assessment", task_id))?;
            if assessment.status != AssessmentStatus::AwaitingHuman {
                return Err(CoordinationError::invalid_state(
                    "assessment",
                    task_id,
                    format!("no human review pending, status is {}", assessment.status),
                ));
            }

            if accepted {
                Disposition::Approve { fail_open: false }
            } else if assessment.iteration < self.config.max_refinement_iterations {
                Disposition::Refine {
                    reasons: notes.into_iter().collect(),
                }
            } else {
                Disposition::Fail
            }
        };

        info!(task_id, accepted, "human feedback recorded");
        match disposition {
            Disposition::Approve { fail_open } => {
                self.conclude(task_id, AssessmentStatus::Approved, fail_open).await
            }
            Disposition::Refine { reasons } => {
                // Leave awaiting_human before re-entering the loop.
                {
                    let mut assessments = self.assessments.write().await;
                    if let Some(a) = assessments.get_mut(task_id) {
                        a.status = AssessmentStatus::Refining;
                    }
                }
                self.request_refinement(task_id, reasons).await
            }
            Disposition::Fail => self.conclude(task_id, AssessmentStatus::Failed, false).await,
            _ => Ok(()),
        }
    }

    /// Current status of a tracked task. Never errs for a valid id.
    pub async fn status(&self, task_id: &str) -> CoordinationResult<AssessmentStatus> {
        Ok(self.assessment(task_id).await?.status)
    }

    /// Full assessment record.
    pub async fn assessment(&self, task_id: &str) -> CoordinationResult<QualityAssessment> {
        self.assessments
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| CoordinationError::not_found("assessment", task_id))
    }

    /// All tracked assessments.
    pub async fn assessments(&self) -> Vec<QualityAssessment> {
        self.assessments.read().await.values().cloned().collect()
    }

    /// Non-producer agents, up to the configured validator count.
    /// Registry listing order makes selection deterministic.
    async fn select_validators(&self, task_id: &str) -> CoordinationResult<Vec<AgentId>> {
        let producer = self.assessment(task_id).await?.producer;
        Ok(self
            .registry
            .list_agents()
            .into_iter()
            .map(|a| a.id)
            .filter(|id| id != &producer)
            .take(self.config.max_validators)
            .collect())
    }

    async fn start_validation(
        self: &Arc<Self>,
        task_id: &str,
        validators: Vec<AgentId>,
    ) -> CoordinationResult<()> {
        let (output, producer, iteration) = {
            let mut assessments = self.assessments.write().await;
            let assessment = assessments
                .get_mut(task_id)
                .ok_or_else(|| CoordinationError::not_found("assessment", task_id))?;
            assessment.status = AssessmentStatus::Validating;
            assessment.validators = validators.clone();
            assessment.validations.clear();
            (
                assessment.output.clone(),
                assessment.producer.clone(),
                assessment.iteration,
            )
        };

        info!(task_id, validators = validators.len(), "validation requested");
        self.bus.publish(CoordinationEvent::ValidationRequested {
            task_id: task_id.to_string(),
            validators: validators.clone(),
            timestamp: Utc::now(),
        });

        let envelope = Envelope::from_coordinator(
            validators,
            ProtocolMessage::ValidationRequest {
                task_id: task_id.to_string(),
                output,
                producer,
            },
        );
        self.transport
            .send_message(envelope, SendOptions::priority(Priority::Normal))
            .await?;

        self.schedule_deadline(task_id, iteration);
        Ok(())
    }

    /// Validation deadline. Guarded by (status, iteration) so a timer from
    /// an earlier cycle no-ops against a later one.
    fn schedule_deadline(self: &Arc<Self>, task_id: &str, iteration: u32) {
        let pipeline = Arc::clone(self);
        let task_id = task_id.to_string();
        self.timer.schedule(
            "validation_deadline",
            Duration::from_secs(self.config.validation_timeout_secs),
            async move {
                let stale = match pipeline.assessment(&task_id).await {
                    Ok(a) => a.status != AssessmentStatus::Validating || a.iteration != iteration,
                    Err(_) => true,
                };
                if stale {
                    debug!(task_id = %task_id, "validation deadline fired on settled assessment");
                    return;
                }
                if let Err(e) = pipeline.process_validation_results(&task_id).await {
                    warn!(task_id = %task_id, error = %e, "deadline processing failed");
                }
            },
        );
    }

    async fn escalate(&self, task_id: &str, iteration: u32) -> CoordinationResult<()> {
        {
            let mut assessments = self.assessments.write().await;
            let assessment = assessments
                .get_mut(task_id)
                .ok_or_else(|| CoordinationError::not_found("assessment", task_id))?;
            assessment.status = AssessmentStatus::AwaitingHuman;
        }
        info!(task_id, iteration, "assessment escalated to human review");
        self.bus.publish(CoordinationEvent::AssessmentEscalated {
            task_id: task_id.to_string(),
            iteration,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn conclude(
        &self,
        task_id: &str,
        status: AssessmentStatus,
        fail_open: bool,
    ) -> CoordinationResult<()> {
        {
            let mut assessments = self.assessments.write().await;
            let assessment = assessments
                .get_mut(task_id)
                .ok_or_else(|| CoordinationError::not_found("assessment", task_id))?;
            assessment.conclude(status, fail_open);
        }
        info!(task_id, status = %status, fail_open, "assessment concluded");
        self.bus.publish(CoordinationEvent::AssessmentConcluded {
            task_id: task_id.to_string(),
            status,
            fail_open,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
