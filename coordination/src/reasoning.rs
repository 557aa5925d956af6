//! Reasoning service contract.
//!
//! Dialogue analysis and reconciliation proposals are produced by an
//! external reasoning capability. The only contract with the core is the
//! shape of [`DialogueAnalysis`]; everything else about the service is a
//! black box. Failures propagate to the caller of the triggering
//! operation and never corrupt the entity under analysis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conflict::types::{Conflict, ResolutionStrategy};

/// Structured verdict returned by the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueAnalysis {
    /// How much the dialogue converged, 0.0–1.0.
    pub agreement_level: f64,
    /// Strategy the service recommends for closing the conflict.
    pub recommended_strategy: ResolutionStrategy,
    /// Proposed resolution payload; opaque to the core.
    pub proposed_resolution: Value,
    /// Free-text rationale, stored verbatim in the resolution record.
    pub documentation: String,
}

/// External reasoning capability invoked by the conflict engine.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Analyze a conflict's dialogue history.
    async fn analyze_dialogue(&self, conflict: &Conflict) -> anyhow::Result<DialogueAnalysis>;

    /// Produce a reconciliation proposal for a conflict whose dialogue did
    /// not converge. Shape-compatible with [`Self::analyze_dialogue`].
    async fn propose_reconciliation(
        &self,
        conflict: &Conflict,
        analysis: &DialogueAnalysis,
    ) -> anyhow::Result<DialogueAnalysis>;
}
