//! Conflict Resolution Engine.
//!
//! Detects contradictory claims between two agents, classifies severity,
//! selects a resolution strategy, runs a structured dialogue, and closes
//! through resolution, reconciliation, or human escalation.

pub mod engine;
pub mod severity;
pub mod types;

pub use engine::ConflictEngine;
pub use severity::{confidence_score, severity_for, strategy_for};
pub use types::{
    Claim, ConfidenceLevel, Conflict, ConflictId, ConflictKind, ConflictStatus, DialogueEntry,
    HumanDecision, Resolution, ResolutionStrategy, Severity,
};
