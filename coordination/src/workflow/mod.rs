//! Phase Workflow Controller.
//!
//! Advances a shared analysis session through a fixed, ordered sequence of
//! phases and notifies every registered agent on each transition. Phase
//! records are retained for audit and never deleted.

pub mod controller;
pub mod phase;

pub use controller::{WorkflowController, WorkflowSnapshot};
pub use phase::{AnalysisPhase, PhaseRecord, PhaseStatus};
