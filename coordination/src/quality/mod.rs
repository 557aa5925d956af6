//! Quality Control Pipeline.
//!
//! Every agent output is registered for assessment, cross-validated by
//! peer agents, refined when validation falls short, and finally
//! approved, failed, or escalated to a human reviewer.

pub mod assessment;
pub mod pipeline;

pub use assessment::{AssessmentStatus, QualityAssessment, TaskId, ValidationRecord};
pub use pipeline::QualityPipeline;
