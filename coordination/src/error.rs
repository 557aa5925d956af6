//! Error taxonomy for the coordination core.
//!
//! Protocol-level outcomes (validator starvation, budget exhaustion) are not
//! errors — they surface as status transitions and events. The variants here
//! cover unknown ids, rejected operations, and true faults from the external
//! collaborators.

use crate::messaging::TransportError;

/// Errors surfaced by coordination operations.
#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    /// The referenced entity is not tracked by its owning component.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation is not valid for the entity's current state.
    /// The entity is left unmodified.
    #[error("invalid state for {entity} {id}: {detail}")]
    InvalidState {
        entity: &'static str,
        id: String,
        detail: String,
    },

    /// The messaging substrate failed to deliver. Local entity state is
    /// authoritative; callers must tolerate agents that missed the message.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The reasoning service failed. The triggering entity is left in its
    /// last consistent state.
    #[error("reasoning service failure: {0}")]
    Reasoning(String),
}

impl CoordinationError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(
        entity: &'static str,
        id: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            entity,
            id: id.into(),
            detail: detail.into(),
        }
    }
}

/// Result type for coordination operations.
pub type CoordinationResult<T> = Result<T, CoordinationError>;
