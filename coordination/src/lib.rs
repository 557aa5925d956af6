//! Multi-agent coordination core for collaborative transcript analysis.
//!
//! Four protocol components drive a set of analysis agents toward a
//! consistent result:
//!
//! - [`workflow`] — phased workflow controller advancing the session
//!   through its fixed analysis phases.
//! - [`consensus`] — bounded-round voting on proposals.
//! - [`conflict`] — detection and resolution of contradictory claims.
//! - [`quality`] — cross-validation and refinement of agent outputs.
//!
//! Agents are external: they are reached through the [`messaging`]
//! substrate, enumerated by the [`registry`], and assisted by an external
//! [`reasoning`] service. [`session::CoordinationSession`] wires the
//! components together for one analysis run.

pub mod config;
pub mod conflict;
pub mod consensus;
pub mod error;
pub mod events;
pub mod messaging;
pub mod quality;
pub mod reasoning;
pub mod registry;
pub mod session;
pub mod telemetry;
pub mod timer;
pub mod workflow;

pub use config::{ConflictConfig, ConsensusConfig, CoordinationConfig, QualityConfig};
pub use conflict::{
    Claim, ConfidenceLevel, Conflict, ConflictEngine, ConflictId, ConflictKind, ConflictStatus,
    HumanDecision, Resolution, ResolutionStrategy, Severity,
};
pub use consensus::{ConsensusBuilder, ConsensusStatus, ConsensusTopic, TopicId, Vote, VoteChoice};
pub use error::{CoordinationError, CoordinationResult};
pub use events::{CoordinationEvent, EventBus, SharedEventBus};
pub use messaging::{
    Envelope, InMemoryTransport, MessageId, MessageTransport, Priority, ProtocolMessage,
    SendOptions, TransportError,
};
pub use quality::{AssessmentStatus, QualityAssessment, QualityPipeline, TaskId};
pub use reasoning::{DialogueAnalysis, ReasoningService};
pub use registry::{AgentId, AgentInfo, AgentRegistry, StaticRegistry};
pub use session::{CoordinationSession, SessionResult};
pub use workflow::{AnalysisPhase, PhaseRecord, PhaseStatus, WorkflowController, WorkflowSnapshot};
