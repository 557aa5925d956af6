//! Consensus Builder.
//!
//! Bounded-round voting on a proposal among a participant set. Each round
//! runs against a deadline; at the deadline the agreement level decides
//! between achieving, failing, or advancing to the next round.

pub mod builder;
pub mod topic;

pub use builder::ConsensusBuilder;
pub use topic::{ConsensusStatus, ConsensusTopic, TopicId, Vote, VoteChoice};
