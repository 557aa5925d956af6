//! Configuration for the coordination components.
//!
//! Every threshold and budget used by the protocols lives here. All sections
//! deserialize from TOML and carry documented defaults, so a session can be
//! built from `CoordinationConfig::default()` or a config file.

use serde::Deserialize;

/// Consensus builder settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Agreement level (agree / total cast) required to achieve consensus.
    pub threshold: f64,
    /// Maximum voting rounds before the topic is marked failed.
    pub max_rounds: u32,
    /// Round deadline in seconds.
    pub round_timeout_secs: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            max_rounds: 3,
            round_timeout_secs: 30,
        }
    }
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Dialogue rounds per participant before outcome processing triggers.
    pub max_dialogue_rounds: u32,
    /// Agreement level from dialogue analysis that permits auto-resolution.
    pub auto_resolve_threshold: f64,
    /// When set, critical conflicts always go to a human and auto-resolution
    /// is disabled regardless of agreement level.
    pub require_human_approval: bool,
    /// Feedback window after a reconciliation proposal, in seconds. The
    /// reconciliation finalizes when the window closes, regardless of how
    /// much feedback arrived.
    pub feedback_window_secs: u64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            max_dialogue_rounds: 3,
            auto_resolve_threshold: 0.75,
            require_human_approval: false,
            feedback_window_secs: 20,
        }
    }
}

/// Quality control settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Outputs below this confidence go straight to refinement.
    pub minimum_confidence: f64,
    /// Average validator agreement required for approval.
    pub validation_threshold: f64,
    /// Refinement iterations allowed before escalation or auto-approval.
    pub max_refinement_iterations: u32,
    /// Validators requested per assessment.
    pub max_validators: usize,
    /// When disabled, exhausted budgets auto-approve instead of escalating.
    pub human_review_enabled: bool,
    /// Validation deadline in seconds; results submitted by then are used.
    pub validation_timeout_secs: u64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            minimum_confidence: 0.6,
            validation_threshold: 0.75,
            max_refinement_iterations: 2,
            max_validators: 2,
            human_review_enabled: true,
            validation_timeout_secs: 30,
        }
    }
}

/// Top-level configuration for a coordination session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    pub consensus: ConsensusConfig,
    pub conflict: ConflictConfig,
    pub quality: QualityConfig,
}

impl CoordinationConfig {
    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        Ok(config)
    }
}
