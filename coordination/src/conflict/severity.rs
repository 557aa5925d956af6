//! Deterministic severity scoring and strategy selection.
//!
//! Severity is a pure function of the two claim confidences and the
//! conflict kind — identical inputs always classify identically. The
//! strategy table is keyed by severity and kind.

use super::types::{ConfidenceLevel, ConflictKind, ResolutionStrategy, Severity};

/// Mean of the two confidence anchors.
pub fn confidence_score(a: ConfidenceLevel, b: ConfidenceLevel) -> f64 {
    (a.anchor() + b.anchor()) / 2.0
}

/// Classify severity from the claims.
///
/// `score = round2(confidence_score × kind_weight)`, banded at
/// critical > 0.8, high > 0.6, medium > 0.4, else low.
pub fn severity_for(a: ConfidenceLevel, b: ConfidenceLevel, kind: ConflictKind) -> Severity {
    let score = confidence_score(a, b) * kind.weight();
    let score = (score * 100.0).round() / 100.0;

    if score > 0.8 {
        Severity::Critical
    } else if score > 0.6 {
        Severity::High
    } else if score > 0.4 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Fixed strategy decision table.
pub fn strategy_for(
    severity: Severity,
    kind: ConflictKind,
    require_human_approval: bool,
) -> ResolutionStrategy {
    match severity {
        Severity::Critical => {
            if require_human_approval {
                ResolutionStrategy::HumanDecision
            } else {
                ResolutionStrategy::EvidenceBased
            }
        }
        Severity::High => ResolutionStrategy::EvidenceBased,
        Severity::Medium => {
            if kind == ConflictKind::Factual {
                ResolutionStrategy::EvidenceBased
            } else {
                ResolutionStrategy::Integration
            }
        }
        Severity::Low => ResolutionStrategy::Compromise,
    }
}
