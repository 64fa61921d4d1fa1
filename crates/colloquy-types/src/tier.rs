//! Subscription tiers and the limits they carry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A subscription plan, ordered from most to least restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Visitor,
    Free,
    Basic,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub const ALL: [PlanTier; 5] = [
        PlanTier::Visitor,
        PlanTier::Free,
        PlanTier::Basic,
        PlanTier::Pro,
        PlanTier::Enterprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Visitor => "visitor",
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits applied to a single request.
///
/// Derived from the caller's plan on every request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierParams {
    pub tier: PlanTier,
    /// Ceiling on words forwarded to the caller.
    pub max_answer_words: usize,
    /// Retrieval fan-out and citation cap.
    pub max_references: usize,
    /// Prior turns (query + response pairs) included as context.
    pub history_window: usize,
    /// Whether history is kept at all.
    pub retain_history: bool,
    /// Follow-up questions offered when an answer completes.
    pub max_suggestions: usize,
}
