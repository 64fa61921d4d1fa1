//! Tier policy: plan id to request limits.
//!
//! `TierPolicy::resolve` is total. Unknown, empty, or missing plan ids fall
//! back to the visitor tier so a malformed plan can never widen the limits.

use colloquy_types::tier::{PlanTier, TierParams};

pub struct TierPolicy;

impl TierPolicy {
    /// Map a plan id to its limits. Matching ignores case and surrounding whitespace.
    pub fn resolve(plan_id: Option<&str>) -> TierParams {
        Self::params(Self::tier_for(plan_id))
    }

    pub fn tier_for(plan_id: Option<&str>) -> PlanTier {
        let Some(plan_id) = plan_id else {
            return PlanTier::Visitor;
        };
        match plan_id.trim().to_ascii_lowercase().as_str() {
            "free" => PlanTier::Free,
            "basic" => PlanTier::Basic,
            "pro" => PlanTier::Pro,
            "enterprise" => PlanTier::Enterprise,
            _ => PlanTier::Visitor,
        }
    }

    pub fn params(tier: PlanTier) -> TierParams {
        let (max_answer_words, max_references, history_window, retain_history, max_suggestions) =
            match tier {
                PlanTier::Visitor => (80, 5, 1, false, 0),
                PlanTier::Free => (150, 7, 2, true, 2),
                PlanTier::Basic => (250, 10, 3, true, 3),
                PlanTier::Pro => (500, 10, 5, true, 3),
                PlanTier::Enterprise => (500, 15, 5, true, 5),
            };
        TierParams {
            tier,
            max_answer_words,
            max_references,
            history_window,
            retain_history,
            max_suggestions,
        }
    }
}
