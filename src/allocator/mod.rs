pub mod collection;
pub mod holders;
pub mod scoring;
pub mod selector;
pub mod sequencer;
pub mod thresholds;

pub use collection::{AddressSet, CollectionSet};
pub use holders::{
    aggregate_holdings, normalize_address, HolderLedger, HolderRecord, RankedHolder, Ranking,
    SourceKind, SourceRecords,
};
pub use scoring::{growth_score, priority_score, score_combination, PriorityList};
pub use selector::{GroupSelection, GroupSelector, SelectionPolicy};
pub use sequencer::{sequence_tiers, Tier, TierOrigin, TierSequencer};
pub use thresholds::{compute_thresholds, threshold_count, ThresholdSet};

/// Percentage breakpoints used when a campaign does not configure its own.
pub const DEFAULT_BREAKPOINTS: [f64; 7] = [1.0, 2.0, 4.0, 8.0, 15.0, 29.0, 56.0];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    #[error("no percentage breakpoints configured")]
    NoBreakpoints,
    #[error("token ranking is empty; nothing to tier")]
    EmptyRanking,
    #[error(
        "breakpoint {current}% adds {target} addresses over {previous}%; breakpoints must grow the threshold set"
    )]
    NonPositiveTarget {
        previous: f64,
        current: f64,
        target: i64,
    },
    #[error("group selection requested with a zero target size")]
    ZeroTarget,
}

/// Everything the allocator needs besides the input sets.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignPlan {
    /// Token symbol used in threshold tier names, e.g. `EXEC`.
    pub token_label: String,
    /// Ascending percentages in (0, 100].
    pub breakpoints: Vec<f64>,
    pub priorities: PriorityList,
    pub policy: SelectionPolicy,
}

impl Default for CampaignPlan {
    fn default() -> Self {
        Self {
            token_label: "TOKEN".to_string(),
            breakpoints: DEFAULT_BREAKPOINTS.to_vec(),
            priorities: PriorityList::default(),
            policy: SelectionPolicy::default(),
        }
    }
}

/// Rank the token holders and sequence tiers over `collections`.
pub fn plan_tiers(
    token_sources: &[SourceRecords],
    collections: &[CollectionSet],
    plan: &CampaignPlan,
) -> Result<Vec<Tier>, AllocationError> {
    let ranking = aggregate_holdings(token_sources).ranking();
    sequence_tiers(&ranking, collections, plan)
}
