//! Tier sequencing: alternate threshold tiers with the best collection group
//! for each step, accumulating a strictly growing allowlist.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::allocator::collection::{AddressSet, CollectionSet};
use crate::allocator::holders::Ranking;
use crate::allocator::selector::GroupSelector;
use crate::allocator::thresholds::{compute_thresholds, ThresholdSet};
use crate::allocator::{AllocationError, CampaignPlan};

/// Where a tier's new addresses came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierOrigin {
    Threshold { percentage: f64 },
    Collections { names: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tier {
    /// 1-based position in the emitted sequence.
    pub index: usize,
    pub name: String,
    pub description: String,
    pub addresses: AddressSet,
    pub components: Vec<String>,
    pub origin: TierOrigin,
}

impl Tier {
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Walks the breakpoints and emits tiers in order.
pub struct TierSequencer<'a> {
    plan: &'a CampaignPlan,
    tiers: Vec<Tier>,
    accumulated: AddressSet,
    used: BTreeSet<String>,
}

impl<'a> TierSequencer<'a> {
    pub fn new(plan: &'a CampaignPlan) -> Self {
        Self {
            plan,
            tiers: Vec::new(),
            accumulated: AddressSet::new(),
            used: BTreeSet::new(),
        }
    }

    pub fn run(
        mut self,
        ranking: &Ranking,
        collections: &[CollectionSet],
    ) -> Result<Vec<Tier>, AllocationError> {
        let plan = self.plan;
        if plan.breakpoints.is_empty() {
            return Err(AllocationError::NoBreakpoints);
        }
        if ranking.is_empty() {
            return Err(AllocationError::EmptyRanking);
        }

        let thresholds = compute_thresholds(ranking, &plan.breakpoints);
        let selector = GroupSelector::new(&plan.priorities, &plan.policy);
        let last = thresholds.len() - 1;

        self.push_threshold(&thresholds[0]);

        for step in 1..thresholds.len() {
            let previous = &thresholds[step - 1];
            let current = &thresholds[step];
            let target = current.len() as i64 - previous.len() as i64;
            if target <= 0 {
                return Err(AllocationError::NonPositiveTarget {
                    previous: previous.percentage,
                    current: current.percentage,
                    target,
                });
            }

            // The final breakpoint only ever gets its threshold tier.
            if step != last {
                let selection = selector.select(
                    collections,
                    &self.used,
                    &self.accumulated,
                    target as usize,
                )?;
                if selection.is_empty() {
                    debug!(
                        percentage = current.percentage,
                        target_size = target,
                        "no collection group qualified, skipping"
                    );
                } else {
                    self.push_collections(selection.collections, selection.addresses);
                }
            }

            self.push_threshold(current);
        }

        info!(
            tiers = self.tiers.len(),
            addresses = self.accumulated.len(),
            collections_used = self.used.len(),
            "tier sequence complete"
        );
        Ok(self.tiers)
    }

    fn push_threshold(&mut self, threshold: &ThresholdSet) {
        let plan = self.plan;
        let token = &plan.token_label;
        let percentage = format_percentage(threshold.percentage);
        self.accumulated.extend(threshold.addresses.iter().cloned());
        self.push_tier(
            format!("Top {percentage}% {token} holders"),
            format!("Top {percentage}% of {token} holders by balance, plus every earlier tier"),
            vec![format!("{token} top {percentage}%")],
            TierOrigin::Threshold {
                percentage: threshold.percentage,
            },
        );
    }

    fn push_collections(&mut self, names: Vec<String>, addresses: AddressSet) {
        self.accumulated.extend(addresses);
        self.used.extend(names.iter().cloned());
        self.push_tier(
            names.join(" + "),
            format!("Holders of {}, plus every earlier tier", names.join(", ")),
            names.clone(),
            TierOrigin::Collections { names },
        );
    }

    fn push_tier(
        &mut self,
        name: String,
        description: String,
        components: Vec<String>,
        origin: TierOrigin,
    ) {
        let index = self.tiers.len() + 1;
        info!(
            index,
            name = %name,
            addresses = self.accumulated.len(),
            "emitted tier"
        );
        self.tiers.push(Tier {
            index,
            name,
            description,
            addresses: self.accumulated.clone(),
            components,
            origin,
        });
    }
}

/// `1` for whole percentages, `0.5` otherwise.
pub fn format_percentage(percentage: f64) -> String {
    if percentage.fract() == 0.0 {
        format!("{}", percentage as i64)
    } else {
        format!("{percentage}")
    }
}

/// Run the full sequence for a plan.
pub fn sequence_tiers(
    ranking: &Ranking,
    collections: &[CollectionSet],
    plan: &CampaignPlan,
) -> Result<Vec<Tier>, AllocationError> {
    TierSequencer::new(plan).run(ranking, collections)
}
