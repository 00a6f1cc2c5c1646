use std::collections::BTreeSet;
use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::allocator::collection::{AddressSet, CollectionSet};
use crate::allocator::scoring::{score_combination, PriorityList, ScoredCombination};
use crate::allocator::AllocationError;

/// Largest combination tried per step. Bounds the C(n,1)+C(n,2)+C(n,3) search.
pub const DEFAULT_MAX_GROUP_SIZE: usize = 3;
/// Raw member count above which a collection counts as large.
pub const DEFAULT_LARGE_COLLECTION_THRESHOLD: usize = 2000;

/// Knobs of the group search. Defaults match the campaign rules; config may
/// override any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    pub max_group_size: usize,
    /// Size cap (× target) when any member is prioritized.
    pub priority_limit_factor: f64,
    /// Size cap (× target) when any member is a large collection.
    pub large_limit_factor: f64,
    pub default_limit_factor: f64,
    pub large_collection_threshold: usize,
    pub growth_weight: f64,
    pub priority_weight: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
            priority_limit_factor: 2.5,
            large_limit_factor: 2.0,
            default_limit_factor: 1.5,
            large_collection_threshold: DEFAULT_LARGE_COLLECTION_THRESHOLD,
            growth_weight: 0.7,
            priority_weight: 0.3,
        }
    }
}

impl SelectionPolicy {
    fn max_limit_factor(&self) -> f64 {
        self.priority_limit_factor
            .max(self.large_limit_factor)
            .max(self.default_limit_factor)
    }
}

/// Winning combination of one selector step. Empty `collections` means nothing
/// qualified and the caller skips the collection tier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSelection {
    pub collections: Vec<String>,
    pub addresses: AddressSet,
    pub net_new: usize,
    pub score: f64,
}

impl GroupSelection {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    fn from_scored(scored: &ScoredCombination<'_>) -> Self {
        Self {
            collections: scored.names(),
            addresses: scored.union.iter().map(|address| address.to_string()).collect(),
            net_new: scored.net_new,
            score: scored.score.combined,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupSelector<'a> {
    priorities: &'a PriorityList,
    policy: &'a SelectionPolicy,
}

impl<'a> GroupSelector<'a> {
    pub fn new(priorities: &'a PriorityList, policy: &'a SelectionPolicy) -> Self {
        Self { priorities, policy }
    }

    /// Net-new cap for a combination, in addresses.
    pub fn size_limit(&self, members: &[&CollectionSet], target: usize) -> f64 {
        let factor = if members
            .iter()
            .any(|member| self.priorities.contains(&member.name))
        {
            self.policy.priority_limit_factor
        } else if members
            .iter()
            .any(|member| member.len() > self.policy.large_collection_threshold)
        {
            self.policy.large_limit_factor
        } else {
            self.policy.default_limit_factor
        };
        factor * target as f64
    }

    pub fn select(
        &self,
        collections: &[CollectionSet],
        used: &BTreeSet<String>,
        base: &AddressSet,
        target: usize,
    ) -> Result<GroupSelection, AllocationError> {
        if target == 0 {
            return Err(AllocationError::ZeroTarget);
        }

        let candidates = self.rank_candidates(collections, used, base, target);
        let mut best: Option<ScoredCombination<'_>> = None;
        let mut evaluated = 0usize;

        for size in 1..=self.policy.max_group_size.min(candidates.len()) {
            for indices in Combinations::new(candidates.len(), size) {
                let members: Vec<&CollectionSet> =
                    indices.iter().map(|&index| candidates[index]).collect();
                let scored =
                    score_combination(&members, base, target, self.priorities, self.policy);
                evaluated += 1;

                let limit = self.size_limit(&members, target);
                if scored.net_new == 0 || scored.net_new as f64 > limit {
                    trace!(
                        collections = ?scored.names(),
                        net_new = scored.net_new,
                        limit,
                        "combination disqualified"
                    );
                    continue;
                }

                // Strict comparison keeps the first combination on ties.
                let better = best
                    .as_ref()
                    .map_or(true, |current| scored.score.combined > current.score.combined);
                if better {
                    best = Some(scored);
                }
            }
        }

        let selection = best
            .as_ref()
            .map(GroupSelection::from_scored)
            .unwrap_or_default();
        debug!(
            target_size = target,
            candidates = candidates.len(),
            evaluated,
            selected = ?selection.collections,
            net_new = selection.net_new,
            "group selection finished"
        );
        Ok(selection)
    }

    /// Unused collections sorted by effective size, largest first. Collections
    /// that alone exceed every possible cap can never qualify and are dropped.
    fn rank_candidates<'c>(
        &self,
        collections: &'c [CollectionSet],
        used: &BTreeSet<String>,
        base: &AddressSet,
        target: usize,
    ) -> Vec<&'c CollectionSet> {
        let ceiling = self.policy.max_limit_factor() * target as f64;
        let mut sized: Vec<(usize, &'c CollectionSet)> = collections
            .iter()
            .filter(|collection| !used.contains(&collection.name))
            .map(|collection| (collection.effective_size(base), collection))
            .filter(|(effective, _)| *effective as f64 <= ceiling)
            .collect();
        sized.sort_by_key(|(effective, _)| Reverse(*effective));
        sized.into_iter().map(|(_, collection)| collection).collect()
    }
}

/// Lexicographic k-combinations of `0..n`.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            started: false,
            done: k == 0 || k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.indices.clone());
        }

        let k = self.indices.len();
        let mut position = k;
        while position > 0 {
            position -= 1;
            if self.indices[position] < self.n - k + position {
                self.indices[position] += 1;
                for next in position + 1..k {
                    self.indices[next] = self.indices[next - 1] + 1;
                }
                return Some(self.indices.clone());
            }
        }
        self.done = true;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(name: &str, prefix: &str, count: usize) -> CollectionSet {
        CollectionSet::new(name, (0..count).map(|i| format!("{prefix}{i:04}")))
    }

    #[test]
    fn combinations_are_lexicographic() {
        let all: Vec<Vec<usize>> = Combinations::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(Combinations::new(5, 3).count(), 10);
        assert_eq!(Combinations::new(2, 3).count(), 0);
        assert_eq!(Combinations::new(3, 0).count(), 0);
    }

    #[test]
    fn size_limit_tiers_by_priority_then_size() {
        let priorities = PriorityList::new(["vip"]);
        let policy = SelectionPolicy::default();
        let selector = GroupSelector::new(&priorities, &policy);
        let vip = collection("vip", "0xv", 10);
        let large = collection("large", "0xl", 2001);
        let small = collection("small", "0xs", 10);

        assert_eq!(selector.size_limit(&[&vip, &large], 100), 250.0);
        assert_eq!(selector.size_limit(&[&small, &large], 100), 200.0);
        assert_eq!(selector.size_limit(&[&small], 100), 150.0);
    }

    #[test]
    fn picks_combination_closest_to_target() {
        let priorities = PriorityList::default();
        let policy = SelectionPolicy::default();
        let selector = GroupSelector::new(&priorities, &policy);
        let collections = vec![
            collection("a", "0xa", 12),
            collection("b", "0xb", 8),
            collection("c", "0xc", 30),
        ];
        let selection = selector
            .select(&collections, &BTreeSet::new(), &AddressSet::new(), 20)
            .expect("positive target");
        assert_eq!(selection.collections, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(selection.net_new, 20);
        assert_eq!(selection.addresses.len(), 20);
    }

    #[test]
    fn used_and_oversized_collections_are_never_selected() {
        let priorities = PriorityList::default();
        let policy = SelectionPolicy::default();
        let selector = GroupSelector::new(&priorities, &policy);
        let collections = vec![collection("a", "0xa", 10), collection("huge", "0xh", 500)];
        let used: BTreeSet<String> = ["a".to_string()].into_iter().collect();

        let selection = selector
            .select(&collections, &used, &AddressSet::new(), 10)
            .expect("positive target");
        assert!(selection.is_empty());
        assert_eq!(selection.net_new, 0);
    }

    #[test]
    fn fully_overlapping_collection_does_not_qualify() {
        let priorities = PriorityList::new(["dup"]);
        let policy = SelectionPolicy::default();
        let selector = GroupSelector::new(&priorities, &policy);
        let dup = collection("dup", "0xd", 5);
        let base: AddressSet = dup.members.clone();

        let selection = selector
            .select(&[dup], &BTreeSet::new(), &base, 5)
            .expect("positive target");
        assert!(selection.is_empty());
    }

    #[test]
    fn zero_target_is_rejected() {
        let priorities = PriorityList::default();
        let policy = SelectionPolicy::default();
        let selector = GroupSelector::new(&priorities, &policy);
        let result = selector.select(&[], &BTreeSet::new(), &AddressSet::new(), 0);
        assert_eq!(result, Err(AllocationError::ZeroTarget));
    }

    #[test]
    fn priority_breaks_near_ties() {
        let priorities = PriorityList::new(["curated"]);
        let policy = SelectionPolicy::default();
        let selector = GroupSelector::new(&priorities, &policy);
        let collections = vec![
            collection("exact", "0xe", 20),
            collection("curated", "0xc", 22),
        ];
        let selection = selector
            .select(&collections, &BTreeSet::new(), &AddressSet::new(), 20)
            .expect("positive target");
        assert_eq!(selection.collections, vec!["curated".to_string()]);
    }
}
