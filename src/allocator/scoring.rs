use std::collections::HashSet;

use crate::allocator::collection::{AddressSet, CollectionSet};
use crate::allocator::selector::SelectionPolicy;

/// Ordered collection names; earlier entries carry more weight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityList {
    names: Vec<String>,
}

impl PriorityList {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| seen.insert(name.clone()))
            .collect();
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|entry| entry == name)
    }

    /// `len - position` for listed names, 0 otherwise.
    pub fn weight(&self, name: &str) -> usize {
        self.names
            .iter()
            .position(|entry| entry == name)
            .map_or(0, |position| self.names.len() - position)
    }

    pub fn max_weight(&self) -> usize {
        self.names.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinationScore {
    pub growth: f64,
    pub priority: f64,
    pub combined: f64,
}

#[derive(Debug, Clone)]
pub struct ScoredCombination<'a> {
    pub members: Vec<&'a CollectionSet>,
    pub union: HashSet<&'a str>,
    pub net_new: usize,
    pub score: CombinationScore,
}

impl ScoredCombination<'_> {
    pub fn names(&self) -> Vec<String> {
        self.members.iter().map(|member| member.name.clone()).collect()
    }
}

/// `1 / (|ln(net_new / target)| + 1)`: 1.0 on target, symmetric in log space.
pub fn growth_score(net_new: usize, target: usize) -> f64 {
    if net_new == 0 || target == 0 {
        return 0.0;
    }
    let ratio = net_new as f64 / target as f64;
    1.0 / (ratio.ln().abs() + 1.0)
}

/// Mean member weight normalized to [0, 1].
pub fn priority_score<'n>(names: impl IntoIterator<Item = &'n str>, priorities: &PriorityList) -> f64 {
    let max_weight = priorities.max_weight();
    if max_weight == 0 {
        return 0.0;
    }
    let (total, count) = names
        .into_iter()
        .fold((0usize, 0usize), |(total, count), name| {
            (total + priorities.weight(name), count + 1)
        });
    if count == 0 {
        return 0.0;
    }
    (total as f64 / count as f64) / max_weight as f64
}

pub fn score_combination<'a>(
    members: &[&'a CollectionSet],
    base: &AddressSet,
    target: usize,
    priorities: &PriorityList,
    policy: &SelectionPolicy,
) -> ScoredCombination<'a> {
    let union: HashSet<&'a str> = members
        .iter()
        .flat_map(|member| member.members.iter().map(String::as_str))
        .collect();
    let net_new = union
        .iter()
        .filter(|address| !base.contains(**address))
        .count();

    let growth = growth_score(net_new, target);
    let priority = priority_score(members.iter().map(|m| m.name.as_str()), priorities);

    ScoredCombination {
        members: members.to_vec(),
        union,
        net_new,
        score: CombinationScore {
            growth,
            priority,
            combined: policy.growth_weight * growth + policy.priority_weight * priority,
        },
    }
}
