//! Percentage thresholds over a ranking: the top `ceil(p/100 × total)` holders
//! for each breakpoint. Every set is a prefix of the same ranking, so the sets
//! nest.

use crate::allocator::collection::AddressSet;
use crate::allocator::holders::Ranking;

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    pub percentage: f64,
    pub addresses: AddressSet,
}

impl ThresholdSet {
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Number of ranked addresses a percentage cutoff admits.
pub fn threshold_count(percentage: f64, total: usize) -> usize {
    // Multiply before dividing so integral percentages stay exact.
    let raw = (percentage * total as f64 / 100.0).ceil();
    if raw <= 0.0 {
        0
    } else {
        (raw as usize).min(total)
    }
}

/// One threshold set per breakpoint, in the order given.
pub fn compute_thresholds(ranking: &Ranking, breakpoints: &[f64]) -> Vec<ThresholdSet> {
    breakpoints
        .iter()
        .map(|&percentage| {
            let count = threshold_count(percentage, ranking.len());
            ThresholdSet {
                percentage,
                addresses: ranking
                    .top(count)
                    .iter()
                    .map(|holder| holder.address.clone())
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::holders::{aggregate_holdings, HolderRecord, SourceKind, SourceRecords};

    fn ranking_of(count: usize) -> Ranking {
        let records = (0..count)
            .map(|i| HolderRecord {
                address: format!("0x{i:040x}"),
                holding: (count - i) as f64,
            })
            .collect();
        aggregate_holdings(&[SourceRecords {
            source: "token.csv".to_string(),
            kind: SourceKind::Balance,
            records,
            skipped_rows: 0,
        }])
        .ranking()
    }

    #[test]
    fn threshold_count_rounds_up() {
        assert_eq!(threshold_count(1.0, 1000), 10);
        assert_eq!(threshold_count(29.0, 1000), 290);
        assert_eq!(threshold_count(56.0, 1000), 560);
        assert_eq!(threshold_count(1.0, 150), 2);
        assert_eq!(threshold_count(100.0, 7), 7);
        assert_eq!(threshold_count(15.0, 0), 0);
    }

    #[test]
    fn thresholds_nest_and_match_expected_sizes() {
        let ranking = ranking_of(1000);
        let breakpoints = [1.0, 2.0, 4.0, 8.0, 15.0, 29.0, 56.0];
        let sets = compute_thresholds(&ranking, &breakpoints);
        assert_eq!(sets.len(), breakpoints.len());
        for pair in sets.windows(2) {
            assert!(pair[0].addresses.is_subset(&pair[1].addresses));
        }
        for set in &sets {
            assert_eq!(set.len(), threshold_count(set.percentage, 1000));
        }
        assert!(sets[0].addresses.contains(&format!("0x{:040x}", 0)));
    }

    #[test]
    fn empty_ranking_gives_empty_sets() {
        let sets = compute_thresholds(&Ranking::default(), &[1.0, 50.0]);
        assert!(sets.iter().all(ThresholdSet::is_empty));
    }
}
