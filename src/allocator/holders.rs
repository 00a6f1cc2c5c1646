//! Holder aggregation: fold per-source balance/quantity records into one
//! cumulative holding per address, then rank descending.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How the adapter interpreted the amount column of a source. Aggregation
/// treats both the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Fractional token balances (`Balance` column).
    Balance,
    /// Integer NFT quantities (`Quantity` column).
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HolderRecord {
    pub address: String,
    pub holding: f64,
}

/// Every valid record parsed from one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecords {
    pub source: String,
    pub kind: SourceKind,
    pub records: Vec<HolderRecord>,
    pub skipped_rows: usize,
}

/// Lowercase and validate a `0x` + 40 hex digit address.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('"');
    let lowered = trimmed.to_ascii_lowercase();
    let hex = lowered.strip_prefix("0x")?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(lowered)
}

/// Cumulative holdings keyed by address, remembering first-seen order so the
/// ranking's tie-break is stable.
#[derive(Debug, Clone, Default)]
pub struct HolderLedger {
    order: Vec<String>,
    totals: HashMap<String, f64>,
}

impl HolderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &HolderRecord) {
        match self.totals.get_mut(&record.address) {
            Some(total) => *total += record.holding,
            None => {
                self.order.push(record.address.clone());
                self.totals.insert(record.address.clone(), record.holding);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn holding(&self, address: &str) -> Option<f64> {
        self.totals.get(address).copied()
    }

    /// Addresses in first-seen order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn ranking(&self) -> Ranking {
        let mut entries: Vec<RankedHolder> = self
            .order
            .iter()
            .map(|address| RankedHolder {
                address: address.clone(),
                holding: self.totals.get(address).copied().unwrap_or_default(),
            })
            .collect();
        // sort_by is stable: equal holdings keep first-seen order.
        entries.sort_by(|left, right| right.holding.total_cmp(&left.holding));
        Ranking { entries }
    }
}

/// Sum every record of every source into one ledger.
pub fn aggregate_holdings(sources: &[SourceRecords]) -> HolderLedger {
    let mut ledger = HolderLedger::new();
    for source in sources {
        if source.records.is_empty() {
            warn!(source = %source.source, "source yielded no valid rows");
            continue;
        }
        for record in &source.records {
            ledger.add(record);
        }
        debug!(
            source = %source.source,
            records = source.records.len(),
            skipped = source.skipped_rows,
            "aggregated source"
        );
    }
    ledger
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedHolder {
    pub address: String,
    pub holding: f64,
}

/// Addresses ordered by aggregated holding, descending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    entries: Vec<RankedHolder>,
}

impl Ranking {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RankedHolder] {
        &self.entries
    }

    /// The first `count` holders (fewer if the ranking is shorter).
    pub fn top(&self, count: usize) -> &[RankedHolder] {
        &self.entries[..count.min(self.entries.len())]
    }
}
