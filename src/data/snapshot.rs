//! Holder snapshot CSV parsing.
//!
//! Snapshots are block-explorer holder exports: a `HolderAddress` column plus
//! either `Balance` (token holders) or `Quantity` (NFT holders). Extra columns
//! such as `PendingBalanceUpdate` are ignored. Header matching is
//! case-insensitive and ignores spaces and underscores.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::allocator::holders::{normalize_address, HolderRecord, SourceKind, SourceRecords};

const ADDRESS_HEADERS: &[&str] = &["holderaddress", "address", "wallet", "owner"];
const BALANCE_HEADERS: &[&str] = &["balance", "amount", "tokenbalance"];
const QUANTITY_HEADERS: &[&str] = &["quantity", "count", "tokens"];

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse snapshot '{source_name}': {source}")]
    Csv {
        source_name: String,
        source: csv::Error,
    },
    #[error("snapshot '{source_name}' has no holder address column")]
    MissingAddressColumn { source_name: String },
    #[error("snapshot '{source_name}' has no {column} column")]
    MissingAmountColumn {
        source_name: String,
        column: &'static str,
    },
    #[error("no CSV files found in '{}'", .path.display())]
    NoSnapshots { path: PathBuf },
}

fn header_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| candidates.contains(&header_key(header).as_str()))
}

/// Parse a holding amount. Balances accept thousands separators; quantities
/// must be whole numbers. Negative or non-finite amounts are rejected.
pub fn parse_amount(raw: &str, kind: SourceKind) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_matches('"')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    match kind {
        SourceKind::Balance => cleaned
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= 0.0),
        SourceKind::Count => cleaned.parse::<u64>().ok().map(|value| value as f64),
    }
}

/// Parse one snapshot. Unparsable rows are skipped and counted.
///
/// A `Count` snapshot without a quantity column is an ownership list: every
/// listed address holds one token.
pub fn parse_snapshot<R: Read>(
    reader: R,
    source_name: &str,
    kind: SourceKind,
) -> Result<SourceRecords, SnapshotError> {
    let csv_error = |source| SnapshotError::Csv {
        source_name: source_name.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers().map_err(csv_error)?.clone();

    let address_column =
        find_column(&headers, ADDRESS_HEADERS).ok_or_else(|| SnapshotError::MissingAddressColumn {
            source_name: source_name.to_string(),
        })?;
    let amount_column = match kind {
        SourceKind::Balance => Some(find_column(&headers, BALANCE_HEADERS).ok_or_else(|| {
            SnapshotError::MissingAmountColumn {
                source_name: source_name.to_string(),
                column: "Balance",
            }
        })?),
        SourceKind::Count => find_column(&headers, QUANTITY_HEADERS),
    };

    let mut records = Vec::new();
    let mut skipped_rows = 0usize;
    for (index, row) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers.
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(source = source_name, line, error = %err, "skipping unreadable row");
                skipped_rows += 1;
                continue;
            }
        };

        let Some(address) = row.get(address_column).and_then(normalize_address) else {
            warn!(source = source_name, line, "skipping row with malformed address");
            skipped_rows += 1;
            continue;
        };
        let holding = match amount_column {
            Some(column) => match row.get(column).and_then(|raw| parse_amount(raw, kind)) {
                Some(holding) => holding,
                None => {
                    warn!(source = source_name, line, "skipping row with malformed amount");
                    skipped_rows += 1;
                    continue;
                }
            },
            None => 1.0,
        };
        records.push(HolderRecord { address, holding });
    }

    if records.is_empty() {
        warn!(source = source_name, skipped_rows, "snapshot yielded no valid rows");
    }

    Ok(SourceRecords {
        source: source_name.to_string(),
        kind,
        records,
        skipped_rows,
    })
}

/// Source name for a snapshot path: the file stem.
pub fn snapshot_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

pub fn load_snapshot(path: &Path, kind: SourceKind) -> Result<SourceRecords, SnapshotError> {
    let file = File::open(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot(file, &snapshot_name(path), kind)
}

/// `*.csv` files directly inside `dir`, sorted by file name.
pub fn list_snapshots(dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    let entries = fs::read_dir(dir).map_err(|source| SnapshotError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}
