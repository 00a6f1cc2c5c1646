//! Collection catalog: NFT holder snapshots become named [CollectionSet]s, then
//! configured umbrella rules fold groups of them under one name.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::allocator::collection::CollectionSet;
use crate::allocator::holders::{aggregate_holdings, SourceKind, SourceRecords};
use crate::data::snapshot::{list_snapshots, load_snapshot, SnapshotError};
use crate::parallel::WorkerPool;

/// Several collections released as one umbrella for allocation purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmbrellaRule {
    pub name: String,
    pub members: Vec<String>,
}

/// Parse every `*.csv` under `dir` as a count snapshot, in parallel. Files that
/// fail to parse are reported and left out; they never abort the run.
pub fn load_collection_sources(
    dir: &Path,
    pool: &WorkerPool,
) -> Result<Vec<SourceRecords>, SnapshotError> {
    let paths = list_snapshots(dir)?;
    let results = pool.map_paths(&paths, |path| load_snapshot(path, SourceKind::Count));

    let mut sources = Vec::with_capacity(results.len());
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(source) => sources.push(source),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping collection snapshot"),
        }
    }
    info!(dir = %dir.display(), collections = sources.len(), "loaded collection snapshots");
    Ok(sources)
}

/// One collection per distinct source name, members being the addresses that
/// hold at least one token. Output order follows first appearance.
pub fn build_collections(sources: &[SourceRecords]) -> Vec<CollectionSet> {
    let mut grouped: Vec<(String, Vec<SourceRecords>)> = Vec::new();
    for source in sources {
        match grouped.iter_mut().find(|(name, _)| *name == source.source) {
            Some((_, group)) => group.push(source.clone()),
            None => grouped.push((source.source.clone(), vec![source.clone()])),
        }
    }

    grouped
        .into_iter()
        .filter_map(|(name, group)| {
            let ledger = aggregate_holdings(&group);
            let members: Vec<String> = ledger
                .addresses()
                .filter(|address| ledger.holding(address).map_or(false, |h| h > 0.0))
                .map(str::to_string)
                .collect();
            if members.is_empty() {
                warn!(collection = %name, "collection has no holders, dropping");
                None
            } else {
                Some(CollectionSet::new(name, members))
            }
        })
        .collect()
}

/// Replace umbrella members by one merged set, placed where the first member
/// was. Members missing from the catalog are reported and ignored.
///
/// A plain collection that already carries an umbrella's name is folded into
/// that umbrella, so collection names stay unique.
pub fn apply_umbrellas(collections: Vec<CollectionSet>, rules: &[UmbrellaRule]) -> Vec<CollectionSet> {
    if rules.is_empty() {
        return collections;
    }

    let mut owner: BTreeMap<&str, usize> = BTreeMap::new();
    for (index, rule) in rules.iter().enumerate() {
        for member in &rule.members {
            owner.entry(member.as_str()).or_insert(index);
        }
    }

    let present: HashSet<&str> = collections.iter().map(|c| c.name.as_str()).collect();
    for (index, rule) in rules.iter().enumerate() {
        for member in &rule.members {
            if !present.contains(member.as_str()) {
                warn!(umbrella = %rule.name, member = %member, "umbrella member not found");
            }
        }
        if present.contains(rule.name.as_str()) && !owner.contains_key(rule.name.as_str()) {
            warn!(umbrella = %rule.name, "collection shares the umbrella name, folding it in");
            owner.insert(rule.name.as_str(), index);
        }
    }

    let mut merged: Vec<Option<CollectionSet>> = vec![None; rules.len()];
    let mut slots: Vec<Slot> = Vec::with_capacity(collections.len());
    for collection in collections {
        match owner.get(collection.name.as_str()).copied() {
            Some(rule_index) => {
                match merged[rule_index].as_mut() {
                    Some(umbrella) => umbrella.members.extend(collection.members),
                    None => {
                        merged[rule_index] = Some(CollectionSet {
                            name: rules[rule_index].name.clone(),
                            members: collection.members,
                        });
                        slots.push(Slot::Umbrella(rule_index));
                    }
                }
            }
            None => slots.push(Slot::Plain(collection)),
        }
    }

    slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Plain(collection) => Some(collection),
            Slot::Umbrella(index) => merged[index].take(),
        })
        .collect()
}

enum Slot {
    Plain(CollectionSet),
    Umbrella(usize),
}
