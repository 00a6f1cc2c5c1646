//! End-to-end campaign run: load snapshots, sequence tiers, write files.
//!
//! Everything is loaded and validated before the allocator starts, and nothing
//! is written until the whole sequence has been computed.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::allocator::{
    aggregate_holdings, sequence_tiers, AllocationError, CollectionSet, Ranking, SourceKind,
    SourceRecords, Tier,
};
use crate::data::collections::{apply_umbrellas, build_collections, load_collection_sources};
use crate::data::config::CampaignConfig;
use crate::data::output::{write_tiers, OutputError, RunManifest};
use crate::data::snapshot::{load_snapshot, SnapshotError};
use crate::parallel::WorkerPool;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("balance snapshot '{}' yielded no valid rows", .path.display())]
    EmptyBalanceSource { path: PathBuf },
    #[error("collections directory '{}' is missing", .path.display())]
    MissingCollections { path: PathBuf },
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Inputs of the allocator, fully materialized.
#[derive(Debug, Clone)]
pub struct CampaignInputs {
    pub ranking: Ranking,
    pub collections: Vec<CollectionSet>,
}

#[derive(Debug, Clone)]
pub struct CampaignOutcome {
    pub tiers: Vec<Tier>,
    pub manifest: RunManifest,
    pub output_dir: PathBuf,
}

/// Parse every balance snapshot. Each one is mandatory: unreadable or empty
/// files abort the run and are named in the error.
pub fn load_balance_sources(
    paths: &[PathBuf],
    pool: &WorkerPool,
) -> Result<Vec<SourceRecords>, PipelineError> {
    let results = pool.map_paths(paths, |path| load_snapshot(path, SourceKind::Balance));
    let mut sources = Vec::with_capacity(results.len());
    for (path, result) in paths.iter().zip(results) {
        let source = result?;
        if source.records.is_empty() {
            return Err(PipelineError::EmptyBalanceSource { path: path.clone() });
        }
        if source.skipped_rows > 0 {
            warn!(
                path = %path.display(),
                skipped = source.skipped_rows,
                "balance snapshot had malformed rows"
            );
        }
        sources.push(source);
    }
    Ok(sources)
}

/// Collections from `dir` after umbrella merging. A missing directory is
/// fatal; an empty one just means no collection tiers.
pub fn load_collections(
    dir: &Path,
    config: &CampaignConfig,
    pool: &WorkerPool,
) -> Result<Vec<CollectionSet>, PipelineError> {
    if !dir.is_dir() {
        return Err(PipelineError::MissingCollections {
            path: dir.to_path_buf(),
        });
    }
    let sources = load_collection_sources(dir, pool)?;
    Ok(apply_umbrellas(build_collections(&sources), &config.umbrellas))
}

pub fn load_inputs(config: &CampaignConfig) -> Result<CampaignInputs, PipelineError> {
    let pool = WorkerPool::with_workers(config.workers);
    let balance_sources = load_balance_sources(&config.token_source_paths(), &pool)?;
    let ledger = aggregate_holdings(&balance_sources);
    info!(
        project = %config.project,
        holders = ledger.len(),
        sources = balance_sources.len(),
        "aggregated token holders"
    );
    let collections = load_collections(&config.collections_path(), config, &pool)?;
    Ok(CampaignInputs {
        ranking: ledger.ranking(),
        collections,
    })
}

/// Compute tiers without writing anything.
pub fn plan_campaign(config: &CampaignConfig) -> Result<Vec<Tier>, PipelineError> {
    let inputs = load_inputs(config)?;
    let tiers = sequence_tiers(&inputs.ranking, &inputs.collections, &config.plan())?;
    Ok(tiers)
}

pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignOutcome, PipelineError> {
    let tiers = plan_campaign(config)?;
    let output_dir = config.output_path();
    let manifest = write_tiers(&output_dir, &config.project, &config.breakpoints, &tiers)?;
    Ok(CampaignOutcome {
        tiers,
        manifest,
        output_dir,
    })
}
