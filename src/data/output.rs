//! Tier files: one JSON document per tier plus a `manifest.json` for the run.
//!
//! The tier document fields (`day`, `name`, `description`, `addresses`,
//! `totalAddresses`, `components`) are read by downstream tooling; keep their
//! names stable.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::allocator::{Tier, TierOrigin};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to create output directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize '{}': {source}", .path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDocument {
    pub day: usize,
    pub name: String,
    pub description: String,
    /// Sorted for stable diffs between runs.
    pub addresses: Vec<String>,
    pub total_addresses: usize,
    pub components: Vec<String>,
}

impl From<&Tier> for TierDocument {
    fn from(tier: &Tier) -> Self {
        let mut addresses: Vec<String> = tier.addresses.iter().cloned().collect();
        addresses.sort();
        Self {
            day: tier.index,
            name: tier.name.clone(),
            description: tier.description.clone(),
            total_addresses: addresses.len(),
            addresses,
            components: tier.components.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub day: usize,
    pub name: String,
    pub file: String,
    pub total_addresses: usize,
    pub new_addresses: usize,
    /// `{"kind": "threshold", "percentage": ..}` or
    /// `{"kind": "collections", "names": [..]}`.
    pub origin: TierOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub project: String,
    pub generated_at: DateTime<Utc>,
    pub breakpoints: Vec<f64>,
    pub collections_used: Vec<String>,
    pub tiers: Vec<ManifestEntry>,
}

pub fn tier_file_name(day: usize) -> String {
    format!("tier_{day:02}.json")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let payload = serde_json::to_string_pretty(value).map_err(|source| OutputError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, payload).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Summarize a tier sequence without touching the filesystem.
pub fn build_manifest(project: &str, breakpoints: &[f64], tiers: &[Tier]) -> RunManifest {
    let mut previous = 0usize;
    let mut collections_used = Vec::new();
    let entries = tiers
        .iter()
        .map(|tier| {
            if let TierOrigin::Collections { names } = &tier.origin {
                collections_used.extend(names.iter().cloned());
            }
            let entry = ManifestEntry {
                day: tier.index,
                name: tier.name.clone(),
                file: tier_file_name(tier.index),
                total_addresses: tier.len(),
                new_addresses: tier.len().saturating_sub(previous),
                origin: tier.origin.clone(),
            };
            previous = tier.len();
            entry
        })
        .collect();

    RunManifest {
        project: project.to_string(),
        generated_at: Utc::now(),
        breakpoints: breakpoints.to_vec(),
        collections_used,
        tiers: entries,
    }
}

/// Write every tier and the manifest under `out_dir`, creating it if needed.
pub fn write_tiers(
    out_dir: &Path,
    project: &str,
    breakpoints: &[f64],
    tiers: &[Tier],
) -> Result<RunManifest, OutputError> {
    fs::create_dir_all(out_dir).map_err(|source| OutputError::CreateDir {
        path: out_dir.to_path_buf(),
        source,
    })?;

    for tier in tiers {
        let path = out_dir.join(tier_file_name(tier.index));
        write_json(&path, &TierDocument::from(tier))?;
    }

    let manifest = build_manifest(project, breakpoints, tiers);
    write_json(&out_dir.join(MANIFEST_FILE), &manifest)?;
    info!(
        dir = %out_dir.display(),
        tiers = tiers.len(),
        "wrote tier files"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AddressSet;

    fn tier(index: usize, addresses: &[&str], origin: TierOrigin) -> Tier {
        Tier {
            index,
            name: format!("tier {index}"),
            description: String::new(),
            addresses: addresses.iter().map(|a| a.to_string()).collect::<AddressSet>(),
            components: vec!["c".to_string()],
            origin,
        }
    }

    #[test]
    fn tier_document_uses_downstream_field_names() {
        let doc = TierDocument::from(&tier(
            3,
            &["0xb", "0xa"],
            TierOrigin::Threshold { percentage: 4.0 },
        ));
        let value = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(value["day"], 3);
        assert_eq!(value["totalAddresses"], 2);
        assert_eq!(value["addresses"][0], "0xa");
        assert!(value.get("components").is_some());
        assert!(value.get("description").is_some());
    }

    #[test]
    fn manifest_tracks_growth_and_collections() {
        let tiers = vec![
            tier(1, &["0x1"], TierOrigin::Threshold { percentage: 1.0 }),
            tier(
                2,
                &["0x1", "0x2", "0x3"],
                TierOrigin::Collections {
                    names: vec!["punks".to_string()],
                },
            ),
        ];
        let manifest = build_manifest("demo", &[1.0, 2.0], &tiers);
        assert_eq!(manifest.tiers[1].new_addresses, 2);
        assert_eq!(manifest.tiers[1].file, "tier_02.json");
        assert_eq!(manifest.collections_used, vec!["punks".to_string()]);

        let value = serde_json::to_value(&manifest).expect("serialize");
        assert_eq!(value["tiers"][0]["origin"]["kind"], "threshold");
        assert_eq!(value["tiers"][0]["origin"]["percentage"], 1.0);
        assert_eq!(value["tiers"][1]["origin"]["kind"], "collections");
        assert_eq!(value["tiers"][1]["origin"]["names"][0], "punks");
    }
}
