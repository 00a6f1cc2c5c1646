//! Delegate rewriting for written tier files.
//!
//! Delegation events (vault → delegate, enabled or revoked) are fetched by an
//! external tool and saved as JSON in chain order. Replaying them gives the
//! current delegate of each vault; tier files are then rewritten so a
//! delegated vault's slot goes to its delegate. Files with nothing to rewrite
//! are not copied.
//!
//! Accepted event file shapes:
//! - `[{"vault": "0x..", "delegate": "0x..", "enabled": true}, ...]`
//! - `{"events": [...]}`
//!
//! `from`/`to` and `value`/`enable` are accepted as aliases, matching the two
//! delegation registry event layouts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::allocator::normalize_address;

#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize '{}': {source}", .path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("tier file '{}' has no addresses array", .path.display())]
    MissingAddresses { path: PathBuf },
    #[error("failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DelegationEvent {
    #[serde(alias = "from")]
    pub vault: String,
    #[serde(alias = "to")]
    pub delegate: String,
    #[serde(alias = "value", alias = "enable")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventFile {
    Events(Vec<DelegationEvent>),
    Wrapped { events: Vec<DelegationEvent> },
}

/// Current vault → delegate assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegationMap {
    delegates: HashMap<String, String>,
}

impl DelegationMap {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a DelegationEvent>) -> Self {
        let mut map = Self::default();
        for event in events {
            map.apply(event);
        }
        map
    }

    /// Later events override earlier ones; a revocation removes the vault.
    pub fn apply(&mut self, event: &DelegationEvent) {
        let (Some(vault), Some(delegate)) = (
            normalize_address(&event.vault),
            normalize_address(&event.delegate),
        ) else {
            warn!(vault = %event.vault, delegate = %event.delegate, "ignoring malformed delegation event");
            return;
        };
        if event.enabled {
            self.delegates.insert(vault, delegate);
        } else {
            self.delegates.remove(&vault);
        }
    }

    pub fn resolve(&self, address: &str) -> Option<&str> {
        self.delegates.get(address).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }
}

pub fn load_events(path: &Path) -> Result<Vec<DelegationEvent>, DelegateError> {
    let raw = fs::read_to_string(path).map_err(|source| DelegateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: EventFile = serde_json::from_str(&raw).map_err(|source| DelegateError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match parsed {
        EventFile::Events(events) | EventFile::Wrapped { events } => events,
    })
}

/// Swap `address` for its delegate. Self-delegation leaves it untouched.
fn rewrite_address(address: &mut String, delegates: &DelegationMap) -> bool {
    let key = address.to_ascii_lowercase();
    match delegates.resolve(&key) {
        Some(delegate) if delegate != key => {
            debug!(vault = %key, delegate, "delegating address");
            *address = delegate.to_string();
            true
        }
        _ => false,
    }
}

/// Replace delegated vaults in place. Returns the number of replaced entries.
pub fn rewrite_addresses(addresses: &mut [String], delegates: &DelegationMap) -> usize {
    addresses
        .iter_mut()
        .map(|address| rewrite_address(address, delegates))
        .filter(|replaced| *replaced)
        .count()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub file: String,
    pub replaced: usize,
    pub output: PathBuf,
}

/// Rewrite every `*.json` tier file in `tiers_dir` (the manifest excluded) and
/// write the modified ones to `out_dir`. Fields other than `addresses` are kept
/// as they are.
pub fn rewrite_tier_dir(
    tiers_dir: &Path,
    out_dir: &Path,
    delegates: &DelegationMap,
) -> Result<Vec<RewriteOutcome>, DelegateError> {
    let read_error = |source| DelegateError::Read {
        path: tiers_dir.to_path_buf(),
        source,
    };
    let mut paths: Vec<PathBuf> = fs::read_dir(tiers_dir)
        .map_err(read_error)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().map_or(false, |ext| ext == "json")
                && path
                    .file_name()
                    .map_or(false, |name| name != crate::data::output::MANIFEST_FILE)
        })
        .collect();
    paths.sort();

    let mut outcomes = Vec::new();
    for path in paths {
        let raw = fs::read_to_string(&path).map_err(|source| DelegateError::Read {
            path: path.clone(),
            source,
        })?;
        let mut document: Value =
            serde_json::from_str(&raw).map_err(|source| DelegateError::Parse {
                path: path.clone(),
                source,
            })?;

        let Some(entries) = document.get_mut("addresses").and_then(Value::as_array_mut) else {
            return Err(DelegateError::MissingAddresses { path });
        };
        // Non-string entries are left where they are.
        let replaced = entries
            .iter_mut()
            .map(|entry| match entry {
                Value::String(address) => rewrite_address(address, delegates),
                _ => false,
            })
            .filter(|replaced| *replaced)
            .count();
        if replaced == 0 {
            continue;
        }

        fs::create_dir_all(out_dir).map_err(|source| DelegateError::Write {
            path: out_dir.to_path_buf(),
            source,
        })?;
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output = out_dir.join(&file);
        let payload = serde_json::to_string_pretty(&document).map_err(|source| {
            DelegateError::Serialize {
                path: output.clone(),
                source,
            }
        })?;
        fs::write(&output, payload).map_err(|source| DelegateError::Write {
            path: output.clone(),
            source,
        })?;
        info!(file = %file, replaced, "saved delegated tier file");
        outcomes.push(RewriteOutcome {
            file,
            replaced,
            output,
        });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAULT: &str = "0x1111111111111111111111111111111111111111";
    const HOT: &str = "0x2222222222222222222222222222222222222222";
    const OTHER: &str = "0x3333333333333333333333333333333333333333";

    fn event(vault: &str, delegate: &str, enabled: bool) -> DelegationEvent {
        DelegationEvent {
            vault: vault.to_string(),
            delegate: delegate.to_string(),
            enabled,
        }
    }

    #[test]
    fn later_events_override_and_revocations_remove() {
        let events = vec![
            event(VAULT, HOT, true),
            event(VAULT, OTHER, true),
            event(OTHER, HOT, true),
            event(OTHER, HOT, false),
        ];
        let map = DelegationMap::from_events(&events);
        assert_eq!(map.resolve(VAULT), Some(OTHER));
        assert_eq!(map.resolve(OTHER), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn rewrite_skips_self_delegation() {
        let map = DelegationMap::from_events(&[event(VAULT, VAULT, true), event(OTHER, HOT, true)]);
        let mut addresses = vec![VAULT.to_string(), OTHER.to_uppercase().replace("0X", "0x")];
        assert_eq!(rewrite_addresses(&mut addresses, &map), 1);
        assert_eq!(addresses, vec![VAULT.to_string(), HOT.to_string()]);
    }

    fn temp_dir(name: &str) -> PathBuf {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("tiermint-delegate-{name}-{stamp}"));
        fs::create_dir_all(&dir).expect("temp dir should be created");
        dir
    }

    #[test]
    fn rewrite_keeps_non_string_entries_in_place() {
        let root = temp_dir("mixed");
        let tiers = root.join("tiers");
        fs::create_dir_all(&tiers).expect("tier dir should be created");
        fs::write(
            tiers.join("tier_01.json"),
            format!("{{\"day\": 1, \"addresses\": [null, \"{VAULT}\", 7, \"{OTHER}\"]}}"),
        )
        .expect("tier should be written");
        let map = DelegationMap::from_events(&[event(VAULT, HOT, true)]);

        let out = root.join("out");
        let outcomes = rewrite_tier_dir(&tiers, &out, &map).expect("rewrite should succeed");
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].replaced, 1);

        let written: Value = serde_json::from_str(
            &fs::read_to_string(out.join("tier_01.json")).expect("output should exist"),
        )
        .expect("output should parse");
        assert_eq!(
            written["addresses"],
            serde_json::json!([null, HOT, 7, OTHER])
        );
        assert_eq!(written["day"], 1);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn serialize_failures_are_not_reported_as_parse_errors() {
        let source = serde_json::from_str::<Value>("{").expect_err("truncated json");
        let err = DelegateError::Serialize {
            path: PathBuf::from("out/tier_01.json"),
            source,
        };
        assert!(err.to_string().starts_with("failed to serialize 'out/tier_01.json'"));
    }

    #[test]
    fn event_aliases_match_registry_layouts() {
        let raw = format!(
            "{{\"events\": [{{\"from\": \"{VAULT}\", \"to\": \"{HOT}\", \"enable\": true}}, \
             {{\"vault\": \"{OTHER}\", \"delegate\": \"{HOT}\", \"value\": false}}]}}"
        );
        let parsed: EventFile = serde_json::from_str(&raw).expect("parse");
        let EventFile::Wrapped { events } = parsed else {
            panic!("expected wrapped events");
        };
        assert_eq!(events.len(), 2);
        assert!(events[0].enabled);
        assert!(!events[1].enabled);
    }
}
