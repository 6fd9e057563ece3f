//! Logical-ID Manager & Drift Avoidance Engine.
//!
//! Preserves deterministic resource identifiers across re-synthesis runs so
//! stateful resources are never replaced, and detects drift between a fresh
//! synthesis and a previously recorded `LogicalIdMap`.
//!
//! Persistence is plain `fs::read_to_string` + `serde_json` to load and
//! `fs::write` (creating parent dirs) to save — no database, no remote
//! state.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::diagnostics::Severity;
use crate::error::{Result, SynthesisError};

/// Priority-ordered preservation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreservationStrategy {
    PreserveStatefulResources,
    DeterministicLambdaNaming,
    PreserveIdentityRoleNames,
}

impl PreservationStrategy {
    pub fn priority(&self) -> u8 {
        match self {
            PreservationStrategy::PreserveStatefulResources => 1,
            PreservationStrategy::DeterministicLambdaNaming => 2,
            PreservationStrategy::PreserveIdentityRoleNames => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalIdMapping {
    pub original_id: String,
    pub resource_type: String,
    pub component_name: String,
    pub preservation_strategy: PreservationStrategy,
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DriftAvoidanceConfig {
    #[serde(default)]
    pub validate_before_plan: bool,
}

/// `{ version, stackName, environment, mappings, driftAvoidanceConfig }`
/// , persisted JSON at `logical-id-map.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalIdMap {
    pub version: u32,
    pub stack_name: String,
    pub environment: String,
    pub mappings: IndexMap<String, LogicalIdMapping>,
    #[serde(default)]
    pub drift_avoidance_config: DriftAvoidanceConfig,
}

impl LogicalIdMap {
    pub fn empty(stack_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self { version: 1, stack_name: stack_name.into(), environment: environment.into(), mappings: IndexMap::new(), drift_avoidance_config: DriftAvoidanceConfig::default() }
    }

    /// Validates uniqueness and absence of cycles among accepted entries.
    /// Bijection is the uniqueness half of this check; a logical-ID map has
    /// no edges to form cycles in, so "no cycles" here means no mapping may
    /// alias its own `originalId` back to a `newId` that is itself a key
    /// elsewhere in the map, which would make resolution path-dependent.
    pub fn validate(&self) -> Result<()> {
        let mut seen_originals: HashMap<&str, &str> = HashMap::new();
        for (new_id, mapping) in &self.mappings {
            if let Some(existing_new_id) = seen_originals.insert(&mapping.original_id, new_id.as_str()) {
                if existing_new_id != new_id {
                    return Err(SynthesisError::Config(format!(
                        "logical-id map is not bijective: '{}' and '{}' both map to original id '{}'",
                        existing_new_id, new_id, mapping.original_id
                    )));
                }
            }
            if self.mappings.contains_key(mapping.original_id.as_str()) && mapping.original_id != *new_id {
                return Err(SynthesisError::Config(format!(
                    "logical-id map has a cyclic alias: '{}' -> '{}' -> ...",
                    new_id, mapping.original_id
                )));
            }
        }
        Ok(())
    }
}

pub fn load(path: &Path) -> Result<Option<LogicalIdMap>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|source| SynthesisError::Io { path: path.to_path_buf(), source })?;
    let map: LogicalIdMap =
        serde_json::from_str(&text).map_err(|err| SynthesisError::Config(format!("malformed logical-id map {}: {err}", path.display())))?;
    map.validate()?;
    Ok(Some(map))
}

pub fn save(path: &Path, map: &LogicalIdMap) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SynthesisError::Io { path: parent.to_path_buf(), source })?;
    }
    let json = serde_json::to_string_pretty(map).expect("LogicalIdMap always serializes");
    fs::write(path, json).map_err(|source| SynthesisError::Io { path: path.to_path_buf(), source })
}

/// `base36(fold32(constructPath))`, truncated to 8 upper-case characters — a
/// pure function of the path from stack root to construct.
pub fn deterministic_hash(construct_path: &str) -> String {
    let digest = Sha256::digest(construct_path.as_bytes());
    let folded = digest.chunks(4).fold(0u32, |acc, chunk| {
        let mut bytes = [0u8; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        acc ^ u32::from_be_bytes(bytes)
    });
    let encoded = base36_encode(folded);
    let padded = format!("{encoded:0>8}");
    padded.chars().take(8).collect::<String>().to_uppercase()
}

fn base36_encode(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 alphabet is ASCII")
}

/// One resource the Logical-ID Manager considers for preservation (a thin
/// projection of a synthesized `Component`, since the manager never touches
/// the component trait object directly).
#[derive(Clone, Copy)]
pub struct ResourceCandidate<'a> {
    pub component_name: &'a str,
    pub component_type: &'a str,
    pub resource_kind: &'a str,
    pub stateful: bool,
    pub construct_path: &'a str,
}

#[derive(Debug, Clone)]
pub struct ResolvedLogicalId {
    pub component_name: String,
    pub logical_id: String,
    pub strategy: Option<PreservationStrategy>,
    /// Set when this id was preserved not by an exact component-name match
    /// but by matching an unclaimed, same-`resourceType` entry whose
    /// recorded key no longer names a current component — i.e. the
    /// component was renamed, not newly created. Carries the old name.
    pub renamed_from: Option<String>,
}

pub struct LogicalIdManager<'a> {
    existing: Option<&'a LogicalIdMap>,
    service_name: &'a str,
    current_component_names: HashSet<&'a str>,
    claimed: RefCell<HashSet<String>>,
}

impl<'a> LogicalIdManager<'a> {
    pub fn new(existing: Option<&'a LogicalIdMap>, service_name: &'a str, current_component_names: impl IntoIterator<Item = &'a str>) -> Self {
        Self { existing, service_name, current_component_names: current_component_names.into_iter().collect(), claimed: RefCell::new(HashSet::new()) }
    }

    /// Finds the map entry that should preserve this stateful candidate's
    /// logical id: an exact match on the current component name first, and
    /// otherwise the unique, not-yet-claimed entry of the same
    /// `resourceType` whose key no longer names any current component. The
    /// latter is the rename case: `preserve-stateful-resources` must survive
    /// a component rename, not just a same-name re-synthesis.
    fn find_stateful_mapping(&self, candidate: &ResourceCandidate<'_>) -> Option<(&'a str, &'a LogicalIdMapping)> {
        let existing = self.existing?;

        if let Some((key, mapping)) = existing.mappings.get_key_value(candidate.component_name) {
            if mapping.preservation_strategy == PreservationStrategy::PreserveStatefulResources {
                return Some((key.as_str(), mapping));
            }
        }

        let claimed = self.claimed.borrow();
        existing
            .mappings
            .iter()
            .find(|(key, mapping)| {
                mapping.preservation_strategy == PreservationStrategy::PreserveStatefulResources
                    && mapping.resource_type == candidate.component_type
                    && !self.current_component_names.contains(key.as_str())
                    && !claimed.contains(key.as_str())
            })
            .map(|(key, mapping)| (key.as_str(), mapping))
    }

    /// Resolves the logical id for one candidate resource, applying
    /// strategies in priority order.
    pub fn resolve(&self, candidate: &ResourceCandidate<'_>) -> ResolvedLogicalId {
        if candidate.stateful {
            if let Some((matched_key, mapping)) = self.find_stateful_mapping(candidate) {
                self.claimed.borrow_mut().insert(matched_key.to_string());
                let renamed_from = if matched_key == candidate.component_name { None } else { Some(matched_key.to_string()) };
                return ResolvedLogicalId {
                    component_name: candidate.component_name.to_string(),
                    logical_id: mapping.original_id.clone(),
                    strategy: Some(PreservationStrategy::PreserveStatefulResources),
                    renamed_from,
                };
            }
        }

        if candidate.component_type == "lambda-api" {
            let hash = deterministic_hash(candidate.construct_path);
            let logical_id = format!("{}-{}-main-{}", self.service_name, candidate.component_name, hash);
            return ResolvedLogicalId {
                component_name: candidate.component_name.to_string(),
                logical_id,
                strategy: Some(PreservationStrategy::DeterministicLambdaNaming),
                renamed_from: None,
            };
        }

        if candidate.resource_kind == "identity-role" {
            if let Some(existing) = self.existing {
                if let Some(mapping) = existing.mappings.get(&format!("{}-role", candidate.component_name)) {
                    return ResolvedLogicalId {
                        component_name: candidate.component_name.to_string(),
                        logical_id: mapping.original_id.clone(),
                        strategy: Some(PreservationStrategy::PreserveIdentityRoleNames),
                        renamed_from: None,
                    };
                }
            }
            let hash = deterministic_hash(candidate.construct_path);
            return ResolvedLogicalId {
                component_name: candidate.component_name.to_string(),
                logical_id: format!("{}-role-{}", candidate.component_name, hash),
                strategy: Some(PreservationStrategy::PreserveIdentityRoleNames),
                renamed_from: None,
            };
        }

        let hash = deterministic_hash(candidate.construct_path);
        ResolvedLogicalId {
            component_name: candidate.component_name.to_string(),
            logical_id: format!("{}-{}-{}", candidate.component_name, candidate.resource_kind, hash),
            strategy: None,
            renamed_from: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftFinding {
    pub code: String,
    pub component_name: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAnalysis {
    pub detected: Vec<DriftFinding>,
    pub recommended: Vec<String>,
    pub risk_level: Severity,
    pub summary: String,
}

/// Analyzes drift across all synthesized resources against `existing` (if
/// any).
pub fn analyze_drift(
    candidates: &[ResourceCandidate<'_>],
    resolved: &[ResolvedLogicalId],
    existing: Option<&LogicalIdMap>,
    fedramp_high: bool,
) -> DriftAnalysis {
    let mut detected = Vec::new();
    let mut recommended = Vec::new();
    let mut stateful_without_mapping = false;

    for (candidate, resolved_id) in candidates.iter().zip(resolved.iter()) {
        if !candidate.stateful {
            continue;
        }

        if resolved_id.strategy == Some(PreservationStrategy::PreserveStatefulResources) {
            if let Some(previous_name) = &resolved_id.renamed_from {
                detected.push(DriftFinding {
                    code: "RenamedSibling".to_string(),
                    component_name: candidate.component_name.to_string(),
                    severity: Severity::Medium,
                    message: format!(
                        "component previously tracked as '{previous_name}' now appears as '{}'; its logical id was preserved across the rename",
                        candidate.component_name
                    ),
                });
            }
            continue;
        }

        stateful_without_mapping = true;
        detected.push(DriftFinding {
            code: "StatefulWithoutMapping".to_string(),
            component_name: candidate.component_name.to_string(),
            // The finding itself always reports `high`;
            // `fedramp-high` elevates the *aggregate* `risk_level` to
            // `critical` below, which is what the orchestrator checks to
            // decide whether to abort.
            severity: Severity::High,
            message: format!(
                "stateful component '{}' has no logical-id-map entry; a future synthesis may replace it",
                candidate.component_name
            ),
        });
        recommended.push(format!(
            "add a mapping for '{}' pinning its logical id to '{}' before the next synthesis",
            candidate.component_name, resolved_id.logical_id
        ));
    }

    if let Some(existing) = existing {
        let current_new_ids: std::collections::HashSet<&str> = resolved.iter().map(|r| r.logical_id.as_str()).collect();
        for (new_id, mapping) in &existing.mappings {
            if current_new_ids.contains(mapping.original_id.as_str()) && !current_new_ids.contains(new_id.as_str()) {
                detected.push(DriftFinding {
                    code: "NamingConflict".to_string(),
                    component_name: mapping.component_name.clone(),
                    severity: Severity::High,
                    message: format!(
                        "new logical id collides with original id '{}' recorded for a different mapping",
                        mapping.original_id
                    ),
                });
            }
        }
    }

    let mut risk_level = detected.iter().map(|f| f.severity).max().unwrap_or(Severity::Low);
    if stateful_without_mapping && fedramp_high {
        risk_level = Severity::Critical;
    }
    let summary = if detected.is_empty() {
        "no drift detected".to_string()
    } else {
        format!("{} drift finding(s), highest severity {:?}", detected.len(), risk_level)
    };

    DriftAnalysis { detected, recommended, risk_level, summary }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_hash_is_pure_and_stable() {
        let a = deterministic_hash("orders-dev/db/main");
        let b = deterministic_hash("orders-dev/db/main");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn different_paths_produce_different_hashes() {
        let a = deterministic_hash("orders-dev/db/main");
        let b = deterministic_hash("orders-dev/queue/main");
        assert_ne!(a, b);
    }

    #[test]
    fn preserve_stateful_resources_locks_existing_original_id() {
        let mut map = LogicalIdMap::empty("orders-staging", "staging");
        map.mappings.insert(
            "database".to_string(),
            LogicalIdMapping {
                original_id: "OriginalDatabaseABC123".to_string(),
                resource_type: "db-postgres".to_string(),
                component_name: "database".to_string(),
                preservation_strategy: PreservationStrategy::PreserveStatefulResources,
                metadata: IndexMap::new(),
            },
        );

        let manager = LogicalIdManager::new(Some(&map), "orders", ["database"]);
        let candidate = ResourceCandidate { component_name: "database", component_type: "db-postgres", resource_kind: "db", stateful: true, construct_path: "orders-staging/database/main" };
        let resolved = manager.resolve(&candidate);
        assert_eq!(resolved.logical_id, "OriginalDatabaseABC123");
        assert_eq!(resolved.renamed_from, None);
    }

    #[test]
    fn preserve_stateful_resources_survives_a_rename() {
        let mut map = LogicalIdMap::empty("orders-staging", "staging");
        map.mappings.insert(
            "database".to_string(),
            LogicalIdMapping {
                original_id: "OriginalDatabaseABC123".to_string(),
                resource_type: "db-postgres".to_string(),
                component_name: "database".to_string(),
                preservation_strategy: PreservationStrategy::PreserveStatefulResources,
                metadata: IndexMap::new(),
            },
        );

        // "db" is a fresh candidate name; "database" no longer appears
        // among current components, so it reads as the same resource
        // renamed, not a brand-new one.
        let manager = LogicalIdManager::new(Some(&map), "orders", ["db"]);
        let candidate = ResourceCandidate { component_name: "db", component_type: "db-postgres", resource_kind: "db", stateful: true, construct_path: "orders-staging/db/main" };
        let resolved = manager.resolve(&candidate);
        assert_eq!(resolved.logical_id, "OriginalDatabaseABC123");
        assert_eq!(resolved.renamed_from.as_deref(), Some("database"));
    }

    #[test]
    fn rename_match_is_not_reused_for_a_second_candidate() {
        let mut map = LogicalIdMap::empty("orders-staging", "staging");
        map.mappings.insert(
            "database".to_string(),
            LogicalIdMapping {
                original_id: "OriginalDatabaseABC123".to_string(),
                resource_type: "db-postgres".to_string(),
                component_name: "database".to_string(),
                preservation_strategy: PreservationStrategy::PreserveStatefulResources,
                metadata: IndexMap::new(),
            },
        );

        let manager = LogicalIdManager::new(Some(&map), "orders", ["db", "db2"]);
        let first = ResourceCandidate { component_name: "db", component_type: "db-postgres", resource_kind: "db", stateful: true, construct_path: "orders-staging/db/main" };
        let second = ResourceCandidate { component_name: "db2", component_type: "db-postgres", resource_kind: "db", stateful: true, construct_path: "orders-staging/db2/main" };

        let resolved_first = manager.resolve(&first);
        let resolved_second = manager.resolve(&second);
        assert_eq!(resolved_first.logical_id, "OriginalDatabaseABC123");
        assert_ne!(resolved_second.logical_id, "OriginalDatabaseABC123");
        assert_eq!(resolved_second.renamed_from, None);
    }

    #[test]
    fn bijection_violation_is_rejected() {
        let mut map = LogicalIdMap::empty("s", "dev");
        map.mappings.insert(
            "a".to_string(),
            LogicalIdMapping { original_id: "Shared".to_string(), resource_type: "db-postgres".to_string(), component_name: "a".to_string(), preservation_strategy: PreservationStrategy::PreserveStatefulResources, metadata: IndexMap::new() },
        );
        map.mappings.insert(
            "b".to_string(),
            LogicalIdMapping { original_id: "Shared".to_string(), resource_type: "queue-sqs".to_string(), component_name: "b".to_string(), preservation_strategy: PreservationStrategy::PreserveStatefulResources, metadata: IndexMap::new() },
        );
        assert!(map.validate().is_err());
    }

    #[test]
    fn stateful_without_mapping_is_high_or_critical() {
        let candidates = vec![ResourceCandidate { component_name: "store", component_type: "key-store", resource_kind: "key-store", stateful: true, construct_path: "s-dev/store/main" }];
        let resolved = vec![ResolvedLogicalId { component_name: "store".to_string(), logical_id: "store-key-store-AB12CD34".to_string(), strategy: None, renamed_from: None }];

        let commercial = analyze_drift(&candidates, &resolved, None, false);
        assert_eq!(commercial.risk_level, Severity::High);

        let fedramp_high = analyze_drift(&candidates, &resolved, None, true);
        assert_eq!(fedramp_high.risk_level, Severity::Critical);
    }
}
