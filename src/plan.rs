//! Terminal synthesis artifacts: the `Plan` resource tree and its side-car
//! `report`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config_builder::PrecedenceEntry;
use crate::diagnostics::Diagnostic;
use crate::logical_id::DriftAnalysis;

/// One synthesized resource entry in the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResource {
    pub component_name: String,
    pub component_type: String,
    pub logical_id: String,
    pub capabilities: Vec<Value>,
    pub construct_paths: IndexMap<String, String>,
}

/// The terminal output of `synthesize`: the resource template tree plus
/// enough metadata to explain any entry without re-running the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub service: String,
    pub environment: String,
    pub compliance_framework: String,
    pub resources: Vec<PlanResource>,
    pub environment_variables: IndexMap<String, IndexMap<String, String>>,
}

impl Plan {
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

/// `{appliedLogicalIdMappings, driftAnalysis, precedenceChains,
/// diagnostics}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub applied_logical_id_mappings: IndexMap<String, String>,
    pub drift_analysis: DriftAnalysis,
    pub precedence_chains: IndexMap<String, Vec<PrecedenceEntry>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// `{ plan, report }` — the full return value of `synthesize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    pub plan: Plan,
    pub report: SynthesisReport,
}
