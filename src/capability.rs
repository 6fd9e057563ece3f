//! Capability / Binder Registry.
//!
//! Registers per-component capability producers (implicitly, via the
//! `Component` trait in `component.rs`) and source→capability binder
//! strategies; answers validity and binding queries for the resolver engine
//! and the reference validator.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manifest::AccessMode;

/// `{ name: string, data: map<string,any> }` — `name` follows
/// `category:subtype`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub data: IndexMap<String, Value>,
}

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), data: IndexMap::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Grammar every registered capability name must match: `category:subtype`,
/// lowercase, colon-separated.
pub fn is_valid_capability_name(name: &str) -> bool {
    let Some((category, subtype)) = name.split_once(':') else { return false };
    !category.is_empty()
        && !subtype.is_empty()
        && category.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        && subtype.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        && category.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && subtype.chars().next().is_some_and(|c| c.is_ascii_lowercase())
}

/// An opaque reference a component exposes under a string key.
pub type ConstructHandle = String;

/// `{ environmentVariables, metadata }` returned by a binder strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingResult {
    pub environment_variables: IndexMap<String, String>,
    pub metadata: BindingMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingMetadata {
    pub success: bool,
    pub binding_type: String,
    pub error: Option<String>,
    pub error_details: Option<Value>,
}

impl BindingResult {
    pub fn success(binding_type: impl Into<String>) -> Self {
        Self {
            environment_variables: IndexMap::new(),
            metadata: BindingMetadata { success: true, binding_type: binding_type.into(), error: None, error_details: None },
        }
    }

    pub fn failure(binding_type: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            environment_variables: IndexMap::new(),
            metadata: BindingMetadata {
                success: false,
                binding_type: binding_type.into(),
                error: Some(error.into()),
                error_details: None,
            },
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }
}

/// Context handed to a binder strategy's `bind` call: the resolved source
/// and target construct handles, the directive's access mode/env remapping,
/// and whichever options the directive carries.
pub struct BindContext<'a> {
    pub from_component: &'a str,
    pub to_component: &'a str,
    pub from_handles: &'a BTreeMap<String, ConstructHandle>,
    pub to_handles: &'a BTreeMap<String, ConstructHandle>,
    pub access: AccessMode,
    pub env_remap: &'a IndexMap<String, String>,
    pub options: &'a Value,
    pub compliance_framework: crate::manifest::ComplianceFramework,
}

/// A registered binder strategy.
pub trait BinderStrategy: Send + Sync {
    /// Component types this strategy can act as a *source* for.
    fn supported_source_types(&self) -> &[&str];
    /// Capabilities this strategy knows how to wire to.
    fn supported_capabilities(&self) -> &[&str];
    /// Access modes this strategy supports.
    fn supported_access(&self) -> &[AccessMode];

    fn bind(&self, ctx: &BindContext<'_>) -> BindingResult;
}

/// `{valid, reason?, suggestion?}` answer from `validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingValidity {
    pub valid: bool,
    pub reason: Option<String>,
    pub suggestion: Option<String>,
}

/// Two-level index over registered strategies: `sourceType → {capability →
/// strategy}` and `capability → strategies[]`. Both indexes are built once,
/// at `register` time, from `usize` positions into `strategies`.
#[derive(Default)]
pub struct BinderRegistry {
    strategies: Vec<Box<dyn BinderStrategy>>,
    by_source: HashMap<String, HashMap<String, usize>>,
    by_capability: HashMap<String, Vec<usize>>,
}

impl BinderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: Box<dyn BinderStrategy>) {
        let index = self.strategies.len();
        for source_type in strategy.supported_source_types() {
            let by_capability_for_source = self.by_source.entry(source_type.to_string()).or_default();
            for capability in strategy.supported_capabilities() {
                // First registrant for a (sourceType, capability) pair wins;
                // later strategies claiming the same pair are unreachable
                // through `find`.
                by_capability_for_source.entry(capability.to_string()).or_insert(index);
                self.by_capability.entry(capability.to_string()).or_default().push(index);
            }
        }
        self.strategies.push(strategy);
    }

    /// Finds the strategy handling `(source_type, capability)`, if any.
    pub fn find(&self, source_type: &str, capability: &str) -> Option<&dyn BinderStrategy> {
        let &index = self.by_source.get(source_type)?.get(capability)?;
        Some(self.strategies[index].as_ref())
    }

    /// All capabilities any registered strategy supports as a target for
    /// `source_type`, used to build the "supported targets for X" suggestion
    /// text.
    pub fn targets_for(&self, source_type: &str) -> Vec<&str> {
        let Some(by_capability_for_source) = self.by_source.get(source_type) else {
            return Vec::new();
        };
        let mut targets: Vec<&str> = by_capability_for_source.keys().map(String::as_str).collect();
        targets.sort_unstable();
        targets
    }

    /// Source types any registered strategy accepts as an origin for
    /// `capability`, the reverse lookup over the `capability → strategies[]`
    /// index — used when a binding fails because the capability exists but
    /// the source component's type isn't one of its producers.
    pub fn source_types_for(&self, capability: &str) -> Vec<&str> {
        let Some(indices) = self.by_capability.get(capability) else {
            return Vec::new();
        };
        let mut types: Vec<&str> = indices
            .iter()
            .flat_map(|&i| self.strategies[i].supported_source_types().iter().copied())
            .collect();
        types.sort_unstable();
        types.dedup();
        types
    }

    /// `validate(sourceType, capability) → {valid, reason?, suggestion?}`.
    pub fn validate(&self, source_type: &str, capability: &str) -> BindingValidity {
        if self.find(source_type, capability).is_some() {
            return BindingValidity { valid: true, reason: None, suggestion: None };
        }
        let targets = self.targets_for(source_type);
        BindingValidity {
            valid: false,
            reason: Some(format!("No binding strategy for '{source_type}' -> '{capability}'")),
            suggestion: if targets.is_empty() {
                None
            } else {
                Some(format!("supported targets for '{source_type}': {}", targets.join(", ")))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_name_grammar() {
        assert!(is_valid_capability_name("db:dynamodb"));
        assert!(is_valid_capability_name("certificate:acm"));
        assert!(!is_valid_capability_name("Db:Dynamodb"));
        assert!(!is_valid_capability_name("db"));
        assert!(!is_valid_capability_name(":dynamodb"));
        assert!(!is_valid_capability_name("db:"));
    }

    struct StubStrategy;
    impl BinderStrategy for StubStrategy {
        fn supported_source_types(&self) -> &[&str] {
            &["lambda-api"]
        }
        fn supported_capabilities(&self) -> &[&str] {
            &["db:postgres", "queue:sqs"]
        }
        fn supported_access(&self) -> &[AccessMode] {
            &[AccessMode::Read, AccessMode::Write]
        }
        fn bind(&self, _ctx: &BindContext<'_>) -> BindingResult {
            BindingResult::success("stub")
        }
    }

    #[test]
    fn validate_reports_suggestion_for_unsupported_capability() {
        let mut registry = BinderRegistry::new();
        registry.register(Box::new(StubStrategy));

        let ok = registry.validate("lambda-api", "db:postgres");
        assert!(ok.valid);

        let bad = registry.validate("lambda-api", "queue:sns");
        assert!(!bad.valid);
        assert!(bad.reason.unwrap().contains("lambda-api"));
        assert!(bad.suggestion.unwrap().contains("db:postgres"));
    }

    #[test]
    fn source_types_for_uses_the_capability_index() {
        let mut registry = BinderRegistry::new();
        registry.register(Box::new(StubStrategy));

        let sources = registry.source_types_for("queue:sqs");
        assert_eq!(sources, vec!["lambda-api"]);
        assert!(registry.source_types_for("queue:sns").is_empty());
    }
}
