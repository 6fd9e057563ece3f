//! Resolver Engine.
//!
//! Computes the component dependency graph from `binds[]`, produces a
//! topological order (ties broken by manifest declaration order), then
//! drives each component's synthesis followed by the Binder Registry's
//! wiring pass. Uses Kahn's algorithm with deterministic indegree tracking
//! and an explicit tie-break, not an unordered `HashSet` frontier.

use std::collections::{BTreeMap, BinaryHeap};
use std::cmp::Reverse;

use indexmap::IndexMap;

use crate::capability::{BindContext, BinderRegistry};
use crate::component::{Component, ComponentCatalog};
use crate::config_builder::EffectiveConfig;
use crate::context::ComponentContext;
use crate::diagnostics::{Diagnostic, DiagnosticReport, Severity};
use crate::error::{Result, SynthesisError};
use crate::manifest::Manifest;

/// One binder's outcome, attributed back to the directive that produced it.
#[derive(Debug, Clone)]
pub struct AppliedBinding {
    pub from: String,
    pub to: String,
    pub capability: String,
    pub success: bool,
}

/// Everything the Resolver Engine produces for the orchestrator to carry
/// into logical-ID preservation and plan emission.
pub struct ResolveOutcome {
    /// Topological synthesis order (component names).
    pub order: Vec<String>,
    pub components: IndexMap<String, Box<dyn Component>>,
    /// Per-component environment variables injected by binders that target it
    /// as a *source*.
    pub environment_variables: IndexMap<String, IndexMap<String, String>>,
    pub applied_bindings: Vec<AppliedBinding>,
}

/// Whether a binding failure aborts the pipeline or is merely recorded as a
/// plan-level diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingFailurePolicy {
    Fatal,
    Degraded,
}

pub struct ResolverEngine<'a> {
    pub catalog: &'a ComponentCatalog,
    pub binder_registry: &'a BinderRegistry,
    pub binding_failure_policy: BindingFailurePolicy,
}

impl<'a> ResolverEngine<'a> {
    pub fn new(catalog: &'a ComponentCatalog, binder_registry: &'a BinderRegistry, binding_failure_policy: BindingFailurePolicy) -> Self {
        Self { catalog, binder_registry, binding_failure_policy }
    }

    /// Runs the full resolve: topological sort, per-component synthesis,
    /// then binder execution in `binds[]` declared order.
    pub fn resolve(
        &self,
        manifest: &Manifest,
        contexts: &IndexMap<String, ComponentContext>,
        effective_configs: &IndexMap<String, EffectiveConfig>,
        report: &mut DiagnosticReport,
    ) -> Result<ResolveOutcome> {
        let order = topological_order(manifest)?;

        let mut components: IndexMap<String, Box<dyn Component>> = IndexMap::new();
        for name in &order {
            let spec = manifest.components.iter().find(|c| &c.name == name).expect("name from manifest");
            let mut component = self
                .catalog
                .create(&spec.component_type)
                .ok_or_else(|| SynthesisError::Reference {
                    message: format!("unknown component type '{}'", spec.component_type),
                    suggestion: None,
                })?;
            let ctx = contexts.get(name).expect("context hydrated for every component");
            let config = effective_configs.get(name).expect("config built for every component");
            component.synth(ctx, config)?;
            components.insert(name.clone(), component);
        }

        let mut environment_variables: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        let mut applied_bindings = Vec::with_capacity(manifest.binds.len());

        for binding in &manifest.binds {
            let from_type = &manifest.components.iter().find(|c| c.name == binding.from).expect("validated by reference checks").component_type;
            let from_handles = components.get(&binding.from).map(|c| c.constructs().clone()).unwrap_or_default();
            let to_handles = components.get(&binding.to).map(|c| c.constructs().clone()).unwrap_or_default();

            let Some(strategy) = self.binder_registry.find(from_type, &binding.capability) else {
                return Err(SynthesisError::Binding(format!(
                    "no binding strategy for '{}' -> '{}' despite passing reference validation",
                    from_type, binding.capability
                )));
            };

            let ctx = BindContext {
                from_component: &binding.from,
                to_component: &binding.to,
                from_handles: &from_handles,
                to_handles: &to_handles,
                access: binding.access,
                env_remap: &binding.env,
                options: &binding.options,
                compliance_framework: manifest.compliance_framework,
            };

            let result = strategy.bind(&ctx);
            applied_bindings.push(AppliedBinding {
                from: binding.from.clone(),
                to: binding.to.clone(),
                capability: binding.capability.clone(),
                success: result.metadata.success,
            });

            if !result.metadata.success {
                let elevates_beyond_support = !strategy.supported_access().contains(&binding.access);
                let is_fatal = elevates_beyond_support || self.binding_failure_policy == BindingFailurePolicy::Fatal;
                if is_fatal {
                    return Err(SynthesisError::Binding(
                        result.metadata.error.unwrap_or_else(|| format!("binding '{}' -> '{}' failed", binding.from, binding.to)),
                    ));
                }
                report.push(Diagnostic::new(
                    Severity::Medium,
                    "BindingDegraded",
                    format!("$.binds[?].from={}", binding.from),
                    result.metadata.error.unwrap_or_else(|| "binding failed".to_string()),
                ));
                continue;
            }

            environment_variables.entry(binding.from.clone()).or_default().extend(result.environment_variables);
        }

        Ok(ResolveOutcome { order, components, environment_variables, applied_bindings })
    }
}

/// Computes a topological order over the component dependency graph implied
/// by `binds[]`. Ties break by manifest declaration order; a cycle produces
/// `CyclicGraph` naming the cycle.
pub fn topological_order(manifest: &Manifest) -> Result<Vec<String>> {
    let declaration_index: BTreeMap<&str, usize> =
        manifest.components.iter().enumerate().map(|(i, c)| (c.name.as_str(), i)).collect();

    let mut indegree: BTreeMap<&str, usize> = declaration_index.keys().map(|name| (*name, 0usize)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for binding in &manifest.binds {
        if !declaration_index.contains_key(binding.from.as_str()) || !declaration_index.contains_key(binding.to.as_str()) {
            continue; // unknown references are caught by reference validation, not here
        }
        if binding.from == binding.to {
            continue; // self-loops are caught by reference validation
        }
        *indegree.get_mut(binding.from.as_str()).expect("checked above") += 1;
        dependents.entry(binding.to.as_str()).or_default().push(binding.from.as_str());
    }

    // Min-heap over declaration index gives deterministic tie-breaking
    // without needing a full lexicographic sort of component names.
    let mut ready: BinaryHeap<Reverse<usize>> =
        indegree.iter().filter(|(_, degree)| **degree == 0).map(|(name, _)| Reverse(declaration_index[name])).collect();

    let index_to_name: BTreeMap<usize, &str> = declaration_index.iter().map(|(name, i)| (*i, *name)).collect();

    let mut order = Vec::with_capacity(indegree.len());
    while let Some(Reverse(index)) = ready.pop() {
        let name = index_to_name[&index];
        order.push(name.to_string());
        if let Some(deps) = dependents.get(name) {
            for dependent in deps {
                let degree = indegree.get_mut(dependent).expect("known node");
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(declaration_index[dependent]));
                }
            }
        }
    }

    if order.len() != indegree.len() {
        let cycle: Vec<String> = indegree.iter().filter(|(_, degree)| **degree > 0).map(|(name, _)| name.to_string()).collect();
        return Err(SynthesisError::CyclicGraph(cycle));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AccessMode, BindingDirective, ComponentSpec};
    use indexmap::IndexMap as Map;
    use serde_json::json;

    fn manifest_with(components: Vec<(&str, &str)>, binds: Vec<(&str, &str)>) -> Manifest {
        Manifest {
            service: "s".into(),
            owner: "o".into(),
            compliance_framework: crate::manifest::ComplianceFramework::Commercial,
            environment: "dev".into(),
            components: components
                .into_iter()
                .map(|(name, component_type)| ComponentSpec { name: name.into(), component_type: component_type.into(), config: json!({}) })
                .collect(),
            binds: binds
                .into_iter()
                .map(|(from, to)| BindingDirective {
                    from: from.into(),
                    to: to.into(),
                    capability: "db:postgres".into(),
                    access: AccessMode::Read,
                    env: Map::new(),
                    options: serde_json::Value::Null,
                })
                .collect(),
            triggers: Vec::new(),
            tags: Map::new(),
            extensions: serde_json::Value::Null,
        }
    }

    #[test]
    fn dependency_synthesizes_before_dependent() {
        let manifest = manifest_with(vec![("api", "lambda-api"), ("db", "db-postgres")], vec![("api", "db")]);
        let order = topological_order(&manifest).unwrap();
        assert_eq!(order, vec!["db".to_string(), "api".to_string()]);
    }

    #[test]
    fn ties_break_by_declaration_order() {
        let manifest = manifest_with(vec![("b", "lambda-api"), ("a", "lambda-api")], vec![]);
        let order = topological_order(&manifest).unwrap();
        assert_eq!(order, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn cycle_is_reported() {
        let manifest = manifest_with(vec![("a", "lambda-api"), ("b", "lambda-api")], vec![("a", "b"), ("b", "a")]);
        let err = topological_order(&manifest).unwrap_err();
        assert!(matches!(err, SynthesisError::CyclicGraph(_)));
    }
}
