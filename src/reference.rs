//! Reference & Semantic Validator.
//!
//! Checks cross-component references (bindings, triggers) and domain rules
//! that aren't expressible in JSON Schema. Runs after schema validation and
//! before context hydration; operates on the raw manifest, not on effective config.

use std::collections::{HashMap, HashSet};

use crate::capability::BinderRegistry;
use crate::component::ComponentCatalog;
use crate::diagnostics::{Diagnostic, DiagnosticReport, Severity};
use crate::manifest::Manifest;

/// Checks not expressible in JSON Schema. Returns the number of fatal
/// reference errors appended to `report`; the orchestrator aborts when
/// this is non-zero.
pub fn validate_references(
    manifest: &Manifest,
    binder_registry: &BinderRegistry,
    component_catalog: &ComponentCatalog,
    report: &mut DiagnosticReport,
) -> usize {
    let mut error_count = 0;
    let component_types: HashMap<&str, &str> =
        manifest.components.iter().map(|c| (c.name.as_str(), c.component_type.as_str())).collect();
    let component_names: HashSet<&str> = component_types.keys().copied().collect();

    for (index, binding) in manifest.binds.iter().enumerate() {
        let path = format!("$.binds[{index}]");

        if !component_names.contains(binding.from.as_str()) {
            report.push(Diagnostic::new(
                Severity::High,
                "UnknownComponent",
                format!("{path}.from"),
                format!("binding references unknown component '{}'", binding.from),
            ));
            error_count += 1;
            continue;
        }
        if !component_names.contains(binding.to.as_str()) {
            report.push(Diagnostic::new(
                Severity::High,
                "UnknownComponent",
                format!("{path}.to"),
                format!("binding references unknown component '{}'", binding.to),
            ));
            error_count += 1;
            continue;
        }
        if binding.from == binding.to {
            report.push(Diagnostic::new(
                Severity::High,
                "SelfLoop",
                path.clone(),
                format!("binding from '{}' to itself is not allowed", binding.from),
            ));
            error_count += 1;
            continue;
        }

        let from_type = component_types[binding.from.as_str()];
        let validity = binder_registry.validate(from_type, &binding.capability);
        if !validity.valid {
            let mut diagnostic = Diagnostic::new(
                Severity::High,
                "UnsupportedBinding",
                path.clone(),
                validity.reason.unwrap_or_else(|| "unsupported binding".to_string()),
            );
            if let Some(suggestion) = validity.suggestion {
                diagnostic = diagnostic.with_suggestion(suggestion);
            }
            report.push(diagnostic);
            error_count += 1;
            continue;
        }

        if let Some(strategy) = binder_registry.find(from_type, &binding.capability) {
            if !strategy.supported_access().contains(&binding.access) {
                report.push(Diagnostic::new(
                    Severity::High,
                    "UnsupportedAccessMode",
                    format!("{path}.access"),
                    format!(
                        "binder for '{}' -> '{}' does not support access mode '{:?}'",
                        from_type, binding.capability, binding.access
                    ),
                ));
                error_count += 1;
            }
        }
    }

    for (index, trigger) in manifest.triggers.iter().enumerate() {
        let path = format!("$.triggers[{index}]");

        if !component_names.contains(trigger.from.as_str()) {
            report.push(Diagnostic::new(
                Severity::High,
                "UnknownComponent",
                format!("{path}.from"),
                format!("trigger references unknown component '{}'", trigger.from),
            ));
            error_count += 1;
            continue;
        }
        if !component_names.contains(trigger.to.as_str()) {
            report.push(Diagnostic::new(
                Severity::High,
                "UnknownComponent",
                format!("{path}.to"),
                format!("trigger references unknown component '{}'", trigger.to),
            ));
            error_count += 1;
            continue;
        }

        let from_type = component_types[trigger.from.as_str()];
        let declared = crate::components::declared_events(from_type);
        if !declared.contains(&trigger.event.as_str()) {
            let suggestion =
                if declared.is_empty() { None } else { Some(format!("declared events for '{from_type}': {}", declared.join(", "))) };
            let mut diagnostic = Diagnostic::new(
                Severity::High,
                "UnknownEvent",
                format!("{path}.event"),
                format!("component type '{from_type}' does not declare event '{}'", trigger.event),
            );
            if let Some(suggestion) = suggestion {
                diagnostic = diagnostic.with_suggestion(suggestion);
            }
            report.push(diagnostic);
            error_count += 1;
        }
    }

    for component in &manifest.components {
        if !component_catalog.contains(&component.component_type) {
            report.push(Diagnostic::new(
                Severity::High,
                "UnknownComponentType",
                format!("$.components[?].type"),
                format!("component '{}' has unknown type '{}'", component.name, component.component_type),
            ));
            error_count += 1;
        }
    }

    error_count += check_production_monitoring(manifest, report);

    error_count
}

/// Production manifests must enable monitoring if the component's schema
/// defines it.
fn check_production_monitoring(manifest: &Manifest, report: &mut DiagnosticReport) -> usize {
    if !matches!(manifest.environment.as_str(), "production" | "prod") {
        return 0;
    }

    let mut count = 0;
    for component in &manifest.components {
        if !crate::components::declares_monitoring(&component.component_type) {
            continue;
        }
        let enabled = component
            .config
            .get("monitoring")
            .and_then(|m| m.get("enabled"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if !enabled {
            report.push(
                Diagnostic::new(
                    Severity::High,
                    "MonitoringRequiredInProduction",
                    format!("$.components[{}].config.monitoring", component.name),
                    format!("component '{}' must enable monitoring in a production environment", component.name),
                )
                .with_suggestion("set config.monitoring.enabled: true"),
            );
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{BindContext, BindingResult, BinderStrategy};
    use crate::manifest::{AccessMode, BindingDirective, ComponentSpec, TriggerDirective};
    use indexmap::IndexMap;
    use serde_json::json;

    struct LambdaToQueue;
    impl BinderStrategy for LambdaToQueue {
        fn supported_source_types(&self) -> &[&str] {
            &["lambda-api"]
        }
        fn supported_capabilities(&self) -> &[&str] {
            &["queue:sqs"]
        }
        fn supported_access(&self) -> &[AccessMode] {
            &[AccessMode::Read, AccessMode::Write]
        }
        fn bind(&self, _ctx: &BindContext<'_>) -> BindingResult {
            BindingResult::success("lambda-to-queue")
        }
    }

    fn manifest_with(binds: Vec<BindingDirective>, triggers: Vec<TriggerDirective>) -> Manifest {
        Manifest {
            service: "s".into(),
            owner: "o".into(),
            compliance_framework: crate::manifest::ComplianceFramework::Commercial,
            environment: "dev".into(),
            components: vec![
                ComponentSpec { name: "a".into(), component_type: "lambda-api".into(), config: json!({}) },
                ComponentSpec { name: "b".into(), component_type: "queue-sqs".into(), config: json!({}) },
            ],
            binds,
            triggers,
            tags: IndexMap::new(),
            extensions: serde_json::Value::Null,
        }
    }

    #[test]
    fn unknown_component_reference_is_an_error() {
        let manifest = manifest_with(
            vec![BindingDirective {
                from: "a".into(),
                to: "ghost".into(),
                capability: "queue:sqs".into(),
                access: AccessMode::Read,
                env: IndexMap::new(),
                options: serde_json::Value::Null,
            }],
            Vec::new(),
        );
        let mut registry = BinderRegistry::new();
        registry.register(Box::new(LambdaToQueue));
        let catalog = ComponentCatalog::with_builtins();
        let mut report = DiagnosticReport::default();
        let count = validate_references(&manifest, &registry, &catalog, &mut report);
        assert_eq!(count, 1);
        assert_eq!(report.diagnostics[0].code, "UnknownComponent");
    }

    #[test]
    fn self_loop_binding_is_rejected() {
        let manifest = manifest_with(
            vec![BindingDirective {
                from: "a".into(),
                to: "a".into(),
                capability: "queue:sqs".into(),
                access: AccessMode::Read,
                env: IndexMap::new(),
                options: serde_json::Value::Null,
            }],
            Vec::new(),
        );
        let registry = BinderRegistry::new();
        let catalog = ComponentCatalog::with_builtins();
        let mut report = DiagnosticReport::default();
        let count = validate_references(&manifest, &registry, &catalog, &mut report);
        assert_eq!(count, 1);
        assert_eq!(report.diagnostics[0].code, "SelfLoop");
    }

    #[test]
    fn unsupported_binding_carries_suggestion() {
        let manifest = manifest_with(
            vec![BindingDirective {
                from: "a".into(),
                to: "b".into(),
                capability: "queue:sns".into(),
                access: AccessMode::Invoke,
                env: IndexMap::new(),
                options: serde_json::Value::Null,
            }],
            Vec::new(),
        );
        let mut registry = BinderRegistry::new();
        registry.register(Box::new(LambdaToQueue));
        let catalog = ComponentCatalog::with_builtins();
        let mut report = DiagnosticReport::default();
        let count = validate_references(&manifest, &registry, &catalog, &mut report);
        assert_eq!(count, 1);
        let diagnostic = &report.diagnostics[0];
        assert_eq!(diagnostic.code, "UnsupportedBinding");
        assert!(diagnostic.message.contains("lambda-api"));
        assert!(diagnostic.suggestion.as_ref().unwrap().contains("queue:sqs"));
    }

    #[test]
    fn production_environment_requires_monitoring_enabled() {
        let mut manifest = manifest_with(Vec::new(), Vec::new());
        manifest.environment = "production".into();
        manifest.components[1].component_type = "db-postgres".into();
        let registry = BinderRegistry::new();
        let catalog = ComponentCatalog::with_builtins();
        let mut report = DiagnosticReport::default();
        let count = validate_references(&manifest, &registry, &catalog, &mut report);
        assert!(count >= 1);
        assert!(report.diagnostics.iter().any(|d| d.code == "MonitoringRequiredInProduction"));
    }
}
