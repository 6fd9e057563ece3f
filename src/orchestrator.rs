//! Pipeline Orchestrator.
//!
//! The single public entry point. Sequences parse → schema compose → schema
//! validate → reference validate → context hydrate → config build → resolve
//! → logical-id preservation → plan emission, aborting at the first fatal
//! stage and returning every diagnostic collected up to that point via
//! `tracing` rather than losing them on the way out.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::info_span;

use crate::capability::BinderRegistry;
use crate::component::ComponentCatalog;
use crate::config_builder::{ConfigBuilder, EffectiveConfig, LayerFiles, PrecedenceEntry};
use crate::context::{self, ComponentContext};
use crate::diagnostics::{DiagnosticReport, Severity};
use crate::error::{Result, SynthesisError};
use crate::logical_id::{
    self, DriftAnalysis, LogicalIdManager, LogicalIdMap, LogicalIdMapping, PreservationStrategy, ResourceCandidate, ResolvedLogicalId,
};
use crate::manifest::{self, Manifest, ManifestSource};
use crate::plan::{Plan, PlanResource, SynthesisOutcome, SynthesisReport};
use crate::reference;
use crate::resolver::{BindingFailurePolicy, ResolverEngine};
use crate::schema::composer::SchemaComposer;
use crate::schema::validator;

/// Cooperative cancellation, checked at stage and I/O boundaries. Cloning
/// shares the same underlying flag; `cancel()` from any clone stops every
/// synthesis run built from it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn check_cancelled(token: Option<&CancellationToken>, stage: &str) -> Result<()> {
    if token.is_some_and(CancellationToken::is_cancelled) {
        return Err(SynthesisError::Cancelled { stage: stage.to_string() });
    }
    Ok(())
}

/// Filesystem layout the pipeline reads from and (optionally) writes to.
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub components_root: PathBuf,
    pub base_schema_path: PathBuf,
    pub layer_files: LayerFiles,
    pub logical_id_map_path: PathBuf,
}

impl PipelinePaths {
    /// Lays out the conventional directory structure under `root`:
    /// `root/components`, `root/base_manifest.schema.json`, the three layer
    /// directories `LayerFiles::under` expects, and `root/logical-id-map.json`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            components_root: root.join("components"),
            base_schema_path: root.join("base_manifest.schema.json"),
            layer_files: LayerFiles::under(root),
            logical_id_map_path: root.join("logical-id-map.json"),
        }
    }
}

/// Options accepted by `synthesize`/`validate`/`explain_precedence`.
///
/// `catalog`/`binder_registry` are the `registerComponent`/`registerBinder`
/// extension points: callers build them (typically starting from
/// `ComponentCatalog::with_builtins()` / the built-in binder set) before
/// handing them to the orchestrator, rather than the orchestrator
/// self-initializing a registry on first use.
pub struct SynthesizeOptions {
    pub paths: PipelinePaths,
    pub region: String,
    pub account_id: String,
    pub catalog: ComponentCatalog,
    pub binder_registry: BinderRegistry,
    pub binding_failure_policy: BindingFailurePolicy,
    pub allow_drift: bool,
    pub persist_logical_id_map: bool,
    pub cancellation: Option<CancellationToken>,
}

impl SynthesizeOptions {
    pub fn new(paths: PipelinePaths, region: impl Into<String>, account_id: impl Into<String>) -> Self {
        let mut binder_registry = BinderRegistry::new();
        crate::components::register_builtin_binders(&mut binder_registry);
        Self {
            paths,
            region: region.into(),
            account_id: account_id.into(),
            catalog: ComponentCatalog::with_builtins(),
            binder_registry,
            binding_failure_policy: BindingFailurePolicy::Degraded,
            allow_drift: false,
            persist_logical_id_map: false,
            cancellation: None,
        }
    }
}

fn stage_span(stage: &'static str, manifest: &Manifest) -> tracing::Span {
    info_span!("synthesis", stage, service = %manifest.service, environment = %manifest.environment)
}

fn load_base_schema(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|source| SynthesisError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|err| SynthesisError::Schema(format!("base schema {} is not valid JSON: {err}", path.display())))
}

struct ValidationStages {
    report: DiagnosticReport,
    schema_errors: usize,
    reference_errors: usize,
    composed: Option<crate::schema::composer::CachedMasterSchema>,
}

/// Runs parse-time validation (schema + reference) without touching config,
/// resolution, or logical-ID preservation. Shared by `validate` (which never
/// errors on validation findings) and `synthesize` (which aborts on them).
fn run_validation_stages(
    manifest: &Manifest,
    raw: &Value,
    options: &SynthesizeOptions,
) -> Result<ValidationStages> {
    let mut report = DiagnosticReport::default();

    check_cancelled(options.cancellation.as_ref(), "compose-schema")?;
    let composer = SchemaComposer::new(&options.paths.components_root, &options.paths.base_schema_path);
    let composed = {
        let _span = stage_span("compose-schema", manifest).entered();
        composer.get_or_compose(&mut report).ok()
    };
    let base_schema = load_base_schema(&options.paths.base_schema_path)?;

    check_cancelled(options.cancellation.as_ref(), "validate-schema")?;
    let schema_errors = {
        let _span = stage_span("validate-schema", manifest).entered();
        validator::validate_manifest(raw, composed.as_ref(), &base_schema, &mut report)?
    };

    let mut reference_errors = 0;
    if schema_errors == 0 {
        check_cancelled(options.cancellation.as_ref(), "validate-references")?;
        let _span = stage_span("validate-references", manifest).entered();
        reference_errors = reference::validate_references(manifest, &options.binder_registry, &options.catalog, &mut report);
    }

    Ok(ValidationStages { report, schema_errors, reference_errors, composed })
}

/// `validate(manifest) → diagnostics`. Runs schema and reference validation
/// only; never aborts on validation findings, only on I/O or schema
/// compilation failures.
pub fn validate(source: ManifestSource<'_>, options: &SynthesizeOptions) -> Result<DiagnosticReport> {
    let (manifest, raw) = manifest::parse(source)?;
    let stages = run_validation_stages(&manifest, &raw, options)?;
    Ok(stages.report)
}

/// `explainPrecedence(component) → {layer, value, source}[]`.
pub fn explain_precedence(component_name: &str, source: ManifestSource<'_>, options: &SynthesizeOptions) -> Result<Vec<PrecedenceEntry>> {
    let (manifest, _raw) = manifest::parse(source)?;
    let spec = manifest
        .components
        .iter()
        .find(|c| c.name == component_name)
        .ok_or_else(|| SynthesisError::Reference { message: format!("unknown component '{component_name}'"), suggestion: None })?;

    let composer = SchemaComposer::new(&options.paths.components_root, &options.paths.base_schema_path);
    let mut discard = DiagnosticReport::default();
    let composed = composer.get_or_compose(&mut discard)?;
    let schema_path = composed
        .known_types
        .get(&spec.component_type)
        .ok_or_else(|| SynthesisError::Schema(format!("no schema registered for component type '{}'", spec.component_type)))?;
    let schema_text = std::fs::read_to_string(schema_path).map_err(|source| SynthesisError::Io { path: schema_path.clone(), source })?;
    let schema: Value = serde_json::from_str(&schema_text)
        .map_err(|err| SynthesisError::Schema(format!("schema {} is not valid JSON: {err}", schema_path.display())))?;

    let builder = ConfigBuilder::new(&options.paths.layer_files);
    let effective = builder.build(
        &spec.component_type,
        &spec.config,
        &schema,
        manifest.compliance_framework,
        &manifest.environment,
        crate::components::normalise_fn(&spec.component_type),
    )?;
    Ok(effective.precedence_trace())
}

/// `synthesize(manifestSource, options) → { plan, report }`.
pub fn synthesize(source: ManifestSource<'_>, options: &SynthesizeOptions) -> Result<SynthesisOutcome> {
    check_cancelled(options.cancellation.as_ref(), "parse")?;
    let (manifest, raw) = manifest::parse(source)?;

    let ValidationStages { report: mut report, schema_errors, reference_errors, composed } = run_validation_stages(&manifest, &raw, options)?;

    if schema_errors > 0 {
        tracing::warn!(count = schema_errors, "aborting: manifest failed schema validation");
        return Err(SynthesisError::Validation(schema_errors));
    }
    if reference_errors > 0 {
        let first = report
            .diagnostics
            .iter()
            .rev()
            .take(reference_errors)
            .find(|d| d.severity >= Severity::High)
            .cloned();
        tracing::warn!(count = reference_errors, "aborting: manifest failed reference validation");
        return Err(match first {
            Some(diag) => SynthesisError::Reference { message: diag.message, suggestion: diag.suggestion },
            None => SynthesisError::Reference { message: "reference validation failed".to_string(), suggestion: None },
        });
    }

    check_cancelled(options.cancellation.as_ref(), "hydrate-context")?;
    let contexts: IndexMap<String, ComponentContext> = {
        let _span = stage_span("hydrate-context", &manifest).entered();
        context::hydrate(&manifest, &options.region, &options.account_id).into_iter().collect()
    };

    check_cancelled(options.cancellation.as_ref(), "build-config")?;
    let config_builder = ConfigBuilder::new(&options.paths.layer_files);
    let mut effective_configs: IndexMap<String, EffectiveConfig> = IndexMap::new();
    {
        let _span = stage_span("build-config", &manifest).entered();
        for spec in &manifest.components {
            let schema = match composed.as_ref().and_then(|c| c.known_types.get(&spec.component_type)) {
                Some(path) => {
                    let text = std::fs::read_to_string(path).map_err(|source| SynthesisError::Io { path: path.clone(), source })?;
                    serde_json::from_str(&text)
                        .map_err(|err| SynthesisError::Schema(format!("schema {} is not valid JSON: {err}", path.display())))?
                }
                None => Value::Object(serde_json::Map::new()),
            };
            let effective = config_builder.build(
                &spec.component_type,
                &spec.config,
                &schema,
                manifest.compliance_framework,
                &manifest.environment,
                crate::components::normalise_fn(&spec.component_type),
            )?;
            effective_configs.insert(spec.name.clone(), effective);
        }
    }

    check_cancelled(options.cancellation.as_ref(), "resolve")?;
    let resolve_outcome = {
        let _span = stage_span("resolve", &manifest).entered();
        let resolver = ResolverEngine::new(&options.catalog, &options.binder_registry, options.binding_failure_policy);
        resolver.resolve(&manifest, &contexts, &effective_configs, &mut report)?
    };

    check_cancelled(options.cancellation.as_ref(), "preserve-logical-ids")?;
    let existing_map = logical_id::load(&options.paths.logical_id_map_path)?;
    let stack_name = format!("{}-{}", manifest.service, manifest.environment);
    let current_component_names: Vec<&str> = manifest.components.iter().map(|c| c.name.as_str()).collect();
    let manager = LogicalIdManager::new(existing_map.as_ref(), &manifest.service, current_component_names);

    let mut candidates: Vec<(String, ResourceCandidate<'_>)> = Vec::new();
    for name in &resolve_outcome.order {
        let component = resolve_outcome.components.get(name).expect("component synthesized for every order entry");
        for (construct_key, handle) in component.constructs() {
            let resource_kind = if construct_key == "main" { component.component_type() } else { construct_key.as_str() };
            candidates.push((
                name.clone(),
                ResourceCandidate {
                    component_name: name.as_str(),
                    component_type: component.component_type(),
                    resource_kind,
                    stateful: component.is_stateful(),
                    construct_path: handle.as_str(),
                },
            ));
        }
    }
    let resolved: Vec<ResolvedLogicalId> = candidates.iter().map(|(_, c)| manager.resolve(c)).collect();
    let fedramp_high = matches!(manifest.compliance_framework, crate::manifest::ComplianceFramework::FedrampHigh);
    let drift_candidates: Vec<ResourceCandidate<'_>> = candidates.iter().map(|(_, c)| *c).collect();
    let drift_analysis: DriftAnalysis = logical_id::analyze_drift(&drift_candidates, &resolved, existing_map.as_ref(), fedramp_high);

    let validate_before_plan = existing_map.as_ref().is_some_and(|m| m.drift_avoidance_config.validate_before_plan);
    if drift_analysis.risk_level == Severity::Critical && validate_before_plan && !options.allow_drift {
        tracing::warn!(summary = %drift_analysis.summary, "aborting: drift-critical resources would be replaced");
        return Err(SynthesisError::DriftCritical(drift_analysis.summary.clone()));
    }

    let mut applied_logical_id_mappings: IndexMap<String, String> = IndexMap::new();
    let mut logical_id_by_candidate: IndexMap<(String, String), String> = IndexMap::new();
    for ((component_name, candidate), resolved_id) in candidates.iter().zip(resolved.iter()) {
        let key = if candidate.resource_kind == candidate.component_type {
            component_name.clone()
        } else {
            format!("{component_name}.{}", candidate.resource_kind)
        };
        applied_logical_id_mappings.insert(key, resolved_id.logical_id.clone());
        logical_id_by_candidate.insert((component_name.clone(), candidate.resource_kind.to_string()), resolved_id.logical_id.clone());
    }

    if options.persist_logical_id_map {
        let _span = stage_span("persist-logical-ids", &manifest).entered();
        let mut new_map = LogicalIdMap::empty(stack_name.clone(), manifest.environment.clone());
        new_map.drift_avoidance_config = existing_map.map(|m| m.drift_avoidance_config).unwrap_or_default();
        // Only the primary construct per component is persisted: it's the
        // only slot `LogicalIdManager::resolve` ever looks up (by component
        // name, or `{name}-role` for identity roles). Secondary constructs
        // (e.g. a key store's `kmsKey`) are always hash-derived and never
        // consult the map.
        for ((component_name, candidate), resolved_id) in candidates.iter().zip(resolved.iter()) {
            let slot = match candidate.resource_kind {
                "identity-role" => format!("{component_name}-role"),
                kind if kind == candidate.component_type => component_name.clone(),
                _ => continue,
            };
            new_map.mappings.insert(
                slot,
                LogicalIdMapping {
                    original_id: resolved_id.logical_id.clone(),
                    resource_type: candidate.component_type.to_string(),
                    component_name: component_name.clone(),
                    preservation_strategy: resolved_id.strategy.unwrap_or(PreservationStrategy::PreserveStatefulResources),
                    metadata: IndexMap::new(),
                },
            );
        }
        logical_id::save(&options.paths.logical_id_map_path, &new_map)?;
    }

    let mut resources = Vec::with_capacity(resolve_outcome.order.len());
    for name in &resolve_outcome.order {
        let component = resolve_outcome.components.get(name).expect("component synthesized for every order entry");
        let logical_id = logical_id_by_candidate
            .get(&(name.clone(), component.component_type().to_string()))
            .cloned()
            .unwrap_or_default();
        let capabilities = component
            .capabilities()
            .iter()
            .map(|cap| serde_json::to_value(cap).expect("Capability always serializes"))
            .collect();
        resources.push(PlanResource {
            component_name: name.clone(),
            component_type: component.component_type().to_string(),
            logical_id,
            capabilities,
            construct_paths: component.constructs().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        });
    }

    let precedence_chains: IndexMap<String, Vec<PrecedenceEntry>> =
        effective_configs.iter().map(|(name, cfg)| (name.clone(), cfg.precedence_trace())).collect();

    let plan = Plan {
        service: manifest.service.clone(),
        environment: manifest.environment.clone(),
        compliance_framework: manifest.compliance_framework.as_str().to_string(),
        resources,
        environment_variables: resolve_outcome.environment_variables,
    };

    let synthesis_report = SynthesisReport {
        applied_logical_id_mappings,
        drift_analysis,
        precedence_chains,
        diagnostics: report.diagnostics,
    };

    Ok(SynthesisOutcome { plan, report: synthesis_report })
}
