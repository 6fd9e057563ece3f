//! Config Builder (5-layer precedence).
//!
//! Resolves a component's effective configuration by layering hardcoded
//! fallbacks, platform defaults, environment defaults, component overrides,
//! and policy overrides (lowest to highest precedence), while retaining the
//! provenance of every leaf for the precedence visualizer.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SynthesisError};
use crate::manifest::ComplianceFramework;

/// The five precedence layers, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerId {
    Fallback,
    Platform,
    Environment,
    Component,
    Policy,
}

impl LayerId {
    pub fn label(&self) -> &'static str {
        match self {
            LayerId::Fallback => "hardcoded fallback",
            LayerId::Platform => "platform default",
            LayerId::Environment => "environment default",
            LayerId::Component => "component override",
            LayerId::Policy => "policy override",
        }
    }
}

/// One resolved leaf's origin, for the precedence visualizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafProvenance {
    pub layer: LayerId,
    pub source_label: String,
}

/// `{layer, value, source}` entry returned by `explainPrecedence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecedenceEntry {
    pub path: String,
    pub layer: LayerId,
    pub source: String,
    pub value: Value,
}

/// The resolved configuration after the 5-layer merge, with provenance
/// retained per leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub value: Value,
    provenance: IndexMap<String, LeafProvenance>,
}

impl EffectiveConfig {
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Builds an `EffectiveConfig` directly from a value, bypassing the
    /// 5-layer merge. Used by other modules' component-level unit tests that
    /// only need a config to synthesize against, not a provenance trace.
    #[cfg(test)]
    pub fn for_test(value: Value) -> Self {
        Self { value, provenance: IndexMap::new() }
    }

    pub fn precedence_trace(&self) -> Vec<PrecedenceEntry> {
        self.provenance
            .iter()
            .map(|(path, prov)| PrecedenceEntry {
                path: path.clone(),
                layer: prov.layer,
                source: prov.source_label.clone(),
                value: self.value.pointer(&dot_path_to_pointer(path)).cloned().unwrap_or(Value::Null),
            })
            .collect()
    }
}

fn dot_path_to_pointer(path: &str) -> String {
    path.trim_start_matches('$').replace('.', "/")
}

/// Paths to the three optional layer files.
#[derive(Debug, Clone)]
pub struct LayerFiles {
    pub platform_defaults_dir: PathBuf,
    pub environment_defaults_dir: PathBuf,
    pub policies_dir: PathBuf,
}

impl LayerFiles {
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            platform_defaults_dir: root.join("config"),
            environment_defaults_dir: root.join("environments"),
            policies_dir: root.join("policies"),
        }
    }
}

fn load_yaml_layer(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|source| SynthesisError::Io { path: path.to_path_buf(), source })?;
    let value: Value = serde_yaml_bw::from_str(&text)
        .map_err(|err| SynthesisError::Config(format!("malformed layer file {}: {err}", path.display())))?;
    Ok(Some(value))
}

/// Picks out the slice of a layer document relevant to `component_type`.
///
/// Layer files may either namespace by component type (a top-level
/// `components.<type>` or `<type>` key) or apply uniformly to every
/// component (no such key present) — see DESIGN.md for the resolution.
fn select_layer_slice(document: &Value, component_type: &str) -> Value {
    let Some(obj) = document.as_object() else { return document.clone() };
    if let Some(components) = obj.get("components").and_then(Value::as_object) {
        if let Some(slice) = components.get(component_type) {
            return slice.clone();
        }
    }
    if let Some(slice) = obj.get(component_type) {
        return slice.clone();
    }
    document.clone()
}

/// Recursively extracts `default` values from a JSON Schema into a skeleton
/// config tree — the "hardcoded fallbacks" layer.
pub fn defaults_from_schema(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else { return Value::Null };

    if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
        let mut defaults = serde_json::Map::new();
        for (key, sub_schema) in properties {
            let nested = defaults_from_schema(sub_schema);
            if let Some(default) = sub_schema.get("default") {
                defaults.insert(key.clone(), default.clone());
            } else if !nested.is_null() {
                defaults.insert(key.clone(), nested);
            }
        }
        if defaults.is_empty() {
            return obj.get("default").cloned().unwrap_or(Value::Null);
        }
        return Value::Object(defaults);
    }

    obj.get("default").cloned().unwrap_or(Value::Null)
}

/// Merges `incoming` on top of `acc`, recording provenance for every leaf it
/// touches. Objects merge recursively; arrays, scalars, and shape mismatches
/// replace wholesale.
fn merge_layer(
    acc: &mut Value,
    provenance: &mut IndexMap<String, LeafProvenance>,
    incoming: &Value,
    layer: LayerId,
    source_label: &str,
    path: &str,
) {
    if incoming.is_null() {
        // A layer contributing `null` (including a schema with no `default`
        // at all, which `defaults_from_schema` renders as `Value::Null`) is
        // "not set" for merge purposes — JSON has no `undefined`, so a bare
        // `null` is the closest representation and this pipeline never
        // needs to distinguish it from an explicit null default.
        return;
    }

    match (acc.as_object_mut(), incoming.as_object()) {
        (Some(acc_obj), Some(incoming_obj)) => {
            for (key, value) in incoming_obj {
                let child_path = format!("{path}.{key}");
                let slot = acc_obj.entry(key.clone()).or_insert(Value::Null);
                merge_layer(slot, provenance, value, layer, source_label, &child_path);
            }
        }
        _ => {
            *acc = incoming.clone();
            record_leaves(provenance, path, incoming, layer, source_label);
        }
    }
}

fn record_leaves(
    provenance: &mut IndexMap<String, LeafProvenance>,
    path: &str,
    value: &Value,
    layer: LayerId,
    source_label: &str,
) {
    match value.as_object() {
        Some(obj) if !obj.is_empty() => {
            for (key, sub_value) in obj {
                record_leaves(provenance, &format!("{path}.{key}"), sub_value, layer, source_label);
            }
        }
        _ => {
            provenance.insert(path.to_string(), LeafProvenance { layer, source_label: source_label.to_string() });
        }
    }
}

/// A component's post-merge normalization hook. Must be idempotent:
/// `normalise(normalise(x)) == normalise(x)`.
pub type NormaliseFn = fn(&mut Value);

/// Given `(ComponentSpec, ComponentContext, ComponentSchema)`, returns
/// `EffectiveConfig`.
pub struct ConfigBuilder<'a> {
    pub layer_files: &'a LayerFiles,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(layer_files: &'a LayerFiles) -> Self {
        Self { layer_files }
    }

    pub fn build(
        &self,
        component_type: &str,
        component_config: &Value,
        schema: &Value,
        framework: ComplianceFramework,
        environment: &str,
        normalise: Option<NormaliseFn>,
    ) -> Result<EffectiveConfig> {
        let mut value = Value::Object(serde_json::Map::new());
        let mut provenance = IndexMap::new();

        // Layer 1: hardcoded fallbacks, baked into the schema's `default`s.
        let fallbacks = defaults_from_schema(schema);
        merge_layer(&mut value, &mut provenance, &fallbacks, LayerId::Fallback, "schema default", "$");

        // Layer 2: platform defaults, config/<framework>.yml.
        let platform_path = self.layer_files.platform_defaults_dir.join(format!("{}.yml", framework.as_str()));
        if let Some(document) = load_yaml_layer(&platform_path)? {
            let slice = select_layer_slice(&document, component_type);
            merge_layer(&mut value, &mut provenance, &slice, LayerId::Platform, &platform_path.display().to_string(), "$");
        }

        // Layer 3: environment defaults, environments/<environment>.yml.
        let environment_path = self.layer_files.environment_defaults_dir.join(format!("{environment}.yml"));
        if let Some(document) = load_yaml_layer(&environment_path)? {
            let slice = select_layer_slice(&document, component_type);
            merge_layer(&mut value, &mut provenance, &slice, LayerId::Environment, &environment_path.display().to_string(), "$");
        }

        // Layer 4: component overrides, spec.config.
        merge_layer(&mut value, &mut provenance, component_config, LayerId::Component, "spec.config", "$");

        // Layer 5: policy overrides, policies/<framework>.yml — fedramp only.
        let mut policy_touched: Vec<String> = Vec::new();
        if framework.is_fedramp() {
            let policy_path = self.layer_files.policies_dir.join(format!("{}.yml", framework.as_str()));
            match load_yaml_layer(&policy_path)? {
                Some(document) => {
                    let slice = select_layer_slice(&document, component_type);
                    merge_layer(&mut value, &mut provenance, &slice, LayerId::Policy, &policy_path.display().to_string(), "$");
                    policy_touched = provenance
                        .iter()
                        .filter(|(_, prov)| prov.layer == LayerId::Policy)
                        .map(|(path, _)| path.clone())
                        .collect();
                }
                None => {
                    return Err(SynthesisError::Config(format!(
                        "policy overrides required for framework '{}' but {} is missing",
                        framework.as_str(),
                        policy_path.display()
                    )));
                }
            }
        }

        let pre_normalize_policy_values: Vec<(String, Value)> = policy_touched
            .iter()
            .map(|path| (path.clone(), value.pointer(&dot_path_to_pointer(path)).cloned().unwrap_or(Value::Null)))
            .collect();

        if let Some(normalise) = normalise {
            normalise(&mut value);
            normalise(&mut value); // idempotence is a contract; exercise it once more defensively
        }

        for (path, before) in &pre_normalize_policy_values {
            let after = value.pointer(&dot_path_to_pointer(path)).cloned().unwrap_or(Value::Null);
            if &after != before {
                return Err(SynthesisError::Config(format!(
                    "policy-mandated value at '{path}' was overridden by normalization (policy set {before}, got {after})"
                )));
            }
        }

        let mut missing = Vec::new();
        check_required(&value, schema, "$", &mut missing);
        if !missing.is_empty() {
            return Err(SynthesisError::Config(format!("missing required config leaves: {}", missing.join(", "))));
        }

        Ok(EffectiveConfig { value, provenance })
    }
}

fn check_required(value: &Value, schema: &Value, path: &str, missing: &mut Vec<String>) {
    let Some(schema_obj) = schema.as_object() else { return };

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        for entry in required {
            if let Some(key) = entry.as_str() {
                match value.get(key) {
                    None | Some(Value::Null) => missing.push(format!("{path}.{key}")),
                    _ => {}
                }
            }
        }
    }

    if let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) {
        for (key, sub_schema) in properties {
            if let Some(sub_value) = value.get(key) {
                check_required(sub_value, sub_schema, &format!("{path}.{key}"), missing);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn precedence_monotonicity_highest_layer_wins() {
        let dir = tempdir().unwrap();
        write(dir.path(), "config/commercial.yml", "encryption: false\n");
        write(dir.path(), "environments/dev.yml", "encryption: true\n");

        let layer_files = LayerFiles::under(dir.path());
        let builder = ConfigBuilder::new(&layer_files);
        let effective = builder
            .build(
                "db-postgres",
                &json!({}),
                &json!({"type": "object", "properties": {"encryption": {"type": "boolean"}}}),
                ComplianceFramework::Commercial,
                "dev",
                None,
            )
            .unwrap();

        assert_eq!(effective.value["encryption"], json!(true));
    }

    #[test]
    fn component_override_beats_environment_default() {
        let dir = tempdir().unwrap();
        write(dir.path(), "environments/dev.yml", "timeout: 30\n");

        let layer_files = LayerFiles::under(dir.path());
        let builder = ConfigBuilder::new(&layer_files);
        let effective = builder
            .build(
                "lambda-api",
                &json!({"timeout": 90}),
                &json!({"type": "object"}),
                ComplianceFramework::Commercial,
                "dev",
                None,
            )
            .unwrap();

        assert_eq!(effective.value["timeout"], json!(90));
    }

    #[test]
    fn policy_override_wins_under_fedramp_and_is_traced() {
        let dir = tempdir().unwrap();
        write(dir.path(), "policies/fedramp-moderate.yml", "encryption: true\n");

        let layer_files = LayerFiles::under(dir.path());
        let builder = ConfigBuilder::new(&layer_files);
        let effective = builder
            .build(
                "db-postgres",
                &json!({"encryption": false}),
                &json!({"type": "object"}),
                ComplianceFramework::FedrampModerate,
                "dev",
                None,
            )
            .unwrap();

        assert_eq!(effective.value["encryption"], json!(true));
        let trace = effective.precedence_trace();
        let entry = trace.iter().find(|e| e.path == "$.encryption").unwrap();
        assert_eq!(entry.layer, LayerId::Policy);
    }

    #[test]
    fn missing_policy_file_is_fatal_under_fedramp() {
        let dir = tempdir().unwrap();
        let layer_files = LayerFiles::under(dir.path());
        let builder = ConfigBuilder::new(&layer_files);
        let err = builder
            .build("db-postgres", &json!({}), &json!({"type": "object"}), ComplianceFramework::FedrampHigh, "dev", None)
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Config(_)));
    }

    #[test]
    fn missing_required_leaf_after_merge_errors() {
        let dir = tempdir().unwrap();
        let layer_files = LayerFiles::under(dir.path());
        let builder = ConfigBuilder::new(&layer_files);
        let schema = json!({"type": "object", "required": ["domainName"], "properties": {"domainName": {"type": "string"}}});
        let err = builder
            .build("certificate-manager", &json!({}), &schema, ComplianceFramework::Commercial, "dev", None)
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Config(_)));
    }

    #[test]
    fn arrays_replace_wholesale_rather_than_concatenate() {
        let dir = tempdir().unwrap();
        write(dir.path(), "environments/dev.yml", "allowedOrigins: [a, b]\n");
        let layer_files = LayerFiles::under(dir.path());
        let builder = ConfigBuilder::new(&layer_files);
        let effective = builder
            .build(
                "lambda-api",
                &json!({"allowedOrigins": ["c"]}),
                &json!({"type": "object"}),
                ComplianceFramework::Commercial,
                "dev",
                None,
            )
            .unwrap();
        assert_eq!(effective.value["allowedOrigins"], json!(["c"]));
    }
}
