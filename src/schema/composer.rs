//! Schema Composer.
//!
//! Discovers per-component config schemas under a components root and
//! stitches them into one master JSON Schema keyed by component type, so the
//! validator only ever compiles a single schema document per run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use walkdir::WalkDir;

use crate::diagnostics::{Diagnostic, DiagnosticReport, Severity};
use crate::error::{Result, SynthesisError};

const SCHEMA_FILENAMES: &[&str] = &["Config.schema.json"];

#[derive(Debug, Clone)]
struct DiscoveredSchema {
    component_type: String,
    schema: Value,
    source: PathBuf,
}

/// The composed master schema plus the set of component types it knows about.
///
/// Cheap to clone: `Value` and `IndexMap<String, PathBuf>` are the only
/// fields, and clones are handed out of the cache on every read.
#[derive(Debug, Clone)]
pub struct CachedMasterSchema {
    pub schema: Value,
    pub known_types: IndexMap<String, PathBuf>,
}

/// Process-wide, read-mostly cache for the master schema.
///
/// Lifecycle is explicit — init on first use, invalidate on explicit
/// reload — so this is a plain struct the orchestrator owns and passes
/// around, never a self-initializing `static`.
pub struct SchemaComposer {
    components_root: PathBuf,
    base_schema_path: PathBuf,
    cache: RwLock<Option<CachedMasterSchema>>,
}

impl SchemaComposer {
    pub fn new(components_root: impl Into<PathBuf>, base_schema_path: impl Into<PathBuf>) -> Self {
        Self {
            components_root: components_root.into(),
            base_schema_path: base_schema_path.into(),
            cache: RwLock::new(None),
        }
    }

    /// Returns the cached master schema, composing it on first use.
    pub fn get_or_compose(&self, report: &mut DiagnosticReport) -> Result<CachedMasterSchema> {
        if let Some(cached) = self.cache.read().expect("schema cache lock poisoned").as_ref() {
            return Ok(cached.clone());
        }
        let composed = self.compose(report)?;
        *self.cache.write().expect("schema cache lock poisoned") = Some(composed.clone());
        Ok(composed)
    }

    /// Drops the cached master schema so the next call recomposes from disk.
    pub fn invalidate(&self) {
        *self.cache.write().expect("schema cache lock poisoned") = None;
    }

    fn compose(&self, report: &mut DiagnosticReport) -> Result<CachedMasterSchema> {
        let base_text = fs::read_to_string(&self.base_schema_path).map_err(|source| SynthesisError::Io {
            path: self.base_schema_path.clone(),
            source,
        })?;
        let base: Value = serde_json::from_str(&base_text)
            .map_err(|err| SynthesisError::Schema(format!("base schema {} is not valid JSON: {err}", self.base_schema_path.display())))?;

        let discovered = discover_schemas(&self.components_root, report);
        compose_master_schema(base, discovered, report)
    }
}

/// Walks the components directory for `Config.schema.json` files, including
/// the nested `src/schema/Config.schema.json` variant.
fn discover_schemas(root: &Path, report: &mut DiagnosticReport) -> Vec<DiscoveredSchema> {
    if !root.exists() {
        return Vec::new();
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else { continue };
        if !SCHEMA_FILENAMES.contains(&name) {
            continue;
        }
        let path = entry.path();
        match load_schema_file(root, path) {
            Ok(discovered) => found.push(discovered),
            Err(message) => {
                report.push(Diagnostic::new(
                    Severity::Low,
                    "SchemaFileSkipped",
                    path.display().to_string(),
                    message,
                ));
            }
        }
    }
    found
}

fn load_schema_file(root: &Path, path: &Path) -> std::result::Result<DiscoveredSchema, String> {
    let text = fs::read_to_string(path).map_err(|err| format!("unreadable schema file: {err}"))?;
    let schema: Value = serde_json::from_str(&text).map_err(|err| format!("malformed schema JSON: {err}"))?;

    let path_derived = derive_component_type(root, path);
    let annotated = schema.get("x-component-type").and_then(Value::as_str).map(str::to_string);
    let component_type = annotated.or(path_derived).ok_or_else(|| {
        "could not derive a component type from the path or x-component-type".to_string()
    })?;

    Ok(DiscoveredSchema {
        component_type,
        schema,
        source: path.to_path_buf(),
    })
}

/// The component `type` is the path segment immediately after `components/`.
fn derive_component_type(root: &Path, schema_path: &Path) -> Option<String> {
    let relative = schema_path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    Some(first.as_os_str().to_string_lossy().into_owned())
}

fn compose_master_schema(
    mut base: Value,
    discovered: Vec<DiscoveredSchema>,
    report: &mut DiagnosticReport,
) -> Result<CachedMasterSchema> {
    if !base.is_object() {
        return Err(SynthesisError::Schema("base schema root is not an object".into()));
    }

    let mut known_types: IndexMap<String, PathBuf> = IndexMap::new();
    let mut conditionals = Vec::new();
    let mut new_defs: Map<String, Value> = Map::new();

    for item in discovered {
        if known_types.contains_key(&item.component_type) {
            report.push(Diagnostic::new(
                Severity::Low,
                "DuplicateComponentSchema",
                item.source.display().to_string(),
                format!("component type '{}' already registered; ignoring duplicate", item.component_type),
            ));
            continue;
        }

        let component_type = item.component_type.clone();
        let mut schema = item.schema;

        // Extract `definitions` (if any) and re-key under the master `$defs`.
        let definitions = schema
            .as_object_mut()
            .and_then(|obj| obj.remove("definitions"))
            .and_then(|v| v.as_object().cloned());

        if let Some(definitions) = &definitions {
            for (name, def_schema) in definitions {
                let mut def_schema = def_schema.clone();
                rewrite_refs(&mut def_schema, &component_type);
                new_defs.insert(format!("component.{component_type}.definition.{name}"), def_schema);
            }
        }

        rewrite_refs(&mut schema, &component_type);
        new_defs.insert(format!("component.{component_type}.config"), schema);

        conditionals.push(json!({
            "if": { "properties": { "type": { "const": component_type } } },
            "then": { "properties": { "config": { "$ref": format!("#/$defs/component.{component_type}.config") } } }
        }));

        known_types.insert(component_type, item.source);
    }

    let defs = base
        .as_object_mut()
        .expect("checked above")
        .entry("$defs")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| SynthesisError::Schema("base schema $defs is not an object".into()))?;
    defs.extend(new_defs);

    if !known_types.is_empty() {
        let component_def = base
            .get_mut("$defs")
            .and_then(Value::as_object_mut)
            .and_then(|defs| defs.get_mut("component"))
            .ok_or_else(|| SynthesisError::Schema("base schema missing $defs.component".into()))?;

        let obj = component_def
            .as_object_mut()
            .ok_or_else(|| SynthesisError::Schema("$defs.component is not an object".into()))?;

        if let Some(properties) = obj.get_mut("properties").and_then(Value::as_object_mut) {
            if let Some(type_prop) = properties.get_mut("type") {
                type_prop["enum"] = Value::Array(known_types.keys().cloned().map(Value::String).collect());
            }
        }

        let all_of = obj.entry("allOf").or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = all_of {
            items.extend(conditionals);
        }
    }

    Ok(CachedMasterSchema { schema: base, known_types })
}

/// Rewrites every `$ref` in `schema` in place:
/// `#/definitions/X` → `#/$defs/component.T.definition.X`
/// `#` (self-reference) → `#/$defs/component.T.config`
fn rewrite_refs(schema: &mut Value, component_type: &str) {
    match schema {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get_mut("$ref") {
                *reference = rewrite_ref_string(reference, component_type);
            }
            for value in map.values_mut() {
                rewrite_refs(value, component_type);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, component_type);
            }
        }
        _ => {}
    }
}

fn rewrite_ref_string(reference: &str, component_type: &str) -> String {
    if reference == "#" {
        return format!("#/$defs/component.{component_type}.config");
    }
    if let Some(name) = reference.strip_prefix("#/definitions/") {
        return format!("#/$defs/component.{component_type}.definition.{name}");
    }
    reference.to_string()
}
