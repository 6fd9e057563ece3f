//! Schema Validator.
//!
//! Validates the parsed manifest tree against the composed master schema in
//! all-errors, verbose mode, and turns raw `jsonschema` errors into the
//! structured diagnostics the rest of the pipeline consumes.

use jsonschema::{Draft, Validator};
use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticReport, Severity};
use crate::error::{Result, SynthesisError};
use crate::schema::composer::CachedMasterSchema;

const MAX_ENUM_VALUES_SHOWN: usize = 10;

/// Records whether the validator fell back to base-schema-only validation
/// because schema composition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorFallback {
    None,
    BaseSchemaOnly,
}

fn compile(schema: &Value) -> Result<Validator> {
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(schema)
        .map_err(|err| SynthesisError::Schema(format!("failed to compile master schema: {err}")))
}

/// Validates `instance` against the composed master schema, or against
/// `base_schema` alone when `fallback` indicates composition failed.
///
/// Diagnostics accumulate into `report`; the function returns the count of
/// `ValidationError`-severity entries it appended so the orchestrator can
/// decide whether to abort.
pub fn validate_manifest(
    instance: &Value,
    composed: Option<&CachedMasterSchema>,
    base_schema: &Value,
    report: &mut DiagnosticReport,
) -> Result<usize> {
    let (schema, fallback) = match composed {
        Some(master) => (&master.schema, ValidatorFallback::None),
        None => (base_schema, ValidatorFallback::BaseSchemaOnly),
    };

    if fallback == ValidatorFallback::BaseSchemaOnly {
        report.push(Diagnostic::new(
            Severity::High,
            "SchemaCompositionFallback",
            "$",
            "schema composition failed; falling back to base-schema-only validation — \
             component configs were not deeply validated",
        ));
    }

    let validator = compile(schema)?;
    let mut error_count = 0;
    for error in validator.iter_errors(instance) {
        let instance_path = error.instance_path().to_string();
        let path = if instance_path.is_empty() { "$".to_string() } else { format!("${instance_path}") };
        let schema_path = error.schema_path().to_string();
        let code = rule_hint(&schema_path);
        let component_name = resolve_component_name(instance, &path);
        let message = format_message(&error, component_name.as_deref());

        let mut diagnostic = Diagnostic::new(Severity::High, code, path, message);
        if code == "enum" {
            if let Some(suggestion) = enum_suggestion(schema, &schema_path) {
                diagnostic = diagnostic.with_suggestion(suggestion);
            }
        }
        report.push(diagnostic);
        error_count += 1;
    }

    Ok(error_count)
}

/// Derives a schema-rule hint (`required`, `enum`, `pattern`, `type`, …) from
/// the last keyword segment of the failing schema pointer.
fn rule_hint(schema_path: &str) -> &'static str {
    for keyword in ["required", "enum", "pattern", "type", "minimum", "maximum", "additionalProperties", "oneOf", "anyOf", "const"] {
        if schema_path.ends_with(&format!("/{keyword}")) {
            return keyword;
        }
    }
    "schema"
}

fn enum_suggestion(schema: &Value, schema_path: &str) -> Option<String> {
    let allowed = schema.pointer(schema_path)?.as_array()?;
    let values: Vec<String> = allowed.iter().take(MAX_ENUM_VALUES_SHOWN).map(value_label).collect();
    let suffix = if allowed.len() > MAX_ENUM_VALUES_SHOWN { ", ..." } else { "" };
    Some(format!("allowed: {}{}", values.join(", "), suffix))
}

fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_message(error: &jsonschema::ValidationError<'_>, component_name: Option<&str>) -> String {
    match component_name {
        Some(name) => format!("component '{name}': {error}"),
        None => error.to_string(),
    }
}

/// Resolves `components[i].name` when `path` traverses into a component, so
/// diagnostics can name the offending component instead of only its index.
fn resolve_component_name(instance: &Value, path: &str) -> Option<String> {
    let rest = path.strip_prefix("$/components/")?;
    let index_str = rest.split('/').next()?;
    let index: usize = index_str.parse().ok()?;
    instance.get("components")?.get(index)?.get("name")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["service"],
            "properties": {
                "service": { "type": "string" },
                "environment": { "type": "string", "enum": ["dev", "staging", "prod"] },
                "components": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "name": { "type": "string" } }
                    }
                }
            }
        })
    }

    #[test]
    fn accumulates_all_errors_in_verbose_mode() {
        let instance = json!({ "environment": "qa", "components": [] });
        let mut report = DiagnosticReport::default();
        let count = validate_manifest(&instance, None, &schema(), &mut report).unwrap();
        assert_eq!(count, 2);
        assert_eq!(report.diagnostics.len(), 2);
    }

    #[test]
    fn fallback_adds_prominent_warning() {
        let instance = json!({ "service": "s" });
        let mut report = DiagnosticReport::default();
        validate_manifest(&instance, None, &schema(), &mut report).unwrap();
        assert!(report.diagnostics.iter().any(|d| d.code == "SchemaCompositionFallback"));
    }

    #[test]
    fn enum_failure_carries_truncated_suggestion() {
        let instance = json!({ "service": "s", "environment": "qa" });
        let mut report = DiagnosticReport::default();
        validate_manifest(&instance, None, &schema(), &mut report).unwrap();
        let diag = report.diagnostics.iter().find(|d| d.code == "enum").unwrap();
        assert!(diag.suggestion.as_ref().unwrap().contains("dev"));
    }

    #[test]
    fn resolves_component_name_from_path() {
        let instance = json!({
            "service": "s",
            "components": [{ "name": "api" }]
        });
        let name = resolve_component_name(&instance, "$/components/0/config/port");
        assert_eq!(name.as_deref(), Some("api"));
    }
}
