//! `db-postgres` — stateful; registers capability `db:postgres`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capability::{Capability, ConstructHandle};
use crate::component::Component;
use crate::config_builder::EffectiveConfig;
use crate::context::ComponentContext;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct DbPostgres {
    constructs: BTreeMap<String, ConstructHandle>,
    capabilities: Vec<Capability>,
}

impl Component for DbPostgres {
    fn component_type(&self) -> &'static str {
        "db-postgres"
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn synth(&mut self, ctx: &ComponentContext, config: &EffectiveConfig) -> Result<()> {
        self.constructs.insert("main".to_string(), ctx.scope.child("main").0);

        let value = config.value();
        let engine_version = value.get("engineVersion").and_then(Value::as_str).unwrap_or("15");
        let encryption = value.get("encryption").and_then(Value::as_bool).unwrap_or(true);

        self.capabilities.push(
            Capability::new("db:postgres")
                .with("engineVersion", engine_version)
                .with("encryption", encryption)
                .with("endpoint", format!("{}.db.internal", ctx.scope.0)),
        );
        Ok(())
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn constructs(&self) -> &BTreeMap<String, ConstructHandle> {
        &self.constructs
    }
}

/// Coerces an unrecognised `engineVersion` to the platform default and
/// forbids `publiclyAccessible` and `privateOnly` both being `true`
/// (mutually exclusive flags).
pub fn normalise(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else { return };

    const KNOWN_VERSIONS: &[&str] = &["13", "14", "15", "16"];
    if let Some(version) = obj.get("engineVersion").and_then(Value::as_str) {
        if !KNOWN_VERSIONS.contains(&version) {
            obj.insert("engineVersion".into(), Value::String("15".into()));
        }
    }

    let publicly_accessible = obj.get("publiclyAccessible").and_then(Value::as_bool).unwrap_or(false);
    let private_only = obj.get("privateOnly").and_then(Value::as_bool).unwrap_or(false);
    if publicly_accessible && private_only {
        obj.insert("publiclyAccessible".into(), Value::Bool(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalise_coerces_unknown_engine_version() {
        let mut config = json!({"engineVersion": "9.6"});
        normalise(&mut config);
        assert_eq!(config["engineVersion"], json!("15"));
    }

    #[test]
    fn normalise_resolves_mutually_exclusive_access_flags_idempotently() {
        let mut config = json!({"publiclyAccessible": true, "privateOnly": true});
        normalise(&mut config);
        assert_eq!(config["publiclyAccessible"], json!(false));
        let once = config.clone();
        normalise(&mut config);
        assert_eq!(config, once);
    }
}
