//! `key-store` — stateful; registers capability `secret:kms`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capability::{Capability, ConstructHandle};
use crate::component::Component;
use crate::config_builder::EffectiveConfig;
use crate::context::ComponentContext;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct KeyStore {
    constructs: BTreeMap<String, ConstructHandle>,
    capabilities: Vec<Capability>,
}

impl Component for KeyStore {
    fn component_type(&self) -> &'static str {
        "key-store"
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn synth(&mut self, ctx: &ComponentContext, config: &EffectiveConfig) -> Result<()> {
        self.constructs.insert("main".to_string(), ctx.scope.child("main").0);
        self.constructs.insert("kmsKey".to_string(), ctx.scope.child("kms-key").0);

        let value = config.value();
        let rotation_enabled = value.get("rotationEnabled").and_then(Value::as_bool).unwrap_or(false);

        self.capabilities.push(
            Capability::new("secret:kms")
                .with("rotationEnabled", rotation_enabled)
                .with("keyArn", format!("arn:aws:kms:internal:{}/key", ctx.scope.0)),
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

/// Clamps `deletionWindowDays` into KMS's accepted range (7–30 days).
pub fn normalise(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else { return };
    if let Some(days) = obj.get("deletionWindowDays").and_then(Value::as_i64) {
        obj.insert("deletionWindowDays".into(), Value::from(days.clamp(7, 30)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalise_clamps_deletion_window() {
        let mut config = json!({"deletionWindowDays": 1});
        normalise(&mut config);
        assert_eq!(config["deletionWindowDays"], json!(7));
    }
}
