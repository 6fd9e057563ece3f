//! `lambda-api` — a pure binder source; registers no capabilities of its own.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capability::{Capability, ConstructHandle};
use crate::component::Component;
use crate::config_builder::EffectiveConfig;
use crate::context::ComponentContext;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct LambdaApi {
    constructs: BTreeMap<String, ConstructHandle>,
    capabilities: Vec<Capability>,
}

impl Component for LambdaApi {
    fn component_type(&self) -> &'static str {
        "lambda-api"
    }

    fn is_stateful(&self) -> bool {
        false
    }

    fn synth(&mut self, ctx: &ComponentContext, _config: &EffectiveConfig) -> Result<()> {
        self.constructs.insert("main".to_string(), ctx.scope.child("main").0);
        Ok(())
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn constructs(&self) -> &BTreeMap<String, ConstructHandle> {
        &self.constructs
    }
}

/// Clamps `timeout`/`memorySize` into the ranges a real runtime would accept.
/// Idempotent: re-clamping an already-clamped value is a no-op.
pub fn normalise(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else { return };

    if let Some(timeout) = obj.get("timeout").and_then(Value::as_i64) {
        obj.insert("timeout".into(), Value::from(timeout.clamp(1, 900)));
    }
    if let Some(memory) = obj.get("memorySize").and_then(Value::as_i64) {
        obj.insert("memorySize".into(), Value::from(memory.clamp(128, 10_240)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalise_clamps_timeout_and_is_idempotent() {
        let mut config = json!({"timeout": 5000, "memorySize": 64});
        normalise(&mut config);
        assert_eq!(config["timeout"], json!(900));
        assert_eq!(config["memorySize"], json!(128));
        let once = config.clone();
        normalise(&mut config);
        assert_eq!(config, once);
    }
}
