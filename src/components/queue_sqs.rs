//! `queue-sqs` — stateful; registers capability `queue:sqs`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capability::{Capability, ConstructHandle};
use crate::component::Component;
use crate::config_builder::EffectiveConfig;
use crate::context::ComponentContext;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct QueueSqs {
    constructs: BTreeMap<String, ConstructHandle>,
    capabilities: Vec<Capability>,
}

impl Component for QueueSqs {
    fn component_type(&self) -> &'static str {
        "queue-sqs"
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn synth(&mut self, ctx: &ComponentContext, config: &EffectiveConfig) -> Result<()> {
        self.constructs.insert("main".to_string(), ctx.scope.child("main").0);

        let value = config.value();
        let fifo = value.get("fifo").and_then(Value::as_bool).unwrap_or(false);

        self.capabilities.push(
            Capability::new("queue:sqs")
                .with("fifo", fifo)
                .with("queueUrl", format!("https://sqs.internal/{}", ctx.scope.0)),
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

/// Clamps `visibilityTimeoutSeconds` into SQS's accepted range (0–12h).
pub fn normalise(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else { return };
    if let Some(seconds) = obj.get("visibilityTimeoutSeconds").and_then(Value::as_i64) {
        obj.insert("visibilityTimeoutSeconds".into(), Value::from(seconds.clamp(0, 43_200)));
    }
}
