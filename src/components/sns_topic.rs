//! `sns-topic` — stateful; registers capability `queue:sns`.
//!
//! Deliberately has no binder strategy targeting it: SNS publish topics
//! are not among the targets `lambda-api` can bind to.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capability::{Capability, ConstructHandle};
use crate::component::Component;
use crate::config_builder::EffectiveConfig;
use crate::context::ComponentContext;
use crate::error::Result;

const MAX_DISPLAY_NAME: usize = 100;

#[derive(Debug, Default)]
pub struct SnsTopic {
    constructs: BTreeMap<String, ConstructHandle>,
    capabilities: Vec<Capability>,
}

impl Component for SnsTopic {
    fn component_type(&self) -> &'static str {
        "sns-topic"
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn synth(&mut self, ctx: &ComponentContext, config: &EffectiveConfig) -> Result<()> {
        self.constructs.insert("main".to_string(), ctx.scope.child("main").0);

        let value = config.value();
        let fifo = value.get("fifo").and_then(Value::as_bool).unwrap_or(false);

        self.capabilities.push(
            Capability::new("queue:sns")
                .with("fifo", fifo)
                .with("topicArn", format!("arn:aws:sns:internal:{}/topic", ctx.scope.0)),
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

/// Truncates an overlong `displayName` to SNS's 100-character limit.
pub fn normalise(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else { return };
    if let Some(name) = obj.get("displayName").and_then(Value::as_str) {
        if name.len() > MAX_DISPLAY_NAME {
            let truncated: String = name.chars().take(MAX_DISPLAY_NAME).collect();
            obj.insert("displayName".into(), Value::String(truncated));
        }
    }
}
