//! `bucket-s3` — stateful; registers capability `bucket:s3`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capability::{Capability, ConstructHandle};
use crate::component::Component;
use crate::config_builder::EffectiveConfig;
use crate::context::ComponentContext;
use crate::error::Result;

const MAX_BUCKET_NAME_PREFIX: usize = 63;

#[derive(Debug, Default)]
pub struct BucketS3 {
    constructs: BTreeMap<String, ConstructHandle>,
    capabilities: Vec<Capability>,
}

impl Component for BucketS3 {
    fn component_type(&self) -> &'static str {
        "bucket-s3"
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn synth(&mut self, ctx: &ComponentContext, config: &EffectiveConfig) -> Result<()> {
        self.constructs.insert("main".to_string(), ctx.scope.child("main").0);

        let value = config.value();
        let versioning = value.get("versioning").and_then(Value::as_bool).unwrap_or(false);

        self.capabilities.push(
            Capability::new("bucket:s3")
                .with("versioning", versioning)
                .with("bucketName", format!("{}-bucket", ctx.scope.0)),
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

/// Truncates an overlong `bucketNamePrefix` to S3's 63-character name limit.
pub fn normalise(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else { return };
    if let Some(prefix) = obj.get("bucketNamePrefix").and_then(Value::as_str) {
        if prefix.len() > MAX_BUCKET_NAME_PREFIX {
            let truncated: String = prefix.chars().take(MAX_BUCKET_NAME_PREFIX).collect();
            obj.insert("bucketNamePrefix".into(), Value::String(truncated));
        }
    }
}
