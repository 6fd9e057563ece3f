//! Built-in binder strategies for the component pairs a `lambda-api`
//! source legally binds to. `queue:sns` deliberately has no strategy, so a
//! binding directive naming it fails reference validation with a suggestion
//! enumerating the capabilities that are actually supported.

use crate::capability::{BindContext, BinderRegistry, BinderStrategy, BindingResult};
use crate::manifest::AccessMode;

/// Enumerates the minimal IAM-like action set for `(capability, access)`.
fn least_privilege_actions(capability: &str, access: AccessMode) -> Vec<&'static str> {
    match (capability, access) {
        ("db:postgres", AccessMode::Read) => vec!["rds-data:ExecuteStatement", "rds-data:BatchExecuteStatement"],
        ("db:postgres", AccessMode::Write | AccessMode::Readwrite) => {
            vec!["rds-data:ExecuteStatement", "rds-data:BatchExecuteStatement", "rds-data:BeginTransaction"]
        }
        ("db:postgres", AccessMode::Admin) => vec!["rds-data:*"],

        ("queue:sqs", AccessMode::Read | AccessMode::Consume) => vec!["sqs:ReceiveMessage", "sqs:DeleteMessage", "sqs:GetQueueAttributes"],
        ("queue:sqs", AccessMode::Write | AccessMode::Readwrite) => vec!["sqs:SendMessage", "sqs:GetQueueAttributes"],

        ("bucket:s3", AccessMode::Read) => vec!["s3:GetObject", "s3:ListBucket"],
        ("bucket:s3", AccessMode::Write) => vec!["s3:PutObject"],
        ("bucket:s3", AccessMode::Readwrite) => vec!["s3:GetObject", "s3:PutObject", "s3:ListBucket"],
        ("bucket:s3", AccessMode::Admin) => vec!["s3:*"],

        ("certificate:acm" | "certificate:validation" | "certificate:monitoring", AccessMode::Use) => {
            vec!["acm:DescribeCertificate", "acm:GetCertificate"]
        }

        ("secret:kms", AccessMode::Use) => vec!["kms:Decrypt", "kms:DescribeKey"],
        ("secret:kms", AccessMode::Read) => vec!["kms:DescribeKey"],

        _ => vec![],
    }
}

/// Applies the compliance overlays required under a `fedramp-*` framework,
/// encoded as environment variables the source component's runtime can
/// read. The concrete IAM policy document itself stays the opaque
/// component's business.
fn apply_compliance_overlay(result: BindingResult, ctx: &BindContext<'_>) -> BindingResult {
    let framework = ctx.compliance_framework.as_str();
    if !framework.starts_with("fedramp") {
        return result;
    }
    let mut result = result
        .with_env("BINDING_REQUIRE_SECURE_TRANSPORT", "true")
        .with_env("BINDING_REGION_CONDITION", ctx_region_placeholder());
    if framework == "fedramp-high" {
        result = result.with_env("BINDING_DENY_WITHOUT_PRIVATE_ENDPOINT", "true");
    }
    result
}

// `BindContext` doesn't carry region directly (region lives on
// `ComponentContext`, which binders don't receive — only construct handles
// and the directive). The region condition is therefore a policy marker the
// component's own materialization resolves against its own context, not a
// concrete value this binder can fill in.
fn ctx_region_placeholder() -> String {
    "component-region".to_string()
}

/// Applies the directive's `options` (dead-letter queues, private auth
/// modes, KMS key references, object-prefix restrictions) as additional
/// environment variables.
fn apply_directive_options(mut result: BindingResult, ctx: &BindContext<'_>) -> BindingResult {
    let Some(options) = ctx.options.as_object() else { return result };
    for (key, value) in options {
        if let Some(s) = value.as_str() {
            result = result.with_env(format!("BINDING_OPTION_{}", screaming_snake(key)), s);
        }
    }
    result
}

fn screaming_snake(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_uppercase() { format!("_{c}") } else { c.to_ascii_uppercase().to_string() })
        .collect::<String>()
        .trim_start_matches('_')
        .to_string()
}

fn finish(mut result: BindingResult, ctx: &BindContext<'_>, env_var_name: &str, handle_key: &str) -> BindingResult {
    if let Some(handle) = ctx.to_handles.get(handle_key).or_else(|| ctx.to_handles.get("main")) {
        result = result.with_env(env_var_name, handle.clone());
    }
    for (from_key, to_key) in ctx.env_remap {
        if let Some(value) = result.environment_variables.get(from_key).cloned() {
            result.environment_variables.insert(to_key.clone(), value);
        }
    }
    apply_directive_options(apply_compliance_overlay(result, ctx), ctx)
}

struct LambdaToDbPostgres;
impl BinderStrategy for LambdaToDbPostgres {
    fn supported_source_types(&self) -> &[&str] {
        &["lambda-api"]
    }
    fn supported_capabilities(&self) -> &[&str] {
        &["db:postgres"]
    }
    fn supported_access(&self) -> &[AccessMode] {
        &[AccessMode::Read, AccessMode::Write, AccessMode::Readwrite, AccessMode::Admin]
    }
    fn bind(&self, ctx: &BindContext<'_>) -> BindingResult {
        let mut result = BindingResult::success("lambda-to-db-postgres");
        for action in least_privilege_actions("db:postgres", ctx.access) {
            let env_key = action.replace(':', "_").replace('-', "_").to_uppercase();
            result = result.with_env(format!("GRANT_{env_key}"), "granted");
        }
        finish(result, ctx, "DB_ENDPOINT", "main")
    }
}

struct LambdaToQueueSqs;
impl BinderStrategy for LambdaToQueueSqs {
    fn supported_source_types(&self) -> &[&str] {
        &["lambda-api"]
    }
    fn supported_capabilities(&self) -> &[&str] {
        &["queue:sqs"]
    }
    fn supported_access(&self) -> &[AccessMode] {
        &[AccessMode::Read, AccessMode::Write, AccessMode::Readwrite, AccessMode::Consume]
    }
    fn bind(&self, ctx: &BindContext<'_>) -> BindingResult {
        let result = BindingResult::success("lambda-to-queue-sqs");
        finish(result, ctx, "QUEUE_URL", "main")
    }
}

struct LambdaToBucketS3;
impl BinderStrategy for LambdaToBucketS3 {
    fn supported_source_types(&self) -> &[&str] {
        &["lambda-api"]
    }
    fn supported_capabilities(&self) -> &[&str] {
        &["bucket:s3"]
    }
    fn supported_access(&self) -> &[AccessMode] {
        &[AccessMode::Read, AccessMode::Write, AccessMode::Readwrite, AccessMode::Admin]
    }
    fn bind(&self, ctx: &BindContext<'_>) -> BindingResult {
        let result = BindingResult::success("lambda-to-bucket-s3");
        finish(result, ctx, "BUCKET_NAME", "main")
    }
}

struct LambdaToCertificateAcm;
impl BinderStrategy for LambdaToCertificateAcm {
    fn supported_source_types(&self) -> &[&str] {
        &["lambda-api"]
    }
    fn supported_capabilities(&self) -> &[&str] {
        &["certificate:acm", "certificate:validation", "certificate:monitoring"]
    }
    fn supported_access(&self) -> &[AccessMode] {
        &[AccessMode::Use]
    }
    fn bind(&self, ctx: &BindContext<'_>) -> BindingResult {
        let result = BindingResult::success("lambda-to-certificate-acm");
        finish(result, ctx, "CERTIFICATE_ARN", "main")
    }
}

struct LambdaToSecretKms;
impl BinderStrategy for LambdaToSecretKms {
    fn supported_source_types(&self) -> &[&str] {
        &["lambda-api"]
    }
    fn supported_capabilities(&self) -> &[&str] {
        &["secret:kms"]
    }
    fn supported_access(&self) -> &[AccessMode] {
        &[AccessMode::Use, AccessMode::Read]
    }
    fn bind(&self, ctx: &BindContext<'_>) -> BindingResult {
        let result = BindingResult::success("lambda-to-secret-kms");
        finish(result, ctx, "KMS_KEY_ARN", "kmsKey")
    }
}

pub fn register(registry: &mut BinderRegistry) {
    registry.register(Box::new(LambdaToDbPostgres));
    registry.register(Box::new(LambdaToQueueSqs));
    registry.register(Box::new(LambdaToBucketS3));
    registry.register(Box::new(LambdaToCertificateAcm));
    registry.register(Box::new(LambdaToSecretKms));
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn no_strategy_targets_queue_sns() {
        let mut registry = BinderRegistry::new();
        register(&mut registry);
        assert!(registry.find("lambda-api", "queue:sns").is_none());
        let validity = registry.validate("lambda-api", "queue:sns");
        assert!(!validity.valid);
        assert!(validity.suggestion.unwrap().contains("db:postgres"));
    }

    #[test]
    fn fedramp_high_adds_private_endpoint_deny() {
        let mut registry = BinderRegistry::new();
        register(&mut registry);
        let strategy = registry.find("lambda-api", "bucket:s3").unwrap();

        let mut to_handles = BTreeMap::new();
        to_handles.insert("main".to_string(), "scope/bucket/main".to_string());
        let env_remap = IndexMap::new();
        let options = json!({});

        let ctx = BindContext {
            from_component: "api",
            to_component: "bucket",
            from_handles: &BTreeMap::new(),
            to_handles: &to_handles,
            access: AccessMode::Read,
            env_remap: &env_remap,
            options: &options,
            compliance_framework: crate::manifest::ComplianceFramework::FedrampHigh,
        };

        let result = strategy.bind(&ctx);
        assert!(result.metadata.success);
        assert_eq!(result.environment_variables.get("BINDING_DENY_WITHOUT_PRIVATE_ENDPOINT").map(String::as_str), Some("true"));
        assert_eq!(result.environment_variables.get("BUCKET_NAME").map(String::as_str), Some("scope/bucket/main"));
    }

    #[test]
    fn commercial_framework_has_no_overlay() {
        let mut registry = BinderRegistry::new();
        register(&mut registry);
        let strategy = registry.find("lambda-api", "queue:sqs").unwrap();

        let mut to_handles = BTreeMap::new();
        to_handles.insert("main".to_string(), "scope/queue/main".to_string());
        let env_remap = IndexMap::new();
        let options = json!({});

        let ctx = BindContext {
            from_component: "api",
            to_component: "queue",
            from_handles: &BTreeMap::new(),
            to_handles: &to_handles,
            access: AccessMode::Write,
            env_remap: &env_remap,
            options: &options,
            compliance_framework: crate::manifest::ComplianceFramework::Commercial,
        };

        let result = strategy.bind(&ctx);
        assert!(!result.environment_variables.contains_key("BINDING_REQUIRE_SECURE_TRANSPORT"));
    }
}
