//! `certificate-manager` — stateful; registers capability `certificate:acm`.
//!
//! Reads `keyAlgorithm` from `EffectiveConfig` — never from
//! `ctx.compliance_framework` directly (see DESIGN.md): compliance-specific
//! behavior flows through the 5-layer config merge (platform defaults under
//! `commercial`/`fedramp-*`), not a runtime branch on the framework.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capability::{Capability, ConstructHandle};
use crate::component::Component;
use crate::config_builder::EffectiveConfig;
use crate::context::ComponentContext;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct CertificateManager {
    constructs: BTreeMap<String, ConstructHandle>,
    capabilities: Vec<Capability>,
}

impl Component for CertificateManager {
    fn component_type(&self) -> &'static str {
        "certificate-manager"
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn synth(&mut self, ctx: &ComponentContext, config: &EffectiveConfig) -> Result<()> {
        self.constructs.insert("main".to_string(), ctx.scope.child("main").0);

        let value = config.value();
        let domain_name = value.get("domainName").and_then(Value::as_str).unwrap_or_default();
        let validation_method =
            value.pointer("/validation/method").and_then(Value::as_str).unwrap_or("DNS");
        let key_algorithm = value.get("keyAlgorithm").and_then(Value::as_str).unwrap_or("RSA_2048");
        let certificate_arn = format!("arn:aws:acm:internal:{}/certificate", ctx.scope.0);

        self.capabilities.push(
            Capability::new("certificate:acm")
                .with("certificateArn", certificate_arn)
                .with("domainName", domain_name)
                .with("validationMethod", validation_method)
                .with("keyAlgorithm", key_algorithm),
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

const KNOWN_VALIDATION_METHODS: &[&str] = &["DNS", "EMAIL"];

/// Coerces an unrecognised `validation.method` to `DNS`, the safer default
/// that doesn't depend on a mailbox existing at the domain's registered
/// contact addresses.
pub fn normalise(value: &mut Value) {
    let Some(method) = value.pointer("/validation/method").and_then(Value::as_str) else { return };
    if KNOWN_VALIDATION_METHODS.contains(&method) {
        return;
    }
    if let Some(validation) = value.get_mut("validation").and_then(Value::as_object_mut) {
        validation.insert("method".into(), Value::String("DNS".into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ComponentContext;
    use crate::manifest::ComplianceFramework;
    use indexmap::IndexMap;
    use serde_json::json;

    fn ctx() -> ComponentContext {
        ComponentContext {
            service_name: "orders".into(),
            owner: "platform-team".into(),
            environment: "dev".into(),
            compliance_framework: ComplianceFramework::FedrampHigh,
            region: "us-east-1".into(),
            account_id: "111122223333".into(),
            service_labels: IndexMap::new(),
            scope: crate::context::Scope("orders-dev".into()).child("cert"),
        }
    }

    #[test]
    fn normalise_coerces_unknown_validation_method_to_dns() {
        let mut config = json!({"validation": {"method": "CARRIER_PIGEON"}});
        normalise(&mut config);
        assert_eq!(config["validation"]["method"], json!("DNS"));
    }

    #[test]
    fn synth_reads_key_algorithm_from_effective_config_not_context() {
        let mut component = CertificateManager::default();
        let config = EffectiveConfig::for_test(json!({
            "domainName": "api.example.com",
            "validation": {"method": "DNS", "hostedZoneId": "Z123"},
            "keyAlgorithm": "EC_secp384r1"
        }));
        component.synth(&ctx(), &config).unwrap();
        let cap = &component.capabilities()[0];
        assert_eq!(cap.name, "certificate:acm");
        assert_eq!(cap.data["keyAlgorithm"], json!("EC_secp384r1"));
        assert_eq!(cap.data["domainName"], json!("api.example.com"));
    }
}
