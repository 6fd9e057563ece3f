mod support;

use iac_synth::config_builder::LayerId;
use iac_synth::manifest::ManifestSource;
use iac_synth::orchestrator::explain_precedence;

#[test]
fn policy_layer_overrides_a_component_override_under_fedramp_moderate() {
    let scratch = tempfile::tempdir().unwrap();
    let options = support::options(scratch.path());

    let manifest = r#"
service: s
owner: o
complianceFramework: fedramp-moderate
environment: dev
components:
  - name: db
    type: db-postgres
    config:
      encryption: false
"#;

    let trace = explain_precedence(
        "db",
        ManifestSource::Bytes { content: manifest.as_bytes(), label: "inline".into() },
        &options,
    )
    .expect("precedence trace resolves");

    let entry = trace.iter().find(|e| e.path == "$.encryption").expect("encryption leaf traced");
    assert_eq!(entry.layer, LayerId::Policy);
    assert_eq!(entry.value, serde_json::json!(true));
}
