mod support;

use iac_synth::manifest::ManifestSource;
use iac_synth::synthesize;

#[test]
fn empty_manifest_synthesizes_to_an_empty_plan() {
    let scratch = tempfile::tempdir().unwrap();
    let options = support::options(scratch.path());

    let manifest = r#"
service: s
owner: o
complianceFramework: commercial
environment: dev
components: []
"#;

    let outcome = synthesize(
        ManifestSource::Bytes { content: manifest.as_bytes(), label: "inline".into() },
        &options,
    )
    .expect("empty manifest synthesizes");

    assert_eq!(outcome.plan.resource_count(), 0);
    assert!(outcome.report.diagnostics.is_empty());
}
