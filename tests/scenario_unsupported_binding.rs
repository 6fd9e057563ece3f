mod support;

use iac_synth::error::SynthesisError;
use iac_synth::manifest::ManifestSource;
use iac_synth::synthesize;

#[test]
fn binding_to_an_unregistered_capability_reports_reference_error_with_suggestion() {
    let scratch = tempfile::tempdir().unwrap();
    let options = support::options(scratch.path());

    let manifest = r#"
service: s
owner: o
complianceFramework: commercial
environment: dev
components:
  - name: a
    type: lambda-api
  - name: b
    type: sns-topic
binds:
  - from: a
    to: b
    capability: "queue:sns"
    access: read
"#;

    let err = synthesize(ManifestSource::Bytes { content: manifest.as_bytes(), label: "inline".into() }, &options).unwrap_err();

    let SynthesisError::Reference { message, suggestion } = err else {
        panic!("expected a Reference error, got {err:?}");
    };
    assert!(message.contains("No binding strategy for 'lambda-api' -> 'queue:sns'"), "message was: {message}");
    let suggestion = suggestion.expect("suggestion present");
    assert!(suggestion.contains("queue:sqs"), "suggestion was: {suggestion}");
    assert!(suggestion.contains("db:postgres"), "suggestion was: {suggestion}");
    assert!(suggestion.contains("bucket:s3"), "suggestion was: {suggestion}");
}
