mod support;

use iac_synth::manifest::ManifestSource;
use iac_synth::synthesize;

fn manifest(framework: &str) -> String {
    format!(
        r#"
service: s
owner: o
complianceFramework: {framework}
environment: dev
components:
  - name: cert
    type: certificate-manager
    config:
      domainName: api.example.com
      validation:
        method: DNS
        hostedZoneId: Z123
"#
    )
}

#[test]
fn commercial_keeps_default_rsa_key_algorithm() {
    let scratch = tempfile::tempdir().unwrap();
    let options = support::options(scratch.path());
    let yaml = manifest("commercial");

    let outcome = synthesize(ManifestSource::Bytes { content: yaml.as_bytes(), label: "inline".into() }, &options).unwrap();

    assert_eq!(outcome.plan.resource_count(), 1);
    let resource = &outcome.plan.resources[0];
    let capability = resource.capabilities.iter().find(|c| c["name"] == "certificate:acm").unwrap();
    assert_eq!(capability["data"]["keyAlgorithm"], "RSA_2048");
    assert_eq!(capability["data"]["domainName"], "api.example.com");
    assert_eq!(capability["data"]["validationMethod"], "DNS");
}

#[test]
fn fedramp_high_upgrades_key_algorithm_via_policy_layer() {
    let scratch = tempfile::tempdir().unwrap();
    let options = support::options(scratch.path());
    let yaml = manifest("fedramp-high");

    let outcome = synthesize(ManifestSource::Bytes { content: yaml.as_bytes(), label: "inline".into() }, &options).unwrap();

    let resource = &outcome.plan.resources[0];
    let capability = resource.capabilities.iter().find(|c| c["name"] == "certificate:acm").unwrap();
    assert_eq!(capability["data"]["keyAlgorithm"], "EC_secp384r1");
}
