//! Context Hydrator.
//!
//! Attaches an environment/compliance/service context to each component
//! spec. The context is frozen: components read it, never write it —
//! enforced here by only ever handing out `&ComponentContext`.

use serde::{Deserialize, Serialize};

use crate::manifest::{ComplianceFramework, Manifest};

/// The parent allocation handle a component attaches resources to.
///
/// A thin string handle is sufficient for the synthesis core: concrete
/// "stack"/"construct tree" semantics live in the per-component
/// materialization layer this crate treats as a black box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope(pub String);

impl Scope {
    pub fn child(&self, name: &str) -> Scope {
        Scope(format!("{}/{name}", self.0))
    }
}

/// Immutable per-synthesis record attached to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentContext {
    pub service_name: String,
    pub owner: String,
    pub environment: String,
    pub compliance_framework: ComplianceFramework,
    pub region: String,
    pub account_id: String,
    pub service_labels: indexmap::IndexMap<String, String>,
    pub scope: Scope,
}

/// Hydrates a `ComponentContext` per component in `manifest`.
///
/// `region`/`account_id` are not part of the manifest's data model; they're
/// threaded through as caller-supplied defaults since this core never talks
/// to a cloud provider to discover them.
pub fn hydrate(manifest: &Manifest, region: &str, account_id: &str) -> Vec<(String, ComponentContext)> {
    let stack_name = format!("{}-{}", manifest.service, manifest.environment);
    manifest
        .components
        .iter()
        .map(|component| {
            let ctx = ComponentContext {
                service_name: manifest.service.clone(),
                owner: manifest.owner.clone(),
                environment: manifest.environment.clone(),
                compliance_framework: manifest.compliance_framework,
                region: region.to_string(),
                account_id: account_id.to_string(),
                service_labels: manifest.tags.clone(),
                scope: Scope(stack_name.clone()).child(&component.name),
            };
            (component.name.clone(), ctx)
        })
        .collect()
}
