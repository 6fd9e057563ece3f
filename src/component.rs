//! The polymorphic component capability set.
//!
//! Resource materialization is a black box behind a `Component` capability
//! set; this module defines that trait plus the tagged-variant factory
//! registry the Resolver Engine instantiates components from. Concrete
//! built-in component kinds live in `components/`.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::capability::{Capability, ConstructHandle};
use crate::config_builder::EffectiveConfig;
use crate::context::ComponentContext;
use crate::error::Result;

/// Polymorphic capability set every component kind implements: `{ synth,
/// getCapabilities, getType, getConstruct(key) }`.
///
/// The natural representation is a tagged-variant registry keyed by `type`
/// with a factory per kind — not deep inheritance — so this is a trait with
/// a small, concrete method set rather than a `BaseComponent` base class.
pub trait Component: Send + Sync {
    /// The component `type` string this instance was created for.
    fn component_type(&self) -> &'static str;

    /// Whether this kind is a stateful resource (storage engines, key
    /// stores, queues with durable state, certificates, secret stores)
    /// and therefore subject to logical-ID preservation.
    fn is_stateful(&self) -> bool;

    /// Synthesizes this component's resources against `config`, registering
    /// constructs and capabilities for later binder use. Must not branch on
    /// `ctx.compliance_framework` directly — only on `config`, which is
    /// already compliance-aware via the 5-layer merge (Open Question 2).
    fn synth(&mut self, ctx: &ComponentContext, config: &EffectiveConfig) -> Result<()>;

    /// Capabilities registered after `synth` has run.
    fn capabilities(&self) -> &[Capability];

    /// Construct handles registered after `synth` has run.
    fn constructs(&self) -> &BTreeMap<String, ConstructHandle>;

    fn construct(&self, key: &str) -> Option<&ConstructHandle> {
        self.constructs().get(key)
    }
}

/// A factory for one component kind, registered under its `type` string.
pub type ComponentFactory = fn() -> Box<dyn Component>;

/// Tagged-variant registry of component factories keyed by `type`.
///
/// `registerComponent(creator)` is `ComponentCatalog::register`; it is an
/// explicit call the orchestrator's caller makes at process start, never a
/// self-initializing `static`.
#[derive(Default)]
pub struct ComponentCatalog {
    factories: IndexMap<String, ComponentFactory>,
}

impl ComponentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, component_type: impl Into<String>, factory: ComponentFactory) {
        self.factories.insert(component_type.into(), factory);
    }

    pub fn known_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, component_type: &str) -> bool {
        self.factories.contains_key(component_type)
    }

    pub fn create(&self, component_type: &str) -> Option<Box<dyn Component>> {
        self.factories.get(component_type).map(|factory| factory())
    }

    /// The built-in catalog: a small set of concrete component kinds scaled
    /// down to synthesis-only, enough for the Resolver Engine and Binder
    /// Registry to have real pairs to wire.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        crate::components::register_builtins(&mut catalog);
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_knows_expected_types() {
        let catalog = ComponentCatalog::with_builtins();
        for expected in [
            "lambda-api",
            "db-postgres",
            "queue-sqs",
            "bucket-s3",
            "certificate-manager",
            "sns-topic",
            "key-store",
        ] {
            assert!(catalog.contains(expected), "missing builtin component type {expected}");
        }
    }
}
