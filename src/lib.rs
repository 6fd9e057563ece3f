//! Deterministic infrastructure-as-code synthesizer.
//!
//! Turns a declarative service manifest into a provider-ready deployment
//! plan: schema composition and validation, reference checking, context
//! hydration, 5-layer config precedence, capability binding, topological
//! resolution, and logical-ID preservation across re-synthesis. See
//! [`orchestrator::synthesize`] for the single entry point that sequences
//! all of it.

pub mod capability;
pub mod component;
pub mod components;
pub mod config_builder;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod logical_id;
pub mod manifest;
pub mod orchestrator;
pub mod plan;
pub mod reference;
pub mod resolver;
pub mod schema;
pub mod telemetry;

pub use error::{Result, SynthesisError};
pub use manifest::{Manifest, ManifestSource};
pub use orchestrator::{explain_precedence, synthesize, validate, CancellationToken, PipelinePaths, SynthesizeOptions};
pub use plan::{Plan, SynthesisOutcome, SynthesisReport};
