pub mod composer;
pub mod validator;

pub use composer::{CachedMasterSchema, SchemaComposer};
pub use validator::{validate_manifest, ValidatorFallback};
