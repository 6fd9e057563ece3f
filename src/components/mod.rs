//! Built-in component catalog.
//!
//! Resource materialization itself stays behind the opaque `Component`
//! trait; this module supplies concrete component types so the Resolver
//! Engine and Binder Registry have something real to exercise. One concrete
//! implementation per pluggable kind, in the same spirit as a provider
//! registry keyed by target platform, scaled down to synthesis-only.

pub mod binders;
pub mod bucket_s3;
pub mod certificate_manager;
pub mod db_postgres;
pub mod key_store;
pub mod lambda_api;
pub mod queue_sqs;
pub mod sns_topic;

use crate::capability::BinderRegistry;
use crate::component::ComponentCatalog;
use crate::config_builder::NormaliseFn;

/// Registers every built-in component factory under its `type` string.
pub fn register_builtins(catalog: &mut ComponentCatalog) {
    catalog.register("lambda-api", || Box::new(lambda_api::LambdaApi::default()));
    catalog.register("db-postgres", || Box::new(db_postgres::DbPostgres::default()));
    catalog.register("queue-sqs", || Box::new(queue_sqs::QueueSqs::default()));
    catalog.register("bucket-s3", || Box::new(bucket_s3::BucketS3::default()));
    catalog.register("certificate-manager", || Box::new(certificate_manager::CertificateManager::default()));
    catalog.register("sns-topic", || Box::new(sns_topic::SnsTopic::default()));
    catalog.register("key-store", || Box::new(key_store::KeyStore::default()));
}

/// Registers every built-in binder strategy.
pub fn register_builtin_binders(registry: &mut BinderRegistry) {
    binders::register(registry);
}

/// Event names a component `type` declares as trigger sources.
pub fn declared_events(component_type: &str) -> Vec<&'static str> {
    match component_type {
        "lambda-api" => vec!["invoke", "error", "cold-start"],
        "queue-sqs" => vec!["message-received", "dead-lettered"],
        "bucket-s3" => vec!["object-created", "object-removed"],
        "sns-topic" => vec!["message-published"],
        "certificate-manager" => vec!["renewal-pending", "validation-failed"],
        "key-store" => vec!["rotation-completed"],
        "db-postgres" => vec![],
        _ => vec![],
    }
}

/// Whether `component_type`'s schema defines a `monitoring` block.
pub fn declares_monitoring(component_type: &str) -> bool {
    matches!(component_type, "lambda-api" | "db-postgres" | "queue-sqs" | "bucket-s3")
}

/// Whether `component_type` is a stateful resource kind.
pub fn is_stateful_type(component_type: &str) -> bool {
    matches!(component_type, "db-postgres" | "queue-sqs" | "bucket-s3" | "certificate-manager" | "key-store")
}

/// The post-merge `normaliseConfig` hook for `component_type`, if any.
pub fn normalise_fn(component_type: &str) -> Option<NormaliseFn> {
    match component_type {
        "lambda-api" => Some(lambda_api::normalise as NormaliseFn),
        "db-postgres" => Some(db_postgres::normalise as NormaliseFn),
        "queue-sqs" => Some(queue_sqs::normalise as NormaliseFn),
        "bucket-s3" => Some(bucket_s3::normalise as NormaliseFn),
        "certificate-manager" => Some(certificate_manager::normalise as NormaliseFn),
        "sns-topic" => Some(sns_topic::normalise as NormaliseFn),
        "key-store" => Some(key_store::normalise as NormaliseFn),
        _ => None,
    }
}
