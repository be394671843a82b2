#![warn(clippy::indexing_slicing)]

//! Container spec of the `connect-sidecar` process, added to every pod the injector mutates.
//!
//! This crate only renders the [`Container`](k8s_openapi::api::core::v1::Container); delivering
//! it (admission webhook, JSON patches, the shared volume itself) is up to the caller.

pub mod sidecar;

pub use sidecar::{InjectorConfig, ANNOTATION_SYNC_PERIOD, SIDECAR_CONTAINER_NAME, VOLUME_NAME};
