#![warn(clippy::indexing_slicing)]

//! Declarative service configuration for the connect sidecar.
//!
//! The sidecar is handed a single HCL file (written by the injector into the shared volume) that
//! declares the workload's service and its mesh proxy:
//!
//! ```hcl
//! services {
//!   id   = "service-id"
//!   name = "service"
//!   port = 80
//! }
//! services {
//!   id   = "service-id-sidecar-proxy"
//!   name = "service-sidecar-proxy"
//!   port = 2000
//!   kind = "connect-proxy"
//!   proxy {
//!     destination_service_name = "service"
//!     destination_service_id   = "service-id"
//!     local_service_port       = 80
//!   }
//! }
//! ```
//!
//! Use [`ServiceSet::load`] (or [`ServiceSet::from_hcl`]) to get the validated pair.
pub mod error;
mod loader;
pub mod service;

pub use error::{ConfigError, Result};
pub use service::{ProxyConfig, ServiceDeclaration, ServiceKind, ServiceSet};
