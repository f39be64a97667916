//! Hemmer provider for the NEOS data platform.
//!
//! The provider manages NEOS core entities (data systems, data sources, data
//! units, data products, outputs and the links between them), registry cores
//! and IAM accounts, groups, users and policies. It speaks the Hemmer provider
//! protocol over gRPC and talks to three NEOS services over HTTPS:
//!
//! - **IAM** (`{iam_host}/api/iam`): login, accounts, users, groups, policies
//! - **Registry** (`{registry_host}/api/registry`): core registration
//! - **Core gateway** (`{core_host}/api/gateway/v2`): entities, links, secrets
//!
//! # Running
//!
//! The `neos-provider` binary is spawned by Hemmer. It binds an ephemeral
//! port and prints one handshake line to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Logs go to stderr, filtered by `RUST_LOG`.
//!
//! # Configuration
//!
//! Every provider setting falls back to a `NEOS_*` environment variable:
//!
//! | Attribute       | Environment           |
//! |-----------------|-----------------------|
//! | `iam_host`      | `NEOS_IAM_HOST`       |
//! | `registry_host` | `NEOS_REGISTRY_HOST`  |
//! | `core_host`     | `NEOS_CORE_HOST`      |
//! | `account`       | `NEOS_ACCOUNT`        |
//! | `partition`     | `NEOS_PARTITION`      |
//! | `username`      | `NEOS_USERNAME`       |
//! | `password`      | `NEOS_PASSWORD`       |
//! | `scheme`        | `NEOS_SCHEME`         |
//! | `read_miss`     | `NEOS_READ_MISS`      |
//!
//! # Embedding
//!
//! ```ignore
//! use neos_provider::{serve, try_init_logging, NeosProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _ = try_init_logging();
//!     serve(NeosProvider::new()).await
//! }
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod provider;
pub mod reconcile;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use client::NeosClient;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{catalogue, NeosProvider};
pub use reconcile::{Catalogue, DataReader, ReadMissPolicy, Reconciler};
pub use schema::ProviderSchema;
pub use server::{serve, serve_on, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;
