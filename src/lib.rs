//! Tensor Catalog - safetensors model introspection
//!
//! Builds a read-only catalog of every tensor in a model directory (single
//! `model.safetensors` or a sharded set with `model.safetensors.index.json`)
//! and answers listing, lookup, and size queries over it.

pub mod config;
pub mod error;
pub mod metrics;
pub mod store;

pub use config::{InspectConfig, OutputFormat};
pub use error::{CatalogError, CatalogResult, ErrorKind, ShardWarning};
pub use store::{
    CatalogBuilder, CatalogQuery, Dtype, ModelStore, NameScope, StoreLayout, TensorCatalog,
    TensorCatalogEntry, build_catalog, normalize_tensor_name,
};
