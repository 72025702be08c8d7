//! Safetensors model store introspection
//!
//! Provides functionality for:
//! - Resolving single-file vs sharded layouts
//! - Decoding shard headers without touching tensor payloads
//! - Building a unified tensor catalog across shards
//! - Normalizing layer indices for pattern listings
//! - Listing, lookup, and size aggregation queries

pub mod catalog;
pub mod header;
pub mod index;
pub mod normalize;
pub mod query;

pub use catalog::{CatalogBuilder, TensorCatalog, TensorCatalogEntry, build_catalog};
pub use header::{Dtype, HeaderEntry, ShardHeader, decode_header, read_header};
pub use index::{ModelStore, StoreLayout, WeightIndex};
pub use normalize::normalize_tensor_name;
pub use query::{CatalogQuery, NameGroup, NameScope, SizeReport, SizeRow, format_size};
