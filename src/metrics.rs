//! Catalog metrics
//!
//! Emitted through the `metrics` facade; they are no-ops until the embedding
//! application installs a recorder.

/// Record a shard header decoded successfully
pub fn record_shard_read(shard: &str) {
    metrics::counter!("tensor_catalog_shards_read_total",
        "shard" => shard.to_string()
    )
    .increment(1);
}

/// Record a non-fatal catalog warning
pub fn record_shard_warning(kind: &'static str) {
    metrics::counter!("tensor_catalog_shard_warnings_total",
        "kind" => kind
    )
    .increment(1);
}

/// Update the number of tensors in the last built catalog
pub fn update_tensor_count(count: usize) {
    metrics::gauge!("tensor_catalog_tensors").set(count as f64);
}
