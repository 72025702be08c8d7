//! Queries over a built catalog
//!
//! Every query borrows an already-built [`TensorCatalog`]; nothing here
//! touches the filesystem.

use super::catalog::{TensorCatalog, TensorCatalogEntry};
use super::normalize::normalize_tensor_name;
use crate::error::{CatalogError, CatalogResult};
use serde::Serialize;
use std::collections::BTreeMap;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Which names a listing or aggregate covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameScope {
    /// Every raw tensor name
    All,
    /// One representative per normalized name
    Unique,
}

/// Tensors sharing one normalized name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameGroup {
    pub normalized: String,
    /// Lexicographically first raw name in the group
    pub representative: String,
    pub members: usize,
}

/// One line of a size report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeRow<'a> {
    /// Raw name for [`NameScope::All`], normalized name for [`NameScope::Unique`]
    pub display_name: String,
    pub entry: &'a TensorCatalogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeReport<'a> {
    pub scope: NameScope,
    pub rows: Vec<SizeRow<'a>>,
    pub total_bytes: u64,
}

/// Read-only query surface over a catalog
#[derive(Debug, Clone, Copy)]
pub struct CatalogQuery<'a> {
    catalog: &'a TensorCatalog,
}

impl<'a> CatalogQuery<'a> {
    pub fn new(catalog: &'a TensorCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a TensorCatalog {
        self.catalog
    }

    /// Sorted raw names, or sorted distinct normalized names
    pub fn list_names(&self, scope: NameScope) -> Vec<String> {
        match scope {
            NameScope::All => self.catalog.names().map(str::to_string).collect(),
            NameScope::Unique => self
                .unique_groups()
                .into_iter()
                .map(|group| group.normalized)
                .collect(),
        }
    }

    /// Normalized names with their representative, sorted by normalized name
    pub fn unique_groups(&self) -> Vec<NameGroup> {
        let mut groups: BTreeMap<String, NameGroup> = BTreeMap::new();

        // Names arrive sorted, so the first raw name seen is the representative
        for name in self.catalog.names() {
            let normalized = normalize_tensor_name(name);
            groups
                .entry(normalized)
                .and_modify(|group| group.members += 1)
                .or_insert_with_key(|normalized| NameGroup {
                    normalized: normalized.clone(),
                    representative: name.to_string(),
                    members: 1,
                });
        }

        groups.into_values().collect()
    }

    /// Metadata for the exact raw name `name`
    ///
    /// Normalized patterns are not matched.
    pub fn lookup(&self, name: &str) -> CatalogResult<&'a TensorCatalogEntry> {
        self.catalog
            .get(name)
            .ok_or_else(|| CatalogError::TensorNotFound(name.to_string()))
    }

    /// Sum byte sizes over the entries selected by `scope`
    ///
    /// [`NameScope::All`] gives the grand total. [`NameScope::Unique`] sums only
    /// one representative per normalized name, i.e. the size of one of each
    /// distinct tensor pattern. Totals saturate at `u64::MAX`.
    pub fn aggregate_size(&self, scope: NameScope) -> SizeReport<'a> {
        let rows: Vec<SizeRow<'a>> = match scope {
            NameScope::All => self
                .catalog
                .entries()
                .map(|entry| SizeRow {
                    display_name: entry.name.clone(),
                    entry,
                })
                .collect(),
            NameScope::Unique => self
                .unique_groups()
                .into_iter()
                .filter_map(|group| {
                    self.catalog
                        .get(&group.representative)
                        .map(|entry| SizeRow {
                            display_name: group.normalized,
                            entry,
                        })
                })
                .collect(),
        };

        let total_bytes = rows
            .iter()
            .fold(0u64, |total, row| total.saturating_add(row.entry.byte_size));

        SizeReport {
            scope,
            rows,
            total_bytes,
        }
    }
}

/// Human-readable byte count using 1024 steps, e.g. `"1.50 KB"`
pub fn format_size(size_bytes: u64) -> String {
    let mut value = size_bytes as f64;
    for unit in &SIZE_UNITS[..SIZE_UNITS.len() - 1] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} {}", SIZE_UNITS[SIZE_UNITS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::header::Dtype;

    fn entry(name: &str, shape: Vec<u64>, byte_size: u64) -> TensorCatalogEntry {
        TensorCatalogEntry {
            name: name.to_string(),
            shard: "model.safetensors".to_string(),
            dtype: Dtype::F32,
            shape,
            byte_size,
        }
    }

    fn layered_catalog() -> TensorCatalog {
        TensorCatalog::from_entries([
            entry("model.layers.1.mlp.weight", vec![4, 4], 64),
            entry("model.layers.0.mlp.weight", vec![4, 4], 64),
            entry("model.layers.10.mlp.weight", vec![4, 4], 64),
            entry("lm_head.weight", vec![8, 4], 128),
            entry("model.embed.weight", vec![2, 4], 32),
        ])
    }

    #[test]
    fn test_list_all_sorted() {
        let catalog = layered_catalog();
        let names = CatalogQuery::new(&catalog).list_names(NameScope::All);
        assert_eq!(
            names,
            vec![
                "lm_head.weight",
                "model.embed.weight",
                "model.layers.0.mlp.weight",
                "model.layers.1.mlp.weight",
                "model.layers.10.mlp.weight",
            ]
        );
    }

    #[test]
    fn test_list_unique() {
        let catalog = layered_catalog();
        let query = CatalogQuery::new(&catalog);
        assert_eq!(
            query.list_names(NameScope::Unique),
            vec!["lm_head.weight", "model.embed.weight", "model.layers.#.mlp.weight"]
        );

        let groups = query.unique_groups();
        let layers = &groups[2];
        assert_eq!(layers.representative, "model.layers.0.mlp.weight");
        assert_eq!(layers.members, 3);
    }

    #[test]
    fn test_lookup_exact_name_only() {
        let catalog = layered_catalog();
        let query = CatalogQuery::new(&catalog);

        assert_eq!(query.lookup("lm_head.weight").unwrap().byte_size, 128);
        let err = query.lookup("model.layers.#.mlp.weight").unwrap_err();
        assert!(err.is_not_found());
        assert!(query.lookup("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_aggregate_all_is_grand_total() {
        let catalog = layered_catalog();
        let report = CatalogQuery::new(&catalog).aggregate_size(NameScope::All);
        assert_eq!(report.rows.len(), 5);
        assert_eq!(report.total_bytes, 64 * 3 + 128 + 32);
    }

    #[test]
    fn test_aggregate_unique_counts_one_representative() {
        let catalog = TensorCatalog::from_entries([
            entry("layer.0.w", vec![2, 2], 16),
            entry("layer.1.w", vec![2, 2], 16),
        ]);
        let query = CatalogQuery::new(&catalog);

        let unique = query.aggregate_size(NameScope::Unique);
        assert_eq!(unique.total_bytes, 16);
        assert_eq!(unique.rows.len(), 1);
        assert_eq!(unique.rows[0].display_name, "layer.#.w");
        assert_eq!(unique.rows[0].entry.name, "layer.0.w");

        assert_eq!(query.aggregate_size(NameScope::All).total_bytes, 32);
    }

    #[test]
    fn test_aggregate_saturates_on_overflow() {
        let catalog = TensorCatalog::from_entries([
            entry("huge.0", vec![1], u64::MAX),
            entry("huge.1", vec![1], u64::MAX),
        ]);
        let query = CatalogQuery::new(&catalog);

        assert_eq!(query.aggregate_size(NameScope::All).total_bytes, u64::MAX);
        assert_eq!(query.aggregate_size(NameScope::Unique).total_bytes, u64::MAX);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = TensorCatalog::default();
        let query = CatalogQuery::new(&catalog);
        assert!(query.list_names(NameScope::Unique).is_empty());
        assert_eq!(query.aggregate_size(NameScope::All).total_bytes, 0);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
        assert_eq!(format_size(2048 * 1024u64.pow(4)), "2048.00 TB");
    }
}
