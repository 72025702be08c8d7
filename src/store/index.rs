//! Storage layout detection
//!
//! A model directory holds either a single `model.safetensors` or a sharded
//! set of files described by `model.safetensors.index.json`:
//! ```text
//! model/
//! ├── model.safetensors.index.json   {"metadata": {"total_size": N}, "weight_map": {...}}
//! ├── model-00001-of-00002.safetensors
//! └── model-00002-of-00002.safetensors
//! ```

use crate::error::{CatalogError, CatalogResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const MODEL_SAFETENSORS_FILE: &str = "model.safetensors";
pub const MODEL_SAFETENSORS_INDEX: &str = "model.safetensors.index.json";

/// Tensor name -> shard filename, parsed from the index file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightIndex {
    weight_map: BTreeMap<String, String>,
    declared_total_size: Option<u64>,
}

/// Raw index file structure (partial)
#[derive(Debug, Deserialize)]
struct RawIndex {
    #[serde(default)]
    metadata: Option<RawIndexMetadata>,
    #[serde(default)]
    weight_map: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawIndexMetadata {
    total_size: Option<u64>,
}

impl WeightIndex {
    pub fn new(weight_map: BTreeMap<String, String>) -> Self {
        Self {
            weight_map,
            declared_total_size: None,
        }
    }

    /// Parse index JSON; a missing `weight_map` yields an empty index
    pub fn parse(content: &str, path: &Path) -> CatalogResult<Self> {
        let raw: RawIndex = serde_json::from_str(content)
            .map_err(|e| CatalogError::format(path, format!("invalid index file: {e}")))?;

        Ok(Self {
            weight_map: raw.weight_map,
            declared_total_size: raw.metadata.and_then(|m| m.total_size),
        })
    }

    pub fn load(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        Self::parse(&content, path)
    }

    pub fn shard_for(&self, tensor_name: &str) -> Option<&str> {
        self.weight_map.get(tensor_name).map(String::as_str)
    }

    pub fn tensor_names(&self) -> impl Iterator<Item = &str> {
        self.weight_map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weight_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weight_map.is_empty()
    }

    /// `metadata.total_size` as declared by the index, if any
    pub fn declared_total_size(&self) -> Option<u64> {
        self.declared_total_size
    }

    /// Group tensor names by the shard that holds them
    ///
    /// Shards and the names within each shard come out sorted.
    pub fn by_shard(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (tensor, shard) in &self.weight_map {
            groups.entry(shard.as_str()).or_default().push(tensor.as_str());
        }
        groups
    }
}

/// On-disk layout of a model directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLayout {
    /// One shard holding every tensor
    SingleFile { shard: String },
    /// Index file plus one or more shard files
    Sharded { index: WeightIndex },
}

impl StoreLayout {
    pub fn is_sharded(&self) -> bool {
        matches!(self, Self::Sharded { .. })
    }

    pub fn shard_count(&self) -> usize {
        match self {
            Self::SingleFile { .. } => 1,
            Self::Sharded { index } => index.by_shard().len(),
        }
    }
}

/// A model directory with its layout resolved
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
    layout: StoreLayout,
}

impl ModelStore {
    /// Resolve the layout of `root`
    ///
    /// The index file takes precedence over a single `model.safetensors`.
    /// Nothing is cached; every call re-reads the directory.
    pub fn open(root: impl Into<PathBuf>) -> CatalogResult<Self> {
        let root = root.into();

        let index_path = root.join(MODEL_SAFETENSORS_INDEX);
        if index_path.is_file() {
            let index = WeightIndex::load(&index_path)?;
            tracing::debug!(
                path = %index_path.display(),
                tensors = index.len(),
                "Resolved sharded layout"
            );
            return Ok(Self {
                root,
                layout: StoreLayout::Sharded { index },
            });
        }

        if root.join(MODEL_SAFETENSORS_FILE).is_file() {
            tracing::debug!(path = %root.display(), "Resolved single-file layout");
            return Ok(Self {
                root,
                layout: StoreLayout::SingleFile {
                    shard: MODEL_SAFETENSORS_FILE.to_string(),
                },
            });
        }

        Err(CatalogError::LayoutNotFound(root))
    }

    pub fn from_parts(root: impl Into<PathBuf>, layout: StoreLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn shard_path(&self, shard: &str) -> PathBuf {
        self.root.join(shard)
    }
}
