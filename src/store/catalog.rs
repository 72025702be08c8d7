//! Catalog construction
//!
//! Composes the layout resolved by [`ModelStore`] with shard header decoding.
//! Each physical shard is read exactly once, no matter how many tensors it
//! holds. A shard that fails to read becomes a [`ShardWarning`]; the build only
//! fails when every shard failed.

use super::header::{Dtype, read_header};
use super::index::{ModelStore, StoreLayout};
use crate::error::{CatalogError, CatalogResult, ShardWarning};
use crate::metrics;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Resolved, queryable metadata for one tensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TensorCatalogEntry {
    pub name: String,
    /// Shard filename relative to the model directory
    pub shard: String,
    pub dtype: Dtype,
    pub shape: Vec<u64>,
    pub byte_size: u64,
}

/// Every resolvable tensor in a model directory, keyed by raw name
#[derive(Debug, Clone, Default)]
pub struct TensorCatalog {
    root: PathBuf,
    sharded: bool,
    declared_total_size: Option<u64>,
    entries: BTreeMap<String, TensorCatalogEntry>,
    warnings: Vec<ShardWarning>,
}

impl TensorCatalog {
    /// Assemble a catalog directly from entries, bypassing disk
    pub fn from_entries(entries: impl IntoIterator<Item = TensorCatalogEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
            ..Default::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<&TensorCatalogEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in lexicographic name order
    pub fn entries(&self) -> impl Iterator<Item = &TensorCatalogEntry> {
        self.entries.values()
    }

    /// Raw names in lexicographic order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Non-fatal problems met while building
    pub fn warnings(&self) -> &[ShardWarning] {
        &self.warnings
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_sharded(&self) -> bool {
        self.sharded
    }

    /// Total size claimed by the index file, for comparison with computed sizes
    pub fn declared_total_size(&self) -> Option<u64> {
        self.declared_total_size
    }
}

/// One shard header read
#[derive(Debug)]
struct ShardTask {
    shard: String,
    path: PathBuf,
    /// Tensors the index assigns to this shard; `None` takes the whole header
    wanted: Option<Vec<String>>,
}

#[derive(Debug)]
struct ShardOutcome {
    shard: String,
    result: Result<ShardContents, String>,
}

#[derive(Debug, Default)]
struct ShardContents {
    entries: Vec<TensorCatalogEntry>,
    warnings: Vec<ShardWarning>,
}

fn read_shard(task: ShardTask) -> ShardOutcome {
    tracing::debug!(shard = %task.shard, path = %task.path.display(), "Reading shard header");

    let header = match read_header(&task.path) {
        Ok(header) => header,
        Err(e) => {
            return ShardOutcome {
                shard: task.shard,
                result: Err(e.to_string()),
            };
        }
    };
    metrics::record_shard_read(&task.shard);

    let names = task.wanted.unwrap_or_else(|| header.all_tensor_names());

    let mut contents = ShardContents::default();
    for name in names {
        if let Some(reason) = header.malformed.get(&name) {
            contents.warnings.push(ShardWarning::UnresolvedEntry {
                tensor: name,
                shard: task.shard.clone(),
                reason: reason.clone(),
            });
            continue;
        }

        let Some(raw) = header.entries.get(&name) else {
            contents.warnings.push(ShardWarning::MissingTensor {
                tensor: name,
                shard: task.shard.clone(),
            });
            continue;
        };

        match raw.resolve() {
            Ok(resolved) => contents.entries.push(TensorCatalogEntry {
                name,
                shard: task.shard.clone(),
                dtype: resolved.dtype,
                shape: resolved.shape,
                byte_size: resolved.byte_size,
            }),
            Err(reason) => contents.warnings.push(ShardWarning::UnresolvedEntry {
                tensor: name,
                shard: task.shard.clone(),
                reason,
            }),
        }
    }

    ShardOutcome {
        shard: task.shard,
        result: Ok(contents),
    }
}

/// Builds a [`TensorCatalog`] from a resolved [`ModelStore`]
pub struct CatalogBuilder {
    store: ModelStore,
}

impl CatalogBuilder {
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }

    /// Resolve the layout of `root` and prepare a builder for it
    pub fn open(root: impl Into<PathBuf>) -> CatalogResult<Self> {
        ModelStore::open(root).map(Self::new)
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Build the catalog reading one shard at a time
    pub fn build(self) -> CatalogResult<TensorCatalog> {
        let outcomes = self.plan().into_iter().map(read_shard).collect();
        self.assemble(outcomes)
    }

    /// Build the catalog reading shard headers on the blocking thread pool
    ///
    /// At most `max_concurrency` reads run at once; `None` leaves it unbounded.
    /// The result is identical to [`CatalogBuilder::build`].
    pub async fn build_concurrent(
        self,
        max_concurrency: Option<usize>,
    ) -> CatalogResult<TensorCatalog> {
        let limiter = max_concurrency.map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        let mut tasks: JoinSet<(usize, ShardOutcome)> = JoinSet::new();

        for (position, task) in self.plan().into_iter().enumerate() {
            let permit = match &limiter {
                Some(semaphore) => Some(
                    semaphore
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|e| CatalogError::Worker(e.to_string()))?,
                ),
                None => None,
            };

            tasks.spawn_blocking(move || {
                let _permit = permit;
                (position, read_shard(task))
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined.map_err(|e| CatalogError::Worker(e.to_string()))?);
        }

        // Fold in plan order so warnings match the sequential build
        outcomes.sort_by_key(|(position, _)| *position);
        self.assemble(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }

    fn plan(&self) -> Vec<ShardTask> {
        match self.store.layout() {
            StoreLayout::SingleFile { shard } => vec![ShardTask {
                shard: shard.clone(),
                path: self.store.shard_path(shard),
                wanted: None,
            }],
            StoreLayout::Sharded { index } => index
                .by_shard()
                .into_iter()
                .map(|(shard, names)| ShardTask {
                    shard: shard.to_string(),
                    path: self.store.shard_path(shard),
                    wanted: Some(names.into_iter().map(str::to_string).collect()),
                })
                .collect(),
        }
    }

    fn assemble(self, outcomes: Vec<ShardOutcome>) -> CatalogResult<TensorCatalog> {
        let attempted = outcomes.len();
        let mut failed = 0;
        let mut entries = BTreeMap::new();
        let mut warnings = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(contents) => {
                    for entry in contents.entries {
                        entries.insert(entry.name.clone(), entry);
                    }
                    warnings.extend(contents.warnings);
                }
                Err(reason) => {
                    failed += 1;
                    warnings.push(ShardWarning::ShardUnreadable {
                        shard: outcome.shard,
                        reason,
                    });
                }
            }
        }

        for warning in &warnings {
            tracing::warn!(shard = %warning.shard(), "{}", warning);
            metrics::record_shard_warning(warning.label());
        }

        if attempted > 0 && failed == attempted {
            return Err(CatalogError::StoreUnreadable {
                dir: self.store.root().to_path_buf(),
                failed,
            });
        }

        let declared_total_size = match self.store.layout() {
            StoreLayout::Sharded { index } => index.declared_total_size(),
            StoreLayout::SingleFile { .. } => None,
        };

        tracing::info!(
            path = %self.store.root().display(),
            shards = attempted,
            failed_shards = failed,
            tensors = entries.len(),
            warnings = warnings.len(),
            "Catalog built"
        );
        metrics::update_tensor_count(entries.len());

        Ok(TensorCatalog {
            root: self.store.root().to_path_buf(),
            sharded: self.store.layout().is_sharded(),
            declared_total_size,
            entries,
            warnings,
        })
    }
}

/// Build the catalog for the model directory at `root`
pub fn build_catalog(root: impl Into<PathBuf>) -> CatalogResult<TensorCatalog> {
    CatalogBuilder::open(root)?.build()
}
