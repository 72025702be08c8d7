//! Error types for catalog construction and queries

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the catalog engine
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Tensor '{0}' not found in catalog")]
    TensorNotFound(String),

    #[error("No safetensors files found in {}", .0.display())]
    LayoutNotFound(PathBuf),

    #[error("Invalid header in {}: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No shard in {} could be read ({failed} failed)", .dir.display())]
    StoreUnreadable { dir: PathBuf, failed: usize },

    #[error("Shard worker failed: {0}")]
    Worker(String),
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Format,
    Io,
    StoreUnreadable,
    Worker,
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TensorNotFound(_) | Self::LayoutNotFound(_) => ErrorKind::NotFound,
            Self::Format { .. } => ErrorKind::Format,
            Self::Io { .. } => ErrorKind::Io,
            Self::StoreUnreadable { .. } => ErrorKind::StoreUnreadable,
            Self::Worker(_) => ErrorKind::Worker,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Non-fatal problem recorded while building a catalog
///
/// Warnings travel alongside a best-effort catalog instead of aborting the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShardWarning {
    /// The shard file could not be opened or its header could not be decoded
    ShardUnreadable { shard: String, reason: String },

    /// The index names a tensor that the shard header does not contain
    MissingTensor { tensor: String, shard: String },

    /// The header entry exists but lacks the metadata needed to size it
    UnresolvedEntry {
        tensor: String,
        shard: String,
        reason: String,
    },
}

impl ShardWarning {
    pub fn shard(&self) -> &str {
        match self {
            Self::ShardUnreadable { shard, .. }
            | Self::MissingTensor { shard, .. }
            | Self::UnresolvedEntry { shard, .. } => shard,
        }
    }

    /// Tensor this warning concerns, if it is scoped to one tensor
    pub fn tensor(&self) -> Option<&str> {
        match self {
            Self::ShardUnreadable { .. } => None,
            Self::MissingTensor { tensor, .. } | Self::UnresolvedEntry { tensor, .. } => {
                Some(tensor)
            }
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::ShardUnreadable { .. } => "shard_unreadable",
            Self::MissingTensor { .. } => "missing_tensor",
            Self::UnresolvedEntry { .. } => "unresolved_entry",
        }
    }
}

impl std::fmt::Display for ShardWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShardUnreadable { shard, reason } => {
                write!(f, "could not read header from {shard}: {reason}")
            }
            Self::MissingTensor { tensor, shard } => {
                write!(f, "tensor '{tensor}' not found in {shard}")
            }
            Self::UnresolvedEntry {
                tensor,
                shard,
                reason,
            } => write!(f, "tensor '{tensor}' in {shard} skipped: {reason}"),
        }
    }
}
