//! Safetensors header decoding
//!
//! A shard starts with an 8-byte little-endian length `n`, followed by `n`
//! bytes of JSON describing every tensor in the file:
//! ```text
//! [u64 LE: n][{"__metadata__": {...}, "name": {"dtype", "shape", "data_offsets"}, ...}][payload]
//! ```
//! Only the header is read; tensor payload bytes are never touched.

use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Reserved header key holding free-form string metadata
pub const METADATA_KEY: &str = "__metadata__";

/// Headers above this size are rejected as corrupt
pub const MAX_HEADER_SIZE: u64 = 100_000_000;

const LENGTH_PREFIX_SIZE: usize = size_of::<u64>();

/// Scalar element type of a tensor
///
/// Unknown type strings are kept verbatim in [`Dtype::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Dtype {
    Bool,
    U8,
    I8,
    F8E5M2,
    F8E4M3,
    I16,
    U16,
    F16,
    BF16,
    I32,
    U32,
    F32,
    F64,
    I64,
    U64,
    Other(String),
}

/// Byte width assumed for dtypes this crate does not recognize
pub const FALLBACK_BYTE_WIDTH: u64 = 4;

impl Dtype {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bool => "BOOL",
            Self::U8 => "U8",
            Self::I8 => "I8",
            Self::F8E5M2 => "F8_E5M2",
            Self::F8E4M3 => "F8_E4M3",
            Self::I16 => "I16",
            Self::U16 => "U16",
            Self::F16 => "F16",
            Self::BF16 => "BF16",
            Self::I32 => "I32",
            Self::U32 => "U32",
            Self::F32 => "F32",
            Self::F64 => "F64",
            Self::I64 => "I64",
            Self::U64 => "U64",
            Self::Other(name) => name,
        }
    }

    /// Size of one element in bytes, `None` for unrecognized types
    pub fn byte_width(&self) -> Option<u64> {
        match self {
            Self::F64 | Self::I64 | Self::U64 => Some(8),
            Self::F32 | Self::I32 | Self::U32 => Some(4),
            Self::F16 | Self::BF16 | Self::I16 | Self::U16 => Some(2),
            Self::I8 | Self::U8 | Self::Bool | Self::F8E4M3 | Self::F8E5M2 => Some(1),
            Self::Other(_) => None,
        }
    }
}

impl From<&str> for Dtype {
    fn from(value: &str) -> Self {
        match value {
            "BOOL" => Self::Bool,
            "U8" => Self::U8,
            "I8" => Self::I8,
            "F8_E5M2" => Self::F8E5M2,
            "F8_E4M3" => Self::F8E4M3,
            "I16" => Self::I16,
            "U16" => Self::U16,
            "F16" => Self::F16,
            "BF16" => Self::BF16,
            "I32" => Self::I32,
            "U32" => Self::U32,
            "F32" => Self::F32,
            "F64" => Self::F64,
            "I64" => Self::I64,
            "U64" => Self::U64,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Dtype {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Dtype> for String {
    fn from(value: Dtype) -> Self {
        match value {
            Dtype::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tensor's record as stored in a shard header
///
/// Fields are optional so a single malformed entry does not invalidate the
/// whole header; resolution decides whether the entry is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtype: Option<Dtype>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<u64>>,

    /// `[start, end)` within the shard's data section
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_offsets: Option<(u64, u64)>,
}

/// Fully resolved metadata for one header entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub dtype: Dtype,
    pub shape: Vec<u64>,
    pub byte_size: u64,
}

impl HeaderEntry {
    /// Storage size in bytes
    ///
    /// Uses `end - start` when offsets are present, otherwise the element
    /// count times the dtype width.
    pub fn byte_size(&self) -> Result<u64, String> {
        if let Some((start, end)) = self.data_offsets {
            return end.checked_sub(start).ok_or_else(|| {
                format!("data_offsets end {end} is before start {start}")
            });
        }

        let shape = self.shape.as_deref().ok_or("missing shape")?;
        let width = self
            .dtype
            .as_ref()
            .and_then(Dtype::byte_width)
            .unwrap_or(FALLBACK_BYTE_WIDTH);

        shape
            .iter()
            .try_fold(width, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| format!("shape {shape:?} overflows u64 byte size"))
    }

    pub fn resolve(&self) -> Result<ResolvedEntry, String> {
        let dtype = self.dtype.clone().ok_or("missing dtype")?;
        let shape = self.shape.clone().ok_or("missing shape")?;
        let byte_size = self.byte_size()?;
        Ok(ResolvedEntry {
            dtype,
            shape,
            byte_size,
        })
    }
}

/// Decoded header of one shard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShardHeader {
    /// String values of the reserved metadata block; other values are dropped
    #[serde(rename = "__metadata__", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,

    /// Tensor entries; never contains the reserved metadata key
    pub entries: BTreeMap<String, HeaderEntry>,

    /// Tensors whose record did not fit the entry layout, with the reason
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub malformed: BTreeMap<String, String>,
}

impl ShardHeader {
    /// Split a parsed header object into metadata, entries, and malformed records
    pub fn from_object(object: BTreeMap<String, Value>) -> Self {
        let mut header = Self::default();

        for (name, value) in object {
            if name == METADATA_KEY {
                header.metadata = Some(string_fields(value));
                continue;
            }

            match serde_json::from_value::<HeaderEntry>(value) {
                Ok(entry) => {
                    header.entries.insert(name, entry);
                }
                Err(e) => {
                    header.malformed.insert(name, format!("malformed header entry: {e}"));
                }
            }
        }

        header
    }

    pub fn tensor_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every tensor key in the header, well-formed or not, sorted
    pub fn all_tensor_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .chain(self.malformed.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }
}

fn string_fields(value: Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(fields) => fields
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(text) => Some((key, text)),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Read and decode the header of the shard at `path`
///
/// The file handle is scoped to this call and released on every return path.
pub fn read_header(path: &Path) -> CatalogResult<ShardHeader> {
    let file = File::open(path).map_err(|e| CatalogError::io(path, e))?;
    decode_header(BufReader::new(file), path)
}

/// Decode a header from any reader positioned at the start of a shard
///
/// `path` is used only for error reporting.
pub fn decode_header<R: Read>(mut reader: R, path: &Path) -> CatalogResult<ShardHeader> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut prefix).map_err(|e| {
        CatalogError::format(path, format!("cannot read 8-byte length prefix: {e}"))
    })?;

    let header_size = u64::from_le_bytes(prefix);
    if header_size > MAX_HEADER_SIZE {
        return Err(CatalogError::format(
            path,
            format!("header length {header_size} exceeds limit of {MAX_HEADER_SIZE} bytes"),
        ));
    }

    // Bounded by MAX_HEADER_SIZE above
    let mut json_buffer = vec![0u8; header_size as usize];
    reader.read_exact(&mut json_buffer).map_err(|e| {
        CatalogError::format(
            path,
            format!("header declares {header_size} bytes but file is shorter: {e}"),
        )
    })?;

    let text = std::str::from_utf8(&json_buffer)
        .map_err(|e| CatalogError::format(path, format!("header is not valid UTF-8: {e}")))?;

    let object: BTreeMap<String, Value> = serde_json::from_str(text)
        .map_err(|e| CatalogError::format(path, format!("header is not a JSON object: {e}")))?;

    Ok(ShardHeader::from_object(object))
}
