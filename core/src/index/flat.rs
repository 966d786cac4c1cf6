use std::path::Path;

use tracing::debug;
use uuid::Uuid;

use super::{IndexError, VectorIndex};
use crate::embeddings::dot;
use crate::persist::write_atomically;

const MAGIC: &[u8; 4] = b"VTFI";
const FORMAT_VERSION: u32 = 2;
const HEADER_LEN: usize = 4 + 4 + 16 + 4 + 8;

/// Exact inner-product index, every query is scored against every row.
///
/// Vectors are expected to be L2 normalized so scores are cosine similarities. Rows are only
/// ever appended, the index is built once and then written to disk.
///
/// On disk layout (all little endian):
///
/// | field     | type                       |
/// |-----------|----------------------------|
/// | magic     | `b"VTFI"`                  |
/// | version   | `u32`                      |
/// | build id  | 16 byte uuid               |
/// | dimension | `u32`                      |
/// | rows      | `u64`                      |
/// | data      | `rows * dimension` x `f32` |
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    build_id: Uuid,
    dimension: usize,
    rows: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            build_id: Uuid::nil(),
            dimension,
            rows: 0,
            data: Vec::new(),
        }
    }

    /// Tags the index with the id of the indexing run that built it.
    #[must_use]
    pub fn with_build_id(mut self, build_id: Uuid) -> Self {
        self.build_id = build_id;
        self
    }

    /// Appends `vector` as the next row.
    ///
    /// # Errors
    /// Fails if `vector` doesn't have the index dimension.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.data.extend_from_slice(vector);
        self.rows += 1;
        Ok(self.rows - 1)
    }

    /// Builds an index from `vectors`, row `i` being the `i`th vector.
    pub fn from_vectors<'a>(
        dimension: usize,
        vectors: impl IntoIterator<Item = &'a [f32]>,
    ) -> Result<Self, IndexError> {
        let mut index = Self::new(dimension);
        for vector in vectors {
            index.add(vector)?;
        }
        Ok(index)
    }

    /// The stored vector of `row`, if it exists.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let dimension = u32::try_from(self.dimension).map_err(|_| "dimension overflows u32")?;
        let rows = u64::try_from(self.len()).map_err(|_| "row count overflows u64")?;

        let mut bytes =
            Vec::with_capacity(HEADER_LEN + std::mem::size_of_val(self.data.as_slice()));
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(self.build_id.as_bytes());
        bytes.extend_from_slice(&dimension.to_le_bytes());
        bytes.extend_from_slice(&rows.to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < HEADER_LEN {
            return Err(format!("file is {} bytes, shorter than the header", bytes.len()));
        }
        let (header, body) = bytes.split_at(HEADER_LEN);
        if &header[..4] != MAGIC {
            return Err("bad magic".to_string());
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != FORMAT_VERSION {
            return Err(format!("unsupported format version {version}"));
        }
        let mut id = [0u8; 16];
        id.copy_from_slice(&header[8..24]);
        let build_id = Uuid::from_bytes(id);
        let dimension =
            u32::from_le_bytes([header[24], header[25], header[26], header[27]]) as usize;
        let mut count = [0u8; 8];
        count.copy_from_slice(&header[28..36]);
        let rows = usize::try_from(u64::from_le_bytes(count))
            .map_err(|_| "row count overflows usize".to_string())?;

        let expected_len = rows
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .ok_or_else(|| "data length overflows usize".to_string())?;
        if body.len() != expected_len {
            return Err(format!(
                "expected {expected_len} data bytes for {rows} rows of {dimension}, found {}",
                body.len()
            ));
        }

        let mut data = Vec::with_capacity(rows * dimension);
        for chunk in body.chunks_exact(4) {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if !value.is_finite() {
                return Err("index contains non-finite values".to_string());
            }
            data.push(value);
        }
        Ok(Self {
            build_id,
            dimension,
            rows,
            data,
        })
    }

    /// Writes the index to `path`, replacing any existing file atomically.
    pub fn write(&self, path: &Path) -> Result<(), IndexError> {
        let bytes = self.to_bytes().map_err(|reason| IndexError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;
        write_atomically(path, &bytes).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), rows = self.len(), "flat index written");
        Ok(())
    }

    /// Reads an index previously written with [`FlatIndex::write`].
    pub fn read(path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                IndexError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                IndexError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_bytes(&bytes).map_err(|reason| IndexError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = (0..self.rows)
            .map(|row| {
                let start = row * self.dimension;
                (row, dot(query, &self.data[start..start + self.dimension]))
            })
            .collect();
        // ties keep row order so results are stable across runs
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn build_id(&self) -> Option<Uuid> {
        Some(self.build_id)
    }

    fn len(&self) -> usize {
        self.rows
    }
}
