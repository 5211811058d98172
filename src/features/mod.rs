//! Feature store: an immutable dense N×D matrix loaded from a serialized container.

pub mod json;
pub mod opencv_xml;
pub mod text;

use crate::error::{MapEvalError, Result};
use std::path::Path;
use std::time::Instant;

/// Logical identifier the upstream feature extractor stores its matrix under.
pub const DEFAULT_FEATURE_IDENTIFIER: &str = "caffe_features";

/// Dense row-major feature matrix. Row `i` is the feature vector of catalog item `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    /// Build a matrix from row-major data, checking that `data.len() == rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            MapEvalError::Load(format!("Matrix shape {}x{} overflows", rows, cols))
        })?;
        if data.len() != expected {
            return Err(MapEvalError::Load(format!(
                "Matrix declares {}x{} = {} values but contains {}",
                rows,
                cols,
                expected,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from individual rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let row_count = rows.len();
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(row_count * cols);
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(MapEvalError::Load(format!(
                    "Row {} has {} values, expected {}",
                    index,
                    row.len(),
                    cols
                )));
            }
            data.extend(row);
        }
        Self::new(row_count, cols, data)
    }

    /// Number of feature vectors (N).
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Length of every feature vector (D).
    pub fn dimension(&self) -> usize {
        self.cols
    }

    /// Read-only view of row `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= row_count()`.
    pub fn vector_at(&self, id: usize) -> &[f32] {
        assert!(
            id < self.rows,
            "Feature row {} out of range ({} rows)",
            id,
            self.rows
        );
        &self.data[id * self.cols..(id + 1) * self.cols]
    }

    /// Iterate over all rows in id order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.rows).map(move |id| self.vector_at(id))
    }
}

/// A serialized container format a feature matrix can be read from.
pub trait FeatureFormat {
    /// Check if this format handles the given (lowercase) file extension
    fn can_load(&self, extension: &str) -> bool;

    /// Decode the matrix stored under `identifier`; `source` is only used in messages.
    fn load(&self, content: &str, identifier: &str, source: &str) -> Result<FeatureMatrix>;
}

/// Format registry that selects a loader by file extension
pub struct FeatureStore {
    formats: Vec<Box<dyn FeatureFormat>>,
}

impl FeatureStore {
    /// Create a store with all built-in formats
    pub fn new() -> Self {
        let mut store = Self {
            formats: Vec::new(),
        };

        store.register(Box::new(opencv_xml::OpenCvXmlFormat));
        store.register(Box::new(json::JsonFormat));
        store.register(Box::new(text::TextFormat));

        store
    }

    /// Register an additional format
    pub fn register(&mut self, format: Box<dyn FeatureFormat>) {
        self.formats.push(format);
    }

    /// Find a format that can handle the given extension
    pub fn find_format(&self, extension: &str) -> Option<&dyn FeatureFormat> {
        self.formats
            .iter()
            .find(|f| f.can_load(extension))
            .map(|f| f.as_ref())
    }

    /// Load the feature matrix stored in `path` under `identifier`.
    ///
    /// Every failure (missing file, unknown extension, absent identifier, corrupt data)
    /// surfaces as `MapEvalError::Load`.
    pub fn load(&self, path: &Path, identifier: &str) -> Result<FeatureMatrix> {
        let start = Instant::now();
        log::info!("Loading features from file: {}", path.display());

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        let format = self.find_format(&extension).ok_or_else(|| {
            MapEvalError::Load(format!(
                "No feature loader for extension \"{}\": {}",
                extension,
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| {
            MapEvalError::Load(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let source = path.display().to_string();
        let matrix = format.load(&content, identifier, &source)?;

        log::info!(
            "Features loaded in {:?} ({} vectors, dimension {})",
            start.elapsed(),
            matrix.row_count(),
            matrix.dimension()
        );
        Ok(matrix)
    }
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a feature matrix with the built-in formats.
pub fn load(path: &Path, identifier: &str) -> Result<FeatureMatrix> {
    FeatureStore::new().load(path, identifier)
}

/// Parse whitespace- or `;`-separated numbers, reporting the first bad token.
pub(crate) fn parse_values<'a>(
    tokens: impl Iterator<Item = &'a str>,
    source: &str,
) -> Result<Vec<f32>> {
    tokens
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f32>().map_err(|_| {
                MapEvalError::Load(format!("Invalid feature value \"{}\" in {}", t, source))
            })
        })
        .collect()
}
