use super::{FeatureFormat, FeatureMatrix};
use crate::error::{MapEvalError, Result};
use serde::Deserialize;

/// JSON container: `{ "<identifier>": { "rows": N, "cols": D, "data": [...] } }`.
///
/// Also reads OpenCV's JSON `FileStorage` output, whose extra keys (`type_id`, `dt`) are ignored.
pub struct JsonFormat;

#[derive(Debug, Deserialize)]
struct JsonMatrix {
    rows: usize,
    cols: usize,
    #[serde(default)]
    data: Vec<f32>,
}

impl FeatureFormat for JsonFormat {
    fn can_load(&self, extension: &str) -> bool {
        extension == "json"
    }

    fn load(&self, content: &str, identifier: &str, source: &str) -> Result<FeatureMatrix> {
        let root: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| MapEvalError::Load(format!("JSON parse error in {}: {}", source, e)))?;

        let node = root.get(identifier).ok_or_else(|| {
            MapEvalError::Load(format!("No matrix named \"{}\" in {}", identifier, source))
        })?;

        let matrix: JsonMatrix = serde_json::from_value(node.clone()).map_err(|e| {
            MapEvalError::Load(format!(
                "Matrix \"{}\" in {} is malformed: {}",
                identifier, source, e
            ))
        })?;

        FeatureMatrix::new(matrix.rows, matrix.cols, matrix.data)
            .map_err(|e| MapEvalError::Load(format!("{} ({})", e, source)))
    }
}
