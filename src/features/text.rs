use super::{parse_values, FeatureFormat, FeatureMatrix};
use crate::error::{MapEvalError, Result};

/// Text output of the feature extractor: one item per line, `image.jpg:0.1;0.2;0.3;`.
///
/// The `name:` prefix is optional and the container has no identifier, so the
/// requested identifier is ignored.
pub struct TextFormat;

impl FeatureFormat for TextFormat {
    fn can_load(&self, extension: &str) -> bool {
        matches!(extension, "txt" | "csv")
    }

    fn load(&self, content: &str, _identifier: &str, source: &str) -> Result<FeatureMatrix> {
        let mut rows = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            // Names may contain ':' (drive letters), values never do
            let values = match line.rsplit_once(':') {
                Some((_, values)) => values,
                None => line,
            };
            let location = format!("{} line {}", source, index + 1);
            rows.push(parse_values(values.split(';'), &location)?);
        }

        FeatureMatrix::from_rows(rows)
            .map_err(|e| MapEvalError::Load(format!("{} ({})", e, source)))
    }
}
