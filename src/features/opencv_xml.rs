use super::{parse_values, FeatureFormat, FeatureMatrix};
use crate::error::{MapEvalError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

/// OpenCV `FileStorage` XML, as written by the feature extractor:
///
/// ```xml
/// <opencv_storage>
/// <caffe_features type_id="opencv-matrix">
///   <rows>2</rows><cols>3</cols><dt>f</dt>
///   <data>1. 2. 3. 4. 5. 6.</data></caffe_features>
/// </opencv_storage>
/// ```
pub struct OpenCvXmlFormat;

/// Element depth of a named node directly under `<opencv_storage>`.
const MATRIX_DEPTH: usize = 2;

impl FeatureFormat for OpenCvXmlFormat {
    fn can_load(&self, extension: &str) -> bool {
        extension == "xml"
    }

    fn load(&self, content: &str, identifier: &str, source: &str) -> Result<FeatureMatrix> {
        let mut reader = Reader::from_str(content);

        let mut buf = Vec::new();
        let mut depth = 0;
        let mut found = false;
        let mut in_matrix = false;
        let mut current_field: Option<String> = None;
        let mut fields: HashMap<String, String> = HashMap::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    depth += 1;
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                    if depth == MATRIX_DEPTH && name == identifier && !found {
                        found = true;
                        in_matrix = true;
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"type_id" {
                                let type_id = String::from_utf8_lossy(&attr.value).to_string();
                                if type_id != "opencv-matrix" {
                                    return Err(MapEvalError::Load(format!(
                                        "Node \"{}\" in {} is a {}, not an opencv-matrix",
                                        identifier, source, type_id
                                    )));
                                }
                            }
                        }
                    } else if in_matrix && depth == MATRIX_DEPTH + 1 {
                        current_field = Some(name);
                    }
                }
                Ok(Event::Empty(e)) => {
                    if depth + 1 == MATRIX_DEPTH && e.name().as_ref() == identifier.as_bytes() {
                        return Err(MapEvalError::Load(format!(
                            "Node \"{}\" in {} is empty",
                            identifier, source
                        )));
                    }
                }
                Ok(Event::Text(e)) => {
                    if let (true, Some(field)) = (in_matrix, current_field.as_ref()) {
                        let text = String::from_utf8_lossy(e.as_ref());
                        let entry = fields.entry(field.clone()).or_default();
                        entry.push_str(&text);
                        entry.push(' ');
                    }
                }
                Ok(Event::End(_)) => {
                    if in_matrix && depth == MATRIX_DEPTH + 1 {
                        current_field = None;
                    } else if in_matrix && depth == MATRIX_DEPTH {
                        in_matrix = false;
                    }
                    depth = depth.saturating_sub(1);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(MapEvalError::Load(format!(
                        "XML parse error in {}: {}",
                        source, e
                    )));
                }
            }
            buf.clear();
        }

        if !found {
            return Err(MapEvalError::Load(format!(
                "No matrix named \"{}\" in {}",
                identifier, source
            )));
        }

        let rows = parse_dimension(&fields, "rows", identifier, source)?;
        let cols = parse_dimension(&fields, "cols", identifier, source)?;
        if let Some(dt) = fields.get("dt") {
            let dt = dt.trim();
            if !matches!(dt, "f" | "d" | "u" | "c" | "w" | "s" | "i") {
                return Err(MapEvalError::Load(format!(
                    "Unsupported element type \"{}\" for \"{}\" in {}",
                    dt, identifier, source
                )));
            }
        }
        let data = match fields.get("data") {
            Some(text) => parse_values(text.split_whitespace(), source)?,
            None => Vec::new(),
        };

        FeatureMatrix::new(rows, cols, data)
            .map_err(|e| MapEvalError::Load(format!("{} ({})", e, source)))
    }
}

fn parse_dimension(
    fields: &HashMap<String, String>,
    name: &str,
    identifier: &str,
    source: &str,
) -> Result<usize> {
    let text = fields.get(name).ok_or_else(|| {
        MapEvalError::Load(format!(
            "Matrix \"{}\" in {} has no <{}> element",
            identifier, source, name
        ))
    })?;
    text.trim().parse::<usize>().map_err(|_| {
        MapEvalError::Load(format!(
            "Invalid <{}> value \"{}\" for \"{}\" in {}",
            name,
            text.trim(),
            identifier,
            source
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<caffe_features type_id="opencv-matrix">
  <rows>2</rows>
  <cols>3</cols>
  <dt>f</dt>
  <data>
    1. 2.5e-01 -3.
    .5 0. 6.</data></caffe_features>
</opencv_storage>
"#;

    #[test]
    fn test_xml_format_can_load() {
        let format = OpenCvXmlFormat;
        assert!(format.can_load("xml"));
        assert!(!format.can_load("json"));
    }

    #[test]
    fn test_xml_load_matrix() {
        let matrix = OpenCvXmlFormat
            .load(SAMPLE, "caffe_features", "sample.xml")
            .unwrap();
        assert_eq!(matrix.row_count(), 2);
        assert_eq!(matrix.dimension(), 3);
        assert_eq!(matrix.vector_at(0), &[1.0, 0.25, -3.0]);
        assert_eq!(matrix.vector_at(1), &[0.5, 0.0, 6.0]);
    }

    #[test]
    fn test_xml_missing_identifier() {
        let result = OpenCvXmlFormat.load(SAMPLE, "other_features", "sample.xml");
        let err = result.unwrap_err();
        assert!(matches!(err, MapEvalError::Load(_)));
        assert!(err.to_string().contains("other_features"));
    }

    #[test]
    fn test_xml_value_count_mismatch() {
        let content = SAMPLE.replace("<rows>2</rows>", "<rows>3</rows>");
        let result = OpenCvXmlFormat.load(&content, "caffe_features", "sample.xml");
        assert!(matches!(result, Err(MapEvalError::Load(_))));
    }

    #[test]
    fn test_xml_bad_value() {
        let content = SAMPLE.replace("6.</data>", "six</data>");
        let result = OpenCvXmlFormat.load(&content, "caffe_features", "sample.xml");
        assert!(matches!(result, Err(MapEvalError::Load(_))));
    }

    #[test]
    fn test_xml_wrong_type_id() {
        let content = SAMPLE.replace("opencv-matrix", "opencv-nd-matrix");
        let result = OpenCvXmlFormat.load(&content, "caffe_features", "sample.xml");
        assert!(matches!(result, Err(MapEvalError::Load(_))));
    }

    #[test]
    fn test_xml_malformed() {
        let content = "<opencv_storage><caffe_features><rows>1</cols>";
        let result = OpenCvXmlFormat.load(content, "caffe_features", "broken.xml");
        assert!(matches!(result, Err(MapEvalError::Load(_))));
    }
}
