use thiserror::Error;

/// Main error type for mapeval
#[derive(Error, Debug)]
pub enum MapEvalError {
    /// Feature source missing, corrupt, or without the expected matrix
    #[error("Load error: {0}")]
    Load(String),

    /// Malformed annotation record (line numbers are 1-based)
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Feature matrix and annotation catalog disagree
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Unknown distance function or invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Guarded division by zero (zero norm, zero queries, zero matches)
    #[error("Numeric error: {0}")]
    Numeric(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenient Result type using MapEvalError
pub type Result<T> = std::result::Result<T, MapEvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MapEvalError::Config("Unknown distance function: l3".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("l3"));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = MapEvalError::Parse {
            line: 7,
            message: "column \"class_id\" is not an integer".to_string(),
        };
        assert!(err.to_string().contains("line 7"));
        assert!(err.to_string().contains("class_id"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MapEvalError = io_err.into();
        assert!(matches!(err, MapEvalError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: MapEvalError = json_err.into();
        assert!(matches!(err, MapEvalError::Json(_)));
    }
}
