pub mod annotation;
pub mod config;
pub mod distance;
pub mod error;
pub mod eval;
pub mod features;
pub mod report;

pub use annotation::{Catalog, CatalogItem};
pub use config::Config;
pub use distance::{DistanceFunction, DistanceMetric};
pub use error::{MapEvalError, Result};
pub use eval::{EvaluationReport, EvaluatorOptions, RetrievalEvaluator};
pub use features::{FeatureMatrix, FeatureStore};
