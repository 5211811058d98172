//! Retrieval evaluation: stable ranking, average precision, and mean average precision.

pub mod average_precision;
pub mod evaluator;
pub mod ranking;

pub use average_precision::{average_precision, PrecisionRecall, QueryScore, ScoringPolicy};
pub use evaluator::{EvaluationReport, EvaluatorOptions, QueryResult, RetrievalEvaluator};
pub use ranking::{compute_distances, rank_by_distance};
