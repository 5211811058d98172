//! Mean average precision over every query of an annotation catalog.

use crate::annotation::{self, Catalog, CatalogItem};
use crate::distance::{DistanceFunction, DistanceMetric};
use crate::error::{MapEvalError, Result};
use crate::eval::average_precision::{average_precision, PrecisionRecall, ScoringPolicy};
use crate::eval::ranking::{compute_distances, rank_by_distance};
use crate::features::{self, FeatureMatrix};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

/// Evaluation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluatorOptions {
    /// Evaluate only the nearest `top_k` results per query; 0 means all.
    pub top_k: usize,
    /// Do not score the query's own entry as a retrieved result.
    pub exclude_query_from_db: bool,
    /// Keep the per-position precision-recall samples of every query.
    pub collect_precision_recall: bool,
    /// Evaluate queries on the rayon thread pool.
    pub parallel: bool,
}

impl EvaluatorOptions {
    fn scoring_policy(&self) -> ScoringPolicy {
        ScoringPolicy {
            exclude_query: self.exclude_query_from_db,
            top_k: self.top_k,
        }
    }
}

/// Score of a single query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub query_id: usize,
    pub class_id: i64,
    pub average_precision: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub precision_recall: Vec<PrecisionRecall>,
}

/// Outcome of a full evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub mean_average_precision: f64,
    /// One entry per query, in annotation file order.
    pub queries: Vec<QueryResult>,
}

/// Runs every query of the catalog against the whole catalog and averages the AP.
pub struct RetrievalEvaluator {
    features: FeatureMatrix,
    catalog: Catalog,
    metric: Box<dyn DistanceMetric>,
    options: EvaluatorOptions,
}

impl RetrievalEvaluator {
    /// Create an evaluator using one of the built-in distance functions.
    ///
    /// Fails with `Consistency` if the matrix and catalog sizes differ.
    pub fn new(
        features: FeatureMatrix,
        catalog: Catalog,
        distance: DistanceFunction,
        options: EvaluatorOptions,
    ) -> Result<Self> {
        Self::with_metric(features, catalog, distance.metric(), options)
    }

    /// Create an evaluator with any distance metric.
    pub fn with_metric(
        features: FeatureMatrix,
        catalog: Catalog,
        metric: Box<dyn DistanceMetric>,
        options: EvaluatorOptions,
    ) -> Result<Self> {
        if features.row_count() != catalog.len() {
            return Err(MapEvalError::Consistency(format!(
                "Number of loaded features ({}) and number of items in the annotation file ({}) are not equal",
                features.row_count(),
                catalog.len()
            )));
        }
        Ok(Self {
            features,
            catalog,
            metric,
            options,
        })
    }

    /// Load the feature matrix and annotation file, then build the evaluator.
    pub fn from_files(
        features_path: &Path,
        annotation_path: &Path,
        feature_identifier: &str,
        distance: DistanceFunction,
        options: EvaluatorOptions,
    ) -> Result<Self> {
        let features = features::load(features_path, feature_identifier)?;
        let catalog = annotation::parse(annotation_path)?;
        Self::new(features, catalog, distance, options)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn options(&self) -> EvaluatorOptions {
        self.options
    }

    pub fn metric_name(&self) -> &'static str {
        self.metric.name()
    }

    /// Evaluate every query and aggregate the mean average precision.
    ///
    /// Queries run in file order, or concurrently when `parallel` is set; either way
    /// the AP values are summed in file order, so the result is bit-identical.
    pub fn evaluate(&self) -> Result<EvaluationReport> {
        let query_count = self.catalog.query_count();
        if query_count == 0 {
            return Err(MapEvalError::Numeric(
                "annotation catalog contains no queries".to_string(),
            ));
        }

        let start = Instant::now();
        log::info!(
            "Evaluating {} queries against {} items (distance: {}, top K: {}, exclude query: {})",
            query_count,
            self.catalog.len(),
            self.metric.name(),
            self.options.top_k,
            self.options.exclude_query_from_db
        );

        let queries: Vec<(usize, &CatalogItem)> = self.catalog.queries().enumerate().collect();
        let results = if self.options.parallel {
            queries
                .par_iter()
                .map(|&(index, query)| self.evaluate_logged(index, query_count, query))
                .collect::<Result<Vec<_>>>()?
        } else {
            queries
                .iter()
                .map(|&(index, query)| self.evaluate_logged(index, query_count, query))
                .collect::<Result<Vec<_>>>()?
        };

        let sum: f64 = results.iter().map(|r| r.average_precision).sum();
        let mean_average_precision = sum / query_count as f64;

        log::info!(
            "Evaluation finished in {:?}, mean average precision: {}",
            start.elapsed(),
            mean_average_precision
        );

        Ok(EvaluationReport {
            mean_average_precision,
            queries: results,
        })
    }

    /// Evaluate and return only the mean average precision.
    pub fn mean_average_precision(&self) -> Result<f64> {
        self.evaluate().map(|report| report.mean_average_precision)
    }

    /// Distance pass, ranking and scoring for one query.
    pub fn evaluate_query(&self, query: &CatalogItem) -> Result<QueryResult> {
        let distances = compute_distances(self.metric.as_ref(), &self.features, query.id)?;
        let ranking = rank_by_distance(&distances);
        log::debug!(
            "Query {}: nearest ids {:?}",
            query.id,
            &ranking[..ranking.len().min(5)]
        );

        let score = average_precision(
            query,
            &ranking,
            &self.catalog,
            self.options.scoring_policy(),
            self.options.collect_precision_recall,
        )?;

        Ok(QueryResult {
            query_id: query.id,
            class_id: query.class_id,
            average_precision: score.average_precision,
            precision_recall: score.precision_recall,
        })
    }

    fn evaluate_logged(
        &self,
        index: usize,
        query_count: usize,
        query: &CatalogItem,
    ) -> Result<QueryResult> {
        let result = self.evaluate_query(query)?;
        log::info!(
            "Query {} of {}, average precision: {}",
            index + 1,
            query_count,
            result.average_precision
        );
        Ok(result)
    }
}
