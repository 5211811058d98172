//! Average precision of one ranked result list.
//!
//! AP is the trapezoidal area under the precision-recall step curve, starting from
//! (recall 0, precision 1). Relevance is class equality with the query; the number of
//! relevant items is the externally supplied class count, never recounted.

use crate::annotation::{Catalog, CatalogItem};
use crate::error::{MapEvalError, Result};
use serde::Serialize;

/// One point of a precision-recall curve, recorded per evaluated rank position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrecisionRecall {
    pub precision: f64,
    pub recall: f64,
}

/// How a ranking is truncated and whether the query's own entry is scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringPolicy {
    /// Skip the query's own entry instead of scoring it as a result.
    pub exclude_query: bool,
    /// Evaluate only the first `top_k` results; 0 evaluates the whole ranking.
    pub top_k: usize,
}

/// Outcome of scoring one ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryScore {
    pub average_precision: f64,
    /// Empty unless samples were requested.
    pub precision_recall: Vec<PrecisionRecall>,
}

/// Score `ranking` (catalog ids, nearest first) for `query`.
///
/// Fails with `Numeric` if the query has nothing left to retrieve, e.g. a class count of
/// 1 while its own entry is excluded.
pub fn average_precision(
    query: &CatalogItem,
    ranking: &[usize],
    catalog: &Catalog,
    policy: ScoringPolicy,
    collect_samples: bool,
) -> Result<QueryScore> {
    let mut matches = query.class_count;
    let mut result_count = ranking.len();

    if policy.exclude_query {
        matches -= 1;
        result_count = result_count.saturating_sub(1);
    }

    if policy.top_k > 0 {
        if policy.top_k as i64 > matches {
            log::warn!(
                "Top K ({}) is higher than match count of query {}: {}",
                policy.top_k,
                query.id,
                matches
            );
        }
        result_count = result_count.min(policy.top_k);
        matches = matches.min(result_count as i64);
    }

    if matches <= 0 {
        return Err(MapEvalError::Numeric(format!(
            "query {} has no relevant items to retrieve (class count {}, {} results evaluated)",
            query.id, query.class_count, result_count
        )));
    }
    let matches = matches as f64;

    let mut samples = Vec::new();
    if collect_samples {
        samples.reserve(result_count);
    }

    let mut average_precision = 0.0;
    let mut match_count = 0usize;
    let mut consumed = 0usize;
    let mut previous = PrecisionRecall {
        precision: 1.0,
        recall: 0.0,
    };

    for &id in ranking {
        if consumed == result_count {
            break;
        }
        if policy.exclude_query && id == query.id {
            continue;
        }

        let item = catalog.get(id).ok_or_else(|| {
            MapEvalError::Consistency(format!("ranked id {} is not in the catalog", id))
        })?;
        if item.class_id == query.class_id {
            match_count += 1;
        }
        // Positions scored so far; a skipped self-match does not count.
        consumed += 1;

        let current = PrecisionRecall {
            precision: match_count as f64 / consumed as f64,
            recall: match_count as f64 / matches,
        };
        average_precision +=
            (current.recall - previous.recall) * (current.precision + previous.precision) / 2.0;

        if collect_samples {
            samples.push(current);
        }
        previous = current;
    }

    Ok(QueryScore {
        average_precision,
        precision_recall: samples,
    })
}
