//! Distance pass and stable ranking for one query.

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::features::FeatureMatrix;

/// Distance from `query_id` to every row, indexed by catalog id.
///
/// The returned buffer belongs to the caller's query; nothing is written back to the
/// catalog, so concurrent queries never share scratch state.
pub fn compute_distances(
    metric: &dyn DistanceMetric,
    features: &FeatureMatrix,
    query_id: usize,
) -> Result<Vec<f64>> {
    let query = features.vector_at(query_id);
    features
        .rows()
        .map(|row| metric.compute(query, row))
        .collect()
}

/// Catalog ids ordered by ascending distance. Equal distances keep id order.
pub fn rank_by_distance(distances: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..distances.len()).collect();
    // sort_by is stable, so ties stay in id order
    order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{Cosine, L2Squared};
    use crate::error::MapEvalError;

    #[test]
    fn test_rank_ascending() {
        let ranking = rank_by_distance(&[3.0, 0.5, 2.0, 0.0]);
        assert_eq!(ranking, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_rank_ties_keep_id_order() {
        let ranking = rank_by_distance(&[1.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(ranking, vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank_by_distance(&[]).is_empty());
    }

    #[test]
    fn test_compute_distances_to_every_row() {
        let features =
            FeatureMatrix::from_rows(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 2.0]])
                .unwrap();
        let distances = compute_distances(&L2Squared, &features, 1).unwrap();
        assert_eq!(distances, vec![1.0, 0.0, 5.0]);
    }

    #[test]
    fn test_compute_distances_propagates_metric_error() {
        let features = FeatureMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 0.0]]).unwrap();
        let result = compute_distances(&Cosine, &features, 0);
        assert!(matches!(result, Err(MapEvalError::Numeric(_))));
    }
}
