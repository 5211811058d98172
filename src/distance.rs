//! Pairwise dissimilarity functions over feature vectors.
//!
//! | Selector | Distance |
//! |----------|----------|
//! | `l1` | Σ\|aᵢ−bᵢ\| |
//! | `l2` | √Σ(aᵢ−bᵢ)² |
//! | `l2sqr` | Σ(aᵢ−bᵢ)² |
//! | `linfinity` | max\|aᵢ−bᵢ\| |
//! | `cosine` | 1 − a·b / (‖a‖‖b‖) |
//! | `hamming` | fraction of positions whose zero/nonzero state differs |
//! | `maxdim` | \|a_k − b_k\|, k = argmax(a) |
//!
//! All sums are accumulated in `f64`.

use crate::error::{MapEvalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stateless dissimilarity between two feature vectors of equal length.
///
/// Implementations panic if `a.len() != b.len()`; vectors taken from one feature
/// matrix always agree.
pub trait DistanceMetric: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Dissimilarity of `b` as seen from `a`. Smaller means more similar.
    fn compute(&self, a: &[f32], b: &[f32]) -> Result<f64>;
}

fn check_lengths(a: &[f32], b: &[f32]) {
    assert_eq!(
        a.len(),
        b.len(),
        "Vectors must have same length for distance computation"
    );
}

fn differences<'a>(a: &'a [f32], b: &'a [f32]) -> impl Iterator<Item = f64> + 'a {
    check_lengths(a, b);
    a.iter().zip(b).map(|(x, y)| (*x as f64 - *y as f64).abs())
}

/// Manhattan distance.
pub struct L1;

impl DistanceMetric for L1 {
    fn name(&self) -> &'static str {
        "l1"
    }

    fn compute(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        Ok(differences(a, b).sum())
    }
}

/// Euclidean distance.
pub struct L2;

impl DistanceMetric for L2 {
    fn name(&self) -> &'static str {
        "l2"
    }

    fn compute(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        L2Squared.compute(a, b).map(f64::sqrt)
    }
}

/// Squared Euclidean distance; ranks like `L2` without the square root.
pub struct L2Squared;

impl DistanceMetric for L2Squared {
    fn name(&self) -> &'static str {
        "l2sqr"
    }

    fn compute(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        Ok(differences(a, b).map(|d| d * d).sum())
    }
}

/// Chebyshev distance.
pub struct Infinity;

impl DistanceMetric for Infinity {
    fn name(&self) -> &'static str {
        "linfinity"
    }

    fn compute(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        Ok(differences(a, b).fold(0.0, f64::max))
    }
}

/// One minus the cosine of the angle between the vectors.
///
/// A zero-norm operand has no direction; that is a `Numeric` error rather than NaN.
pub struct Cosine;

impl DistanceMetric for Cosine {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn compute(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        check_lengths(a, b);
        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;
        for (x, y) in a.iter().zip(b) {
            let (x, y) = (*x as f64, *y as f64);
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return Err(MapEvalError::Numeric(
                "cosine distance is undefined for a zero-norm vector".to_string(),
            ));
        }
        // One sqrt of the product: sqrt(n * n) == n exactly, so self-distance is 0
        Ok(1.0 - dot / (norm_a * norm_b).sqrt())
    }
}

/// Hamming distance of the binarized vectors (nonzero → 1), divided by the vector length.
///
/// Length normalization keeps values in [0, 1]. Within one run every vector has the
/// same length, so rankings match the raw differing-position count.
pub struct Hamming;

impl DistanceMetric for Hamming {
    fn name(&self) -> &'static str {
        "hamming"
    }

    fn compute(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        check_lengths(a, b);
        if a.is_empty() {
            return Ok(0.0);
        }
        let differing = a
            .iter()
            .zip(b)
            .filter(|(x, y)| (**x != 0.0) != (**y != 0.0))
            .count();
        Ok(differing as f64 / a.len() as f64)
    }
}

/// Difference at the index of the largest value in `a` (first occurrence wins).
///
/// Meant for probability-layer features, where that index is the most likely class of
/// `a`. Not symmetric.
pub struct MaxDimensionDifference;

impl DistanceMetric for MaxDimensionDifference {
    fn name(&self) -> &'static str {
        "maxdim"
    }

    fn compute(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        check_lengths(a, b);
        let mut best: Option<(usize, f32)> = None;
        for (index, &value) in a.iter().enumerate() {
            match best {
                Some((_, max)) if value <= max || value.is_nan() => {}
                None if value.is_nan() => {}
                _ => best = Some((index, value)),
            }
        }
        let (k, _) = best.ok_or_else(|| {
            MapEvalError::Numeric("maximal dimension is undefined for an empty vector".to_string())
        })?;
        Ok((a[k] as f64 - b[k] as f64).abs())
    }
}

/// Built-in distance selector, as accepted on the command line and in config files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DistanceFunction {
    L1,
    L2,
    #[default]
    L2Squared,
    Infinity,
    Cosine,
    Hamming,
    MaxDimensionDifference,
}

impl DistanceFunction {
    pub const ALL: [DistanceFunction; 7] = [
        DistanceFunction::L1,
        DistanceFunction::L2,
        DistanceFunction::L2Squared,
        DistanceFunction::Infinity,
        DistanceFunction::Cosine,
        DistanceFunction::Hamming,
        DistanceFunction::MaxDimensionDifference,
    ];

    /// The metric implementing this selector.
    pub fn metric(&self) -> Box<dyn DistanceMetric> {
        match self {
            DistanceFunction::L1 => Box::new(L1),
            DistanceFunction::L2 => Box::new(L2),
            DistanceFunction::L2Squared => Box::new(L2Squared),
            DistanceFunction::Infinity => Box::new(Infinity),
            DistanceFunction::Cosine => Box::new(Cosine),
            DistanceFunction::Hamming => Box::new(Hamming),
            DistanceFunction::MaxDimensionDifference => Box::new(MaxDimensionDifference),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceFunction::L1 => "l1",
            DistanceFunction::L2 => "l2",
            DistanceFunction::L2Squared => "l2sqr",
            DistanceFunction::Infinity => "linfinity",
            DistanceFunction::Cosine => "cosine",
            DistanceFunction::Hamming => "hamming",
            DistanceFunction::MaxDimensionDifference => "maxdim",
        }
    }
}

impl fmt::Display for DistanceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceFunction {
    type Err = MapEvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "l2" | "lp2" => Ok(DistanceFunction::L2),
            "l2sqr" | "l2squared" => Ok(DistanceFunction::L2Squared),
            "l1" | "lp1" => Ok(DistanceFunction::L1),
            "linfinity" | "infinity" | "linf" => Ok(DistanceFunction::Infinity),
            "cosine" => Ok(DistanceFunction::Cosine),
            "hamming" => Ok(DistanceFunction::Hamming),
            "maxdim" | "maximal_dimension_difference" => {
                Ok(DistanceFunction::MaxDimensionDifference)
            }
            other => Err(MapEvalError::Config(format!(
                "Unknown distance function: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for DistanceFunction {
    type Error = MapEvalError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DistanceFunction> for String {
    fn from(value: DistanceFunction) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn sample_vectors() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 2.0, -1.0],
            vec![0.5, 3.0, 0.0, -1.0],
            vec![0.0, 0.25, 4.0, 2.0],
        ]
    }

    #[test]
    fn test_known_values() {
        let a = [1.0, 2.0, 0.0];
        let b = [4.0, -2.0, 0.0];
        assert!((L1.compute(&a, &b).unwrap() - 7.0).abs() < EPS);
        assert!((L2Squared.compute(&a, &b).unwrap() - 25.0).abs() < EPS);
        assert!((L2.compute(&a, &b).unwrap() - 5.0).abs() < EPS);
        assert!((Infinity.compute(&a, &b).unwrap() - 4.0).abs() < EPS);
    }

    #[test]
    fn test_self_distance_is_zero() {
        let symmetric: [&dyn DistanceMetric; 5] = [&L1, &L2, &L2Squared, &Infinity, &Hamming];
        for v in sample_vectors() {
            for metric in symmetric {
                assert_eq!(metric.compute(&v, &v).unwrap(), 0.0, "{}", metric.name());
            }
            assert_eq!(Cosine.compute(&v, &v).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_symmetry() {
        let symmetric: [&dyn DistanceMetric; 5] = [&L1, &L2, &L2Squared, &Infinity, &Hamming];
        let vectors = sample_vectors();
        for a in &vectors {
            for b in &vectors {
                for metric in symmetric {
                    assert_eq!(
                        metric.compute(a, b).unwrap(),
                        metric.compute(b, a).unwrap(),
                        "{} is not symmetric",
                        metric.name()
                    );
                }
            }
        }
    }

    #[test]
    fn test_cosine_self_distance_is_exactly_zero() {
        let vectors: [&[f32]; 4] = [&[1.0, 1.0], &[0.1, 0.37], &[3.0, -7.5, 0.2], &[1e-3, 5e2]];
        for v in vectors {
            assert_eq!(Cosine.compute(v, v).unwrap(), 0.0, "{:?}", v);
        }
        // A scaled copy is no closer than the vector itself
        let a = [0.1f32, 0.37];
        let scaled = [a[0] * 3.0, a[1] * 3.0];
        assert!(Cosine.compute(&a, &scaled).unwrap() >= 0.0);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        let a = [1.0, 0.0];
        assert!((Cosine.compute(&a, &[0.0, 3.0]).unwrap() - 1.0).abs() < EPS);
        assert!((Cosine.compute(&a, &[-2.0, 0.0]).unwrap() - 2.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_zero_norm_is_error() {
        let result = Cosine.compute(&[0.0, 0.0], &[1.0, 0.0]);
        assert!(matches!(result, Err(MapEvalError::Numeric(_))));
        let result = Cosine.compute(&[1.0, 0.0], &[0.0, 0.0]);
        assert!(matches!(result, Err(MapEvalError::Numeric(_))));
    }

    #[test]
    fn test_hamming_binarizes_and_normalizes() {
        let a = [0.3, 0.0, 5.0, 0.0];
        let b = [7.0, 1.0, 0.0, 0.0];
        // Positions 1 and 2 differ after binarization
        assert!((Hamming.compute(&a, &b).unwrap() - 0.5).abs() < EPS);
        assert_eq!(Hamming.compute(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_max_dimension_difference() {
        let a = [0.1, 0.7, 0.7, 0.2];
        let b = [0.5, 0.2, 0.9, 0.0];
        // First occurrence of the max in `a` is index 1
        let d = MaxDimensionDifference.compute(&a, &b).unwrap();
        assert!((d - 0.5).abs() < 1e-6);
        // Asymmetric: argmax of `b` is index 2
        let d = MaxDimensionDifference.compute(&b, &a).unwrap();
        assert!((d - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_max_dimension_empty_is_error() {
        let result = MaxDimensionDifference.compute(&[], &[]);
        assert!(matches!(result, Err(MapEvalError::Numeric(_))));
    }

    #[test]
    #[should_panic]
    fn test_length_mismatch_panics() {
        let _ = L1.compute(&[1.0, 2.0], &[1.0]);
    }

    #[test]
    fn test_selector_aliases() {
        assert_eq!("L2".parse::<DistanceFunction>().unwrap(), DistanceFunction::L2);
        assert_eq!("lp1".parse::<DistanceFunction>().unwrap(), DistanceFunction::L1);
        assert_eq!(
            "L2Sqr".parse::<DistanceFunction>().unwrap(),
            DistanceFunction::L2Squared
        );
        assert_eq!(
            "maximal_dimension_difference".parse::<DistanceFunction>().unwrap(),
            DistanceFunction::MaxDimensionDifference
        );
        for function in DistanceFunction::ALL {
            assert_eq!(function.as_str().parse::<DistanceFunction>().unwrap(), function);
            assert_eq!(function.metric().name(), function.as_str());
        }
    }

    #[test]
    fn test_unknown_selector_is_config_error() {
        let result = "l3".parse::<DistanceFunction>();
        assert!(matches!(result, Err(MapEvalError::Config(_))));
    }

    #[test]
    fn test_selector_serde() {
        let function: DistanceFunction = serde_json::from_str("\"Cosine\"").unwrap();
        assert_eq!(function, DistanceFunction::Cosine);
        assert_eq!(serde_json::to_string(&function).unwrap(), "\"cosine\"");
        assert!(serde_json::from_str::<DistanceFunction>("\"chebyshev\"").is_err());
    }
}
