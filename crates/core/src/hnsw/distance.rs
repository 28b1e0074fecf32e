//! Distance metrics for vector similarity.
//!
//! Three metrics, all returning a scalar where **lower is better** so the
//! graph code uses a single ordering everywhere: squared euclidean, cosine
//! distance (`1 - cosine similarity`), and negated inner product. Plain
//! portable f32 loops; no SIMD intrinsics.

use serde::{Deserialize, Serialize};

/// Distance metric used for similarity computation.
///
/// All variants return a value where **lower is better** (more similar).
/// Scores reported to callers are these raw values: squared distance for
/// euclidean, cosine distance for cosine, negated inner product for dot
/// product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\].
    #[default]
    Cosine,
    /// Squared euclidean distance (L2²). Range: \[0, ∞).
    Euclidean,
    /// Negated dot product: `-dot(a, b)`.
    DotProduct,
}

impl DistanceMetric {
    /// Distance between two equal-length vectors.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_sq(a, b),
            DistanceMetric::DotProduct => -dot_product(a, b),
        }
    }

    /// Stable wire/config name of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::DotProduct => "dot_product",
        }
    }

    /// Parses a metric name as used in configs and API requests.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cosine" => Some(DistanceMetric::Cosine),
            "euclidean" => Some(DistanceMetric::Euclidean),
            "dot_product" | "dot" => Some(DistanceMetric::DotProduct),
            _ => None,
        }
    }
}

/// Squared euclidean distance. Monotonic with true L2 but avoids the sqrt.
#[inline]
pub fn euclidean_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Inner product.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine distance: `1 - dot(a, b) / (|a| |b|)`. Zero vectors compare as
/// maximally distant.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
///
/// Cosine collections normalize stored vectors at insert time; query
/// normalization is the caller's job.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_sq() {
        let a = [0.0, 0.0, 0.0];
        let b = [3.0, 4.0, 0.0];
        assert!((euclidean_sq(&a, &b) - 25.0).abs() < 1e-6);
        assert_eq!(euclidean_sq(&a, &a), 0.0);
    }

    #[test]
    fn test_dot_product_metric_negates() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let d = DistanceMetric::DotProduct.distance(&a, &b);
        assert!((d - (-32.0)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let a = [1.0, 2.0, 3.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-6);

        let x = [1.0, 0.0];
        let y = [0.0, 1.0];
        assert!((cosine_distance(&x, &y) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let a = [0.5, -0.25, 0.75];
        let b: Vec<f32> = a.iter().map(|x| x * 10.0).collect();
        assert!(cosine_distance(&a, &b).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let z = [0.0, 0.0];
        let a = [1.0, 0.0];
        assert_eq!(cosine_distance(&z, &a), 1.0);
    }

    #[test]
    fn test_normalize_in_place() {
        let mut v = vec![3.0, 4.0];
        normalize_in_place(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);

        let mut z = vec![0.0, 0.0];
        normalize_in_place(&mut z);
        assert_eq!(z, vec![0.0, 0.0]);
    }

    #[test]
    fn test_metric_names_roundtrip() {
        for metric in [
            DistanceMetric::Cosine,
            DistanceMetric::Euclidean,
            DistanceMetric::DotProduct,
        ] {
            assert_eq!(DistanceMetric::parse(metric.as_str()), Some(metric));
        }
        assert_eq!(DistanceMetric::parse("dot"), Some(DistanceMetric::DotProduct));
        assert_eq!(DistanceMetric::parse("manhattan"), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&DistanceMetric::DotProduct).unwrap();
        assert_eq!(json, "\"dot_product\"");
        let back: DistanceMetric = serde_json::from_str("\"euclidean\"").unwrap();
        assert_eq!(back, DistanceMetric::Euclidean);
    }
}
