//! Elbow and silhouette diagnostics over a range of cluster counts.

use crate::cluster::{ClusteringEngine, KMeansConfig};
use crate::dataset::FeatureMatrix;
use crate::error::{ClusterError, Result};
use crate::metrics::silhouette_score;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Quality of one fit. Both numbers come from the same run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KMetrics {
    pub inertia: f64,
    pub silhouette: f64,
}

/// Metrics keyed by cluster count. `None` marks a `k` whose fit or
/// silhouette could not be computed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSeries {
    entries: BTreeMap<usize, Option<KMetrics>>,
}

impl MetricSeries {
    pub fn get(&self, k: usize) -> Option<&KMetrics> {
        self.entries.get(&k).and_then(Option::as_ref)
    }

    pub fn contains(&self, k: usize) -> bool {
        self.entries.contains_key(&k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<&KMetrics>)> + '_ {
        self.entries.iter().map(|(&k, m)| (k, m.as_ref()))
    }

    pub fn k_values(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }

    /// Inertia per `k` in ascending `k` order, for an elbow plot.
    pub fn inertia(&self) -> Vec<Option<f64>> {
        self.entries.values().map(|m| m.map(|m| m.inertia)).collect()
    }

    pub fn silhouette(&self) -> Vec<Option<f64>> {
        self.entries.values().map(|m| m.map(|m| m.silhouette)).collect()
    }

    /// The `k` with the highest silhouette; ties go to the smaller `k`.
    pub fn best_by_silhouette(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (k, metrics) in self.iter() {
            if let Some(m) = metrics {
                if best.is_none_or(|(_, s)| m.silhouette > s) {
                    best = Some((k, m.silhouette));
                }
            }
        }
        best.map(|(k, _)| k)
    }

    fn insert(&mut self, k: usize, metrics: Option<KMetrics>) {
        self.entries.insert(k, metrics);
    }
}

#[derive(Clone, Debug, Default)]
pub struct ClusterEvaluator {
    engine: ClusteringEngine,
}

impl ClusterEvaluator {
    pub fn new(config: KMeansConfig) -> Self {
        Self {
            engine: ClusteringEngine::new(config),
        }
    }

    /// Fits every `k` in `2..=max_k` independently. A failure for one `k`
    /// leaves that entry empty and never stops the sweep.
    pub fn compute_metrics(&self, matrix: &FeatureMatrix, max_k: usize) -> Result<MetricSeries> {
        if max_k < 2 {
            return Err(ClusterError::config(format!(
                "max_k must be at least 2, got {}",
                max_k
            )));
        }

        let mut series = MetricSeries::default();
        for k in 2..=max_k {
            let metrics = match self.evaluate(matrix, k) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!(k, error = %e, "K-Means failed for this k, leaving it empty");
                    None
                }
            };
            series.insert(k, metrics);
        }

        debug!(
            max_k,
            present = series.iter().filter(|(_, m)| m.is_some()).count(),
            "metric sweep finished"
        );
        Ok(series)
    }

    fn evaluate(&self, matrix: &FeatureMatrix, k: usize) -> Result<KMetrics> {
        let n = matrix.n_samples();
        if k + 1 > n {
            return Err(ClusterError::config(format!(
                "silhouette needs k <= n_samples - 1 ({} rows)",
                n
            )));
        }

        let fit = self.engine.fit_detailed(matrix, k)?;
        let silhouette = silhouette_score(matrix.values(), &fit.labels)?;
        Ok(KMetrics {
            inertia: fit.inertia,
            silhouette,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix(x: crate::Matrix) -> FeatureMatrix {
        let names = (0..x.ncols()).map(|j| format!("f{}", j)).collect();
        FeatureMatrix::from_array(names, x).unwrap()
    }

    #[test]
    fn test_small_dataset_does_not_abort() {
        let m = matrix(array![[0.0, 0.0], [1.0, 0.5], [4.0, 4.0], [8.0, 1.0], [9.0, 9.0]]);
        let series = ClusterEvaluator::default().compute_metrics(&m, 10).unwrap();

        assert_eq!(series.k_values(), (2..=10).collect::<Vec<_>>());
        for k in 2..=4 {
            let metrics = series.get(k).unwrap();
            assert!(metrics.inertia >= 0.0);
            assert!((-1.0..=1.0).contains(&metrics.silhouette));
        }
        for k in 5..=10 {
            assert!(series.contains(k));
            assert!(series.get(k).is_none());
        }
    }

    #[test]
    fn test_inertia_decreases_with_k() {
        let m = matrix(array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0], [30.0], [31.0]]);
        let series = ClusterEvaluator::default().compute_metrics(&m, 4).unwrap();
        let inertia: Vec<f64> = series.inertia().into_iter().flatten().collect();
        assert_eq!(inertia.len(), 3);
        assert!(inertia.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_degenerate_k_is_isolated() {
        // Only three distinct points: k = 3 works, k = 4 cannot be seeded.
        let m = matrix(array![[0.0], [0.0], [5.0], [5.0], [9.0], [9.0]]);
        let series = ClusterEvaluator::default().compute_metrics(&m, 4).unwrap();
        assert!(series.get(2).is_some());
        assert!(series.get(3).is_some());
        assert!(series.get(4).is_none());
        assert_eq!(series.best_by_silhouette(), Some(3));
    }

    #[test]
    fn test_overflowing_values_leave_entries_empty() {
        let m = matrix(array![[-1e200], [-1e200], [0.0], [1e200], [1e200]]);
        let series = ClusterEvaluator::default().compute_metrics(&m, 4).unwrap();
        assert_eq!(series.k_values(), vec![2, 3, 4]);
        assert!(series.iter().all(|(_, metrics)| metrics.is_none()));
    }

    #[test]
    fn test_invalid_range() {
        let m = matrix(array![[0.0], [1.0], [2.0]]);
        assert!(ClusterEvaluator::default().compute_metrics(&m, 1).is_err());
    }

    #[test]
    fn test_series_serializes_absent_entries_as_null() {
        let m = matrix(array![[0.0], [1.0], [5.0]]);
        let series = ClusterEvaluator::default().compute_metrics(&m, 3).unwrap();
        let json = serde_json::to_value(&series).unwrap();
        assert!(json["2"]["inertia"].is_number());
        assert!(json["3"].is_null());
    }
}
