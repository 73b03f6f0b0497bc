//! Centroid-based clustering of a [`FeatureMatrix`].
//!
//! - `KMeans`: Lloyd's algorithm with k-means++ seeding and seeded restarts
//! - `ClusteringEngine`: validates a cluster count and returns per-row labels
//!
//! # Examples
//!
//! ```rust
//! use clustervision::{ClusteringEngine, FeatureMatrix};
//! use ndarray::array;
//!
//! let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
//! let matrix = FeatureMatrix::from_array(vec!["spend".to_string()], x).unwrap();
//!
//! let engine = ClusteringEngine::default();
//! let assignment = engine.fit(&matrix, 2).unwrap();
//! assert_eq!(assignment.len(), 6);
//! assert_eq!(assignment.cluster_sizes(), vec![3, 3]);
//! ```

mod kmeans;

pub use kmeans::{KMeans, KMeansConfig, KMeansFit};

use crate::dataset::FeatureMatrix;
use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One label per matrix row, each in `[0, n_clusters)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedAssignment")]
pub struct ClusterAssignment {
    labels: Vec<usize>,
    n_clusters: usize,
}

#[derive(Deserialize)]
struct UncheckedAssignment {
    labels: Vec<usize>,
    n_clusters: usize,
}

impl TryFrom<UncheckedAssignment> for ClusterAssignment {
    type Error = ClusterError;

    fn try_from(raw: UncheckedAssignment) -> Result<Self> {
        ClusterAssignment::new(raw.labels, raw.n_clusters)
    }
}

impl ClusterAssignment {
    pub fn new(labels: Vec<usize>, n_clusters: usize) -> Result<Self> {
        if let Some(&bad) = labels.iter().find(|&&l| l >= n_clusters) {
            return Err(ClusterError::config(format!(
                "label {} out of range for {} clusters",
                bad, n_clusters
            )));
        }
        Ok(Self { labels, n_clusters })
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Members per cluster; empty clusters count as 0.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    pub fn into_labels(self) -> Vec<usize> {
        self.labels
    }
}

/// Stateless front end over [`KMeans`]; every call fits from scratch.
#[derive(Clone, Debug, Default)]
pub struct ClusteringEngine {
    config: KMeansConfig,
}

impl ClusteringEngine {
    pub fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    pub fn fit(&self, matrix: &FeatureMatrix, k: usize) -> Result<ClusterAssignment> {
        let fit = self.fit_detailed(matrix, k)?;
        ClusterAssignment::new(fit.labels, k)
    }

    /// Like [`fit`](Self::fit) but keeps centroids and inertia.
    pub fn fit_detailed(&self, matrix: &FeatureMatrix, k: usize) -> Result<KMeansFit> {
        if k < 2 {
            return Err(ClusterError::config(format!(
                "number of clusters must be at least 2, got {}",
                k
            )));
        }
        if matrix.n_features() == 0 {
            return Err(ClusterError::config("feature matrix has no columns"));
        }
        if matrix.n_samples() < k {
            return Err(ClusterError::config(format!(
                "cannot form {} clusters from {} rows",
                k,
                matrix.n_samples()
            )));
        }

        let fit = KMeans::with_config(k, self.config.clone()).fit(matrix.values())?;
        info!(k, inertia = fit.inertia, n_iter = fit.n_iter, "k-means fit complete");
        Ok(fit)
    }
}
