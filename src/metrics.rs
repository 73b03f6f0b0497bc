use crate::error::{ClusterError, NumericalError, Result};
use crate::{Matrix, Vector};
use ndarray::ArrayView1;
use std::collections::HashMap;

pub(crate) fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

pub(crate) fn euclidean_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Sum of squared distances from each sample to the centroid of its cluster.
pub fn inertia(x: &Matrix, labels: &[usize], centroids: &Matrix) -> Result<f64> {
    if x.nrows() != labels.len() {
        return Err(ClusterError::config("x and labels must have the same length"));
    }
    if x.ncols() != centroids.ncols() {
        return Err(ClusterError::config(format!(
            "Number of features in X ({}) doesn't match centroids ({})",
            x.ncols(),
            centroids.ncols()
        )));
    }

    let mut total = 0.0;
    for (i, &label) in labels.iter().enumerate() {
        if label >= centroids.nrows() {
            return Err(ClusterError::config(format!(
                "label {} has no centroid ({} clusters)",
                label,
                centroids.nrows()
            )));
        }
        total += squared_distance(&x.row(i), &centroids.row(label));
    }
    Ok(total)
}

/// Per-sample silhouette coefficients.
///
/// Only defined when the labels name between 2 and `n_samples - 1` distinct
/// clusters. Members of singleton clusters score 0.
pub fn silhouette_samples(x: &Matrix, labels: &[usize]) -> Result<Vector> {
    let n = x.nrows();
    if n != labels.len() {
        return Err(ClusterError::config("x and labels must have the same length"));
    }

    // Labels may be arbitrary; map them onto dense cluster indices.
    let mut index: HashMap<usize, usize> = HashMap::new();
    let dense: Vec<usize> = labels
        .iter()
        .map(|&label| {
            let next = index.len();
            *index.entry(label).or_insert(next)
        })
        .collect();
    let distinct = index.len();
    if distinct < 2 || distinct + 1 > n {
        return Err(ClusterError::config(format!(
            "silhouette needs 2 <= n_clusters <= n_samples - 1, got {} clusters for {} samples",
            distinct, n
        )));
    }

    let mut sizes = vec![0usize; distinct];
    for &c in &dense {
        sizes[c] += 1;
    }

    let mut scores = Vector::zeros(n);
    let mut sums = vec![0.0; distinct];
    for i in 0..n {
        let own = dense[i];
        if sizes[own] == 1 {
            continue;
        }

        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                sums[dense[j]] += euclidean_distance(&x.row(i), &x.row(j));
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..distinct)
            .filter(|&c| c != own)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        let score = if denom > 0.0 { (b - a) / denom } else { 0.0 };
        if !score.is_finite() {
            return Err(ClusterError::Fit {
                k: distinct,
                source: NumericalError::NonFinite { stage: "silhouette" },
            });
        }
        scores[i] = score;
    }

    Ok(scores)
}

/// Mean silhouette coefficient over all samples, in `[-1, 1]`.
pub fn silhouette_score(x: &Matrix, labels: &[usize]) -> Result<f64> {
    let scores = silhouette_samples(x, labels)?;
    scores
        .mean()
        .ok_or_else(|| ClusterError::config("silhouette of an empty matrix"))
}
