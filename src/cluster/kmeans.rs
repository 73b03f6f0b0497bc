use crate::error::{ClusterError, NumericalError, Result};
use crate::metrics::{inertia, squared_distance};
use crate::{Matrix, Vector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Tuning knobs shared by every k-means fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Independent seeded restarts; the lowest-inertia run wins
    pub n_init: usize,
    /// Lloyd iterations per restart
    pub max_iter: usize,
    /// Stop once no centroid moves further than this
    pub tolerance: f64,
    pub random_state: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            random_state: 42,
        }
    }
}

impl KMeansConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_init == 0 {
            return Err(ClusterError::config("n_init must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(ClusterError::config("max_iter must be > 0"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ClusterError::config(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Outcome of a single k-means fit.
#[derive(Clone, Debug)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub cluster_centers: Matrix,
    pub inertia: f64,
    pub n_iter: usize,
}

#[derive(Clone, Debug)]
pub struct KMeans {
    n_clusters: usize,
    config: KMeansConfig,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            config: KMeansConfig::default(),
        }
    }

    pub fn with_config(n_clusters: usize, config: KMeansConfig) -> Self {
        Self { n_clusters, config }
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.config.n_init = n_init;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.config.random_state = random_state;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Runs `n_init` seeded restarts and keeps the one with the lowest inertia.
    pub fn fit(&self, x: &Matrix) -> Result<KMeansFit> {
        self.config.validate()?;

        if self.n_clusters == 0 {
            return Err(ClusterError::config("n_clusters must be > 0"));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ClusterError::config(
                "Input matrix must have at least one sample and one feature",
            ));
        }
        if x.nrows() < self.n_clusters {
            return Err(ClusterError::config(format!(
                "n_samples={} should be >= n_clusters={}",
                x.nrows(),
                self.n_clusters
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(self.fit_error(NumericalError::NonFinite { stage: "input" }));
        }

        let mut rng = StdRng::seed_from_u64(self.config.random_state);
        let mut best: Option<KMeansFit> = None;

        for run in 0..self.config.n_init {
            let centroids = self.initialize_centroids(x, &mut rng)?;
            let fit = self.lloyd(x, centroids)?;
            debug!(
                k = self.n_clusters,
                run,
                inertia = fit.inertia,
                n_iter = fit.n_iter,
                "k-means run finished"
            );

            if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.ok_or_else(|| ClusterError::config("n_init must be > 0"))
    }

    fn fit_error(&self, source: NumericalError) -> ClusterError {
        ClusterError::Fit {
            k: self.n_clusters,
            source,
        }
    }

    /// k-means++ seeding: each new centroid is drawn with probability
    /// proportional to its squared distance from the nearest chosen one.
    fn initialize_centroids(&self, x: &Matrix, rng: &mut StdRng) -> Result<Matrix> {
        let n_samples = x.nrows();
        let mut centroids = Matrix::zeros((self.n_clusters, x.ncols()));

        let first_idx = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first_idx));

        let mut closest = Vector::from_shape_fn(n_samples, |i| {
            squared_distance(&x.row(i), &centroids.row(0))
        });

        for k in 1..self.n_clusters {
            let total: f64 = closest.sum();
            // Squared distances between huge finite values overflow.
            if !total.is_finite() {
                return Err(self.fit_error(NumericalError::NonFinite { stage: "seeding" }));
            }
            if total <= 0.0 {
                return Err(self.fit_error(NumericalError::TooFewDistinctPoints {
                    distinct: k,
                    n_clusters: self.n_clusters,
                }));
            }

            let target = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            let mut chosen = None;
            for (i, &d) in closest.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                cumulative += d;
                chosen = Some(i);
                if cumulative > target {
                    break;
                }
            }

            // total > 0 guarantees at least one positive weight.
            let Some(idx) = chosen else {
                return Err(self.fit_error(NumericalError::NonFinite { stage: "seeding" }));
            };
            centroids.row_mut(k).assign(&x.row(idx));

            for i in 0..n_samples {
                let d = squared_distance(&x.row(i), &centroids.row(k));
                if d < closest[i] {
                    closest[i] = d;
                }
            }
        }

        Ok(centroids)
    }

    fn lloyd(&self, x: &Matrix, mut centroids: Matrix) -> Result<KMeansFit> {
        let mut labels = vec![0usize; x.nrows()];
        let mut n_iter = 0;

        for iteration in 0..self.config.max_iter {
            n_iter = iteration + 1;
            let changed = self.assign(x, &centroids, &mut labels);

            let old_centroids = centroids.clone();
            self.update_centroids(x, &labels, &mut centroids);

            if centroids.iter().any(|v| !v.is_finite()) {
                return Err(self.fit_error(NumericalError::NonFinite {
                    stage: "centroid update",
                }));
            }

            let shift = self.max_centroid_shift(&old_centroids, &centroids);
            trace!(iteration, shift, changed, "lloyd iteration");
            if (iteration > 0 && changed == 0) || shift < self.config.tolerance {
                break;
            }
        }

        // Labels always refer to the returned centroids.
        self.assign(x, &centroids, &mut labels);
        let inertia = inertia(x, &labels, &centroids)?;
        if !inertia.is_finite() {
            return Err(self.fit_error(NumericalError::NonFinite { stage: "inertia" }));
        }

        Ok(KMeansFit {
            labels,
            cluster_centers: centroids,
            inertia,
            n_iter,
        })
    }

    /// Assigns every sample to its nearest centroid, returning how many labels changed.
    fn assign(&self, x: &Matrix, centroids: &Matrix, labels: &mut [usize]) -> usize {
        let mut changed = 0;
        for (i, label) in labels.iter_mut().enumerate() {
            let mut min_distance = f64::INFINITY;
            let mut closest_cluster = 0;

            for k in 0..self.n_clusters {
                let distance = squared_distance(&x.row(i), &centroids.row(k));
                if distance < min_distance {
                    min_distance = distance;
                    closest_cluster = k;
                }
            }

            if *label != closest_cluster {
                changed += 1;
                *label = closest_cluster;
            }
        }
        changed
    }

    /// Empty clusters keep their previous centroid.
    fn update_centroids(&self, x: &Matrix, labels: &[usize], centroids: &mut Matrix) {
        let mut sums = Matrix::zeros((self.n_clusters, x.ncols()));
        let mut counts = vec![0usize; self.n_clusters];

        for (i, &label) in labels.iter().enumerate() {
            let mut row = sums.row_mut(label);
            row += &x.row(i);
            counts[label] += 1;
        }

        for (k, &count) in counts.iter().enumerate() {
            if count > 0 {
                let mean = &sums.row(k) / count as f64;
                centroids.row_mut(k).assign(&mean);
            }
        }
    }

    fn max_centroid_shift(&self, old_centroids: &Matrix, new_centroids: &Matrix) -> f64 {
        let mut max_shift: f64 = 0.0;

        for k in 0..self.n_clusters {
            let shift = squared_distance(&old_centroids.row(k), &new_centroids.row(k)).sqrt();
            max_shift = max_shift.max(shift);
        }

        max_shift
    }
}
