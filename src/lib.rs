//! Preprocessing, k-means clustering and cluster-count diagnostics for
//! tabular data.
//!
//! The three entry points are pure functions of their inputs:
//! [`preprocess`] turns a [`RawDataset`] into a [`FeatureMatrix`],
//! [`ClusteringEngine::fit`] labels its rows, and
//! [`ClusterEvaluator::compute_metrics`] sweeps candidate cluster counts.

pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub mod assembly;
pub mod cluster;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod preprocessing;

pub use assembly::{assemble, CLUSTER_LABEL_COLUMN};
pub use cluster::{ClusterAssignment, ClusteringEngine, KMeans, KMeansConfig, KMeansFit};
pub use dataset::{
    categorical_columns, numeric_columns, ColumnRole, ColumnRoles, FeatureMatrix, RawDataset,
    Value,
};
pub use error::{ClusterError, ErrorKind, NumericalError, Result};
pub use evaluation::{ClusterEvaluator, KMetrics, MetricSeries};
pub use preprocessing::{preprocess, MinMaxScaler, ScalingMethod, StandardScaler};

pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;
