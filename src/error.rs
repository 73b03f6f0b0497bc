//! Error types shared by the preprocessing, clustering and evaluation stages.

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Coarse classification of a [`ClusterError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    EmptyResult,
    Fit,
}

/// Main error type for the library
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Invalid method name, cluster count or range; correctable by the caller
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Preprocessing left no usable rows or columns
    #[error("no usable data: {0}")]
    EmptyResult(String),

    /// Clustering failed numerically for the given cluster count
    #[error("k-means failed for k={k}: {source}")]
    Fit {
        k: usize,
        #[source]
        source: NumericalError,
    },
}

impl ClusterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClusterError::Configuration(_) => ErrorKind::Configuration,
            ClusterError::EmptyResult(_) => ErrorKind::EmptyResult,
            ClusterError::Fit { .. } => ErrorKind::Fit,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ClusterError::Configuration(msg.into())
    }

    pub(crate) fn empty(msg: impl Into<String>) -> Self {
        ClusterError::EmptyResult(msg.into())
    }
}

/// Low-level failure raised inside the k-means iterations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericalError {
    #[error("only {distinct} distinct points available to seed {n_clusters} centroids")]
    TooFewDistinctPoints { distinct: usize, n_clusters: usize },

    #[error("non-finite value encountered during {stage}")]
    NonFinite { stage: &'static str },
}
