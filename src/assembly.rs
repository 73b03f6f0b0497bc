//! Maps cluster labels back onto the unprocessed dataset for display or export.

use crate::cluster::ClusterAssignment;
use crate::dataset::{FeatureMatrix, RawDataset, Value};
use crate::error::{ClusterError, Result};

pub const CLUSTER_LABEL_COLUMN: &str = "cluster_label";

/// Returns a copy of `dataset` with a trailing `cluster_label` column.
///
/// Rows that were dropped during preprocessing get `Value::Missing`.
pub fn assemble(
    dataset: &RawDataset,
    matrix: &FeatureMatrix,
    assignment: &ClusterAssignment,
) -> Result<RawDataset> {
    if assignment.len() != matrix.n_samples() {
        return Err(ClusterError::config(format!(
            "{} labels given for a matrix of {} rows",
            assignment.len(),
            matrix.n_samples()
        )));
    }

    let mut labels = vec![Value::Missing; dataset.n_rows()];
    for (&source, &label) in matrix.source_rows().iter().zip(assignment.labels()) {
        let slot = labels.get_mut(source).ok_or_else(|| {
            ClusterError::config(format!(
                "matrix row refers to source row {} but the dataset has {} rows",
                source,
                dataset.n_rows()
            ))
        })?;
        *slot = Value::Number(label as f64);
    }

    dataset.with_column(CLUSTER_LABEL_COLUMN, labels)
}
