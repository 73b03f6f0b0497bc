//! Turns a [`RawDataset`] into a [`FeatureMatrix`]: missing-value policy,
//! one-hot encoding of categorical columns, scaling of numeric columns.

use crate::dataset::{ColumnRoles, FeatureMatrix, RawDataset, Value};
use crate::error::{ClusterError, Result};
use crate::{Matrix, Vector};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMethod {
    #[default]
    Standard,
    #[serde(rename = "minmax")]
    MinMax,
    #[serde(rename = "none")]
    Passthrough,
}

impl FromStr for ScalingMethod {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(ScalingMethod::Standard),
            "minmax" => Ok(ScalingMethod::MinMax),
            "none" => Ok(ScalingMethod::Passthrough),
            other => Err(ClusterError::config(format!(
                "invalid scaling method '{}': choose 'standard', 'minmax' or 'none'",
                other
            ))),
        }
    }
}

impl fmt::Display for ScalingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalingMethod::Standard => "standard",
            ScalingMethod::MinMax => "minmax",
            ScalingMethod::Passthrough => "none",
        })
    }
}

pub struct StandardScaler {
    mean: Option<Vector>,
    std: Option<Vector>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: None,
            std: None,
        }
    }

    pub fn fit(&mut self, data: &Matrix) -> Result<()> {
        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| ClusterError::empty("cannot fit a scaler on zero rows"))?;
        // Constant columns keep a unit scale so they map to 0.
        let std = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 { 1.0 } else { s });

        self.mean = Some(mean);
        self.std = Some(std);
        Ok(())
    }

    pub fn transform(&self, data: &Matrix) -> Result<Matrix> {
        let mean = self
            .mean
            .as_ref()
            .ok_or_else(|| ClusterError::config("Scaler not fitted. Call fit() first."))?;
        let std = self
            .std
            .as_ref()
            .ok_or_else(|| ClusterError::config("Scaler not fitted. Call fit() first."))?;

        let mut result = data.clone();
        for mut row in result.axis_iter_mut(Axis(0)) {
            row -= mean;
            row /= std;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, data: &Matrix) -> Result<Matrix> {
        self.fit(data)?;
        self.transform(data)
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MinMaxScaler {
    min: Option<Vector>,
    range: Option<Vector>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self {
            min: None,
            range: None,
        }
    }

    pub fn fit(&mut self, data: &Matrix) -> Result<()> {
        if data.nrows() == 0 {
            return Err(ClusterError::empty("cannot fit a scaler on zero rows"));
        }

        let min = data.fold_axis(Axis(0), f64::INFINITY, |&acc, &x| acc.min(x));
        let max = data.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &x| acc.max(x));
        let range = (&max - &min).mapv(|r| if r == 0.0 { 1.0 } else { r });

        self.min = Some(min);
        self.range = Some(range);
        Ok(())
    }

    pub fn transform(&self, data: &Matrix) -> Result<Matrix> {
        let min = self
            .min
            .as_ref()
            .ok_or_else(|| ClusterError::config("Scaler not fitted. Call fit() first."))?;
        let range = self
            .range
            .as_ref()
            .ok_or_else(|| ClusterError::config("Scaler not fitted. Call fit() first."))?;

        let mut result = data.clone();
        for mut row in result.axis_iter_mut(Axis(0)) {
            row -= min;
            row /= range;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, data: &Matrix) -> Result<Matrix> {
        self.fit(data)?;
        self.transform(data)
    }
}

impl Default for MinMaxScaler {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a clustering-ready matrix from `dataset` without touching it.
///
/// Output columns are the numeric columns in their original order followed by
/// the indicator columns of each categorical column. Only the numeric columns
/// are scaled.
pub fn preprocess(
    dataset: &RawDataset,
    scaling: ScalingMethod,
    drop_missing: bool,
) -> Result<FeatureMatrix> {
    let roles = ColumnRoles::of(dataset);
    let numeric_idx = column_indices(dataset, &roles.numeric);
    let categorical_idx = column_indices(dataset, &roles.categorical);

    let kept_rows: Vec<usize> = if drop_missing {
        dataset
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.iter().any(Value::is_missing))
            .map(|(i, _)| i)
            .collect()
    } else {
        (0..dataset.n_rows()).collect()
    };

    debug!(
        numeric = roles.numeric.len(),
        categorical = roles.categorical.len(),
        kept = kept_rows.len(),
        dropped = dataset.n_rows() - kept_rows.len(),
        "classified columns and applied missing-value policy"
    );

    if kept_rows.is_empty() {
        return Err(ClusterError::empty("every row contains a missing value"));
    }

    let n_rows = kept_rows.len();
    let mut numeric = Matrix::zeros((n_rows, numeric_idx.len()));
    for (j, (&col, name)) in numeric_idx.iter().zip(&roles.numeric).enumerate() {
        let column = numeric_column(dataset, col, &kept_rows, name)?;
        numeric.column_mut(j).assign(&Vector::from(column));
    }

    let numeric = match scaling {
        _ if numeric.ncols() == 0 => numeric,
        ScalingMethod::Standard => StandardScaler::new().fit_transform(&numeric)?,
        ScalingMethod::MinMax => MinMaxScaler::new().fit_transform(&numeric)?,
        ScalingMethod::Passthrough => numeric,
    };

    let mut columns = roles.numeric.clone();
    let mut origin: HashMap<String, &str> =
        roles.numeric.iter().map(|c| (c.clone(), c.as_str())).collect();
    let mut blocks = vec![numeric];
    for (&col, name) in categorical_idx.iter().zip(&roles.categorical) {
        let values = categorical_column(dataset, col, &kept_rows, name)?;
        let (names, block) = one_hot(name, &values);
        for feature in &names {
            if let Some(other) = origin.insert(feature.clone(), name.as_str()) {
                return Err(ClusterError::config(format!(
                    "indicator '{}' from categorical column '{}' collides with column '{}'",
                    feature, name, other
                )));
            }
        }
        columns.extend(names);
        blocks.push(block);
    }

    let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
    let values = ndarray::concatenate(Axis(1), &views)
        .map_err(|e| ClusterError::config(format!("failed to assemble features: {}", e)))?;

    if values.ncols() == 0 {
        return Err(ClusterError::empty("no usable features found after preprocessing"));
    }

    info!(
        rows = values.nrows(),
        features = values.ncols(),
        %scaling,
        "preprocessed dataset"
    );

    FeatureMatrix::new(columns, values, kept_rows)
}

fn column_indices(dataset: &RawDataset, names: &[String]) -> Vec<usize> {
    names
        .iter()
        .filter_map(|n| dataset.column_index(n))
        .collect()
}

/// Numeric column restricted to `rows`, missing cells replaced by the mean
/// of the present ones.
fn numeric_column(
    dataset: &RawDataset,
    col: usize,
    rows: &[usize],
    name: &str,
) -> Result<Vec<f64>> {
    let raw: Vec<Option<f64>> = rows
        .iter()
        .map(|&r| dataset.rows()[r][col].as_number())
        .collect();

    let present: Vec<f64> = raw.iter().flatten().copied().collect();
    if present.len() == raw.len() {
        return Ok(present);
    }
    if present.is_empty() {
        return Err(ClusterError::config(format!(
            "cannot impute column '{}': every value is missing",
            name
        )));
    }

    let mean = present.iter().sum::<f64>() / present.len() as f64;
    Ok(raw.into_iter().map(|v| v.unwrap_or(mean)).collect())
}

/// Categorical column restricted to `rows`, missing cells replaced by the
/// most frequent category. Ties go to the category seen first.
fn categorical_column(
    dataset: &RawDataset,
    col: usize,
    rows: &[usize],
    name: &str,
) -> Result<Vec<String>> {
    let raw: Vec<Option<String>> = rows
        .iter()
        .map(|&r| {
            let v = &dataset.rows()[r][col];
            (!v.is_missing()).then(|| v.to_string())
        })
        .collect();

    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, v) in raw.iter().enumerate() {
        if let Some(v) = v {
            counts.entry(v.as_str()).or_insert((0, pos)).0 += 1;
        }
    }

    let mode = counts
        .iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
        .map(|(v, _)| v.to_string());

    let Some(mode) = mode else {
        return Err(ClusterError::config(format!(
            "cannot impute column '{}': every value is missing",
            name
        )));
    };

    Ok(raw.into_iter().map(|v| v.unwrap_or_else(|| mode.clone())).collect())
}

/// Indicator columns for every category except the lexicographically first.
fn one_hot(name: &str, values: &[String]) -> (Vec<String>, Matrix) {
    let categories: Vec<&str> = values
        .iter()
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .skip(1)
        .collect();

    let names = categories.iter().map(|c| format!("{}_{}", name, c)).collect();
    let mut block = Matrix::zeros((values.len(), categories.len()));
    for (i, v) in values.iter().enumerate() {
        if let Some(j) = categories.iter().position(|c| *c == v.as_str()) {
            block[[i, j]] = 1.0;
        }
    }

    (names, block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    fn mixed() -> RawDataset {
        RawDataset::new(
            names(&["age", "segment", "spend"]),
            vec![
                vec![20.0.into(), "gold".into(), 100.0.into()],
                vec![30.0.into(), "silver".into(), Value::Missing],
                vec![Value::Missing, "bronze".into(), 300.0.into()],
                vec![50.0.into(), Value::Missing, 400.0.into()],
                vec![40.0.into(), "silver".into(), 200.0.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_standard_scaler() {
        let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let mut scaler = StandardScaler::new();

        let scaled = scaler.fit_transform(&data).unwrap();
        assert_eq!(scaled.shape(), data.shape());
        for col in scaled.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(col.std(0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_standard_scaler_constant_column() {
        let data = array![[7.0], [7.0], [7.0]];
        let scaled = StandardScaler::new().fit_transform(&data).unwrap();
        assert_eq!(scaled, array![[0.0], [0.0], [0.0]]);
    }

    #[test]
    fn test_transform_requires_fit() {
        let data = array![[1.0]];
        assert!(StandardScaler::new().transform(&data).is_err());
        assert!(MinMaxScaler::new().transform(&data).is_err());
    }

    #[test]
    fn test_minmax_scaler() {
        let data = array![[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]];
        let scaled = MinMaxScaler::new().fit_transform(&data).unwrap();
        assert_eq!(scaled, array![[0.0, 0.0], [0.5, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_scaling_method_parsing() {
        assert_eq!("standard".parse::<ScalingMethod>().unwrap(), ScalingMethod::Standard);
        assert_eq!("minmax".parse::<ScalingMethod>().unwrap(), ScalingMethod::MinMax);
        assert_eq!("none".parse::<ScalingMethod>().unwrap(), ScalingMethod::Passthrough);

        let err = "zscore".parse::<ScalingMethod>().unwrap_err();
        assert!(matches!(err, ClusterError::Configuration(_)));
        assert!(err.to_string().contains("zscore"));
    }

    #[test]
    fn test_drop_missing_removes_incomplete_rows() {
        let ds = mixed();
        let fm = preprocess(&ds, ScalingMethod::Passthrough, true).unwrap();
        assert_eq!(fm.source_rows(), &[0, 4]);
        assert_eq!(fm.column("age").unwrap().to_vec(), vec![20.0, 40.0]);
        // Input is left untouched.
        assert_eq!(ds, mixed());
    }

    #[test]
    fn test_impute_numeric_mean_and_categorical_mode() {
        let fm = preprocess(&mixed(), ScalingMethod::Passthrough, false).unwrap();
        assert_eq!(fm.n_samples(), 5);
        assert_eq!(fm.column("age").unwrap()[2], 35.0);
        assert_eq!(fm.column("spend").unwrap()[1], 250.0);
        // "silver" is the most frequent segment.
        assert_eq!(fm.column("segment_silver").unwrap()[3], 1.0);
        assert_eq!(fm.column("segment_gold").unwrap()[3], 0.0);
    }

    #[test]
    fn test_mode_tie_goes_to_first_seen() {
        let ds = RawDataset::new(
            names(&["c"]),
            vec![
                vec!["b".into()],
                vec!["a".into()],
                vec![Value::Missing],
                vec!["c".into()],
            ],
        )
        .unwrap();
        let fm = preprocess(&ds, ScalingMethod::Passthrough, false).unwrap();
        assert_eq!(fm.columns(), &names(&["c_b", "c_c"])[..]);
        assert_eq!(fm.values().row(2).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_one_hot_drops_reference_category() {
        let fm = preprocess(&mixed(), ScalingMethod::Standard, true).unwrap();
        assert_eq!(
            fm.columns(),
            &names(&["age", "spend", "segment_silver"])[..]
        );

        let fm = preprocess(&mixed(), ScalingMethod::Standard, false).unwrap();
        assert_eq!(
            fm.columns(),
            &names(&["age", "spend", "segment_gold", "segment_silver"])[..]
        );
        for row in fm.values().axis_iter(Axis(0)) {
            let hot = row[2] + row[3];
            assert!(hot == 0.0 || hot == 1.0);
        }
    }

    #[test]
    fn test_indicators_are_never_scaled() {
        let fm = preprocess(&mixed(), ScalingMethod::Standard, false).unwrap();
        for x in fm.column("segment_silver").unwrap() {
            assert!(*x == 0.0 || *x == 1.0);
        }
        assert_abs_diff_eq!(fm.column("age").unwrap().mean().unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_minmax_preprocessing_bounds() {
        let fm = preprocess(&mixed(), ScalingMethod::MinMax, false).unwrap();
        let spend = fm.column("spend").unwrap();
        assert_eq!(spend.fold(f64::INFINITY, |a, &b| a.min(b)), 0.0);
        assert_eq!(spend.fold(f64::NEG_INFINITY, |a, &b| a.max(b)), 1.0);
    }

    #[test]
    fn test_all_missing_column_cannot_be_imputed() {
        let ds = RawDataset::new(
            names(&["x", "y"]),
            vec![
                vec![1.0.into(), Value::Missing],
                vec![2.0.into(), Value::Missing],
            ],
        )
        .unwrap();
        let err = preprocess(&ds, ScalingMethod::Passthrough, false).unwrap_err();
        assert!(matches!(err, ClusterError::Configuration(_)));

        let err = preprocess(&ds, ScalingMethod::Passthrough, true).unwrap_err();
        assert!(matches!(err, ClusterError::EmptyResult(_)));
    }

    #[test]
    fn test_indicator_name_collision_names_both_columns() {
        let ds = RawDataset::new(
            names(&["segment_gold", "segment"]),
            vec![
                vec![1.0.into(), "gold".into()],
                vec![2.0.into(), "silver".into()],
                vec![3.0.into(), "bronze".into()],
            ],
        )
        .unwrap();
        let err = preprocess(&ds, ScalingMethod::Passthrough, true).unwrap_err();
        assert!(matches!(err, ClusterError::Configuration(_)));
        let message = err.to_string();
        assert!(message.contains("'segment'"));
        assert!(message.contains("'segment_gold'"));
    }

    #[test]
    fn test_single_category_yields_no_features() {
        let rows = vec![vec!["only".into()], vec!["only".into()]];
        let ds = RawDataset::new(names(&["c"]), rows).unwrap();
        let err = preprocess(&ds, ScalingMethod::Standard, true).unwrap_err();
        assert!(matches!(err, ClusterError::EmptyResult(_)));
    }

    #[test]
    fn test_infinite_input_is_rejected() {
        let rows = vec![vec![1.0.into()], vec![f64::INFINITY.into()]];
        let ds = RawDataset::new(names(&["x"]), rows).unwrap();
        let err = preprocess(&ds, ScalingMethod::Passthrough, true).unwrap_err();
        assert!(matches!(err, ClusterError::Configuration(_)));
    }
}
