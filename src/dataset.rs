use crate::error::{ClusterError, Result};
use crate::Matrix;
use ndarray::Axis;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single cell of a raw table.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// NaN numbers count as missing, the same way a float column stores nulls.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Number(x) => x.is_nan(),
            Value::Text(_) => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(x) if !x.is_nan() => Some(*x),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(x) if x.is_nan() => Ok(()),
            Value::Number(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Missing => Ok(()),
        }
    }
}

/// Tabular input as loaded from the outside world. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RawDataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if columns.is_empty() || rows.is_empty() {
            return Err(ClusterError::empty(format!(
                "dataset must have at least one row and one column, got {} rows and {} columns",
                rows.len(),
                columns.len()
            )));
        }

        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ClusterError::config(format!("duplicate column name '{}'", name)));
            }
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ClusterError::config(format!(
                    "row {} has {} values but the dataset has {} columns",
                    i,
                    row.len(),
                    columns.len()
                )));
            }
        }

        Ok(Self { columns, rows })
    }

    /// Builds a dataset from name-to-value records; absent keys become `Missing`.
    pub fn from_records(
        columns: Vec<String>,
        records: Vec<HashMap<String, Value>>,
    ) -> Result<Self> {
        let mut rows = Vec::with_capacity(records.len());
        for (i, mut record) in records.into_iter().enumerate() {
            let row: Vec<Value> = columns
                .iter()
                .map(|c| record.remove(c).unwrap_or(Value::Missing))
                .collect();
            if let Some(unknown) = record.keys().next() {
                return Err(ClusterError::config(format!(
                    "record {} has unknown column '{}'",
                    i, unknown
                )));
            }
            rows.push(row);
        }
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Returns a copy with one more trailing column.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Self> {
        if self.column_index(name).is_some() {
            return Err(ClusterError::config(format!("column '{}' already exists", name)));
        }
        if values.len() != self.n_rows() {
            return Err(ClusterError::config(format!(
                "new column '{}' has {} values but the dataset has {} rows",
                name,
                values.len(),
                self.n_rows()
            )));
        }

        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, v)| {
                let mut row = row.clone();
                row.push(v);
                row
            })
            .collect();

        Ok(Self { columns, rows })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnRole {
    Numeric,
    Categorical,
}

/// Numeric/categorical split of one dataset's columns, in column order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl ColumnRoles {
    pub fn of(dataset: &RawDataset) -> Self {
        let mut roles = ColumnRoles::default();
        for (idx, name) in dataset.columns().iter().enumerate() {
            match infer_role(dataset, idx) {
                ColumnRole::Numeric => roles.numeric.push(name.clone()),
                ColumnRole::Categorical => roles.categorical.push(name.clone()),
            }
        }
        roles
    }

    pub fn role(&self, column: &str) -> Option<ColumnRole> {
        if self.numeric.iter().any(|c| c == column) {
            Some(ColumnRole::Numeric)
        } else if self.categorical.iter().any(|c| c == column) {
            Some(ColumnRole::Categorical)
        } else {
            None
        }
    }
}

/// A column is numeric unless some non-missing cell holds text.
fn infer_role(dataset: &RawDataset, idx: usize) -> ColumnRole {
    if dataset.column(idx).any(|v| matches!(v, Value::Text(_))) {
        ColumnRole::Categorical
    } else {
        ColumnRole::Numeric
    }
}

pub fn numeric_columns(dataset: &RawDataset) -> Vec<String> {
    ColumnRoles::of(dataset).numeric
}

pub fn categorical_columns(dataset: &RawDataset) -> Vec<String> {
    ColumnRoles::of(dataset).categorical
}

/// Dense, fully numeric input for clustering.
///
/// Every value is finite, the feature names are unique and match the column
/// count, and `source_rows[i]` is the index of the raw row that produced row `i`.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Matrix,
    source_rows: Vec<usize>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Matrix, source_rows: Vec<usize>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(ClusterError::config(format!(
                "{} feature names given for {} columns",
                columns.len(),
                values.ncols()
            )));
        }
        if source_rows.len() != values.nrows() {
            return Err(ClusterError::config(format!(
                "{} source row indices given for {} rows",
                source_rows.len(),
                values.nrows()
            )));
        }

        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ClusterError::config(format!("duplicate feature name '{}'", name)));
            }
        }

        for (j, column) in values.axis_iter(Axis(1)).enumerate() {
            if column.iter().any(|x| !x.is_finite()) {
                return Err(ClusterError::config(format!(
                    "feature '{}' contains a non-finite value",
                    columns[j]
                )));
            }
        }

        Ok(Self { columns, values, source_rows })
    }

    /// Wraps an existing matrix whose rows map one-to-one onto source rows.
    pub fn from_array(columns: Vec<String>, values: Matrix) -> Result<Self> {
        let source_rows = (0..values.nrows()).collect();
        Self::new(columns, values, source_rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Matrix {
        &self.values
    }

    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    pub fn column(&self, name: &str) -> Option<ndarray::ArrayView1<'_, f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.values.column(idx))
    }

    /// Restricts the matrix to the named features, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Err(ClusterError::config("at least one feature must be selected"));
        }

        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let idx = self
                .columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| ClusterError::config(format!("unknown feature '{}'", name)))?;
            indices.push(idx);
        }

        let values = self.values.select(Axis(1), &indices);
        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        Self::new(columns, values, self.source_rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> RawDataset {
        RawDataset::new(
            names(&["age", "city", "income"]),
            vec![
                vec![25.0.into(), "Oslo".into(), 40.0.into()],
                vec![Value::Missing, "Rome".into(), 52.5.into()],
                vec![31.0.into(), Value::Missing, Value::Missing],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_dataset_creation() {
        let ds = sample();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.n_columns(), 3);
        assert_eq!(ds.value(1, "city"), Some(&Value::Text("Rome".into())));
    }

    #[test]
    fn test_dataset_rejects_bad_shapes() {
        let dup = RawDataset::new(names(&["a", "a"]), vec![vec![1.0.into(), 2.0.into()]]);
        assert!(matches!(dup, Err(ClusterError::Configuration(_))));

        let ragged = RawDataset::new(names(&["a", "b"]), vec![vec![1.0.into()]]);
        assert!(matches!(ragged, Err(ClusterError::Configuration(_))));

        let empty = RawDataset::new(names(&["a"]), vec![]);
        assert!(matches!(empty, Err(ClusterError::EmptyResult(_))));
    }

    #[test]
    fn test_from_records_fills_missing() {
        let mut r0 = HashMap::new();
        r0.insert("x".to_string(), Value::Number(1.0));
        let mut r1 = HashMap::new();
        r1.insert("y".to_string(), Value::from("a"));
        let ds = RawDataset::from_records(names(&["x", "y"]), vec![r0, r1]).unwrap();
        assert_eq!(ds.rows()[0][1], Value::Missing);
        assert_eq!(ds.rows()[1][0], Value::Missing);

        let mut bad = HashMap::new();
        bad.insert("z".to_string(), Value::Number(1.0));
        assert!(RawDataset::from_records(names(&["x"]), vec![bad]).is_err());
    }

    #[test]
    fn test_column_roles() {
        let ds = sample();
        assert_eq!(numeric_columns(&ds), names(&["age", "income"]));
        assert_eq!(categorical_columns(&ds), names(&["city"]));
        assert_eq!(ColumnRoles::of(&ds).role("city"), Some(ColumnRole::Categorical));
    }

    #[test]
    fn test_roles_follow_the_dataset_passed_in() {
        let first = sample();
        let second = RawDataset::new(names(&["city"]), vec![vec![1.0.into()]]).unwrap();
        assert_eq!(categorical_columns(&first), names(&["city"]));
        assert_eq!(categorical_columns(&second), Vec::<String>::new());
        assert_eq!(numeric_columns(&second), names(&["city"]));
    }

    #[test]
    fn test_nan_counts_as_missing() {
        assert!(Value::Number(f64::NAN).is_missing());
        assert_eq!(Value::Number(f64::NAN).as_number(), None);
        assert_eq!(Value::from(None::<f64>), Value::Missing);
    }

    #[test]
    fn test_with_column_copies() {
        let ds = sample();
        let labelled = ds
            .with_column("tag", vec![1.0.into(), 2.0.into(), Value::Missing])
            .unwrap();
        assert_eq!(labelled.n_columns(), 4);
        assert_eq!(ds.n_columns(), 3);
        assert!(ds.with_column("age", vec![Value::Missing; 3]).is_err());
        assert!(ds.with_column("tag", vec![Value::Missing; 2]).is_err());
    }

    #[test]
    fn test_feature_matrix_invariants() {
        let ok = FeatureMatrix::from_array(names(&["a", "b"]), array![[1.0, 2.0], [3.0, 4.0]]);
        assert!(ok.is_ok());

        let wrong_names = FeatureMatrix::from_array(names(&["a"]), array![[1.0, 2.0]]);
        assert!(wrong_names.is_err());

        let infinite = FeatureMatrix::from_array(names(&["a"]), array![[f64::INFINITY]]);
        assert!(matches!(infinite, Err(ClusterError::Configuration(_))));
    }

    #[test]
    fn test_select_features() {
        let fm = FeatureMatrix::new(
            names(&["a", "b", "c"]),
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            vec![0, 2],
        )
        .unwrap();

        let picked = fm.select(&["c", "a"]).unwrap();
        assert_eq!(picked.columns(), &names(&["c", "a"])[..]);
        assert_eq!(picked.values(), &array![[3.0, 1.0], [6.0, 4.0]]);
        assert_eq!(picked.source_rows(), &[0, 2]);

        assert!(fm.select(&["missing"]).is_err());
        assert!(fm.select::<&str>(&[]).is_err());
    }
}
