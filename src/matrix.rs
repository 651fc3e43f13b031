//! Dense matrices and element-wise / product arithmetic
//!
//! A 1-D input is stored as an n x 1 column but remembers that it was a
//! vector, so results built from it come back as flat arrays.

use std::fmt;
use std::ops::Index;

use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{MathError, MathResult};
use crate::value::{serialize_number, Value};

/// Raw matrix data as callers supply it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MatrixInput {
    Vector(Vec<f64>),
    Grid(Vec<Vec<f64>>),
}

/// Rectangular, row-major matrix of `f64`
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    vector: bool,
}

impl Matrix {
    /// Build from rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> MathResult<Self> {
        let row_count = rows.len();
        let cols = rows.first().map_or(0, Vec::len);

        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(MathError::shape(
                    format!("row {} to have {} elements", i, cols),
                    format!("{} elements", row.len()),
                ));
            }
        }

        Ok(Self {
            rows: row_count,
            cols,
            data: rows.into_iter().flatten().collect(),
            vector: false,
        })
    }

    /// Build a column vector
    pub fn from_vector(values: Vec<f64>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values,
            vector: true,
        }
    }

    pub fn from_input(input: MatrixInput) -> MathResult<Self> {
        match input {
            MatrixInput::Vector(values) => Ok(Self::from_vector(values)),
            MatrixInput::Grid(rows) => Self::from_rows(rows),
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
            vector: false,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_vector(&self) -> bool {
        self.vector
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Row-major element storage
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub(crate) fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for col in 0..self.cols {
            self.data.swap(a * self.cols + col, b * self.cols + col);
        }
    }

    /// Human-readable shape for error messages
    pub fn describe_shape(&self) -> String {
        if self.vector {
            format!("vector of length {}", self.rows)
        } else {
            format!("{}x{} matrix", self.rows, self.cols)
        }
    }

    /// Apply `f` to every element
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            data: self.data.iter().map(|&x| f(x)).collect(),
            ..self.clone()
        }
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| x * factor)
    }

    /// Element-wise sum; shapes must be identical
    pub fn add(&self, other: &Matrix) -> MathResult<Matrix> {
        if self.shape() != other.shape() {
            return Err(MathError::shape(
                self.describe_shape(),
                other.describe_shape(),
            ));
        }

        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect(),
            vector: self.vector && other.vector,
        })
    }

    /// Matrix product; inner dimensions must match
    pub fn matmul(&self, other: &Matrix) -> MathResult<Matrix> {
        if self.cols != other.rows {
            return Err(MathError::shape(
                format!("{} rows on the right operand", self.cols),
                format!("{} times {}", self.describe_shape(), other.describe_shape()),
            ));
        }

        let mut result = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for j in 0..other.cols {
                let sum = (0..self.cols)
                    .map(|k| self[(i, k)] * other[(k, j)])
                    .sum::<f64>();
                result.set(i, j, sum);
            }
        }
        result.vector = other.vector;
        Ok(result)
    }

    fn dot(&self, other: &Matrix) -> MathResult<f64> {
        if self.data.len() != other.data.len() {
            return Err(MathError::shape(
                self.describe_shape(),
                other.describe_shape(),
            ));
        }
        Ok(self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum::<f64>())
    }

    /// Row vector times matrix, returned as a vector
    fn row_times(&self, other: &Matrix) -> MathResult<Matrix> {
        if self.rows != other.rows {
            return Err(MathError::shape(
                format!("a vector of length {}", other.rows),
                self.describe_shape(),
            ));
        }

        let values: Vec<f64> = (0..other.cols)
            .map(|j| (0..other.rows).map(|k| self.data[k] * other[(k, j)]).sum::<f64>())
            .collect();
        Ok(Matrix::from_vector(values))
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.cols + col]
    }
}

struct Number(f64);

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_number(self.0, serializer)
    }
}

struct Row<'a>(&'a [f64]);

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for &value in self.0 {
            seq.serialize_element(&Number(value))?;
        }
        seq.end()
    }
}

impl Serialize for Matrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.vector {
            return Row(&self.data).serialize(serializer);
        }
        let mut seq = serializer.serialize_seq(Some(self.rows))?;
        for r in 0..self.rows {
            seq.serialize_element(&Row(self.row(r)))?;
        }
        seq.end()
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, row: &[f64]) -> fmt::Result {
    f.write_str("[")?;
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(&crate::ast::format_number(*value))?;
    }
    f.write_str("]")
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vector {
            return write_row(f, &self.data);
        }
        f.write_str("[")?;
        for r in 0..self.rows {
            if r > 0 {
                f.write_str(", ")?;
            }
            write_row(f, self.row(r))?;
        }
        f.write_str("]")
    }
}

/// Validate and build a matrix from raw data
pub fn create_matrix(input: MatrixInput) -> MathResult<Matrix> {
    Matrix::from_input(input)
}

/// Element-wise addition; a scalar operand is broadcast over the other
pub fn matrix_add(a: &Value, b: &Value) -> MathResult<Value> {
    match (a, b) {
        (Value::Scalar(x), Value::Scalar(y)) => Ok(Value::Scalar(x + y)),
        (Value::Scalar(s), Value::Matrix(m)) | (Value::Matrix(m), Value::Scalar(s)) => {
            let s = *s;
            Ok(Value::Matrix(m.map(|x| x + s)))
        }
        (Value::Matrix(m), Value::Matrix(n)) => m.add(n).map(Value::Matrix),
    }
}

/// Products: scalar x matrix, matrix x matrix, matrix x vector,
/// vector x matrix and vector . vector (a scalar)
pub fn matrix_multiply(a: &Value, b: &Value) -> MathResult<Value> {
    match (a, b) {
        (Value::Scalar(x), Value::Scalar(y)) => Ok(Value::Scalar(x * y)),
        (Value::Scalar(s), Value::Matrix(m)) | (Value::Matrix(m), Value::Scalar(s)) => {
            Ok(Value::Matrix(m.scale(*s)))
        }
        (Value::Matrix(m), Value::Matrix(n)) => match (m.is_vector(), n.is_vector()) {
            (true, true) => m.dot(n).map(Value::Scalar),
            (true, false) => m.row_times(n).map(Value::Matrix),
            _ => m.matmul(n).map(Value::Matrix),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: Vec<Vec<f64>>) -> Value {
        Value::Matrix(Matrix::from_rows(rows).unwrap())
    }

    fn vector(values: Vec<f64>) -> Value {
        Value::Matrix(Matrix::from_vector(values))
    }

    #[test]
    fn test_create_matrix() {
        let m = create_matrix(MatrixInput::Grid(vec![vec![1.0, 2.0], vec![3.0, 4.0]])).unwrap();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(1, 0)], 3.0);

        let v = create_matrix(MatrixInput::Vector(vec![1.0, 2.0, 3.0])).unwrap();
        assert!(v.is_vector());
        assert_eq!(v.shape(), (3, 1));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(err.kind(), "ShapeError");
    }

    #[test]
    fn test_add() {
        let sum = matrix_add(
            &grid(vec![vec![1.0, 2.0], vec![3.0, 4.0]]),
            &grid(vec![vec![5.0, 6.0], vec![7.0, 8.0]]),
        )
        .unwrap();
        assert_eq!(sum, grid(vec![vec![6.0, 8.0], vec![10.0, 12.0]]));

        let sum = matrix_add(&vector(vec![1.0, 2.0, 3.0]), &vector(vec![4.0, 5.0, 6.0])).unwrap();
        assert_eq!(sum, vector(vec![5.0, 7.0, 9.0]));
    }

    #[test]
    fn test_add_shape_mismatch() {
        let err = matrix_add(
            &grid(vec![vec![1.0, 2.0]]),
            &grid(vec![vec![1.0], vec![2.0]]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MathError::shape("1x2 matrix", "2x1 matrix")
        );
    }

    #[test]
    fn test_multiply_variants() {
        let a = grid(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let product = matrix_multiply(&a, &grid(vec![vec![5.0, 6.0], vec![7.0, 8.0]])).unwrap();
        assert_eq!(product, grid(vec![vec![19.0, 22.0], vec![43.0, 50.0]]));

        let product = matrix_multiply(&a, &vector(vec![5.0, 6.0])).unwrap();
        assert_eq!(product, vector(vec![17.0, 39.0]));

        let product = matrix_multiply(&a, &Value::Scalar(2.0)).unwrap();
        assert_eq!(product, grid(vec![vec![2.0, 4.0], vec![6.0, 8.0]]));

        let product = matrix_multiply(&vector(vec![1.0, 1.0]), &a).unwrap();
        assert_eq!(product, vector(vec![4.0, 6.0]));

        let product = matrix_multiply(&vector(vec![1.0, 2.0]), &vector(vec![3.0, 4.0])).unwrap();
        assert_eq!(product, Value::Scalar(11.0));
    }

    #[test]
    fn test_multiply_inner_dimension_mismatch() {
        let err = matrix_multiply(
            &grid(vec![vec![1.0, 2.0, 3.0]]),
            &grid(vec![vec![1.0, 2.0]]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ShapeError");
    }

    #[test]
    fn test_display_and_json() {
        let m = Matrix::from_rows(vec![vec![1.0, 2.5], vec![f64::INFINITY, 4.0]]).unwrap();
        assert_eq!(m.to_string(), "[[1, 2.5], [Infinity, 4]]");
        assert_eq!(
            serde_json::to_string(&m).unwrap(),
            r#"[[1.0,2.5],["Infinity",4.0]]"#
        );
        assert_eq!(Matrix::from_vector(vec![1.0, 2.0]).to_string(), "[1, 2]");
    }

    #[test]
    fn test_input_deserializes_both_layouts() {
        let grid: MatrixInput = serde_json::from_str("[[1, 2], [3, 4]]").unwrap();
        let flat: MatrixInput = serde_json::from_str("[1, 2]").unwrap();
        assert!(matches!(grid, MatrixInput::Grid(_)));
        assert_eq!(flat, MatrixInput::Vector(vec![1.0, 2.0]));
    }
}
