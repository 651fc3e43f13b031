//! Linear system solving by LU decomposition with partial pivoting

use std::collections::BTreeMap;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{MathError, MathResult};
use crate::matrix::Matrix;

/// Packed LU factors of a square matrix, `P A = L U`.
///
/// `L` has an implicit unit diagonal and lives below the diagonal of `lu`;
/// `U` occupies the diagonal and above.
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    lu: Matrix,
    permutation: Vec<usize>,
}

impl LuDecomposition {
    pub fn decompose(a: &Matrix, pivot_epsilon: f64) -> MathResult<Self> {
        if !a.is_square() {
            return Err(MathError::shape("a square coefficient matrix", a.describe_shape()));
        }

        let n = a.rows();
        let mut lu = a.clone();
        let mut permutation: Vec<usize> = (0..n).collect();

        for k in 0..n {
            let mut pivot_row = k;
            for i in k + 1..n {
                if lu[(i, k)].abs() > lu[(pivot_row, k)].abs() {
                    pivot_row = i;
                }
            }

            let pivot = lu[(pivot_row, k)];
            // NaN pivots fail this comparison too
            if !(pivot.abs() >= pivot_epsilon) {
                return Err(MathError::SingularMatrix { pivot, column: k });
            }

            if pivot_row != k {
                trace!("column {}: swapping rows {} and {}", k, k, pivot_row);
                lu.swap_rows(k, pivot_row);
                permutation.swap(k, pivot_row);
            }

            for i in k + 1..n {
                let factor = lu[(i, k)] / lu[(k, k)];
                lu.set(i, k, factor);
                for j in k + 1..n {
                    let value = lu[(i, j)] - factor * lu[(k, j)];
                    lu.set(i, j, value);
                }
            }
        }

        Ok(Self { lu, permutation })
    }

    pub fn dimension(&self) -> usize {
        self.lu.rows()
    }

    /// Solve `A x = b` for one right-hand side
    pub fn solve(&self, b: &[f64]) -> MathResult<Vec<f64>> {
        let n = self.dimension();
        if b.len() != n {
            return Err(MathError::shape(
                format!("a constants vector of length {}", n),
                format!("length {}", b.len()),
            ));
        }

        // Forward substitution with the unit lower triangle
        let mut y = vec![0.0; n];
        for i in 0..n {
            let sum: f64 = (0..i).map(|j| self.lu[(i, j)] * y[j]).sum();
            y[i] = b[self.permutation[i]] - sum;
        }

        // Back substitution with the upper triangle
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let sum: f64 = (i + 1..n).map(|j| self.lu[(i, j)] * x[j]).sum();
            x[i] = (y[i] - sum) / self.lu[(i, i)];
        }

        Ok(x)
    }
}

/// Replace values within `tolerance` of an integer by that integer
pub fn snap_to_integers(values: &mut [f64], tolerance: f64) {
    for value in values.iter_mut() {
        let rounded = value.round();
        if (*value - rounded).abs() < tolerance {
            // avoid handing out -0
            *value = if rounded == 0.0 { 0.0 } else { rounded };
        }
    }
}

/// Solve `A x = b`, snapping near-integer entries of `x`
pub fn solve_linear_system(a: &Matrix, b: &[f64], config: &EngineConfig) -> MathResult<Vec<f64>> {
    if !a.is_square() {
        return Err(MathError::shape("a square coefficient matrix", a.describe_shape()));
    }
    if b.len() != a.rows() {
        return Err(MathError::shape(
            format!("a constants vector of length {}", a.rows()),
            format!("length {}", b.len()),
        ));
    }

    debug!("solving {}x{} linear system", a.rows(), a.cols());
    let lu = LuDecomposition::decompose(a, config.pivot_epsilon)?;
    let mut x = lu.solve(b)?;
    snap_to_integers(&mut x, config.snap_tolerance);
    Ok(x)
}

/// An equation system as callers submit it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EquationSystem {
    /// Textual equations such as `2x + y = 5`; not supported
    Equations(Vec<String>),
    Coefficients {
        coefficients: Vec<Vec<f64>>,
        constants: Vec<f64>,
    },
}

/// Solution vector, optionally keyed by variable name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Solution {
    Values(Vec<f64>),
    Named(BTreeMap<String, f64>),
}

impl Solution {
    /// Attach names to a solution vector; an empty name list keeps it positional.
    pub fn from_values(values: Vec<f64>, names: Option<&[String]>) -> MathResult<Self> {
        match names {
            Some(names) if !names.is_empty() => {
                if names.len() != values.len() {
                    return Err(MathError::shape(
                        format!("{} variable names", values.len()),
                        format!("{} names", names.len()),
                    ));
                }
                Ok(Solution::Named(names.iter().cloned().zip(values).collect()))
            }
            _ => Ok(Solution::Values(values)),
        }
    }

    pub fn values(&self) -> Vec<f64> {
        match self {
            Solution::Values(values) => values.clone(),
            Solution::Named(map) => map.values().copied().collect(),
        }
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Solution::Values(values) => {
                let parts: Vec<String> = values.iter().map(|v| crate::ast::format_number(*v)).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Solution::Named(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(name, v)| format!("{} = {}", name, crate::ast::format_number(*v)))
                    .collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

/// Solve a coefficient-form system; textual equations are rejected
pub fn solve_equation_system(
    system: &EquationSystem,
    names: Option<&[String]>,
    config: &EngineConfig,
) -> MathResult<Solution> {
    match system {
        EquationSystem::Equations(_) => Err(MathError::not_implemented(
            "solving systems given as equation strings",
        )),
        EquationSystem::Coefficients {
            coefficients,
            constants,
        } => {
            let a = Matrix::from_rows(coefficients.clone())?;
            let x = solve_linear_system(&a, constants, config)?;
            Solution::from_values(x, names)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn matrix(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_solve_2x2() {
        let a = matrix(vec![vec![2.0, 1.0], vec![1.0, 3.0]]);
        let x = solve_linear_system(&a, &[5.0, 7.0], &EngineConfig::default()).unwrap();
        assert_eq!(x, vec![1.6, 1.8]);
    }

    #[test]
    fn test_solve_upper_triangular_snaps_to_integers() {
        let a = matrix(vec![
            vec![1.0, 1.0, 1.0],
            vec![0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0],
        ]);
        let x = solve_linear_system(&a, &[6.0, 4.0, 3.0], &EngineConfig::default()).unwrap();
        assert_eq!(x, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_pivoting_handles_zero_leading_entry() {
        let a = matrix(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
        let x = solve_linear_system(&a, &[3.0, 4.0], &EngineConfig::default()).unwrap();
        assert_eq!(x, vec![4.0, 3.0]);
    }

    #[test]
    fn test_singular() {
        let a = matrix(vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
        let err = solve_linear_system(&a, &[1.0, 3.0], &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, MathError::SingularMatrix { column: 1, .. }));
    }

    #[test]
    fn test_shape_errors() {
        let a = matrix(vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
        let err = solve_linear_system(&a, &[1.0, 3.0, 5.0], &EngineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "ShapeError");

        let wide = matrix(vec![vec![1.0, 2.0, 3.0]]);
        let err = solve_linear_system(&wide, &[1.0], &EngineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "ShapeError");
    }

    #[test]
    fn test_decomposition_reused_for_several_right_hand_sides() {
        let a = matrix(vec![vec![4.0, 3.0], vec![6.0, 3.0]]);
        let lu = LuDecomposition::decompose(&a, 1e-12).unwrap();
        let x = lu.solve(&[10.0, 12.0]).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-12);
        let x = lu.solve(&[7.0, 9.0]).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_snap_to_integers() {
        let mut values = vec![1.99999999999, 2.5, -1e-13, 3.0000001];
        snap_to_integers(&mut values, 1e-10);
        assert_eq!(values, vec![2.0, 2.5, 0.0, 3.0000001]);
        assert!(values[2].is_sign_positive());
    }

    #[test]
    fn test_equation_system_with_names() {
        let system = EquationSystem::Coefficients {
            coefficients: vec![vec![1.0, 1.0, 1.0], vec![0.0, 1.0, 1.0], vec![0.0, 0.0, 1.0]],
            constants: vec![6.0, 4.0, 3.0],
        };
        let names: Vec<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        let solution = solve_equation_system(&system, Some(names.as_slice()), &EngineConfig::default()).unwrap();
        let expected: BTreeMap<String, f64> = names.iter().cloned().zip([2.0, 1.0, 3.0]).collect();
        assert_eq!(solution, Solution::Named(expected));
        assert_eq!(solution.to_string(), "x = 2, y = 1, z = 3");
    }

    #[test]
    fn test_equation_system_name_count_mismatch() {
        let system = EquationSystem::Coefficients {
            coefficients: vec![vec![2.0, 1.0], vec![1.0, 3.0]],
            constants: vec![5.0, 7.0],
        };
        let names = vec!["x".to_string()];
        let err = solve_equation_system(&system, Some(names.as_slice()), &EngineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "ShapeError");
    }

    #[test]
    fn test_textual_equations_not_implemented() {
        let system = EquationSystem::Equations(vec!["2x + y = 5".to_string()]);
        let err = solve_equation_system(&system, None, &EngineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "NotImplementedError");
    }

    #[test]
    fn test_equation_system_json() {
        let coefficients: EquationSystem =
            serde_json::from_str(r#"{ "coefficients": [[2, 1], [1, 3]], "constants": [5, 7] }"#).unwrap();
        assert!(matches!(coefficients, EquationSystem::Coefficients { .. }));
        let text: EquationSystem = serde_json::from_str(r#"["x + y = 1"]"#).unwrap();
        assert!(matches!(text, EquationSystem::Equations(_)));
    }
}
