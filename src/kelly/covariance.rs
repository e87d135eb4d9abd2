//! # Covariance
//!
//! $$
//! C = 252\cdot\widehat{\operatorname{Cov}}(R),\qquad
//! \rho_{ij}=\frac{C_{ij}}{\sqrt{C_{ii}C_{jj}}},\qquad
//! \kappa(C)=\frac{\lambda_{\max}}{\lambda_{\min}}
//! $$
//!
//! Annualised covariance estimation, positive-definiteness validation and
//! correlation derivation.

use nalgebra::DMatrix;
use nalgebra::SymmetricEigen;
use ndarray::Array2;
use ndarray_stats::CorrelationExt;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;
use tracing::info;
use tracing::warn;

use super::shrinkage::ledoit_wolf;
use super::types::PERIODS_PER_YEAR;
use super::types::ReturnsMatrix;
use super::types::serialize_labeled;
use crate::error::KellyError;
use crate::error::Result;

/// Condition number above which the covariance is reported as ill-conditioned.
pub const ILL_CONDITIONED: f64 = 1e6;

const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Covariance estimation method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CovarianceMethod {
  /// Unbiased sample covariance.
  #[default]
  Sample,
  /// Ledoit-Wolf shrinkage toward a scaled identity.
  LedoitWolf,
}

impl CovarianceMethod {
  pub fn from_shrinkage_flag(use_shrinkage: bool) -> Self {
    if use_shrinkage {
      Self::LedoitWolf
    } else {
      Self::Sample
    }
  }
}

/// Diagnostics gathered while validating a covariance matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CovarianceDiagnostics {
  /// `max|λ| / min|λ|`.
  pub condition_number: f64,
  pub min_eigenvalue: f64,
  pub max_eigenvalue: f64,
  /// Ledoit-Wolf intensity when the shrinkage estimator was used.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shrinkage: Option<f64>,
}

/// Symmetric, strictly positive definite, annualised covariance matrix.
///
/// Instances can only be obtained through validation, so optimizers never see a
/// singular or indefinite matrix.
#[derive(Clone, Debug)]
pub struct CovarianceMatrix {
  symbols: Vec<String>,
  matrix: DMatrix<f64>,
  diagnostics: CovarianceDiagnostics,
}

impl CovarianceMatrix {
  /// Validate a user supplied covariance matrix.
  pub fn new(symbols: Vec<String>, matrix: DMatrix<f64>) -> Result<Self> {
    Self::validate(symbols, matrix, None)
  }

  fn validate(symbols: Vec<String>, matrix: DMatrix<f64>, shrinkage: Option<f64>) -> Result<Self> {
    let n = symbols.len();
    if n == 0 {
      return Err(KellyError::Data("covariance needs at least one asset".into()));
    }
    if matrix.shape() != (n, n) {
      return Err(KellyError::Data(format!(
        "covariance is {}x{} but {} symbols were given",
        matrix.nrows(),
        matrix.ncols(),
        n
      )));
    }
    if matrix.iter().any(|c| !c.is_finite()) {
      return Err(KellyError::Data(
        "covariance contains non-finite values".into(),
      ));
    }

    let scale = matrix.amax().max(f64::MIN_POSITIVE);
    for i in 0..n {
      for j in (i + 1)..n {
        if (matrix[(i, j)] - matrix[(j, i)]).abs() > SYMMETRY_TOLERANCE * scale {
          return Err(KellyError::Numerical(format!(
            "covariance is not symmetric at ({}, {})",
            symbols[i], symbols[j]
          )));
        }
      }
    }

    let eigen = SymmetricEigen::try_new(matrix.clone(), f64::EPSILON, 10_000).ok_or_else(|| {
      KellyError::Numerical("eigen decomposition of the covariance did not converge".into())
    })?;
    let min_eigenvalue = eigen
      .eigenvalues
      .iter()
      .copied()
      .fold(f64::INFINITY, f64::min);
    let max_eigenvalue = eigen
      .eigenvalues
      .iter()
      .copied()
      .fold(f64::NEG_INFINITY, f64::max);
    let min_abs = eigen
      .eigenvalues
      .iter()
      .map(|l| l.abs())
      .fold(f64::INFINITY, f64::min);
    let max_abs = eigen.eigenvalues.amax();
    let condition_number = if min_abs > 0.0 {
      max_abs / min_abs
    } else {
      f64::INFINITY
    };

    info!(condition_number, min_eigenvalue, "covariance condition number");

    // Numerical rank cut-off: eigenvalues within n·ε·max|λ| of zero are zero.
    if min_eigenvalue <= n as f64 * f64::EPSILON * max_abs {
      return Err(KellyError::NotPositiveDefinite {
        min_eigenvalue,
        condition_number,
      });
    }
    if condition_number > ILL_CONDITIONED {
      warn!(
        condition_number,
        "covariance is ill-conditioned; consider the shrinkage estimator"
      );
    }

    Ok(Self {
      symbols,
      matrix,
      diagnostics: CovarianceDiagnostics {
        condition_number,
        min_eigenvalue,
        max_eigenvalue,
        shrinkage,
      },
    })
  }

  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn matrix(&self) -> &DMatrix<f64> {
    &self.matrix
  }

  pub fn diagnostics(&self) -> &CovarianceDiagnostics {
    &self.diagnostics
  }

  pub fn condition_number(&self) -> f64 {
    self.diagnostics.condition_number
  }

  pub fn n_assets(&self) -> usize {
    self.symbols.len()
  }
}

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
  DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Annualised covariance of excess returns, validated for positive definiteness.
pub fn annualized_covariance(
  returns: &ReturnsMatrix,
  method: CovarianceMethod,
) -> Result<CovarianceMatrix> {
  let periods = returns.n_periods();
  if periods < 2 {
    return Err(KellyError::Data(format!(
      "covariance needs at least 2 return periods, got {periods}"
    )));
  }

  let (periodic, shrinkage) = match method {
    CovarianceMethod::Sample => {
      let cov = returns
        .values()
        .t()
        .cov(1.0)
        .map_err(|e| KellyError::Data(format!("sample covariance failed: {e}")))?;
      (cov, None)
    }
    CovarianceMethod::LedoitWolf => {
      let fit = ledoit_wolf(returns.values().view())?;
      info!(shrinkage = fit.shrinkage, "ledoit-wolf shrinkage intensity");
      (fit.covariance, Some(fit.shrinkage))
    }
  };

  let annual = to_dmatrix(&periodic) * PERIODS_PER_YEAR;
  // Matrix products are symmetric only up to rounding.
  let annual = (&annual + annual.transpose()) * 0.5;

  info!(
    periods,
    assets = returns.n_assets(),
    method = ?method,
    "estimated annualised covariance"
  );

  CovarianceMatrix::validate(returns.symbols().to_vec(), annual, shrinkage)
}

/// Correlation matrix derived from a covariance matrix.
#[derive(Clone, Debug)]
pub struct CorrelationMatrix {
  symbols: Vec<String>,
  matrix: DMatrix<f64>,
}

impl CorrelationMatrix {
  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn matrix(&self) -> &DMatrix<f64> {
    &self.matrix
  }
}

/// `ρ = C / (σ σᵀ)`; exact-zero covariances map to exact-zero correlations.
pub fn correlation_from_covariance(cov: &CovarianceMatrix) -> CorrelationMatrix {
  let c = cov.matrix();
  let sd = c.diagonal().map(f64::sqrt);
  let outer = &sd * sd.transpose();

  let matrix = DMatrix::from_fn(c.nrows(), c.ncols(), |i, j| {
    if c[(i, j)] == 0.0 {
      0.0
    } else {
      c[(i, j)] / outer[(i, j)]
    }
  });

  CorrelationMatrix {
    symbols: cov.symbols().to_vec(),
    matrix,
  }
}

struct LabeledRow<'a> {
  symbols: &'a [String],
  matrix: &'a DMatrix<f64>,
  row: usize,
}

impl Serialize for LabeledRow<'_> {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serialize_labeled(
      self.symbols,
      self.matrix.row(self.row).iter().copied(),
      serializer,
    )
  }
}

fn serialize_labeled_matrix<S: Serializer>(
  symbols: &[String],
  matrix: &DMatrix<f64>,
  serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
  let mut map = serializer.serialize_map(Some(symbols.len()))?;
  for (row, symbol) in symbols.iter().enumerate() {
    map.serialize_entry(
      symbol,
      &LabeledRow {
        symbols,
        matrix,
        row,
      },
    )?;
  }
  map.end()
}

impl Serialize for CovarianceMatrix {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serialize_labeled_matrix(&self.symbols, &self.matrix, serializer)
  }
}

impl Serialize for CorrelationMatrix {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serialize_labeled_matrix(&self.symbols, &self.matrix, serializer)
  }
}
