//! # Errors
//!
//! $$
//! \text{stage}_k:\ \text{input}\to\text{Result}\langle\text{output},\ \text{KellyError}\rangle
//! $$
//!
//! Typed failures raised by every stage of the allocation pipeline.

use thiserror::Error;

/// Errors raised by the allocation pipeline.
///
/// Every variant is fatal for the computation that raised it; the library never
/// retries or returns partial results.
#[derive(Debug, Error)]
pub enum KellyError {
  /// Required configuration field missing or malformed.
  #[error("configuration error: {0}")]
  Config(String),

  /// Price or return table is too short, misaligned or non-finite.
  #[error("data error: {0}")]
  Data(String),

  /// Covariance matrix is not positive definite.
  #[error(
    "covariance matrix is not positive definite (min eigenvalue {min_eigenvalue:e}, condition number {condition_number:e})"
  )]
  NotPositiveDefinite {
    min_eigenvalue: f64,
    condition_number: f64,
  },

  /// Any other numerical failure (singular system, failed decomposition).
  #[error("numerical error: {0}")]
  Numerical(String),

  /// Position bounds cannot be satisfied together with full investment.
  #[error("infeasible constraints: {0}")]
  Constraint(String),

  /// The QP solver stopped without reaching an optimum.
  #[error("solver error after {iterations} iterations: {reason}")]
  Solver { iterations: usize, reason: String },

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Csv(#[from] csv::Error),
}

impl KellyError {
  /// `true` for failures caused by an unusable covariance matrix.
  pub fn is_numerical(&self) -> bool {
    matches!(
      self,
      KellyError::NotPositiveDefinite { .. } | KellyError::Numerical(_)
    )
  }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, KellyError>;
