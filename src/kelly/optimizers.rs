//! # Kelly Optimizers
//!
//! $$
//! g(F) = r + F^\top(M-r) - \tfrac12 F^\top C F,\qquad
//! F^\*_{\text{unc}} = C^{-1}M,\qquad M_{\text{impl}} = C F
//! $$
//!
//! Closed-form and constrained growth-optimal weights, implied returns and
//! fractional Kelly scaling.

use nalgebra::DMatrix;
use nalgebra::DVector;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use super::covariance::CovarianceMatrix;
use super::qp::MAX_ITERATIONS;
use super::qp::QuadraticProgram;
use super::types::ExpectedReturns;
use super::types::WeightVector;
use crate::error::KellyError;
use crate::error::Result;

const BOUND_TOLERANCE: f64 = 1e-12;

fn check_aligned(mu: &ExpectedReturns, cov: &CovarianceMatrix) -> Result<()> {
  if mu.symbols() != cov.symbols() {
    return Err(KellyError::Data(format!(
      "expected returns {:?} do not match covariance assets {:?}",
      mu.symbols(),
      cov.symbols()
    )));
  }
  Ok(())
}

/// `F = C⁻¹ M` without any constraint; the result may short or lever.
pub fn optimize_unconstrained(mu: &ExpectedReturns, cov: &CovarianceMatrix) -> Result<WeightVector> {
  check_aligned(mu, cov)?;

  let chol = cov
    .matrix()
    .clone()
    .cholesky()
    .ok_or_else(|| KellyError::Numerical("covariance has no Cholesky factor".into()))?;
  let weights = chol.solve(mu.values());

  info!(
    total = weights.sum(),
    "unconstrained kelly weights computed"
  );

  WeightVector::new(cov.symbols().to_vec(), weights)
}

/// Per-asset position bounds as fractions of capital.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PositionBounds {
  /// Lower bound; `None` means no shorting (0). Negative values permit
  /// bounded shorts.
  pub min: Option<f64>,
  /// Upper bound; `None` leaves positions unbounded above.
  pub max: Option<f64>,
}

impl PositionBounds {
  pub fn lower(&self) -> f64 {
    self.min.unwrap_or(0.0)
  }

  /// Check the box against `Σ F = 1` for `n` assets.
  pub fn check_feasible(&self, n: usize) -> Result<()> {
    if n == 0 {
      return Err(KellyError::Data("no assets to allocate".into()));
    }

    let lower = self.lower();
    if !lower.is_finite() || self.max.is_some_and(|m| !m.is_finite()) {
      return Err(KellyError::Config("position bounds must be finite".into()));
    }

    let n = n as f64;
    if n * lower > 1.0 + BOUND_TOLERANCE {
      return Err(KellyError::Constraint(format!(
        "lower bounds sum to {} which exceeds full investment",
        n * lower
      )));
    }

    if let Some(max) = self.max {
      if max < lower {
        return Err(KellyError::Constraint(format!(
          "max_position_size {max} is below min_position_size {lower}"
        )));
      }
      if n * max < 1.0 - BOUND_TOLERANCE {
        return Err(KellyError::Constraint(format!(
          "upper bounds sum to {} which cannot reach full investment",
          n * max
        )));
      }
    }

    Ok(())
  }
}

/// Scaling of the quadratic program.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QpFormulation {
  /// `P = C / (1+r)²`, `q = -(M - r) / (1+r)`.
  #[default]
  Discounted,
  /// `P = C`, `q = -M`.
  Continuous,
}

/// Fully invested Kelly weights under box constraints.
///
/// Infeasible bounds are rejected before the solver runs.
pub fn optimize_constrained(
  mu: &ExpectedReturns,
  cov: &CovarianceMatrix,
  bounds: PositionBounds,
  annual_risk_free_rate: f64,
  formulation: QpFormulation,
) -> Result<WeightVector> {
  check_aligned(mu, cov)?;
  let n = cov.n_assets();
  bounds.check_feasible(n)?;

  let r = annual_risk_free_rate;
  if !r.is_finite() || r <= -1.0 {
    return Err(KellyError::Config(format!(
      "annual_risk_free_rate {r} must be finite and above -1"
    )));
  }

  let (p, q) = match formulation {
    QpFormulation::Discounted => {
      let d = 1.0 + r;
      (
        cov.matrix() / (d * d),
        -mu.values().add_scalar(-r) / d,
      )
    }
    QpFormulation::Continuous => (cov.matrix().clone(), -mu.values()),
  };

  // x >= lower, and x <= max when configured.
  let identity = DMatrix::<f64>::identity(n, n);
  let (g, h) = match bounds.max {
    Some(max) => {
      let mut g = DMatrix::zeros(2 * n, n);
      g.view_mut((0, 0), (n, n)).copy_from(&(-&identity));
      g.view_mut((n, 0), (n, n)).copy_from(&identity);
      let mut h = DVector::from_element(2 * n, max);
      h.rows_mut(0, n).fill(-bounds.lower());
      (g, h)
    }
    None => (-identity, DVector::from_element(n, -bounds.lower())),
  };
  let a = DMatrix::from_element(1, n, 1.0);
  let b = DVector::from_element(1, 1.0);

  let solution = QuadraticProgram::new(p, q, g, h, a, b)?.solve(MAX_ITERATIONS)?;

  info!(
    iterations = solution.iterations,
    formulation = ?formulation,
    "constrained kelly weights computed"
  );

  WeightVector::new(cov.symbols().to_vec(), solution.x)
}

/// Expected returns under which `weights` is the unconstrained optimum.
///
/// `weights` must name exactly the covariance assets in the same order.
pub fn implied_returns(cov: &CovarianceMatrix, weights: &WeightVector) -> Result<ExpectedReturns> {
  if weights.symbols() != cov.symbols() {
    return Err(KellyError::Config(format!(
      "position_sizes {:?} do not match covariance assets {:?}",
      weights.symbols(),
      cov.symbols()
    )));
  }

  ExpectedReturns::new(cov.symbols().to_vec(), cov.matrix() * weights.values())
}

/// Fractional Kelly: every weight multiplied by `fraction`.
pub fn scale_weights(weights: &WeightVector, fraction: f64) -> Result<WeightVector> {
  if !fraction.is_finite() {
    return Err(KellyError::Config("kelly_fraction must be finite".into()));
  }
  WeightVector::new(weights.symbols().to_vec(), weights.values() * fraction)
}
