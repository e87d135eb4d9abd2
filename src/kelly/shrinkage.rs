//! # Ledoit-Wolf Shrinkage
//!
//! $$
//! \hat\Sigma = (1-\delta)S + \delta\,\mu I,\qquad \mu=\frac{\operatorname{tr}S}{p}
//! $$
//!
//! Analytical shrinkage toward a scaled identity (Ledoit & Wolf, 2004). Returns
//! are centred and the empirical covariance uses the `1/n` normalisation.

use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;

use crate::error::KellyError;
use crate::error::Result;

/// Shrunk covariance together with the intensity that produced it.
#[derive(Clone, Debug)]
pub struct ShrunkCovariance {
  pub covariance: Array2<f64>,
  /// Weight `δ ∈ [0, 1]` placed on the scaled identity target.
  pub shrinkage: f64,
}

/// Fit the Ledoit-Wolf estimator on a `periods x assets` table.
pub fn ledoit_wolf(x: ArrayView2<'_, f64>) -> Result<ShrunkCovariance> {
  let (n_samples, n_features) = x.dim();
  if n_samples < 2 || n_features == 0 {
    return Err(KellyError::Data(format!(
      "shrinkage estimation needs at least 2 periods and 1 asset, got {n_samples}x{n_features}"
    )));
  }

  let means = x
    .mean_axis(Axis(0))
    .ok_or_else(|| KellyError::Data("cannot centre an empty returns table".into()))?;
  let centred = &x - &means.insert_axis(Axis(0));

  let n = n_samples as f64;
  let emp_cov = centred.t().dot(&centred) / n;

  if n_features == 1 {
    return Ok(ShrunkCovariance {
      covariance: emp_cov,
      shrinkage: 0.0,
    });
  }

  let shrinkage = shrinkage_intensity(&centred);
  let mu = emp_cov.diag().sum() / n_features as f64;

  let mut covariance = emp_cov * (1.0 - shrinkage);
  covariance.diag_mut().mapv_inplace(|v| v + shrinkage * mu);

  Ok(ShrunkCovariance {
    covariance,
    shrinkage,
  })
}

/// Optimal intensity for already centred data.
fn shrinkage_intensity(centred: &Array2<f64>) -> f64 {
  let (n_samples, n_features) = centred.dim();
  let n = n_samples as f64;
  let p = n_features as f64;

  let x2 = centred.mapv(|v| v * v);
  let emp_cov_trace = x2.sum_axis(Axis(0)) / n;
  let mu = emp_cov_trace.sum() / p;

  // beta: variance of the entries of x x^T around S; delta: ||S - mu I||_F^2.
  let beta_sum = x2.t().dot(&x2).sum();
  let delta_sum = centred.t().dot(centred).mapv(|v| v * v).sum() / (n * n);

  let beta = (beta_sum / n - delta_sum) / (p * n);
  let delta = (delta_sum - 2.0 * mu * emp_cov_trace.sum() + p * mu * mu) / p;
  let beta = beta.min(delta);

  if beta <= 0.0 || delta <= 0.0 {
    0.0
  } else {
    (beta / delta).clamp(0.0, 1.0)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  #[test]
  fn single_asset_is_not_shrunk() {
    let x = array![[0.01], [0.03], [-0.02]];
    let fit = ledoit_wolf(x.view()).unwrap();

    assert_eq!(fit.shrinkage, 0.0);
    let mean = 0.02 / 3.0;
    let var = [0.01, 0.03, -0.02]
      .iter()
      .map(|v| (v - mean) * (v - mean))
      .sum::<f64>()
      / 3.0;
    assert_relative_eq!(fit.covariance[[0, 0]], var, epsilon = 1e-15);
  }

  #[test]
  fn shrinkage_stays_in_unit_interval_and_preserves_trace() {
    let mut rng = StdRng::seed_from_u64(11);
    let normal = Normal::new(0.0, 0.02).unwrap();
    let x = Array2::from_shape_fn((12, 5), |_| normal.sample(&mut rng));

    let fit = ledoit_wolf(x.view()).unwrap();
    assert!((0.0..=1.0).contains(&fit.shrinkage));
    assert!(fit.shrinkage > 0.0);

    let means = x.mean_axis(Axis(0)).unwrap();
    let c = &x - &means.insert_axis(Axis(0));
    let emp = c.t().dot(&c) / 12.0;
    // Convex blend with mu * I keeps the trace.
    assert_relative_eq!(
      fit.covariance.diag().sum(),
      emp.diag().sum(),
      epsilon = 1e-12
    );

    for i in 0..5 {
      for j in 0..5 {
        assert_relative_eq!(fit.covariance[[i, j]], fit.covariance[[j, i]], epsilon = 1e-15);
      }
    }
  }

  #[test]
  fn few_observations_shrink_harder() {
    let mut rng = StdRng::seed_from_u64(3);
    let normal = Normal::new(0.0, 0.01).unwrap();
    // Unequal volatilities, so the identity target is misspecified.
    let short = Array2::from_shape_fn((6, 5), |(_, j)| (j + 1) as f64 * normal.sample(&mut rng));
    let long = Array2::from_shape_fn((2000, 5), |(_, j)| (j + 1) as f64 * normal.sample(&mut rng));

    let s_short = ledoit_wolf(short.view()).unwrap().shrinkage;
    let s_long = ledoit_wolf(long.view()).unwrap().shrinkage;
    assert!(s_short > s_long, "{s_short} <= {s_long}");
  }

  #[test]
  fn one_period_is_rejected() {
    let x = array![[0.01, 0.02]];
    assert!(ledoit_wolf(x.view()).is_err());
  }
}
