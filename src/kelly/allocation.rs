//! # Capital Allocation
//!
//! $$
//! a_i = F_i\,K,\qquad \text{cash} = K - \sum_i a_i
//! $$
//!
//! Converts fractional weights into currency amounts for a capital base `K`.

use serde::Serialize;
use tracing::warn;

use super::types::WeightVector;

/// Currency amount held in one asset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetAllocation {
  pub symbol: String,
  pub weight: f64,
  pub amount: f64,
}

/// Positions plus residual cash; negative cash means borrowing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Allocation {
  pub positions: Vec<AssetAllocation>,
  pub capital: f64,
  pub cash: f64,
}

impl Allocation {
  pub fn invested(&self) -> f64 {
    self.positions.iter().map(|p| p.amount).sum()
  }

  pub fn is_leveraged(&self) -> bool {
    self.cash < 0.0
  }
}

pub fn allocate(weights: &WeightVector, capital: f64) -> Allocation {
  let positions: Vec<AssetAllocation> = weights
    .iter()
    .map(|(symbol, weight)| AssetAllocation {
      symbol: symbol.to_string(),
      weight,
      amount: weight * capital,
    })
    .collect();
  let cash = capital - positions.iter().map(|p| p.amount).sum::<f64>();

  if cash < 0.0 {
    warn!(cash, "allocation borrows beyond the available capital");
  }

  Allocation {
    positions,
    capital,
    cash,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use nalgebra::dvector;
  use tracing_test::traced_test;

  use super::*;

  #[test]
  fn fully_invested_leaves_no_cash() {
    let w = WeightVector::new(vec!["A".into(), "B".into()], dvector![0.25, 0.75]).unwrap();
    let a = allocate(&w, 10_000.0);

    assert_eq!(a.positions[0].amount, 2_500.0);
    assert_eq!(a.positions[1].symbol, "B");
    assert_relative_eq!(a.cash, 0.0, epsilon = 1e-9);
    assert!(!a.is_leveraged());
  }

  #[test]
  #[traced_test]
  fn leverage_shows_up_as_negative_cash() {
    let w = WeightVector::new(vec!["A".into(), "B".into()], dvector![2.0, 4.0 / 3.0]).unwrap();
    let a = allocate(&w, 1_000.0);

    assert_relative_eq!(a.cash, 1_000.0 - 3_333.333_333_333_333, epsilon = 1e-6);
    assert!(a.is_leveraged());
    assert_relative_eq!(a.invested(), 3_333.333_333_333_333, epsilon = 1e-6);
    assert!(logs_contain("borrows"));
  }

  #[test]
  fn short_positions_free_up_cash() {
    let w = WeightVector::new(vec!["A".into(), "B".into()], dvector![0.6, -0.1]).unwrap();
    let a = allocate(&w, 100.0);

    assert_relative_eq!(a.cash, 50.0, epsilon = 1e-12);
  }
}
