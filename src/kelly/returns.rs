//! # Excess Returns
//!
//! $$
//! r_{t,i}=\frac{P_{t,i}}{P_{t-1,i}}-1-\frac{r_f}{252},\qquad
//! M_i = 252\cdot\bar r_i
//! $$
//!
//! Weekday-aligned excess returns and the three expected-return estimators.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use chrono::NaiveDate;
use nalgebra::DVector;
use ndarray::Axis;
use ndarray::s;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::types::ExpectedReturns;
use super::types::PERIODS_PER_YEAR;
use super::types::PriceSeries;
use super::types::ReturnsMatrix;
use crate::error::KellyError;
use crate::error::Result;

fn is_weekday(date: NaiveDate) -> bool {
  date.weekday().number_from_monday() <= 5
}

/// Convert prices into periodic excess returns.
///
/// Weekend rows are discarded first so that a price printed on a non-trading
/// day (crypto assets trade every day) does not register as a zero return for
/// the equities; Friday-to-Monday becomes a single period. The first retained
/// row has no predecessor and is dropped.
pub fn excess_returns(prices: &PriceSeries, annual_risk_free_rate: f64) -> Result<ReturnsMatrix> {
  if !annual_risk_free_rate.is_finite() {
    return Err(KellyError::Config(
      "annual_risk_free_rate must be finite".into(),
    ));
  }

  let rows: Vec<usize> = prices
    .dates()
    .iter()
    .enumerate()
    .filter(|(_, d)| is_weekday(**d))
    .map(|(i, _)| i)
    .collect();

  if rows.len() < 2 {
    return Err(KellyError::Data(format!(
      "need at least two weekday prices to form a return, got {}",
      rows.len()
    )));
  }

  let kept = prices.prices().select(Axis(0), &rows);
  let period_rf = annual_risk_free_rate / PERIODS_PER_YEAR;
  let mut values = &kept.slice(s![1.., ..]) / &kept.slice(s![..-1, ..]);
  values.mapv_inplace(|growth| growth - 1.0 - period_rf);

  let dates = rows[1..].iter().map(|&i| prices.dates()[i]).collect();

  debug!(
    periods = values.nrows(),
    dropped_weekend_rows = prices.len() - rows.len(),
    "computed excess returns"
  );

  ReturnsMatrix::new(dates, prices.symbols().to_vec(), values)
}

/// How the annualised expected excess returns are obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationMode {
  /// One configured rate for every asset.
  Identical,
  /// Sample mean of the historical excess returns, annualised.
  Historical,
  /// Per-symbol rates supplied by the user.
  Custom,
}

impl FromStr for EstimationMode {
  type Err = KellyError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_lowercase().as_str() {
      "identical" => Ok(Self::Identical),
      "historical" => Ok(Self::Historical),
      "custom" => Ok(Self::Custom),
      other => Err(KellyError::Config(format!(
        "unexpected estimation mode `{other}` (expected identical, historical or custom)"
      ))),
    }
  }
}

impl fmt::Display for EstimationMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EstimationMode::Identical => write!(f, "identical"),
      EstimationMode::Historical => write!(f, "historical"),
      EstimationMode::Custom => write!(f, "custom"),
    }
  }
}

/// Resolved input for [`estimate_expected_returns`].
#[derive(Clone, Copy, Debug)]
pub enum ReturnSource<'a> {
  Identical(f64),
  Historical,
  Custom(&'a BTreeMap<String, f64>),
}

impl ReturnSource<'_> {
  pub fn mode(&self) -> EstimationMode {
    match self {
      ReturnSource::Identical(_) => EstimationMode::Identical,
      ReturnSource::Historical => EstimationMode::Historical,
      ReturnSource::Custom(_) => EstimationMode::Custom,
    }
  }
}

/// Annualised expected excess returns ordered like the columns of `returns`.
pub fn estimate_expected_returns(
  source: ReturnSource<'_>,
  returns: &ReturnsMatrix,
) -> Result<ExpectedReturns> {
  let symbols = returns.symbols().to_vec();
  let n = symbols.len();

  let values = match source {
    ReturnSource::Identical(rate) => DVector::from_element(n, rate),
    ReturnSource::Historical => {
      let mean = returns
        .values()
        .mean_axis(Axis(0))
        .ok_or_else(|| KellyError::Data("cannot average an empty returns table".into()))?;
      DVector::from_iterator(n, mean.iter().map(|m| m * PERIODS_PER_YEAR))
    }
    ReturnSource::Custom(rates) => {
      let mut values = DVector::zeros(n);
      for (i, symbol) in symbols.iter().enumerate() {
        values[i] = *rates.get(symbol).ok_or_else(|| {
          KellyError::Config(format!(
            "expected_annual_excess_return_rates has no entry for `{symbol}`"
          ))
        })?;
      }
      values
    }
  };

  ExpectedReturns::new(symbols, values)
}
