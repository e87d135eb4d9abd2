//! # Kelly Types
//!
//! $$
//! P\in\mathbb R^{T\times N},\quad R\in\mathbb R^{(T-1)\times N},\quad M,F\in\mathbb R^N
//! $$
//!
//! Labelled value objects passed between pipeline stages. Every container keeps
//! its asset symbols next to the numbers so stages can check alignment.

use std::collections::HashSet;

use chrono::NaiveDate;
use nalgebra::DVector;
use ndarray::Array2;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;

use crate::error::KellyError;
use crate::error::Result;

/// Trading periods per year used for annualisation.
pub const PERIODS_PER_YEAR: f64 = 252.0;

fn check_symbols(symbols: &[String]) -> Result<()> {
  if symbols.is_empty() {
    return Err(KellyError::Data("at least one asset symbol is required".into()));
  }

  let mut seen = HashSet::with_capacity(symbols.len());
  for s in symbols {
    if !seen.insert(s.as_str()) {
      return Err(KellyError::Data(format!("duplicate asset symbol `{s}`")));
    }
  }

  Ok(())
}

pub(crate) fn serialize_labeled<S, I>(
  symbols: &[String],
  values: I,
  serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
  S: Serializer,
  I: IntoIterator<Item = f64>,
{
  let mut map = serializer.serialize_map(Some(symbols.len()))?;
  for (symbol, value) in symbols.iter().zip(values) {
    map.serialize_entry(symbol, &value)?;
  }
  map.end()
}

/// Adjusted close prices, one row per date and one column per asset.
#[derive(Clone, Debug)]
pub struct PriceSeries {
  dates: Vec<NaiveDate>,
  symbols: Vec<String>,
  prices: Array2<f64>,
}

impl PriceSeries {
  /// Build a price table.
  ///
  /// Dates must be strictly increasing, symbols unique and every price finite
  /// and positive.
  pub fn new(dates: Vec<NaiveDate>, symbols: Vec<String>, prices: Array2<f64>) -> Result<Self> {
    check_symbols(&symbols)?;

    if prices.dim() != (dates.len(), symbols.len()) {
      return Err(KellyError::Data(format!(
        "price table is {}x{} but {} dates and {} symbols were given",
        prices.nrows(),
        prices.ncols(),
        dates.len(),
        symbols.len()
      )));
    }

    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
      return Err(KellyError::Data(format!(
        "dates must be strictly increasing ({} followed by {})",
        w[0], w[1]
      )));
    }

    if let Some(((t, j), p)) = prices
      .indexed_iter()
      .find(|(_, p)| !p.is_finite() || **p <= 0.0)
    {
      return Err(KellyError::Data(format!(
        "price of {} on {} is not a positive finite number ({p})",
        symbols[j], dates[t]
      )));
    }

    Ok(Self {
      dates,
      symbols,
      prices,
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  /// Number of dated rows.
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }
}

/// Periodic excess returns, one row per retained period.
#[derive(Clone, Debug)]
pub struct ReturnsMatrix {
  dates: Vec<NaiveDate>,
  symbols: Vec<String>,
  values: Array2<f64>,
}

impl ReturnsMatrix {
  /// Build a returns table from already computed excess returns.
  pub fn new(dates: Vec<NaiveDate>, symbols: Vec<String>, values: Array2<f64>) -> Result<Self> {
    check_symbols(&symbols)?;

    if values.dim() != (dates.len(), symbols.len()) {
      return Err(KellyError::Data(format!(
        "returns table is {}x{} but {} dates and {} symbols were given",
        values.nrows(),
        values.ncols(),
        dates.len(),
        symbols.len()
      )));
    }

    if values.iter().any(|r| !r.is_finite()) {
      return Err(KellyError::Data("returns contain non-finite values".into()));
    }

    Ok(Self {
      dates,
      symbols,
      values,
    })
  }

  /// Period end dates.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  pub fn n_periods(&self) -> usize {
    self.values.nrows()
  }

  pub fn n_assets(&self) -> usize {
    self.values.ncols()
  }
}

/// Annualised expected excess return per asset.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpectedReturns {
  symbols: Vec<String>,
  values: DVector<f64>,
}

impl ExpectedReturns {
  pub fn new(symbols: Vec<String>, values: DVector<f64>) -> Result<Self> {
    check_symbols(&symbols)?;
    if values.len() != symbols.len() {
      return Err(KellyError::Data(format!(
        "{} expected returns for {} symbols",
        values.len(),
        symbols.len()
      )));
    }
    if values.iter().any(|m| !m.is_finite()) {
      return Err(KellyError::Data(
        "expected returns contain non-finite values".into(),
      ));
    }
    Ok(Self { symbols, values })
  }

  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn values(&self) -> &DVector<f64> {
    &self.values
  }

  pub fn get(&self, symbol: &str) -> Option<f64> {
    self
      .symbols
      .iter()
      .position(|s| s == symbol)
      .map(|i| self.values[i])
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
    self
      .symbols
      .iter()
      .map(String::as_str)
      .zip(self.values.iter().copied())
  }
}

impl Serialize for ExpectedReturns {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serialize_labeled(&self.symbols, self.values.iter().copied(), serializer)
  }
}

/// Fraction of capital per asset.
///
/// Unconstrained vectors may be negative (short) or sum above one (leverage).
#[derive(Clone, Debug, PartialEq)]
pub struct WeightVector {
  symbols: Vec<String>,
  values: DVector<f64>,
}

impl WeightVector {
  pub fn new(symbols: Vec<String>, values: DVector<f64>) -> Result<Self> {
    check_symbols(&symbols)?;
    if values.len() != symbols.len() {
      return Err(KellyError::Data(format!(
        "{} weights for {} symbols",
        values.len(),
        symbols.len()
      )));
    }
    if values.iter().any(|w| !w.is_finite()) {
      return Err(KellyError::Data("weights contain non-finite values".into()));
    }
    Ok(Self { symbols, values })
  }

  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn values(&self) -> &DVector<f64> {
    &self.values
  }

  pub fn get(&self, symbol: &str) -> Option<f64> {
    self
      .symbols
      .iter()
      .position(|s| s == symbol)
      .map(|i| self.values[i])
  }

  /// Total invested fraction.
  pub fn sum(&self) -> f64 {
    self.values.sum()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
    self
      .symbols
      .iter()
      .map(String::as_str)
      .zip(self.values.iter().copied())
  }
}

impl Serialize for WeightVector {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serialize_labeled(&self.symbols, self.values.iter().copied(), serializer)
  }
}
