//! # Allocation Config
//!
//! $$
//! \theta = (r_f,\ K,\ \phi,\ F_{\min},\ F_{\max},\ \ldots)
//! $$
//!
//! JSON configuration bundle consumed by [`crate::kelly::KellyEngine`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use nalgebra::DVector;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use tracing::warn;

use crate::error::KellyError;
use crate::error::Result;
use crate::kelly::CovarianceMethod;
use crate::kelly::EstimationMode;
use crate::kelly::PositionBounds;
use crate::kelly::QpFormulation;
use crate::kelly::ReturnSource;
use crate::kelly::WeightVector;

/// Symbols the price loader should select.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetUniverse {
  #[serde(default)]
  pub stock_symbols: Vec<String>,
  #[serde(default)]
  pub crypto_symbols: Vec<String>,
}

impl AssetUniverse {
  /// Stocks and cryptos merged, sorted and deduplicated.
  pub fn symbols(&self) -> Vec<String> {
    let mut all: Vec<String> = self
      .stock_symbols
      .iter()
      .chain(&self.crypto_symbols)
      .cloned()
      .collect();
    all.sort();
    all.dedup();
    all
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
  Number(f64),
  Text(String),
}

impl Numeric {
  fn into_f64<E: serde::de::Error>(self) -> std::result::Result<f64, E> {
    match self {
      Numeric::Number(v) => Ok(v),
      Numeric::Text(s) => s
        .trim()
        .parse()
        .map_err(|_| E::custom(format!("`{s}` is not a number"))),
    }
  }
}

// Numbers may arrive quoted ("kelly_fraction": "0.5").
fn numeric<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
  Numeric::deserialize(d)?.into_f64()
}

fn optional_numeric<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
  Option::<Numeric>::deserialize(d)?
    .map(Numeric::into_f64)
    .transpose()
}

fn default_kelly_fraction() -> f64 {
  1.0
}

fn default_lookback_years() -> u32 {
  5
}

/// Immutable input bundle for one allocation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
  #[serde(default)]
  pub assets: AssetUniverse,
  #[serde(deserialize_with = "numeric")]
  pub annual_risk_free_rate: f64,
  #[serde(deserialize_with = "numeric")]
  pub capital: f64,
  #[serde(default = "default_kelly_fraction", deserialize_with = "numeric")]
  pub kelly_fraction: f64,
  /// History window in years, counted back from the latest price.
  #[serde(default = "default_lookback_years")]
  pub max_lookback_years: u32,
  #[serde(default, alias = "use_Ledoit_Wolf")]
  pub use_shrinkage_estimator: bool,
  #[serde(default, deserialize_with = "optional_numeric")]
  pub min_position_size: Option<f64>,
  #[serde(default, deserialize_with = "optional_numeric")]
  pub max_position_size: Option<f64>,
  /// Fixed weights for the implied-return path.
  #[serde(default)]
  pub position_sizes: Option<BTreeMap<String, f64>>,
  #[serde(default, deserialize_with = "optional_numeric")]
  pub identical_annual_excess_return_rate: Option<f64>,
  #[serde(default)]
  pub expected_annual_excess_return_rates: Option<BTreeMap<String, f64>>,
  #[serde(default)]
  pub estimation_mode: Option<EstimationMode>,
  #[serde(default)]
  pub qp_formulation: QpFormulation,
}

impl AllocationConfig {
  /// Minimal config with every optional field at its default.
  pub fn new(annual_risk_free_rate: f64, capital: f64) -> Self {
    Self {
      assets: AssetUniverse::default(),
      annual_risk_free_rate,
      capital,
      kelly_fraction: default_kelly_fraction(),
      max_lookback_years: default_lookback_years(),
      use_shrinkage_estimator: false,
      min_position_size: None,
      max_position_size: None,
      position_sizes: None,
      identical_annual_excess_return_rate: None,
      expected_annual_excess_return_rates: None,
      estimation_mode: None,
      qp_formulation: QpFormulation::default(),
    }
  }

  /// Parse and validate a JSON document.
  pub fn from_json_str(json: &str) -> Result<Self> {
    let config: Self =
      serde_json::from_str(json).map_err(|e| KellyError::Config(format!("invalid config: {e}")))?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let json = fs::read_to_string(path)?;
    Self::from_json_str(&json)
  }

  pub fn validate(&self) -> Result<()> {
    if !self.capital.is_finite() || self.capital <= 0.0 {
      return Err(KellyError::Config(format!(
        "capital must be a positive amount, got {}",
        self.capital
      )));
    }

    if !self.kelly_fraction.is_finite() || self.kelly_fraction <= 0.0 {
      return Err(KellyError::Config(format!(
        "kelly_fraction must be positive, got {}",
        self.kelly_fraction
      )));
    }
    if self.kelly_fraction > 1.0 {
      warn!(
        kelly_fraction = self.kelly_fraction,
        "kelly_fraction above 1 bets more than full Kelly"
      );
    }

    if !self.annual_risk_free_rate.is_finite() || self.annual_risk_free_rate <= -1.0 {
      return Err(KellyError::Config(format!(
        "annual_risk_free_rate must be finite and above -1, got {}",
        self.annual_risk_free_rate
      )));
    }

    if self.max_lookback_years == 0 {
      return Err(KellyError::Config(
        "max_lookback_years must be at least 1".into(),
      ));
    }

    for (name, bound) in [
      ("min_position_size", self.min_position_size),
      ("max_position_size", self.max_position_size),
      (
        "identical_annual_excess_return_rate",
        self.identical_annual_excess_return_rate,
      ),
    ] {
      if bound.is_some_and(|b| !b.is_finite()) {
        return Err(KellyError::Config(format!("{name} must be finite")));
      }
    }
    if let (Some(min), Some(max)) = (self.min_position_size, self.max_position_size) {
      if min > max {
        return Err(KellyError::Config(format!(
          "min_position_size {min} exceeds max_position_size {max}"
        )));
      }
    }

    for (name, map) in [
      ("position_sizes", &self.position_sizes),
      (
        "expected_annual_excess_return_rates",
        &self.expected_annual_excess_return_rates,
      ),
    ] {
      if let Some((symbol, _)) = map
        .iter()
        .flatten()
        .find(|(_, v)| !v.is_finite())
      {
        return Err(KellyError::Config(format!(
          "{name} entry for `{symbol}` must be finite"
        )));
      }
    }

    Ok(())
  }

  pub fn bounds(&self) -> PositionBounds {
    PositionBounds {
      min: self.min_position_size,
      max: self.max_position_size,
    }
  }

  pub fn covariance_method(&self) -> CovarianceMethod {
    CovarianceMethod::from_shrinkage_flag(self.use_shrinkage_estimator)
  }

  /// Command-line override first, then the configured mode.
  pub fn resolve_mode(&self, requested: Option<EstimationMode>) -> Result<EstimationMode> {
    requested.or(self.estimation_mode).ok_or_else(|| {
      KellyError::Config(
        "no estimation mode given (expected identical, historical or custom)".into(),
      )
    })
  }

  /// Inputs required by the chosen estimation mode.
  pub fn return_source(&self, mode: EstimationMode) -> Result<ReturnSource<'_>> {
    match mode {
      EstimationMode::Identical => self
        .identical_annual_excess_return_rate
        .map(ReturnSource::Identical)
        .ok_or_else(|| {
          KellyError::Config("identical mode needs identical_annual_excess_return_rate".into())
        }),
      EstimationMode::Historical => Ok(ReturnSource::Historical),
      EstimationMode::Custom => self
        .expected_annual_excess_return_rates
        .as_ref()
        .map(ReturnSource::Custom)
        .ok_or_else(|| {
          KellyError::Config("custom mode needs expected_annual_excess_return_rates".into())
        }),
    }
  }

  /// Configured `position_sizes` ordered like `symbols`.
  ///
  /// The configured keys must be exactly `symbols`.
  pub fn position_weights(&self, symbols: &[String]) -> Result<WeightVector> {
    let sizes = self
      .position_sizes
      .as_ref()
      .ok_or_else(|| KellyError::Config("implied returns need position_sizes".into()))?;

    if let Some(extra) = sizes.keys().find(|k| !symbols.contains(*k)) {
      return Err(KellyError::Config(format!(
        "position_sizes names `{extra}` which has no price data"
      )));
    }

    let mut values = DVector::zeros(symbols.len());
    for (i, symbol) in symbols.iter().enumerate() {
      values[i] = *sizes
        .get(symbol)
        .ok_or_else(|| KellyError::Config(format!("position_sizes has no entry for `{symbol}`")))?;
    }

    WeightVector::new(symbols.to_vec(), values)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use tempfile::NamedTempFile;
  use tracing_test::traced_test;

  use super::*;

  const FULL_CONFIG: &str = r#"{
    "assets": {
      "stock_symbols": ["SPY", "AAPL"],
      "crypto_symbols": ["BTC-USD"]
    },
    "annual_risk_free_rate": 0.02,
    "capital": 100000,
    "kelly_fraction": "0.5",
    "max_lookback_years": 3,
    "use_Ledoit_Wolf": true,
    "max_position_size": "0.6",
    "position_sizes": {"AAPL": 0.3, "BTC-USD": 0.2, "SPY": 0.5},
    "identical_annual_excess_return_rate": 0.06,
    "expected_annual_excess_return_rates": {"AAPL": 0.1, "BTC-USD": 0.3, "SPY": 0.05}
  }"#;

  fn symbols() -> Vec<String> {
    vec!["AAPL".into(), "BTC-USD".into(), "SPY".into()]
  }

  #[test]
  fn parses_quoted_numbers_and_aliases() {
    let c = AllocationConfig::from_json_str(FULL_CONFIG).unwrap();

    assert_eq!(c.assets.symbols(), symbols());
    assert_eq!(c.kelly_fraction, 0.5);
    assert_eq!(c.max_lookback_years, 3);
    assert!(c.use_shrinkage_estimator);
    assert_eq!(c.covariance_method(), CovarianceMethod::LedoitWolf);
    assert_eq!(c.bounds(), PositionBounds { min: None, max: Some(0.6) });
    assert_eq!(c.qp_formulation, QpFormulation::Discounted);
  }

  #[test]
  fn defaults_apply_to_minimal_config() {
    let c = AllocationConfig::from_json_str(r#"{"annual_risk_free_rate": 0.0, "capital": 10}"#)
      .unwrap();

    assert_eq!(c, AllocationConfig::new(0.0, 10.0));
    assert!(c.resolve_mode(None).is_err());
    assert_eq!(
      c.resolve_mode(Some(EstimationMode::Historical)).unwrap(),
      EstimationMode::Historical
    );
  }

  #[test]
  fn missing_capital_is_a_config_error() {
    let err = AllocationConfig::from_json_str(r#"{"annual_risk_free_rate": 0.01}"#).unwrap_err();
    assert!(matches!(err, KellyError::Config(_)));
    assert!(err.to_string().contains("capital"));
  }

  #[test]
  fn crossed_bounds_are_rejected() {
    let mut c = AllocationConfig::new(0.0, 1.0);
    c.min_position_size = Some(0.5);
    c.max_position_size = Some(0.1);
    assert!(c.validate().is_err());

    c.max_position_size = Some(f64::NAN);
    assert!(c.validate().is_err());
  }

  #[test]
  fn non_positive_capital_and_fraction_are_rejected() {
    let mut c = AllocationConfig::new(0.0, 0.0);
    assert!(c.validate().is_err());

    c.capital = 1.0;
    c.kelly_fraction = 0.0;
    assert!(c.validate().is_err());
  }

  #[test]
  #[traced_test]
  fn over_betting_is_only_a_warning() {
    let mut c = AllocationConfig::new(0.0, 1.0);
    c.kelly_fraction = 2.0;
    assert!(c.validate().is_ok());
    assert!(logs_contain("more than full Kelly"));
  }

  #[test]
  fn return_source_follows_mode() {
    let c = AllocationConfig::from_json_str(FULL_CONFIG).unwrap();

    assert!(matches!(
      c.return_source(EstimationMode::Identical).unwrap(),
      ReturnSource::Identical(r) if r == 0.06
    ));
    assert!(matches!(
      c.return_source(EstimationMode::Custom).unwrap(),
      ReturnSource::Custom(m) if m.len() == 3
    ));

    let bare = AllocationConfig::new(0.0, 1.0);
    assert!(bare.return_source(EstimationMode::Identical).is_err());
    assert!(bare.return_source(EstimationMode::Custom).is_err());
    assert!(bare.return_source(EstimationMode::Historical).is_ok());
  }

  #[test]
  fn position_weights_follow_symbol_order() {
    let c = AllocationConfig::from_json_str(FULL_CONFIG).unwrap();
    let order = vec!["SPY".to_string(), "AAPL".into(), "BTC-USD".into()];
    let w = c.position_weights(&order).unwrap();

    assert_eq!(w.symbols(), order.as_slice());
    assert_eq!(w.values().as_slice(), &[0.5, 0.3, 0.2]);
  }

  #[test]
  fn position_weights_reject_mismatched_assets() {
    let c = AllocationConfig::from_json_str(FULL_CONFIG).unwrap();

    let fewer = vec!["AAPL".to_string(), "SPY".into()];
    assert!(c.position_weights(&fewer).unwrap_err().to_string().contains("BTC-USD"));

    let more = vec!["AAPL".to_string(), "BTC-USD".into(), "SPY".into(), "QQQ".into()];
    assert!(c.position_weights(&more).unwrap_err().to_string().contains("QQQ"));
  }

  #[test]
  fn loads_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(FULL_CONFIG.as_bytes()).unwrap();

    let c = AllocationConfig::from_path(file.path()).unwrap();
    assert_eq!(c.capital, 100_000.0);
  }
}
