//! # Kelly Engine
//!
//! $$
//! P \to R \to C \to \{F_{\text{unc}},\ F^\*,\ \phi F^\*,\ \rho\} \to K F
//! $$
//!
//! High-level orchestration of the allocation pipeline.

use serde::Serialize;
use tracing::info;

use super::allocation::Allocation;
use super::allocation::allocate;
use super::covariance::CorrelationMatrix;
use super::covariance::CovarianceDiagnostics;
use super::covariance::CovarianceMatrix;
use super::covariance::annualized_covariance;
use super::covariance::correlation_from_covariance;
use super::optimizers::implied_returns;
use super::optimizers::optimize_constrained;
use super::optimizers::optimize_unconstrained;
use super::optimizers::scale_weights;
use super::returns::EstimationMode;
use super::returns::estimate_expected_returns;
use super::returns::excess_returns;
use super::types::ExpectedReturns;
use super::types::PriceSeries;
use super::types::ReturnsMatrix;
use super::types::WeightVector;
use crate::config::AllocationConfig;
use crate::error::Result;

/// Everything produced by one optimisation run.
#[derive(Clone, Debug, Serialize)]
pub struct KellyReport {
  pub estimation_mode: EstimationMode,
  pub periods: usize,
  pub covariance: CovarianceMatrix,
  pub diagnostics: CovarianceDiagnostics,
  pub correlation: CorrelationMatrix,
  pub expected_returns: ExpectedReturns,
  pub unconstrained_weights: WeightVector,
  pub kelly_weights: WeightVector,
  pub kelly_fraction: f64,
  pub partial_kelly_weights: WeightVector,
  pub unconstrained_allocation: Allocation,
  pub kelly_allocation: Allocation,
  pub partial_kelly_allocation: Allocation,
}

/// Single entry point for allocation and implied-return workflows.
#[derive(Clone, Debug)]
pub struct KellyEngine {
  config: AllocationConfig,
}

impl KellyEngine {
  /// Construct an engine from a validated configuration.
  pub fn new(config: AllocationConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { config })
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &AllocationConfig {
    &self.config
  }

  pub fn excess_returns(&self, prices: &PriceSeries) -> Result<ReturnsMatrix> {
    excess_returns(prices, self.config.annual_risk_free_rate)
  }

  /// Validated annualised covariance of the excess returns.
  pub fn covariance(&self, prices: &PriceSeries) -> Result<CovarianceMatrix> {
    let returns = self.excess_returns(prices)?;
    annualized_covariance(&returns, self.config.covariance_method())
  }

  /// Full pipeline: covariance, expected returns, all three weight vectors
  /// and their capital allocations.
  pub fn run(&self, prices: &PriceSeries, mode: EstimationMode) -> Result<KellyReport> {
    let returns = self.excess_returns(prices)?;
    info!(
      periods = returns.n_periods(),
      assets = returns.n_assets(),
      "excess returns ready"
    );

    let covariance = annualized_covariance(&returns, self.config.covariance_method())?;
    let correlation = correlation_from_covariance(&covariance);

    let source = self.config.return_source(mode)?;
    let expected_returns = estimate_expected_returns(source, &returns)?;

    let unconstrained_weights = optimize_unconstrained(&expected_returns, &covariance)?;
    let kelly_weights = optimize_constrained(
      &expected_returns,
      &covariance,
      self.config.bounds(),
      self.config.annual_risk_free_rate,
      self.config.qp_formulation,
    )?;
    let partial_kelly_weights = scale_weights(&kelly_weights, self.config.kelly_fraction)?;

    let capital = self.config.capital;
    let report = KellyReport {
      estimation_mode: mode,
      periods: returns.n_periods(),
      diagnostics: *covariance.diagnostics(),
      unconstrained_allocation: allocate(&unconstrained_weights, capital),
      kelly_allocation: allocate(&kelly_weights, capital),
      partial_kelly_allocation: allocate(&partial_kelly_weights, capital),
      covariance,
      correlation,
      expected_returns,
      unconstrained_weights,
      kelly_weights,
      kelly_fraction: self.config.kelly_fraction,
      partial_kelly_weights,
    };

    info!(
      mode = %mode,
      invested = report.kelly_allocation.invested(),
      "kelly allocation complete"
    );
    Ok(report)
  }

  /// Returns under which the configured `position_sizes` are Kelly optimal.
  pub fn implied(&self, prices: &PriceSeries) -> Result<ExpectedReturns> {
    let covariance = self.covariance(prices)?;
    let weights = self.config.position_weights(covariance.symbols())?;
    implied_returns(&covariance, &weights)
  }
}
