//! # Kelly
//!
//! $$
//! \max_F\ g(F) = r + F^\top M - \tfrac12 F^\top C F
//! $$
//!
//! Return estimation, covariance validation and growth-optimal allocation.

pub mod allocation;
pub mod covariance;
pub mod engine;
pub mod optimizers;
pub mod qp;
pub mod returns;
pub mod shrinkage;
pub mod types;

pub use allocation::Allocation;
pub use allocation::AssetAllocation;
pub use allocation::allocate;
pub use covariance::CorrelationMatrix;
pub use covariance::CovarianceDiagnostics;
pub use covariance::CovarianceMatrix;
pub use covariance::CovarianceMethod;
pub use covariance::ILL_CONDITIONED;
pub use covariance::annualized_covariance;
pub use covariance::correlation_from_covariance;
pub use engine::KellyEngine;
pub use engine::KellyReport;
pub use optimizers::PositionBounds;
pub use optimizers::QpFormulation;
pub use optimizers::implied_returns;
pub use optimizers::optimize_constrained;
pub use optimizers::optimize_unconstrained;
pub use optimizers::scale_weights;
pub use qp::MAX_ITERATIONS;
pub use qp::QpSolution;
pub use qp::QuadraticProgram;
pub use returns::EstimationMode;
pub use returns::ReturnSource;
pub use returns::estimate_expected_returns;
pub use returns::excess_returns;
pub use shrinkage::ShrunkCovariance;
pub use shrinkage::ledoit_wolf;
pub use types::ExpectedReturns;
pub use types::PERIODS_PER_YEAR;
pub use types::PriceSeries;
pub use types::ReturnsMatrix;
pub use types::WeightVector;
