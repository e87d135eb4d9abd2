//! # kelly-rs
//!
//! $$
//! g(F) = r + F^\top (M - r) - \tfrac12 F^\top C F
//! $$
//!
//! Growth-optimal (Kelly) capital allocation across risky assets: excess
//! return estimation, covariance estimation with optional Ledoit-Wolf
//! shrinkage, closed-form and constrained optimal weights, and implied
//! returns for a fixed allocation.

pub mod config;
pub mod error;
pub mod kelly;
pub mod prices;

pub use config::AllocationConfig;
pub use config::AssetUniverse;
pub use error::KellyError;
pub use error::Result;
pub use kelly::KellyEngine;
pub use kelly::KellyReport;
