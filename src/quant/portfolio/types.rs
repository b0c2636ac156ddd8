//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Shared enums and result containers for portfolio optimization.

use serde::Serialize;

/// Single-period allocation objectives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Objective {
  /// Maximize annualized Sharpe ratio.
  MaxSharpe,
  /// Minimize portfolio variance.
  MinVariance,
}

/// How an [`Allocation`] was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
  /// Solver converged to a non-trivial allocation.
  Optimized,
  /// Solver converged and the optimum is the equal-weight vector.
  EqualWeight,
  /// Solver failed; the equal-weight vector was substituted.
  FellBack,
}

/// Long-only, fully invested weight vector plus its provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
  pub weights: Vec<f64>,
  pub status: SolveStatus,
}

/// Annualized `(return, volatility, sharpe)` triple.
///
/// Used for the named portfolios, frontier points and scatter points alike.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortfolioStats {
  /// `12 * w·mu`.
  pub annual_return: f64,
  /// `sqrt(12) * sqrt(wᵀΣw)`.
  pub annual_volatility: f64,
  /// `(annual_return - risk_free) / annual_volatility`, `-inf` below the volatility floor.
  pub sharpe: f64,
}

/// Wealth-multiple percentiles across simulated paths for one forward month.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WealthBand {
  /// 1-based forward month.
  pub month: usize,
  pub p5: f64,
  pub p25: f64,
  pub p50: f64,
  pub p75: f64,
  pub p95: f64,
}

pub(crate) fn equal_weights(n: usize) -> Vec<f64> {
  if n == 0 {
    Vec::new()
  } else {
    vec![1.0 / n as f64; n]
  }
}
