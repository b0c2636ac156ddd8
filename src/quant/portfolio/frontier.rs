//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(r)=\min_{\mathbf{w}}\sqrt{12\,\mathbf{w}^\top\Sigma\mathbf{w}}\quad
//! \text{s.t.}\quad 12\,\mu^\top\mathbf{w}=r,\ \ r\in[\min_i 12\mu_i,\ \max_i 12\mu_i]
//! $$
//!
//! Traces the long-only minimum-variance frontier on an evenly spaced grid of
//! annualized target returns.

use ndarray::Array1;
use rayon::prelude::*;
use tracing::debug;

use super::data::Moments;
use super::optimizers::optimize;
use super::types::Objective;
use super::types::PortfolioStats;
use crate::config::SolverConfig;

/// `points` frontier portfolios, ordered by target return.
///
/// Each point reports the achieved statistics of its solved weights, which
/// may be the equal-weight fallback when a target could not be met.
pub fn efficient_frontier(
  moments: &Moments,
  risk_free: f64,
  points: usize,
  solver: &SolverConfig,
) -> Vec<PortfolioStats> {
  if moments.n_assets() == 0 || points == 0 {
    return Vec::new();
  }

  let annual = moments.annualized_asset_returns();
  let lo = annual.fold(f64::INFINITY, |acc, &r| acc.min(r));
  let hi = annual.fold(f64::NEG_INFINITY, |acc, &r| acc.max(r));
  let targets = Array1::linspace(lo, hi, points);
  debug!(points, lo, hi, "tracing efficient frontier");

  targets
    .to_vec()
    .into_par_iter()
    .map(|target| {
      let alloc = optimize(
        moments,
        Objective::MinVariance,
        Some(target),
        risk_free,
        solver,
      );
      moments.stats(&alloc.weights, risk_free)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::quant::portfolio::data::fixtures::fund_panel;
  use crate::quant::portfolio::data::fixtures::synthetic_panel;
  use crate::quant::portfolio::types::SolveStatus;

  const RF: f64 = 0.065;

  #[test]
  fn spans_asset_return_range() {
    let moments = Moments::estimate(&synthetic_panel(120, 5)).unwrap();
    let frontier = efficient_frontier(&moments, RF, 50, &SolverConfig::default());
    let annual = moments.annualized_asset_returns();
    let lo = annual.fold(f64::INFINITY, |acc, &r| acc.min(r));
    let hi = annual.fold(f64::NEG_INFINITY, |acc, &r| acc.max(r));

    assert_eq!(frontier.len(), 50);
    assert_abs_diff_eq!(frontier[0].annual_return, lo, epsilon = 1e-6);
    assert_abs_diff_eq!(frontier[49].annual_return, hi, epsilon = 1e-6);
    for pair in frontier.windows(2) {
      assert!(pair[1].annual_return >= pair[0].annual_return - 1e-8);
    }
  }

  #[test]
  fn fund_scale_targets_are_met_exactly() {
    let solver = SolverConfig::default();

    for seed in 0..20 {
      let moments = Moments::estimate(&fund_panel(72, seed)).unwrap();
      let annual = moments.annualized_asset_returns();
      let lo = annual.fold(f64::INFINITY, |acc, &r| acc.min(r));
      let hi = annual.fold(f64::NEG_INFINITY, |acc, &r| acc.max(r));

      let mut previous = f64::NEG_INFINITY;
      for &target in Array1::linspace(lo, hi, 50).iter() {
        let alloc = optimize(&moments, Objective::MinVariance, Some(target), RF, &solver);
        let achieved = moments.annualized_return(&alloc.weights);

        assert_ne!(alloc.status, SolveStatus::FellBack, "seed {seed} target {target}");
        assert_abs_diff_eq!(alloc.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(achieved, target, epsilon = 1e-9);
        assert!(achieved >= previous, "seed {seed}: {achieved} < {previous}");
        previous = achieved;
      }

      let frontier = efficient_frontier(&moments, RF, 50, &solver);
      for pair in frontier.windows(2) {
        assert!(pair[1].annual_return >= pair[0].annual_return, "seed {seed}");
      }
    }
  }

  #[test]
  fn no_point_beats_min_variance() {
    let moments = Moments::estimate(&synthetic_panel(96, 9)).unwrap();
    let solver = SolverConfig::default();
    let minvar = optimize(&moments, Objective::MinVariance, None, RF, &solver);
    let floor = moments.annualized_volatility(&minvar.weights);

    for point in efficient_frontier(&moments, RF, 20, &solver) {
      assert!(point.annual_volatility >= floor - 1e-6);
    }
  }

  #[test]
  fn identical_returns_collapse_to_one_point() {
    let moments = Moments::new(array![0.01, 0.01], array![[0.0004, 0.0], [0.0, 0.0016]]).unwrap();
    let frontier = efficient_frontier(&moments, RF, 5, &SolverConfig::default());

    assert_eq!(frontier.len(), 5);
    for point in &frontier {
      assert_abs_diff_eq!(point.annual_return, 0.12, epsilon = 1e-12);
      assert_abs_diff_eq!(point.annual_volatility, frontier[0].annual_volatility, epsilon = 1e-9);
    }
  }

  #[test]
  fn empty_inputs_give_empty_frontier() {
    let moments = Moments::new(array![0.01], array![[0.0004]]).unwrap();
    assert!(efficient_frontier(&moments, RF, 0, &SolverConfig::default()).is_empty());
  }
}
