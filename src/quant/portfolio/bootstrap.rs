//! # Block Bootstrap Wealth Simulation
//!
//! $$
//! W_h=\prod_{m=1}^{h}\bigl(1+r_{\pi(m)}\bigr),\qquad
//! \pi(m)=\min\bigl(s_{\lfloor (m-1)/b\rfloor}+(m-1)\bmod b,\ T-1\bigr)
//! $$
//!
//! Resamples the historical monthly portfolio returns in contiguous blocks of
//! `b` months and reports percentile bands of the compounded wealth multiple.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray::Zip;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use super::data::ReturnPanel;
use super::types::WealthBand;
use crate::config::SimulationConfig;

/// Reported wealth percentiles.
pub const BAND_PERCENTILES: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

/// Simulate `config.paths` wealth paths for `weights` and summarize them per month.
///
/// Block starts are drawn up front, path-major, from one generator seeded
/// with `seed`; the same inputs always give the same bands. Returns an empty
/// vector when there is no history to resample or when `weights` does not
/// hold one entry per panel asset.
pub fn simulate(
  panel: &ReturnPanel,
  weights: &[f64],
  config: &SimulationConfig,
  seed: u64,
) -> Vec<WealthBand> {
  let history = panel.months();
  if history == 0 || panel.n_assets() == 0 || config.paths == 0 || config.horizon_months == 0 {
    return Vec::new();
  }

  if weights.len() != panel.n_assets() {
    warn!(
      weights = weights.len(),
      assets = panel.n_assets(),
      "weight vector does not match the panel, skipping simulation"
    );
    return Vec::new();
  }

  let returns = panel.portfolio_returns(weights);
  let starts = block_starts(history, config, seed);
  let wealth = wealth_paths(&returns, &starts, config);
  debug!(
    paths = config.paths,
    horizon = config.horizon_months,
    block = config.block_size,
    history,
    "simulated bootstrap wealth paths"
  );

  (0..config.horizon_months)
    .into_par_iter()
    .map(|month| {
      let mut column = wealth.column(month).to_vec();
      column.sort_by(|a, b| a.total_cmp(b));
      let [p5, p25, p50, p75, p95] = BAND_PERCENTILES.map(|p| percentile(&column, p));
      WealthBand {
        month: month + 1,
        p5,
        p25,
        p50,
        p75,
        p95,
      }
    })
    .collect()
}

/// `paths x n_blocks` matrix of block start indices in `[0, max(1, T - b + 1))`.
fn block_starts(history: usize, config: &SimulationConfig, seed: u64) -> Array2<usize> {
  let block = config.block_size.max(1);
  let n_blocks = config.horizon_months.div_ceil(block);
  let upper = (history + 1).saturating_sub(block).max(1);
  let mut rng = StdRng::seed_from_u64(seed);

  Array2::random_using((config.paths, n_blocks), Uniform::new(0, upper), &mut rng)
}

/// Compounded wealth multiples, one row per path and one column per month.
fn wealth_paths(returns: &Array1<f64>, starts: &Array2<usize>, config: &SimulationConfig) -> Array2<f64> {
  let block = config.block_size.max(1);
  let last = returns.len() - 1;
  let mut wealth = Array2::zeros((config.paths, config.horizon_months));

  Zip::from(wealth.axis_iter_mut(Axis(0)))
    .and(starts.axis_iter(Axis(0)))
    .into_par_iter()
    .for_each(|(mut path, starts)| {
      let mut value = 1.0;
      for m in 0..path.len() {
        let index = (starts[m / block] + m % block).min(last);
        value *= 1.0 + returns[index];
        path[m] = value;
      }
    });

  wealth
}

/// Linearly interpolated `p`-th percentile (0..100) of sorted data.
fn percentile(sorted: &[f64], p: f64) -> f64 {
  if sorted.is_empty() {
    return f64::NAN;
  }
  let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
  let lower = rank.floor() as usize;
  let upper = rank.ceil() as usize;
  let frac = rank - lower as f64;

  sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}
