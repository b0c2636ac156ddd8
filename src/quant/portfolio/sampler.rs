//! # Random Portfolio Sampler
//!
//! $$
//! \mathbf{w}^{(k)}=\frac{\mathbf{u}^{(k)}}{\mathbf{1}^\top\mathbf{u}^{(k)}},\qquad
//! u^{(k)}_i\sim\mathcal U[0,1)
//! $$
//!
//! Seeded cloud of long-only portfolios plotted behind the frontier.

use ndarray::Array2;
use ndarray::Axis;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::data::Moments;
use super::types::PortfolioStats;

/// `count x n` matrix of random simplex weights, one portfolio per row.
pub fn random_portfolios(n: usize, count: usize, seed: u64) -> Array2<f64> {
  let mut rng = StdRng::seed_from_u64(seed);
  let mut weights = Array2::random_using((count, n), Uniform::new(0.0, 1.0), &mut rng);

  for mut row in weights.axis_iter_mut(Axis(0)) {
    let total = row.sum();
    if total > 0.0 {
      row /= total;
    } else if n > 0 {
      row.fill(1.0 / n as f64);
    }
  }
  weights
}

/// Statistics of `count` random portfolios drawn with `seed`.
pub fn scatter(moments: &Moments, count: usize, risk_free: f64, seed: u64) -> Vec<PortfolioStats> {
  let n = moments.n_assets();
  if n == 0 {
    return Vec::new();
  }

  random_portfolios(n, count, seed)
    .rows()
    .into_iter()
    .map(|row| moments.stats(&row.to_vec(), risk_free))
    .collect()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::Array1;

  use super::*;

  #[test]
  fn rows_are_long_only_and_fully_invested() {
    let w = random_portfolios(6, 500, 42);

    assert_eq!(w.dim(), (500, 6));
    for row in w.rows() {
      assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
      assert!(row.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }
  }

  #[test]
  fn same_seed_same_cloud() {
    assert_eq!(random_portfolios(4, 50, 42), random_portfolios(4, 50, 42));
    assert_ne!(random_portfolios(4, 50, 42), random_portfolios(4, 50, 43));
  }

  #[test]
  fn scatter_reports_every_sample() {
    let moments = Moments::new(array![0.01, 0.005], array![[0.0025, 0.0], [0.0, 0.0001]]).unwrap();
    let points = scatter(&moments, 500, 0.065, 42);

    assert_eq!(points.len(), 500);
    let lo = 12.0 * 0.005;
    let hi = 12.0 * 0.01;
    for p in &points {
      assert!(p.annual_return >= lo - 1e-12 && p.annual_return <= hi + 1e-12);
      assert!(p.annual_volatility > 0.0);
      assert!(p.sharpe.is_finite());
    }
  }

  #[test]
  fn no_assets_no_points() {
    let moments = Moments::new(Array1::zeros(0), Array2::zeros((0, 0))).unwrap();
    assert!(scatter(&moments, 10, 0.065, 42).is_empty());
  }
}
