//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf{w}\in[0,1]^n} \mathcal{L}(\mathbf{w})\quad\text{s.t.}\quad
//! \mathbf{1}^\top\mathbf{w}=1,\ \ 12\,\mu^\top\mathbf{w}=r^\*
//! $$
//!
//! Long-only max-Sharpe and min-variance allocation on the simplex, with an
//! optional target-return equality used by the efficient frontier.

use argmin::core::CostFunction;
use argmin::core::Error;
use argmin::core::Gradient;
use tracing::debug;
use tracing::warn;

use super::data::Moments;
use super::data::VOLATILITY_FLOOR;
use super::sqp::LinearEqualities;
use super::sqp::Sqp;
use super::types::equal_weights;
use super::types::Allocation;
use super::types::Objective;
use super::types::SolveStatus;
use crate::config::SolverConfig;
use crate::config::MONTHS_PER_YEAR;

/// Max absolute deviation for a solution to count as the equal-weight vector.
const EQUAL_WEIGHT_TOL: f64 = 1e-6;

/// Negative annualized Sharpe ratio; `+inf` below the volatility floor.
struct NegativeSharpe<'a> {
  moments: &'a Moments,
  risk_free: f64,
}

impl CostFunction for NegativeSharpe<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> Result<Self::Output, Error> {
    let ret = self.moments.annualized_return(w);
    let vol = self.moments.annualized_volatility(w);
    if vol > VOLATILITY_FLOOR {
      Ok(-(ret - self.risk_free) / vol)
    } else {
      Ok(f64::INFINITY)
    }
  }
}

impl Gradient for NegativeSharpe<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, w: &Self::Param) -> Result<Self::Gradient, Error> {
    let vol = self.moments.annualized_volatility(w);
    if vol <= VOLATILITY_FLOOR {
      return Ok(vec![0.0; w.len()]);
    }

    // d/dw [-(12 mu·w - rf) / sqrt(12 wᵀΣw)]
    let excess = self.moments.annualized_return(w) - self.risk_free;
    let sigma_w = self.moments.cov_times(w);
    let vol3 = vol.powi(3);
    Ok(
      self
        .moments
        .mean()
        .iter()
        .zip(sigma_w.iter())
        .map(|(mu, sw)| -MONTHS_PER_YEAR * mu / vol + excess * MONTHS_PER_YEAR * sw / vol3)
        .collect(),
    )
  }
}

/// Monthly portfolio variance `wᵀΣw`.
struct Variance<'a> {
  moments: &'a Moments,
}

impl CostFunction for Variance<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> Result<Self::Output, Error> {
    Ok(self.moments.portfolio_variance(w))
  }
}

impl Gradient for Variance<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, w: &Self::Param) -> Result<Self::Gradient, Error> {
    Ok(self.moments.cov_times(w).iter().map(|v| 2.0 * v).collect())
  }
}

/// Optimize long-only, fully invested weights for `objective`.
///
/// `target_return` (annualized) adds the equality `12 mu·w = target_return`.
/// The solve starts from equal weights; with a target it starts from the
/// nearest point on the segment between equal weights and the extreme-return
/// asset that meets the target. A failed solve returns equal weights with
/// [`SolveStatus::FellBack`].
pub fn optimize(
  moments: &Moments,
  objective: Objective,
  target_return: Option<f64>,
  risk_free: f64,
  solver: &SolverConfig,
) -> Allocation {
  let n = moments.n_assets();
  let equal = equal_weights(n);
  if n <= 1 {
    return Allocation {
      weights: equal,
      status: SolveStatus::EqualWeight,
    };
  }

  let mut constraints = LinearEqualities::new(n).with_row(&vec![1.0; n], 1.0);
  let mut x0 = equal.clone();
  if let Some(target) = target_return {
    let annual = moments.annualized_asset_returns().to_vec();
    x0 = feasible_start(&equal, &annual, target);
    constraints = constraints.with_row(&annual, target);
  }

  let sqp = Sqp::new(solver.tolerance, solver.max_iters);
  let lower = vec![0.0; n];
  let upper = vec![1.0; n];
  let report = match objective {
    Objective::MaxSharpe => {
      let problem = NegativeSharpe { moments, risk_free };
      sqp.minimize(&problem, x0, &constraints, &lower, &upper)
    }
    Objective::MinVariance => {
      let problem = Variance { moments };
      sqp.minimize(&problem, x0, &constraints, &lower, &upper)
    }
  };

  if !report.converged() {
    warn!(
      ?objective,
      ?target_return,
      termination = ?report.termination,
      iterations = report.iterations,
      "optimizer did not converge, falling back to equal weights"
    );
    return Allocation {
      weights: equal,
      status: SolveStatus::FellBack,
    };
  }

  let weights: Vec<f64> = report.param.iter().map(|w| w.clamp(0.0, 1.0)).collect();
  let is_equal = weights
    .iter()
    .zip(&equal)
    .all(|(w, e)| (w - e).abs() <= EQUAL_WEIGHT_TOL);
  debug!(
    ?objective,
    ?target_return,
    iterations = report.iterations,
    cost = report.cost,
    "optimizer converged"
  );

  Allocation {
    weights,
    status: if is_equal {
      SolveStatus::EqualWeight
    } else {
      SolveStatus::Optimized
    },
  }
}

/// Move `equal` towards the highest (or lowest) return asset until
/// `annual · w = target`. Targets outside the asset range stay infeasible.
fn feasible_start(equal: &[f64], annual: &[f64], target: f64) -> Vec<f64> {
  let current: f64 = equal.iter().zip(annual).map(|(w, r)| w * r).sum();
  let pick = |better: fn(f64, f64) -> bool| {
    annual
      .iter()
      .copied()
      .enumerate()
      .fold((0, annual[0]), |best, (i, r)| if better(r, best.1) { (i, r) } else { best })
  };
  let (idx, extreme) = if target >= current {
    pick(|a, b| a > b)
  } else {
    pick(|a, b| a < b)
  };

  let gap = extreme - current;
  if gap == 0.0 {
    return equal.to_vec();
  }

  let t = ((target - current) / gap).clamp(0.0, 1.0);
  let mut w: Vec<f64> = equal.iter().map(|wi| wi * (1.0 - t)).collect();
  w[idx] += t;
  w
}
