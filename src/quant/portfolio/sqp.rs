//! # Sequential Quadratic Programming
//!
//! $$
//! \min_{\mathbf{x}} f(\mathbf{x})\quad\text{s.t.}\quad A\mathbf{x}=\mathbf{b},\ \ \mathbf{l}\le\mathbf{x}\le\mathbf{u}
//! $$
//!
//! Feasible-path SQP for smooth objectives under linear equality constraints
//! and box bounds. Each iteration solves
//!
//! $$
//! \min_{\mathbf{d}} \tfrac12\mathbf{d}^\top B\mathbf{d} + \nabla f^\top\mathbf{d}
//! \quad\text{s.t.}\quad A\mathbf{d}=0,\ \ \mathbf{l}-\mathbf{x}\le\mathbf{d}\le\mathbf{u}-\mathbf{x}
//! $$
//!
//! with a primal active-set method whose steps live in the null space of the
//! free columns of `A`, then backtracks along `d` (Armijo) and refreshes `B`
//! with a damped BFGS update. Accepted iterates are projected back onto
//! `A x = b` so rounding never accumulates into constraint drift.

use argmin::core::CostFunction;
use argmin::core::Gradient;
use nalgebra::DMatrix;
use nalgebra::DVector;
use tracing::trace;

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const FEASIBILITY_TOL: f64 = 1e-8;
const ACTIVE_TOL: f64 = 1e-12;
const QP_STEP_TOL: f64 = 1e-13;
const MULTIPLIER_RTOL: f64 = 1e-9;
const SVD_RCOND: f64 = 1e-12;
/// First-order residual, relative to the gradient, accepted when the line
/// search can no longer resolve a decrease.
const STALL_RTOL: f64 = 1e-6;

/// Why the solver stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
  /// First-order conditions, step or relative objective change fell below tolerance.
  Converged,
  /// Iteration cap reached first.
  MaxIterations,
  /// No step along the search direction decreased the objective away from a
  /// first-order point.
  LineSearchFailed,
  /// Start point violates the constraints.
  InfeasibleStart,
  /// Objective or gradient is not finite at the start point.
  NonFiniteStart,
  /// The objective returned an error.
  ObjectiveError,
}

/// Final iterate of an SQP run.
#[derive(Clone, Debug)]
pub struct SqpReport {
  pub param: Vec<f64>,
  pub cost: f64,
  pub iterations: u64,
  pub termination: Termination,
}

impl SqpReport {
  pub fn converged(&self) -> bool {
    self.termination == Termination::Converged
  }
}

/// Linear equality constraints `A x = b`.
#[derive(Clone, Debug)]
pub struct LinearEqualities {
  n: usize,
  rows: Vec<Vec<f64>>,
  rhs: Vec<f64>,
}

impl LinearEqualities {
  pub fn new(n: usize) -> Self {
    Self {
      n,
      rows: Vec::new(),
      rhs: Vec::new(),
    }
  }

  /// Append `coefficients · x = rhs`. Missing coefficients are zero.
  pub fn with_row(mut self, coefficients: &[f64], rhs: f64) -> Self {
    let mut row = vec![0.0; self.n];
    for (dst, src) in row.iter_mut().zip(coefficients) {
      *dst = *src;
    }
    self.rows.push(row);
    self.rhs.push(rhs);
    self
  }

  fn matrix(&self) -> DMatrix<f64> {
    DMatrix::from_fn(self.rows.len(), self.n, |r, c| self.rows[r][c])
  }

  fn rhs_vector(&self) -> DVector<f64> {
    DVector::from_column_slice(&self.rhs)
  }

  /// Largest absolute constraint violation at `x`.
  fn residual(&self, x: &DVector<f64>) -> f64 {
    self
      .rows
      .iter()
      .zip(&self.rhs)
      .map(|(row, b)| {
        let ax: f64 = row.iter().zip(x.iter()).map(|(a, xi)| a * xi).sum();
        (ax - b).abs()
      })
      .fold(0.0, f64::max)
  }
}

/// SQP driver configured with a tolerance and an iteration cap.
#[derive(Clone, Copy, Debug)]
pub struct Sqp {
  tolerance: f64,
  max_iters: u64,
}

impl Sqp {
  pub fn new(tolerance: f64, max_iters: u64) -> Self {
    Self {
      tolerance,
      max_iters,
    }
  }

  /// Minimize `problem` from the feasible start `x0`.
  pub fn minimize<O>(
    &self,
    problem: &O,
    x0: Vec<f64>,
    constraints: &LinearEqualities,
    lower: &[f64],
    upper: &[f64],
  ) -> SqpReport
  where
    O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
  {
    let n = x0.len();
    let finish = |x: &DVector<f64>, cost: f64, iterations: u64, termination: Termination| SqpReport {
      param: x.as_slice().to_vec(),
      cost,
      iterations,
      termination,
    };

    let lower = DVector::from_column_slice(lower);
    let upper = DVector::from_column_slice(upper);
    let mut x = DVector::from_vec(x0);

    let out_of_bounds =
      (0..n).any(|i| x[i] < lower[i] - FEASIBILITY_TOL || x[i] > upper[i] + FEASIBILITY_TOL);
    if out_of_bounds || constraints.residual(&x) > FEASIBILITY_TOL {
      return finish(&x, f64::NAN, 0, Termination::InfeasibleStart);
    }
    if n == 0 {
      return finish(&x, 0.0, 0, Termination::Converged);
    }

    let a = constraints.matrix();
    let b = constraints.rhs_vector();
    for i in 0..n {
      x[i] = x[i].clamp(lower[i], upper[i]);
    }
    restore_equalities(&mut x, &a, &b, &lower, &upper);

    let mut f = match cost_at(problem, &x) {
      Ok(f) if f.is_finite() => f,
      Ok(f) => return finish(&x, f, 0, Termination::NonFiniteStart),
      Err(_) => return finish(&x, f64::NAN, 0, Termination::ObjectiveError),
    };
    let mut g = match gradient_at(problem, &x) {
      Ok(g) if g.iter().all(|v| v.is_finite()) => g,
      Ok(_) => return finish(&x, f, 0, Termination::NonFiniteStart),
      Err(_) => return finish(&x, f, 0, Termination::ObjectiveError),
    };

    let mut hess = DMatrix::identity(n, n);
    let mut scaled = false;
    // `hess` is the plain identity; a failed line search is not retried.
    let mut fresh = true;

    for iter in 1..=self.max_iters {
      let lo = &lower - &x;
      let hi = &upper - &x;
      let first_order = first_order_residual(&g, &a, &lo, &hi);
      if first_order <= self.tolerance * (1.0 + g.amax()) {
        return finish(&x, f, iter, Termination::Converged);
      }

      let d = solve_qp(&hess, &g, &a, &lo, &hi);
      if d.amax() <= self.tolerance {
        return finish(&x, f, iter, Termination::Converged);
      }

      let slope = g.dot(&d);
      let mut accepted = None;
      if slope < 0.0 {
        let mut alpha = 1.0;
        for _ in 0..MAX_BACKTRACKS {
          let mut trial = &x + &d * alpha;
          for i in 0..n {
            trial[i] = trial[i].clamp(lower[i], upper[i]);
          }
          match cost_at(problem, &trial) {
            Ok(ft) if ft.is_finite() && ft <= f + ARMIJO * alpha * slope => {
              accepted = Some((trial, alpha));
              break;
            }
            Ok(_) => alpha *= 0.5,
            Err(_) => return finish(&x, f, iter, Termination::ObjectiveError),
          }
        }
      }

      let Some((mut x_new, alpha)) = accepted else {
        if !fresh {
          trace!(iter, "line search stalled, resetting curvature");
          hess = DMatrix::identity(n, n);
          scaled = false;
          fresh = true;
          continue;
        }
        let termination = if first_order <= STALL_RTOL * g.amax() + f64::EPSILON {
          Termination::Converged
        } else {
          Termination::LineSearchFailed
        };
        return finish(&x, f, iter, termination);
      };

      restore_equalities(&mut x_new, &a, &b, &lower, &upper);
      let f_new = match cost_at(problem, &x_new) {
        Ok(ft) if ft.is_finite() => ft,
        _ => return finish(&x, f, iter, Termination::ObjectiveError),
      };
      let g_new = match gradient_at(problem, &x_new) {
        Ok(g) if g.iter().all(|v| v.is_finite()) => g,
        _ => return finish(&x, f, iter, Termination::ObjectiveError),
      };

      let s = &x_new - &x;
      let y = &g_new - &g;
      if !scaled {
        let sy = s.dot(&y);
        if sy > 0.0 {
          hess = DMatrix::identity(n, n) * (y.norm_squared() / sy);
          scaled = true;
        }
      }
      damped_bfgs_update(&mut hess, &s, &y);
      fresh = false;

      let step = s.amax();
      let change = (f - f_new).abs();
      x = x_new;
      f = f_new;
      g = g_new;
      trace!(iter, cost = f, step, alpha, "sqp iteration");

      if step <= self.tolerance || change <= self.tolerance * f.abs() {
        return finish(&x, f, iter, Termination::Converged);
      }
    }

    finish(&x, f, self.max_iters, Termination::MaxIterations)
  }
}

fn cost_at<O>(problem: &O, x: &DVector<f64>) -> Result<f64, argmin::core::Error>
where
  O: CostFunction<Param = Vec<f64>, Output = f64>,
{
  problem.cost(&x.as_slice().to_vec())
}

fn gradient_at<O>(problem: &O, x: &DVector<f64>) -> Result<DVector<f64>, argmin::core::Error>
where
  O: Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
  problem.gradient(&x.as_slice().to_vec()).map(DVector::from_vec)
}

/// Largest entry of the projected steepest-descent step; zero exactly at a
/// first-order point.
fn first_order_residual(
  g: &DVector<f64>,
  a: &DMatrix<f64>,
  lo: &DVector<f64>,
  hi: &DVector<f64>,
) -> f64 {
  let n = g.len();
  solve_qp(&DMatrix::identity(n, n), g, a, lo, hi).amax()
}

/// Minimum-norm correction of `x` onto `A x = b` over the variables strictly
/// inside their bounds.
fn restore_equalities(
  x: &mut DVector<f64>,
  a: &DMatrix<f64>,
  b: &DVector<f64>,
  lower: &DVector<f64>,
  upper: &DVector<f64>,
) {
  if a.nrows() == 0 {
    return;
  }
  let residual = a * &*x - b;
  if residual.amax() == 0.0 {
    return;
  }
  let free: Vec<usize> = (0..x.len())
    .filter(|&i| x[i] > lower[i] && x[i] < upper[i])
    .collect();
  if free.is_empty() {
    return;
  }

  if let Some(delta) = pseudo_solve(a.select_columns(free.iter()), &residual) {
    for (k, &i) in free.iter().enumerate() {
      x[i] = (x[i] - delta[k]).clamp(lower[i], upper[i]);
    }
  }
}

/// Powell-damped BFGS update keeping `h` positive definite.
fn damped_bfgs_update(h: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) {
  let hs = &*h * s;
  let shs = s.dot(&hs);
  if !(shs > 0.0 && shs.is_finite()) {
    return;
  }

  let sy = s.dot(y);
  let r = if sy >= 0.2 * shs {
    y.clone()
  } else {
    let theta = 0.8 * shs / (shs - sy);
    y * theta + &hs * (1.0 - theta)
  };
  let sr = s.dot(&r);
  if !(sr > 0.0 && sr.is_finite()) {
    return;
  }

  *h += &r * r.transpose() / sr - &hs * hs.transpose() / shs;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bound {
  Lower,
  Upper,
}

/// Primal active-set solve of
/// `min ½ dᵀHd + gᵀd  s.t.  A d = 0,  lo <= d <= hi` with `lo <= 0 <= hi`.
fn solve_qp(
  h: &DMatrix<f64>,
  g: &DVector<f64>,
  a: &DMatrix<f64>,
  lo: &DVector<f64>,
  hi: &DVector<f64>,
) -> DVector<f64> {
  let n = g.len();
  let mut d = DVector::zeros(n);
  let mut working: Vec<Option<Bound>> = (0..n)
    .map(|i| {
      if lo[i] >= -ACTIVE_TOL {
        Some(Bound::Lower)
      } else if hi[i] <= ACTIVE_TOL {
        Some(Bound::Upper)
      } else {
        None
      }
    })
    .collect();

  for _ in 0..(10 * (n + a.nrows()) + 20) {
    let free: Vec<usize> = (0..n).filter(|&i| working[i].is_none()).collect();
    let grad = h * &d + g;
    let Some((p, lambda)) = working_set_step(h, &grad, a, &free) else {
      break;
    };

    if p.amax() <= QP_STEP_TOL {
      let full = &grad + a.transpose() * &lambda;
      let tol = MULTIPLIER_RTOL * full.amax();
      let mut release: Option<(usize, f64)> = None;
      for (i, bound) in working.iter().enumerate() {
        let multiplier = match bound {
          Some(Bound::Lower) => full[i],
          Some(Bound::Upper) => -full[i],
          None => continue,
        };
        if multiplier < -tol && release.map_or(true, |(_, worst)| multiplier < worst) {
          release = Some((i, multiplier));
        }
      }
      match release {
        Some((i, _)) => working[i] = None,
        None => return d,
      }
      continue;
    }

    let mut alpha = 1.0;
    let mut blocking = None;
    for (k, &i) in free.iter().enumerate() {
      let (limit, bound) = if p[k] < 0.0 {
        (lo[i], Bound::Lower)
      } else if p[k] > 0.0 {
        (hi[i], Bound::Upper)
      } else {
        continue;
      };
      let ratio = ((limit - d[i]) / p[k]).max(0.0);
      if ratio < alpha {
        alpha = ratio;
        blocking = Some((i, bound));
      }
    }

    for (k, &i) in free.iter().enumerate() {
      d[i] += alpha * p[k];
    }
    if let Some((i, bound)) = blocking {
      d[i] = match bound {
        Bound::Lower => lo[i],
        Bound::Upper => hi[i],
      };
      working[i] = Some(bound);
    }
  }

  d
}

/// Minimizer step over the free variables with the working bounds fixed,
/// plus the equality multipliers.
///
/// The step is `Z u` with `Z` an orthonormal basis of the null space of the
/// free columns of `A`, so it never leaves the equality constraints.
fn working_set_step(
  h: &DMatrix<f64>,
  grad: &DVector<f64>,
  a: &DMatrix<f64>,
  free: &[usize],
) -> Option<(DVector<f64>, DVector<f64>)> {
  let k = free.len();

  if k == 0 {
    let lambda = pseudo_solve(a.transpose(), &(-grad))?;
    return Some((DVector::zeros(0), lambda));
  }

  let a_free = a.select_columns(free.iter());
  let h_free = h.select_rows(free.iter()).select_columns(free.iter());
  let g_free = DVector::from_iterator(k, free.iter().map(|&i| grad[i]));

  let z = null_space(&a_free);
  let p = if z.ncols() == 0 {
    DVector::zeros(k)
  } else {
    let reduced = z.transpose() * &h_free * &z;
    let rhs = -(z.transpose() * &g_free);
    let u = match reduced.clone().cholesky() {
      Some(chol) => chol.solve(&rhs),
      None => pseudo_solve(reduced, &rhs)?,
    };
    &z * u
  };

  let lambda = pseudo_solve(a_free.transpose(), &(-g_free))?;
  Some((p, lambda))
}

/// Orthonormal basis (columns) of `{v : A v = 0}`.
///
/// Built from the eigenvectors of the projector `I - V_rᵀV_r`, whose
/// eigenvalues are exactly 0 or 1, so the basis is accurate to rounding.
fn null_space(a: &DMatrix<f64>) -> DMatrix<f64> {
  let k = a.ncols();
  if k == 0 {
    return DMatrix::zeros(0, 0);
  }

  let mut projector = DMatrix::identity(k, k);
  if a.nrows() > 0 {
    let svd = a.clone().svd(false, true);
    if let Some(v_t) = svd.v_t {
      let cutoff = SVD_RCOND * svd.singular_values.max();
      for (i, &sigma) in svd.singular_values.iter().enumerate() {
        if sigma > cutoff {
          let v = v_t.row(i).transpose();
          projector -= &v * v.transpose();
        }
      }
    }
  }

  let eig = projector.symmetric_eigen();
  let cols: Vec<usize> = (0..k).filter(|&i| eig.eigenvalues[i] > 0.5).collect();
  DMatrix::from_fn(k, cols.len(), |r, c| eig.eigenvectors[(r, cols[c])])
}

/// Minimum-norm least-squares solution; tolerates redundant equality rows.
fn pseudo_solve(matrix: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
  if matrix.ncols() == 0 {
    return Some(DVector::zeros(0));
  }
  if matrix.nrows() == 0 {
    return Some(DVector::zeros(matrix.ncols()));
  }
  let svd = matrix.svd(true, true);
  let eps = SVD_RCOND * svd.singular_values.max();
  svd.solve(rhs, eps).ok()
}
