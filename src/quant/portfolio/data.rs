//! # Portfolio Data Utilities
//!
//! $$
//! \hat\mu = \frac{1}{T}\sum_t r_t,\qquad
//! \hat\Sigma = \frac{1}{T-1}\sum_t (r_t-\hat\mu)(r_t-\hat\mu)^\top
//! $$
//!
//! Monthly return panel and the moment estimator built on it.

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use super::types::PortfolioStats;
use crate::config::MONTHS_PER_YEAR;
use crate::error::EngineError;

/// Annualized volatility at or below this is treated as zero.
pub const VOLATILITY_FLOOR: f64 = 1e-9;

/// Month-end indexed simple returns, one column per surviving asset.
///
/// Every cell is populated: the panel is the inner join of the asset series.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnPanel {
  asset_ids: Vec<String>,
  dates: Vec<NaiveDate>,
  returns: Array2<f64>,
  base_date: Option<NaiveDate>,
}

impl ReturnPanel {
  /// Build a panel from `returns` with shape `(dates.len(), asset_ids.len())`.
  pub fn new(
    asset_ids: Vec<String>,
    dates: Vec<NaiveDate>,
    returns: Array2<f64>,
  ) -> Result<Self, EngineError> {
    if returns.nrows() != dates.len() {
      return Err(EngineError::PanelShape(format!(
        "{} dates for {} return rows",
        dates.len(),
        returns.nrows()
      )));
    }
    if returns.ncols() != asset_ids.len() {
      return Err(EngineError::PanelShape(format!(
        "{} asset ids for {} return columns",
        asset_ids.len(),
        returns.ncols()
      )));
    }
    if let Some(((row, col), _)) = returns.indexed_iter().find(|(_, r)| !r.is_finite()) {
      return Err(EngineError::PanelShape(format!(
        "non-finite return for `{}` at row {row}",
        asset_ids[col]
      )));
    }

    Ok(Self {
      asset_ids,
      dates,
      returns,
      base_date: None,
    })
  }

  /// Panel with no assets and no months.
  pub fn empty() -> Self {
    Self {
      asset_ids: Vec::new(),
      dates: Vec::new(),
      returns: Array2::zeros((0, 0)),
      base_date: None,
    }
  }

  /// Record the month-end NAV date the first return is measured from.
  pub(crate) fn with_base_date(mut self, date: NaiveDate) -> Self {
    self.base_date = Some(date);
    self
  }

  pub fn asset_ids(&self) -> &[String] {
    &self.asset_ids
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Returns matrix, rows = months, columns = assets.
  pub fn returns(&self) -> ArrayView2<'_, f64> {
    self.returns.view()
  }

  pub fn months(&self) -> usize {
    self.returns.nrows()
  }

  pub fn n_assets(&self) -> usize {
    self.asset_ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.months() == 0 || self.n_assets() == 0
  }

  /// First date of the underlying NAV window (the base month when known).
  pub fn start_date(&self) -> Option<NaiveDate> {
    self.base_date.or_else(|| self.dates.first().copied())
  }

  pub fn end_date(&self) -> Option<NaiveDate> {
    self.dates.last().copied()
  }

  /// Historical monthly portfolio returns `r_t = w · panel[t]`.
  ///
  /// `weights` must have one entry per asset; ndarray panics otherwise.
  pub fn portfolio_returns(&self, weights: &[f64]) -> Array1<f64> {
    debug_assert_eq!(weights.len(), self.n_assets(), "one weight per asset");
    self.returns.dot(&ArrayView1::from(weights))
  }
}

/// Mean vector and covariance matrix in monthly units.
#[derive(Clone, Debug, PartialEq)]
pub struct Moments {
  mean: Array1<f64>,
  cov: Array2<f64>,
}

impl Moments {
  /// Wrap precomputed moments; `cov` must be `n x n` for a length-`n` mean.
  pub fn new(mean: Array1<f64>, cov: Array2<f64>) -> Result<Self, EngineError> {
    let n = mean.len();
    if cov.dim() != (n, n) {
      return Err(EngineError::PanelShape(format!(
        "covariance is {:?} for {n} means",
        cov.dim()
      )));
    }
    Ok(Self { mean, cov })
  }

  /// Sample mean and sample covariance (ddof = 1) of the panel columns.
  pub fn estimate(panel: &ReturnPanel) -> Result<Self, EngineError> {
    let insufficient = || EngineError::InsufficientData {
      months: panel.months(),
      required: 2,
    };
    if panel.n_assets() == 0 || panel.months() < 2 {
      return Err(insufficient());
    }

    let returns = panel.returns();
    let mean = returns.mean_axis(Axis(0)).ok_or_else(insufficient)?;
    // ndarray-stats treats rows as variables.
    let cov = returns.t().cov(1.0).map_err(|_| insufficient())?;

    Ok(Self { mean, cov })
  }

  pub fn mean(&self) -> ArrayView1<'_, f64> {
    self.mean.view()
  }

  pub fn cov(&self) -> ArrayView2<'_, f64> {
    self.cov.view()
  }

  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  /// Monthly expected portfolio return `w·mu`.
  pub fn portfolio_return(&self, weights: &[f64]) -> f64 {
    self.mean.dot(&ArrayView1::from(weights))
  }

  /// Monthly portfolio variance `wᵀΣw`.
  pub fn portfolio_variance(&self, weights: &[f64]) -> f64 {
    let w = ArrayView1::from(weights);
    w.dot(&self.cov.dot(&w))
  }

  /// Portfolio covariance with each asset, `Σw`.
  pub(crate) fn cov_times(&self, weights: &[f64]) -> Array1<f64> {
    self.cov.dot(&ArrayView1::from(weights))
  }

  pub fn annualized_return(&self, weights: &[f64]) -> f64 {
    MONTHS_PER_YEAR * self.portfolio_return(weights)
  }

  /// `sqrt(12 * wᵀΣw)`; a negative quadratic form counts as zero volatility.
  pub fn annualized_volatility(&self, weights: &[f64]) -> f64 {
    (MONTHS_PER_YEAR * self.portfolio_variance(weights))
      .max(0.0)
      .sqrt()
  }

  /// Per-asset annualized mean returns `12 * mu_i`.
  pub fn annualized_asset_returns(&self) -> Array1<f64> {
    &self.mean * MONTHS_PER_YEAR
  }

  pub fn stats(&self, weights: &[f64], risk_free: f64) -> PortfolioStats {
    let annual_return = self.annualized_return(weights);
    let annual_volatility = self.annualized_volatility(weights);

    PortfolioStats {
      annual_return,
      annual_volatility,
      sharpe: sharpe_ratio(annual_return, annual_volatility, risk_free),
    }
  }
}

/// Annualized Sharpe ratio with the volatility floor applied.
pub fn sharpe_ratio(annual_return: f64, annual_volatility: f64, risk_free: f64) -> f64 {
  if annual_volatility > VOLATILITY_FLOOR {
    (annual_return - risk_free) / annual_volatility
  } else {
    f64::NEG_INFINITY
  }
}


#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::fixtures::month_ends;
  use super::fixtures::panel_from_rows;
  use super::*;

  #[test]
  fn moments_match_hand_computed_values() {
    let panel = panel_from_rows(
      &["a", "b"],
      &[vec![0.01, 0.02], vec![0.03, 0.00], vec![0.02, 0.01]],
    );
    let m = Moments::estimate(&panel).unwrap();

    assert_abs_diff_eq!(m.mean()[0], 0.02, epsilon = 1e-15);
    assert_abs_diff_eq!(m.mean()[1], 0.01, epsilon = 1e-15);
    assert_abs_diff_eq!(m.cov()[[0, 0]], 1e-4, epsilon = 1e-15);
    assert_abs_diff_eq!(m.cov()[[1, 1]], 1e-4, epsilon = 1e-15);
    assert_abs_diff_eq!(m.cov()[[0, 1]], -1e-4, epsilon = 1e-15);
    assert_eq!(m.cov()[[0, 1]], m.cov()[[1, 0]]);
  }

  #[test]
  fn estimate_rejects_degenerate_panels() {
    let one_row = panel_from_rows(&["a"], &[vec![0.01]]);
    assert_eq!(
      Moments::estimate(&one_row),
      Err(EngineError::InsufficientData {
        months: 1,
        required: 2
      })
    );
    assert!(Moments::estimate(&ReturnPanel::empty()).is_err());
  }

  #[test]
  fn panel_shape_is_validated() {
    let err = ReturnPanel::new(
      vec!["a".into()],
      month_ends(3),
      Array2::zeros((2, 1)),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::PanelShape(_)));

    let err = ReturnPanel::new(
      vec!["a".into(), "b".into()],
      month_ends(1),
      array![[0.01, f64::NAN]],
    )
    .unwrap_err();
    assert!(err.to_string().contains("`b`"));
  }

  #[test]
  fn start_date_prefers_base_month() {
    let panel = panel_from_rows(&["a"], &[vec![0.01], vec![0.02]]);
    assert_eq!(panel.start_date(), panel.dates().first().copied());

    let base = NaiveDate::from_ymd_opt(2014, 12, 31).unwrap();
    let panel = panel.with_base_date(base);
    assert_eq!(panel.start_date(), Some(base));
    assert_eq!(panel.end_date(), panel.dates().last().copied());
  }

  #[test]
  fn annualized_stats() {
    let m = Moments::new(array![0.01, 0.02], array![[0.0004, 0.0], [0.0, 0.0009]]).unwrap();
    let stats = m.stats(&[0.5, 0.5], 0.065);

    assert_abs_diff_eq!(stats.annual_return, 0.18, epsilon = 1e-12);
    let vol = (12.0_f64 * (0.25 * 0.0004 + 0.25 * 0.0009)).sqrt();
    assert_abs_diff_eq!(stats.annual_volatility, vol, epsilon = 1e-12);
    assert_abs_diff_eq!(stats.sharpe, (0.18 - 0.065) / vol, epsilon = 1e-12);
  }

  #[test]
  fn volatility_floor_guards_sharpe() {
    let zero = Moments::new(array![0.01], array![[0.0]]).unwrap();
    assert_eq!(zero.stats(&[1.0], 0.065).sharpe, f64::NEG_INFINITY);

    let negative = Moments::new(array![0.01], array![[-0.0004]]).unwrap();
    let stats = negative.stats(&[1.0], 0.065);
    assert_eq!(stats.annual_volatility, 0.0);
    assert_eq!(stats.sharpe, f64::NEG_INFINITY);
  }

  #[test]
  fn portfolio_returns_follow_weights() {
    let panel = panel_from_rows(&["a", "b"], &[vec![0.02, 0.0], vec![-0.01, 0.03]]);
    let r = panel.portfolio_returns(&[0.25, 0.75]);

    assert_abs_diff_eq!(r[0], 0.005, epsilon = 1e-15);
    assert_abs_diff_eq!(r[1], 0.02, epsilon = 1e-15);
  }
}
