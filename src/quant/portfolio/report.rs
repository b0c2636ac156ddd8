//! # Optimization Report
//!
//! Serializable result of one engine run, rounded for presentation:
//! percentages and Sharpe ratios to 4 decimals, weights to 6 decimals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::types::Allocation;
use super::types::PortfolioStats;
use super::types::SolveStatus;
use super::types::WealthBand;
use crate::universe::Asset;

const STAT_DECIMALS: i32 = 4;
const WEIGHT_DECIMALS: i32 = 6;

/// Round half away from zero to `decimals` places; non-finite values pass through.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
  if !value.is_finite() {
    return value;
  }
  let scale = 10f64.powi(decimals);
  (value * scale).round() / scale
}

/// One `(return %, volatility %, sharpe)` point of the frontier or scatter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PointReport {
  pub ret: f64,
  pub vol: f64,
  /// `null` in JSON when the volatility floor was hit.
  pub sharpe: f64,
}

impl From<PortfolioStats> for PointReport {
  fn from(stats: PortfolioStats) -> Self {
    Self {
      ret: round_to(stats.annual_return * 100.0, STAT_DECIMALS),
      vol: round_to(stats.annual_volatility * 100.0, STAT_DECIMALS),
      sharpe: round_to(stats.sharpe, STAT_DECIMALS),
    }
  }
}

/// A named portfolio with its weights and simulated wealth bands.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortfolioReport {
  pub weights: BTreeMap<String, f64>,
  pub ret: f64,
  pub vol: f64,
  pub sharpe: f64,
  pub status: SolveStatus,
  pub monte_carlo: Vec<WealthBand>,
}

impl PortfolioReport {
  pub fn new(
    asset_ids: &[String],
    allocation: &Allocation,
    stats: PortfolioStats,
    bands: Vec<WealthBand>,
  ) -> Self {
    let point = PointReport::from(stats);
    Self {
      weights: asset_ids
        .iter()
        .cloned()
        .zip(allocation.weights.iter().map(|w| round_to(*w, WEIGHT_DECIMALS)))
        .collect(),
      ret: point.ret,
      vol: point.vol,
      sharpe: point.sharpe,
      status: allocation.status,
      monte_carlo: bands
        .into_iter()
        .map(|b| WealthBand {
          month: b.month,
          p5: round_to(b.p5, STAT_DECIMALS),
          p25: round_to(b.p25, STAT_DECIMALS),
          p50: round_to(b.p50, STAT_DECIMALS),
          p75: round_to(b.p75, STAT_DECIMALS),
          p95: round_to(b.p95, STAT_DECIMALS),
        })
        .collect(),
    }
  }
}

/// Full engine output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizationReport {
  /// Metadata for every panel column, in panel order.
  pub assets: Vec<Asset>,
  pub max_sharpe: PortfolioReport,
  pub min_variance: PortfolioReport,
  pub equal_weight: PortfolioReport,
  pub frontier: Vec<PointReport>,
  pub mc_scatter: Vec<PointReport>,
  pub risk_free_rate: f64,
  pub start_date: Option<NaiveDate>,
  pub end_date: Option<NaiveDate>,
  pub months: usize,
}
