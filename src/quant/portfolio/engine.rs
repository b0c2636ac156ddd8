//! # Portfolio Engine
//!
//! $$
//! (\hat\mu,\hat\Sigma)\ \to\ \{\mathbf{w}_{\text{sharpe}},\ \mathbf{w}_{\text{minvar}},\ \mathbf{w}_{\text{eq}}\}
//! \ \to\ \text{frontier},\ \text{scatter},\ \text{wealth bands}
//! $$
//!
//! High-level orchestration API: one call turns a monthly return panel into
//! the full optimization report.

use tracing::debug;
use tracing::info;

use super::bootstrap::simulate;
use super::data::Moments;
use super::data::ReturnPanel;
use super::frontier::efficient_frontier;
use super::optimizers::optimize;
use super::report::OptimizationReport;
use super::report::PointReport;
use super::report::PortfolioReport;
use super::sampler::scatter;
use super::types::equal_weights;
use super::types::Allocation;
use super::types::Objective;
use super::types::SolveStatus;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::universe::Asset;
use crate::universe::AssetUniverse;

/// Single entry-point engine for the allocation pipeline.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: EngineConfig,
  universe: AssetUniverse,
}

impl Default for PortfolioEngine {
  fn default() -> Self {
    Self::new(EngineConfig::default(), AssetUniverse::standard())
  }
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: EngineConfig, universe: AssetUniverse) -> Self {
    Self { config, universe }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn universe(&self) -> &AssetUniverse {
    &self.universe
  }

  /// Optimize, trace the frontier, sample the scatter and simulate wealth
  /// for the max-Sharpe, min-variance and equal-weight portfolios.
  ///
  /// Panels shorter than [`EngineConfig::min_months`] are rejected before any
  /// numeric work.
  pub fn run(&self, panel: &ReturnPanel) -> Result<OptimizationReport, EngineError> {
    let cfg = &self.config;
    if panel.is_empty() || panel.months() < cfg.min_months {
      return Err(EngineError::InsufficientData {
        months: panel.months(),
        required: cfg.min_months,
      });
    }

    let assets = panel
      .asset_ids()
      .iter()
      .map(|id| {
        self
          .universe
          .get(id)
          .cloned()
          .ok_or_else(|| EngineError::UnknownAsset(id.clone()))
      })
      .collect::<Result<Vec<Asset>, _>>()?;

    info!(
      assets = panel.n_assets(),
      months = panel.months(),
      risk_free = cfg.risk_free_rate,
      "running portfolio optimization"
    );

    let moments = Moments::estimate(panel)?;
    let rf = cfg.risk_free_rate;
    let max_sharpe = optimize(&moments, Objective::MaxSharpe, None, rf, &cfg.solver);
    let min_variance = optimize(&moments, Objective::MinVariance, None, rf, &cfg.solver);
    let equal_weight = Allocation {
      weights: equal_weights(panel.n_assets()),
      status: SolveStatus::EqualWeight,
    };
    debug!(
      max_sharpe = ?max_sharpe.status,
      min_variance = ?min_variance.status,
      "solved named portfolios"
    );

    let frontier = efficient_frontier(&moments, rf, cfg.frontier_points, &cfg.solver);
    let cloud = scatter(&moments, cfg.scatter_portfolios, rf, cfg.seed);

    let run_sim = |alloc: &Allocation| simulate(panel, &alloc.weights, &cfg.simulation, cfg.seed);
    let (sharpe_bands, (minvar_bands, equal_bands)) = rayon::join(
      || run_sim(&max_sharpe),
      || rayon::join(|| run_sim(&min_variance), || run_sim(&equal_weight)),
    );

    let ids = panel.asset_ids();
    let named = |alloc: &Allocation, bands| {
      PortfolioReport::new(ids, alloc, moments.stats(&alloc.weights, rf), bands)
    };
    let report = OptimizationReport {
      assets,
      max_sharpe: named(&max_sharpe, sharpe_bands),
      min_variance: named(&min_variance, minvar_bands),
      equal_weight: named(&equal_weight, equal_bands),
      frontier: frontier.into_iter().map(PointReport::from).collect(),
      mc_scatter: cloud.into_iter().map(PointReport::from).collect(),
      risk_free_rate: rf,
      start_date: panel.start_date(),
      end_date: panel.end_date(),
      months: panel.months(),
    };

    info!(
      sharpe = report.max_sharpe.sharpe,
      frontier = report.frontier.len(),
      "portfolio optimization finished"
    );
    Ok(report)
  }
}
