//! # Engine Configuration
//!
//! Runtime knobs for the optimizer, frontier, scatter sampler and bootstrap
//! simulator. Every field has a default matching the production service.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

/// Months per year used for annualization.
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Environment variable overriding [`EngineConfig::risk_free_rate`].
pub const RISK_FREE_RATE_ENV: &str = "RISK_FREE_RATE";

/// Termination settings for the SQP solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
  /// Step and relative objective-change tolerance.
  pub tolerance: f64,
  /// Outer SQP iteration cap.
  pub max_iters: u64,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      tolerance: 1e-9,
      max_iters: 1_000,
    }
  }
}

/// Block-bootstrap wealth simulation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
  /// Independent simulated paths.
  pub paths: usize,
  /// Forward horizon in months.
  pub horizon_months: usize,
  /// Contiguous historical months per bootstrap block.
  pub block_size: usize,
}

impl Default for SimulationConfig {
  fn default() -> Self {
    Self {
      paths: 5_000,
      horizon_months: 120,
      block_size: 3,
    }
  }
}

/// Runtime configuration for [`crate::quant::portfolio::PortfolioEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Annual risk-free rate as a plain decimal (0.065 = 6.5%).
  pub risk_free_rate: f64,
  /// Minimum monthly return rows required before optimizing.
  pub min_months: usize,
  /// Number of efficient-frontier targets.
  pub frontier_points: usize,
  /// Number of random portfolios in the scatter cloud.
  pub scatter_portfolios: usize,
  /// Seed shared by the scatter sampler and the bootstrap simulator.
  pub seed: u64,
  pub solver: SolverConfig,
  pub simulation: SimulationConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      risk_free_rate: 0.065,
      min_months: 24,
      frontier_points: 50,
      scatter_portfolios: 500,
      seed: 42,
      solver: SolverConfig::default(),
      simulation: SimulationConfig::default(),
    }
  }
}

impl EngineConfig {
  /// Load configuration from a JSON file; missing fields take their defaults.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
      .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
      .with_context(|| format!("failed to parse config file {}", path.display()))
  }

  /// Apply `RISK_FREE_RATE` from the process environment when it is set.
  pub fn with_env_overrides(self) -> Result<Self> {
    self.with_overrides_from(|key| env::var(key).ok())
  }

  fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    if let Some(raw) = lookup(RISK_FREE_RATE_ENV) {
      self.risk_free_rate = raw
        .trim()
        .parse()
        .with_context(|| format!("{RISK_FREE_RATE_ENV} must be a decimal, got `{raw}`"))?;
    }
    Ok(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_json_keeps_defaults() {
    let cfg: EngineConfig =
      serde_json::from_str(r#"{"risk_free_rate":0.05,"simulation":{"paths":100}}"#).unwrap();

    assert_eq!(cfg.risk_free_rate, 0.05);
    assert_eq!(cfg.simulation.paths, 100);
    assert_eq!(cfg.simulation.horizon_months, 120);
    assert_eq!(cfg.simulation.block_size, 3);
    assert_eq!(cfg.min_months, 24);
    assert_eq!(cfg.solver, SolverConfig::default());
  }

  #[test]
  fn risk_free_override() {
    let cfg = EngineConfig::default()
      .with_overrides_from(|key| (key == RISK_FREE_RATE_ENV).then(|| " 0.07 ".to_string()))
      .unwrap();
    assert_eq!(cfg.risk_free_rate, 0.07);

    let err = EngineConfig::default()
      .with_overrides_from(|_| Some("seven".to_string()))
      .unwrap_err();
    assert!(err.to_string().contains(RISK_FREE_RATE_ENV));
  }

  #[test]
  fn missing_file_reports_path() {
    let err = EngineConfig::from_path("/definitely/not/here.json").unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.json"));
  }
}
