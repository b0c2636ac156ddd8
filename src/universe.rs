//! # Asset Universe
//!
//! The small, hand-curated set of fund proxies a computation runs over.

use std::fs;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

/// One asset class proxy backed by an external NAV series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
  /// Stable key used in weight maps.
  pub id: String,
  /// Display label.
  pub label: String,
  /// External price-series reference (AMFI scheme code).
  pub scheme_code: u32,
}

impl Asset {
  pub fn new(id: impl Into<String>, label: impl Into<String>, scheme_code: u32) -> Self {
    Self {
      id: id.into(),
      label: label.into(),
      scheme_code,
    }
  }
}

/// Ordered asset universe handed to the engine at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetUniverse {
  assets: Vec<Asset>,
}

impl AssetUniverse {
  pub fn new(assets: Vec<Asset>) -> Self {
    Self { assets }
  }

  /// Direct-growth index and debt proxies comparable from January 2013.
  pub fn standard() -> Self {
    Self::new(vec![
      Asset::new("equity", "Passive Equity (Nifty 50)", 120716),
      Asset::new("gold", "Gold ETF", 111954),
      Asset::new("gilt", "Government Bonds", 119116),
      Asset::new("corp_bond", "Corporate Bonds", 118987),
      Asset::new("short_dur", "Short Duration Debt", 118780),
      Asset::new("liquid", "Liquid (Cash Proxy)", 119568),
    ])
  }

  /// Load a universe from a JSON array of assets.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
      .with_context(|| format!("failed to read universe file {}", path.display()))?;
    serde_json::from_str(&raw)
      .with_context(|| format!("failed to parse universe file {}", path.display()))
  }

  pub fn get(&self, id: &str) -> Option<&Asset> {
    self.assets.iter().find(|a| a.id == id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Asset> {
    self.assets.iter()
  }

  pub fn len(&self) -> usize {
    self.assets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.assets.is_empty()
  }
}
