//! # NAV Resampling
//!
//! $$
//! r_t = \frac{\mathrm{NAV}_t}{\mathrm{NAV}_{t-1}} - 1
//! $$
//!
//! Turns raw daily NAV observations into the inner-joined monthly return
//! panel the optimizer consumes.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;

use anyhow::Context;
use anyhow::Result;
use chrono::Datelike;
use chrono::NaiveDate;
use ndarray::Array2;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::data::ReturnPanel;
use crate::universe::AssetUniverse;

/// Month-end NAVs an asset needs to yield twelve return observations.
pub const MIN_MONTHLY_NAVS: usize = 13;

/// One published NAV.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavObservation {
  pub date: NaiveDate,
  pub nav: f64,
}

/// Inclusive date window applied when loading NAV history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
    Self { start, end }
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }
}

impl Default for DateRange {
  fn default() -> Self {
    Self {
      start: NaiveDate::from_ymd_opt(2013, 1, 1).unwrap_or_default(),
      end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or_default(),
    }
  }
}

/// Provider of daily NAV history keyed by scheme code.
pub trait NavSource {
  fn load(&self, scheme_code: u32, range: &DateRange) -> Result<Vec<NavObservation>>;
}

impl NavSource for HashMap<u32, Vec<NavObservation>> {
  fn load(&self, scheme_code: u32, range: &DateRange) -> Result<Vec<NavObservation>> {
    Ok(
      self
        .get(&scheme_code)
        .map(|obs| {
          obs
            .iter()
            .filter(|o| range.contains(o.date))
            .copied()
            .collect()
        })
        .unwrap_or_default(),
    )
  }
}

/// Last calendar day of `year`-`month`.
pub(crate) fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
  let (next_year, next_month) = if month == 12 {
    (year + 1, 1)
  } else {
    (year, month + 1)
  };
  NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Month-end NAV series: last available NAV of each calendar month.
///
/// Invalid NAVs (non-finite or non-positive) are discarded, duplicate dates
/// keep the last value, and months without a publication carry the previous
/// month's NAV forward.
pub fn month_end_navs(observations: &[NavObservation]) -> BTreeMap<NaiveDate, f64> {
  let mut daily = BTreeMap::new();
  for obs in observations {
    if obs.nav.is_finite() && obs.nav > 0.0 {
      daily.insert(obs.date, obs.nav);
    }
  }

  let mut monthly = BTreeMap::new();
  let (Some((&first, _)), Some((&last, _))) = (daily.first_key_value(), daily.last_key_value())
  else {
    return monthly;
  };

  let mut carried = None;
  let mut daily_iter = daily.into_iter().peekable();
  let (mut year, mut month) = (first.year(), first.month());

  loop {
    let Some(label) = month_end(year, month) else {
      break;
    };
    while let Some((_, nav)) = daily_iter.next_if(|(date, _)| *date <= label) {
      carried = Some(nav);
    }
    if let Some(nav) = carried {
      monthly.insert(label, nav);
    }
    if label >= last {
      break;
    }
    (year, month) = if month == 12 {
      (year + 1, 1)
    } else {
      (year, month + 1)
    };
  }

  monthly
}

/// Load, resample and inner-join every asset of the universe.
///
/// Assets with fewer than [`MIN_MONTHLY_NAVS`] month-end NAVs are logged and dropped
/// from this run. When nothing survives the panel is empty.
pub fn load_monthly_returns(
  source: &impl NavSource,
  universe: &AssetUniverse,
  range: &DateRange,
) -> Result<ReturnPanel> {
  let mut series: Vec<(String, BTreeMap<NaiveDate, f64>)> = Vec::new();

  for asset in universe.iter() {
    let raw = source
      .load(asset.scheme_code, range)
      .with_context(|| format!("failed to load NAV history for `{}`", asset.id))?;
    let monthly = month_end_navs(&raw);

    if monthly.len() < MIN_MONTHLY_NAVS {
      warn!(
        asset = %asset.id,
        scheme_code = asset.scheme_code,
        months = monthly.len(),
        "dropping asset with insufficient NAV history"
      );
      continue;
    }
    series.push((asset.id.clone(), monthly));
  }

  let Some((_, first)) = series.first() else {
    return Ok(ReturnPanel::empty());
  };

  let common: BTreeSet<NaiveDate> = first
    .keys()
    .filter(|date| series.iter().all(|(_, s)| s.contains_key(*date)))
    .copied()
    .collect();
  let common: Vec<NaiveDate> = common.into_iter().collect();

  let n_assets = series.len();
  let n_months = common.len().saturating_sub(1);
  let mut returns = Array2::zeros((n_months, n_assets));

  for (col, (_, navs)) in series.iter().enumerate() {
    for (row, pair) in common.windows(2).enumerate() {
      returns[[row, col]] = navs[&pair[1]] / navs[&pair[0]] - 1.0;
    }
  }

  let asset_ids: Vec<String> = series.into_iter().map(|(id, _)| id).collect();
  debug!(
    assets = n_assets,
    months = n_months,
    "built monthly return panel"
  );

  let panel = ReturnPanel::new(asset_ids, common.iter().skip(1).copied().collect(), returns)?;
  Ok(match common.first() {
    Some(&base) => panel.with_base_date(base),
    None => panel,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::universe::Asset;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn obs(date: NaiveDate, nav: f64) -> NavObservation {
    NavObservation { date, nav }
  }

  /// One observation on the 15th of each month, NAV growing by `step`.
  fn mid_month_series(start_year: i32, months: usize, base: f64, step: f64) -> Vec<NavObservation> {
    (0..months)
      .map(|i| {
        let year = start_year + (i / 12) as i32;
        let month = (i % 12) as u32 + 1;
        obs(d(year, month, 15), base * (1.0 + step).powi(i as i32))
      })
      .collect()
  }

  #[test]
  fn month_end_handles_december_and_leap_years() {
    assert_eq!(month_end(2024, 2), Some(d(2024, 2, 29)));
    assert_eq!(month_end(2023, 2), Some(d(2023, 2, 28)));
    assert_eq!(month_end(2023, 12), Some(d(2023, 12, 31)));
  }

  #[test]
  fn month_end_navs_takes_last_value_and_forward_fills() {
    let raw = vec![
      obs(d(2020, 1, 10), 10.0),
      obs(d(2020, 1, 28), 11.0),
      obs(d(2020, 1, 28), 11.5),
      obs(d(2020, 1, 29), -1.0),
      obs(d(2020, 3, 5), 12.0),
      obs(d(2020, 3, 6), f64::NAN),
    ];
    let monthly = month_end_navs(&raw);

    let expected = vec![
      (d(2020, 1, 31), 11.5),
      (d(2020, 2, 29), 11.5),
      (d(2020, 3, 31), 12.0),
    ];
    assert_eq!(monthly.into_iter().collect::<Vec<_>>(), expected);
    assert!(month_end_navs(&[]).is_empty());
  }

  #[test]
  fn short_assets_are_dropped_and_series_inner_joined() {
    let universe = AssetUniverse::new(vec![
      Asset::new("equity", "Equity", 1),
      Asset::new("gold", "Gold", 2),
      Asset::new("young", "Young fund", 3),
    ]);
    let mut source: HashMap<u32, Vec<NavObservation>> = HashMap::new();
    source.insert(1, mid_month_series(2015, 36, 100.0, 0.01));
    // Gold starts six months later.
    source.insert(
      2,
      mid_month_series(2015, 36, 50.0, 0.02)
        .into_iter()
        .skip(6)
        .collect(),
    );
    source.insert(3, mid_month_series(2017, 12, 10.0, 0.0));

    let range = DateRange::new(d(2015, 1, 1), d(2017, 12, 31));
    let panel = load_monthly_returns(&source, &universe, &range).unwrap();

    assert_eq!(panel.asset_ids(), &["equity".to_string(), "gold".to_string()]);
    assert_eq!(panel.months(), 29);
    assert_eq!(panel.start_date(), Some(d(2015, 7, 31)));
    assert_eq!(panel.end_date(), Some(d(2017, 12, 31)));
    for t in 0..panel.months() {
      assert_abs_diff_eq!(panel.returns()[[t, 0]], 0.01, epsilon = 1e-12);
      assert_abs_diff_eq!(panel.returns()[[t, 1]], 0.02, epsilon = 1e-12);
    }
  }

  #[test]
  fn range_filters_observations() {
    let universe = AssetUniverse::new(vec![Asset::new("equity", "Equity", 1)]);
    let mut source: HashMap<u32, Vec<NavObservation>> = HashMap::new();
    source.insert(1, mid_month_series(2015, 48, 100.0, 0.01));

    let range = DateRange::new(d(2016, 1, 1), d(2016, 12, 31));
    let panel = load_monthly_returns(&source, &universe, &range).unwrap();
    // Twelve month-ends in range are below the survival threshold.
    assert!(panel.is_empty());

    let range = DateRange::new(d(2016, 1, 1), d(2017, 1, 31));
    let panel = load_monthly_returns(&source, &universe, &range).unwrap();
    assert_eq!(panel.months(), 12);
  }

  #[test]
  fn missing_scheme_yields_empty_panel() {
    let source: HashMap<u32, Vec<NavObservation>> = HashMap::new();
    let panel =
      load_monthly_returns(&source, &AssetUniverse::standard(), &DateRange::default()).unwrap();

    assert!(panel.is_empty());
    assert_eq!(panel.months(), 0);
  }
}
