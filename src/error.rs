//! Errors surfaced by the portfolio engine.

use thiserror::Error;

/// Errors returned before or instead of a portfolio computation.
///
/// Solver non-convergence is not an error: it is reported through
/// [`crate::quant::portfolio::SolveStatus`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
  /// The return panel is too short to compute anything meaningful.
  #[error("insufficient data: {months} monthly returns < minimum {required}")]
  InsufficientData { months: usize, required: usize },
  /// Dates, asset ids and the return matrix disagree on dimensions.
  #[error("return panel shape mismatch: {0}")]
  PanelShape(String),
  /// A panel column has no entry in the configured asset universe.
  #[error("asset `{0}` is not part of the configured universe")]
  UnknownAsset(String),
}

impl EngineError {
  /// `true` for the client-facing "not enough history" condition.
  pub fn is_insufficient_data(&self) -> bool {
    matches!(self, Self::InsufficientData { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display() {
    let err = EngineError::InsufficientData {
      months: 23,
      required: 24,
    };
    assert_eq!(
      err.to_string(),
      "insufficient data: 23 monthly returns < minimum 24"
    );
    assert!(err.is_insufficient_data());
    assert!(!EngineError::UnknownAsset("gold".into()).is_insufficient_data());
  }

  #[test]
  fn converts_into_anyhow() {
    let err: anyhow::Error = EngineError::PanelShape("3 dates for 2 rows".into()).into();
    assert!(err.to_string().contains("3 dates"));
    assert!(err.downcast_ref::<EngineError>().is_some());
  }
}
