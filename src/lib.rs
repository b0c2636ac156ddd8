//! # fund-frontier
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}\in\Delta} \frac{12\,\mathbf{w}^\top\mu-r_f}{\sqrt{12\,\mathbf{w}^\top\Sigma\mathbf{w}}}
//! $$
//!
//! Markowitz allocation (max Sharpe, min variance, efficient frontier) and
//! block-bootstrap wealth simulation over monthly mutual-fund return panels.

pub mod config;
pub mod error;
pub mod quant;
pub mod universe;

pub use config::EngineConfig;
pub use config::SimulationConfig;
pub use config::SolverConfig;
pub use error::EngineError;
pub use universe::Asset;
pub use universe::AssetUniverse;
