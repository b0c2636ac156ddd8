//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Long-only portfolio optimization, efficient frontier, random scatter and
//! block-bootstrap wealth simulation over monthly return panels.

pub mod bootstrap;
pub mod data;
pub mod engine;
pub mod frontier;
pub mod nav;
pub mod optimizers;
pub mod report;
pub mod sampler;
pub mod sqp;
pub mod types;

pub use bootstrap::simulate;
pub use data::sharpe_ratio;
pub use data::Moments;
pub use data::ReturnPanel;
pub use engine::PortfolioEngine;
pub use frontier::efficient_frontier;
pub use nav::load_monthly_returns;
pub use nav::month_end_navs;
pub use nav::DateRange;
pub use nav::NavObservation;
pub use nav::NavSource;
pub use optimizers::optimize;
pub use report::OptimizationReport;
pub use report::PointReport;
pub use report::PortfolioReport;
pub use sampler::random_portfolios;
pub use sampler::scatter;
pub use types::Allocation;
pub use types::Objective;
pub use types::PortfolioStats;
pub use types::SolveStatus;
pub use types::WealthBand;
