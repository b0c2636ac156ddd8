//! # Quant
//!
//! Portfolio construction and simulation over monthly fund returns.

pub mod portfolio;
