//! Common types shared by every arbitrage component

pub mod errors;
pub mod fixed_point;
pub mod identifiers;
