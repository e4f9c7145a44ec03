//! Monte Carlo model of a small services company's monthly cash position,
//! with the bonus-pool, hiring-risk and cash-goal tools built on top of it.

pub mod api;
pub mod cache;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod logging;

pub use error::{ModelError, Result};
