//! Lumen - REST backend for the Lumen identity journey platform
//!
//! Gamified progression (XP, levels, achievements), subscription-tier
//! feature gating, engagement scoring, and a credit ledger over MongoDB,
//! served through a hyper HTTP API.

pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{LumenError, Result};
