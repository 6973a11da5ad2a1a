//! Configuration for Lumen
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Lumen - REST backend for the Lumen identity journey platform
#[derive(Parser, Debug, Clone)]
#[command(name = "lumen")]
#[command(about = "REST backend for the Lumen identity journey platform")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "lumen")]
    pub mongodb_db: String,

    /// Enable development mode (server starts without MongoDB, health only)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path to a JSON feature-access table overriding the built-in matrix
    #[arg(long, env = "FEATURE_TABLE")]
    pub feature_table: Option<String>,

    /// Age in minutes after which a pending debit transaction is considered
    /// abandoned and marked failed during startup recovery
    #[arg(long, env = "PENDING_TXN_MAX_AGE_MINUTES", default_value = "60")]
    pub pending_txn_max_age_minutes: i64,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.pending_txn_max_age_minutes <= 0 {
            return Err("PENDING_TXN_MAX_AGE_MINUTES must be positive".to_string());
        }

        if let Some(ref path) = self.feature_table {
            if path.trim().is_empty() {
                return Err("FEATURE_TABLE must not be empty when set".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["lumen"])
    }

    #[test]
    fn default_args_validate() {
        assert!(base_args().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_recovery_age() {
        let mut args = base_args();
        args.pending_txn_max_age_minutes = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn rejects_blank_feature_table_path() {
        let mut args = base_args();
        args.feature_table = Some("  ".to_string());
        assert!(args.validate().is_err());
    }
}
