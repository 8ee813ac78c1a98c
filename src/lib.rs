//! Trade Sync - Main Library
//!
//! Real-time trading synchronization core.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (config paths)
//! - **tradesync**: Orders, positions, P&L sync (re-exported from workspace)
//! - **hypersockets**: WebSocket library (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use trade_sync::bin_common::{load_config_from_env, ConfigType};
//! use trade_sync::tradesync::{SyncConfig, TradingStream};
//! ```

// Re-export workspace libraries for convenience
pub use hypersockets;
pub use tradesync;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{load_config_from_env, ConfigType};
}
