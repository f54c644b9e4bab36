//! Realtime Collaboration Client - Main Library
//!
//! ## Architecture
//!
//! - **livesockets**: Resilient connection manager (re-exported from workspace)
//! - **bin_common**: Common utilities for binary executables (CLI, logging, runners)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use realtime_collab::bin_common::{load_config_from_env, ConfigType};
//! use realtime_collab::livesockets::ConnectionOptions;
//! ```

// Re-export workspace libraries for convenience
pub use livesockets;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod runner;

    pub use cli::{load_config_from_env, optional_env, ConfigType};
    pub use logging::init_tracing;
    pub use runner::{BinaryRunner, RunConfig, ShutdownManager};
}
