//! # Binix Shields - Tracker Blocking Statistics
//!
//! Page-side instrumentation that observes which resource loads the network
//! layer blocked and reports each one to the host application, so the host
//! can show per-page tracker counts.
//!
//! ## Architecture
//!
//! - **page**: single-threaded page runtime (window, document, event loop,
//!   `XMLHttpRequest` and `Image` prototypes, mutation observers)
//! - **shields**: the interceptors and their lifecycle controller
//! - **channel**: page-to-host message channel and security token
//! - **host**: host-side statistics collection
//! - **utils**: shared error types

pub mod channel;
pub mod host;
pub mod page;
pub mod shields;
pub mod utils;

// Re-export main types for convenience
pub use shields::{ShieldsConfig, TrackingProtectionStats};
pub use utils::error::{Result, ShieldsError};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Binix Shields";
