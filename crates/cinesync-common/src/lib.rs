//! cinesync common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pieces shared by the cinesync workspace members:
//!
//! - **Logging**: subscriber setup driven by `LOG_*` environment variables
//! - **Environment**: typed lookups for configuration variables
//! - **Errors**: the error type those two report through
//!
//! # Example
//!
//! ```no_run
//! use cinesync_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> cinesync_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
