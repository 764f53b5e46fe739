//! Shared configuration and error types for the citizen appeals service.
//!
//! - **Configuration**: layered settings via [`Config`]
//! - **Error handling**: the service-wide taxonomy via [`AppError`] and [`AppResult`]
//!
//! # Example
//!
//! ```no_run
//! use appeals_common::{AppResult, Config};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     println!("Listening on {}:{}", config.server.host, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
