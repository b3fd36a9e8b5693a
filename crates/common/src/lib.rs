//! Common utilities and shared types for ferry.
//!
//! This crate provides foundational components used across all ferry crates:
//!
//! - **Configuration**: Relay settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Keys**: RSA key loading for the relay actor via [`KeyStore`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use ferry_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     println!("{} -> {}", id_gen.generate(), config.inbox_url()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod keys;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use keys::KeyStore;
