//! `webundo-core` — configuration and shared error types for webundo.

pub mod config;
pub mod error;

pub use config::{JobsConfig, WebundoConfig};
pub use error::{CoreError, Result};
