//! Common utilities and types shared across uptime components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
