//! Common utilities and types shared across the NAADS client crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
