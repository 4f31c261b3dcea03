//! Common utilities for rust-usb-bridge
//!
//! This crate provides the ambient pieces shared across the workspace:
//! error handling, logging setup, and the test utilities that stand in for
//! the native USB core (transfer pool, descriptor fixtures).

pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::setup_logging;
