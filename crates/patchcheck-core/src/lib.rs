//! Baseline-driven file integrity verification and patch reconciliation.

pub mod config;
pub mod logging;

pub mod checksum;
pub mod control;
pub mod error;
pub mod fs;
pub mod manifest;
pub mod reconcile;
pub mod registry;
pub mod transport;
pub mod verify;

pub use error::{Error, Result, TransportError};
