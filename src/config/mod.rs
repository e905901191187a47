//! Configuration constants and structures for the widget runtime
//!
//! This module centralizes all configuration values so sandbox limits, error
//! codes and generation-service settings are adjusted in one place.

pub mod errors;
pub mod limits;
pub mod service;

pub use service::{HeadersMap, ServiceConfig};
