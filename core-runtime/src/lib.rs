//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the episode sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management with environment overrides
//!
//! ## Overview
//!
//! This crate contains the runtime utilities every other crate depends on.
//! It owns the `AppConfig` shape and the logging conventions used across the
//! workspace, and nothing about reconciliation itself.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, AppConfigBuilder, IdRange, SourceKind};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
