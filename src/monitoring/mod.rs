//! Monitoring Module
//!
//! Provides observability for Agent Mesh:
//! - Structured logging via `tracing`

pub mod logging;

pub use logging::{init as init_logging, LogFormat, LogLevel, LoggerConfig};
