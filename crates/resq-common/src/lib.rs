//! ---
//! resq_section: "01-core-functionality"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Shared primitives and utilities for the metrics engine."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
//! Core shared primitives for the RESQ metrics workspace.
//! This crate exposes configuration loading and tracing bootstrap utilities
//! consumed by the metrics engine and its integration tests.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, AutarkyConfig, ExportConfig, LoadedAppConfig, LoggingConfig, ResolverConfig,
    ZeitgleichDenominator,
};
pub use logging::{init_tracing, LogFormat};
