//! # Observability
//!
//! Structured logging for the beam manager and the simulator built on it.
//! Engine code only emits `tracing` events; binaries and tests choose how
//! they are rendered by calling [`init_logging`] once at startup.
//!
//! ```text
//! engine ── tracing::info!/debug!/warn! ──► EnvFilter ──► fmt layer
//!                                                        (pretty | compact | json)
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
