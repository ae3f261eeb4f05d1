//! # Utilities
//!
//! - **Compression**: no-op, LZ4 and Zstd with decompression size limits
//! - **Logging**: `tracing-subscriber` setup driven by `LoggingConfig`
//! - **Metrics**: process-wide atomic counters
//! - **Timeout**: Async timeout wrappers and default durations

pub mod compression;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use compression::{CompressionKind, Compressor};
