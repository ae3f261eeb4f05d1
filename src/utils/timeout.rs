//! Timeout helpers shared by transports and configuration defaults.

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Default timeout for connecting and other single operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long an inbound connection may wait for its admission decision
pub const ADMISSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Suggested interval between keepalive pings
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Run a fallible future with a deadline, mapping expiry to `ProtocolError::Timeout`
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}
