//! Wait for an office suite listener (`soffice --accept=socket,...`) to come up.

use tokio::net::TcpStream;

use super::service::ConnectionError;
use crate::retry::{retry, RetryExhaustedError, RetryPolicy};

/// Open and immediately close one TCP connection to `endpoint`.
///
/// # Errors
///
/// Returns `ConnectionError::Unreachable` if the connection is refused or
/// the address cannot be resolved.
pub async fn probe_acceptor(endpoint: &str) -> Result<(), ConnectionError> {
    TcpStream::connect(endpoint)
        .await
        .map(drop)
        .map_err(|source| ConnectionError::Unreachable {
            endpoint: endpoint.to_string(),
            source,
        })
}

/// Probe `endpoint` until it accepts a connection or `policy` is exhausted.
///
/// # Errors
///
/// Returns `RetryExhaustedError` with the last connection error.
pub async fn wait_for_acceptor(
    endpoint: &str,
    policy: &RetryPolicy,
) -> Result<(), RetryExhaustedError<ConnectionError>> {
    tracing::info!(
        endpoint,
        max_attempts = policy.max_attempts.get(),
        "Waiting for office listener"
    );
    retry(policy, || probe_acceptor(endpoint)).await
}
