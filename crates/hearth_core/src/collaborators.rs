//! Collaborator interfaces
//!
//! The diagnostics core never talks to a vendor API directly. It consumes
//! three narrow async traits, so production code can plug in real
//! platform clients while tests use in-memory fakes with no network or
//! sleep calls.
//!
//! Transient network failures are retried here, at the collaborator
//! boundary, with bounded exponential backoff. Detection algorithms never
//! retry; their failures surface as partial failures in the report.

use async_trait::async_trait;
use hearth_common::{AutomationRuleRef, DeviceSnapshot, DiagnosticError, Event};
use std::time::Duration;
use tracing::warn;

/// Source of a device's recent event history.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Fetch up to `limit` most recent events for a device, ordered as
    /// the platform delivers them.
    async fn get_events(&self, device_id: &str, limit: usize)
        -> Result<Vec<Event>, DiagnosticError>;
}

/// Source of a device's current health snapshot.
#[async_trait]
pub trait DeviceHealth: Send + Sync {
    /// Fetch the current snapshot for a device. `Ok(None)` means the
    /// platform has no such device; an `Err` means the collaborator
    /// itself could not answer.
    async fn get_health(&self, device_id: &str)
        -> Result<Option<DeviceSnapshot>, DiagnosticError>;
}

/// Index of automation rules referencing a device.
#[async_trait]
pub trait AutomationIndex: Send + Sync {
    async fn find_rules_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<AutomationRuleRef>, DiagnosticError>;
}

/// Bounded exponential backoff for transient collaborator errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (attempt 1 = first retry).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << (attempt - 1).min(16));
        exp.min(self.max_delay)
    }
}

/// Run `op` with retries according to `policy`.
///
/// Fatal errors (`DeviceNotFound`, `InvalidInput`) are returned
/// immediately; retrying cannot make a missing device appear.
pub async fn retry_with_backoff<T, F, Fut>(
    op_name: &str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, DiagnosticError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, DiagnosticError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    op_name, attempt, policy.max_attempts, delay, err
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
