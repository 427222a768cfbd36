//! Remote services on the motor controller and the start-up readiness gate.

use std::time::Duration;

use rover_safety::ThresholdSet;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::{ChassisError, Result};
use crate::messages::PidGains;

/// Service call failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// The service has not come up yet
    #[error("service not ready")]
    NotReady,

    /// The call reached the service but failed
    #[error("call failed: {0}")]
    CallFailed(String),
}

/// Something that can be probed for availability.
pub trait RemoteService: Send + Sync {
    fn name(&self) -> &str;

    fn is_ready(&self) -> bool;
}

/// Sets the wheel speed loop gains. Blocking.
pub trait GainService: RemoteService {
    fn set_gains(&self, gains: &PidGains) -> std::result::Result<(), ServiceError>;
}

/// Sets the range sensor thresholds and tilter commands. Blocking.
pub trait ThresholdService: RemoteService {
    fn set_thresholds(&self, thresholds: &ThresholdSet) -> std::result::Result<(), ServiceError>;
}

/// How long and how often to probe services at start-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadinessPolicy {
    /// `None` waits forever.
    pub timeout: Option<Duration>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Blocks until every service reports ready, in order.
///
/// The deadline covers the whole call, not each service.
///
/// # Errors
///
/// Returns [`ChassisError::StartupTimeout`] naming the first service still
/// down when the deadline passes.
pub async fn wait_for_services(
    services: &[&dyn RemoteService],
    policy: &ReadinessPolicy,
) -> Result<()> {
    let start = Instant::now();

    for service in services {
        info!(service = service.name(), "Waiting for service");
        let mut backoff = policy.initial_backoff;

        while !service.is_ready() {
            let waited = start.elapsed();
            let mut pause = backoff;
            if let Some(timeout) = policy.timeout {
                if waited >= timeout {
                    warn!(service = service.name(), ?waited, "Service did not come up in time");
                    return Err(ChassisError::StartupTimeout {
                        service: service.name().to_string(),
                        waited,
                    });
                }
                pause = pause.min(timeout - waited);
            }
            debug!(service = service.name(), ?pause, "Service not ready, retrying");
            sleep(pause).await;
            backoff = (backoff * 2).min(policy.max_backoff);
        }

        info!(service = service.name(), "Service is ready");
    }

    Ok(())
}
