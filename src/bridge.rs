//! Configuration bridge: turns a configuration change into the gain and
//! threshold service calls.
//!
//! Service failures are logged, recorded as faults and otherwise dropped.
//! Nothing is retried or rolled back. Inconsistent safety geometry is
//! returned to the caller.

use std::sync::Arc;

use rover_safety::{
    MountPosition, SafetyGeometryParams, SafetyThresholdResult, ThresholdSet, thresholds_for,
};
use tracing::{error, info, warn};

use crate::blackboard::{Blackboard, raise_fault, record_gains, record_thresholds};
use crate::error::{ChassisError, Result};
use crate::messages::ConfigUpdate;
use crate::services::{GainService, ServiceError, ThresholdService};

/// What happened to one configuration update.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeReport {
    pub gains_applied: bool,
    pub thresholds: ThresholdSet,
    pub thresholds_applied: bool,
}

pub struct ConfigBridge {
    safety: SafetyGeometryParams,
    gain_service: Arc<dyn GainService>,
    threshold_service: Arc<dyn ThresholdService>,
    blackboard: Blackboard,
}

impl ConfigBridge {
    pub fn new(
        safety: SafetyGeometryParams,
        gain_service: Arc<dyn GainService>,
        threshold_service: Arc<dyn ThresholdService>,
        blackboard: Blackboard,
    ) -> Self {
        Self {
            safety,
            gain_service,
            threshold_service,
            blackboard,
        }
    }

    /// Forwards the gains, then computes and forwards the front/back thresholds.
    ///
    /// Blocks for as long as the service calls do.
    ///
    /// # Errors
    ///
    /// Returns [`ChassisError::Configuration`] if either mount yields a
    /// negative threshold. The gains have already been forwarded by then; the
    /// thresholds are not sent.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<BridgeReport> {
        let gains = update.gains();
        let gains_applied = match self.call(self.gain_service.name(), self.gain_service.is_ready(), || {
            self.gain_service.set_gains(&gains)
        }) {
            Ok(()) => {
                record_gains(&self.blackboard, gains);
                info!(gains = ?gains.as_array(), "Gains forwarded");
                true
            }
            Err(e) => {
                self.report(&e);
                false
            }
        };

        let front = self.mount_thresholds(update, MountPosition::Front)?;
        let back = self.mount_thresholds(update, MountPosition::Back)?;
        let thresholds = ThresholdSet::from_results(&front, &back);

        let thresholds_applied = match self.call(
            self.threshold_service.name(),
            self.threshold_service.is_ready(),
            || self.threshold_service.set_thresholds(&thresholds),
        ) {
            Ok(()) => {
                record_thresholds(&self.blackboard, thresholds);
                info!(%thresholds, "Safety thresholds forwarded");
                true
            }
            Err(e) => {
                self.report(&e);
                false
            }
        };

        Ok(BridgeReport {
            gains_applied,
            thresholds,
            thresholds_applied,
        })
    }

    fn mount_thresholds(
        &self,
        update: &ConfigUpdate,
        mount: MountPosition,
    ) -> Result<SafetyThresholdResult> {
        thresholds_for(&self.safety, &update.distances(), mount).map_err(|e| {
            error!(
                error = %e,
                %mount,
                obstacle_x_mm = update.obstacle_threshold_x_mm,
                ledge_y_mm = update.ledge_threshold_y_mm,
                buffer_x_mm = update.buffer_x_mm,
                "Safety thresholds rejected"
            );
            raise_fault(&self.blackboard, &format!("{mount} safety thresholds rejected: {e}"));
            ChassisError::Configuration(e)
        })
    }

    fn call<F>(&self, service: &str, ready: bool, f: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<(), ServiceError>,
    {
        let outcome = if ready { f() } else { Err(ServiceError::NotReady) };
        outcome.map_err(|e| ChassisError::ServiceUnavailable {
            service: service.to_string(),
            reason: e.to_string(),
        })
    }

    fn report(&self, e: &ChassisError) {
        warn!(error = %e, "Service call failed, configuration change dropped");
        raise_fault(&self.blackboard, &e.to_string());
    }
}
