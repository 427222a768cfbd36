//! The chassis controller: sole owner of the odometry state, the latest
//! encoder sample and the last wheel command.
//!
//! All handlers take `&mut self`; callers are expected to serialize them
//! (see [`crate::node`]).

use rover_kinematics::{
    EncoderSample, OdometryEstimate, OdometryIntegrator, OdometryState, RobotGeometry,
    WheelRateCommand,
};
use tracing::{debug, warn};

use crate::error::{ChassisError, Result};
use crate::messages::{FrameIds, OdometryMsg, TransformStamped, VelocityCommand};

/// Everything produced by one integration tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub estimate: OdometryEstimate,
    pub odometry: OdometryMsg,
    pub transform: TransformStamped,
}

#[derive(Debug)]
pub struct ChassisController {
    geometry: RobotGeometry,
    frames: FrameIds,
    integrator: OdometryIntegrator,
    latest_sample: EncoderSample,
    last_command: Option<WheelRateCommand>,
}

impl ChassisController {
    pub fn new(geometry: RobotGeometry, frames: FrameIds) -> Self {
        Self {
            geometry,
            frames,
            integrator: OdometryIntegrator::new(geometry),
            latest_sample: EncoderSample::default(),
            last_command: None,
        }
    }

    pub fn geometry(&self) -> &RobotGeometry {
        &self.geometry
    }

    pub fn odometry_state(&self) -> &OdometryState {
        self.integrator.state()
    }

    pub fn last_command(&self) -> Option<WheelRateCommand> {
        self.last_command
    }

    /// Converts a body velocity command into wheel rates.
    ///
    /// Commands beyond the configured maximum wheel speed are passed through
    /// unchanged and only logged.
    pub fn on_velocity_command(&mut self, cmd: VelocityCommand) -> WheelRateCommand {
        let command = self.geometry.inverse_kinematics(cmd.into());
        if command.exceeds(self.geometry.max_speed_tps()) {
            warn!(
                left = command.left,
                right = command.right,
                max_tps = self.geometry.max_speed_tps(),
                "Wheel rate command exceeds maximum wheel speed"
            );
        }
        debug!(linear_x = cmd.linear_x, angular_z = cmd.angular_z, %command, "Velocity command");
        self.last_command = Some(command);
        command
    }

    /// Replaces the stored sample; only the most recent one is kept.
    pub fn on_encoder_sample(&mut self, sample: EncoderSample) {
        self.latest_sample = sample;
    }

    /// Runs one integration step against the latest sample.
    ///
    /// # Errors
    ///
    /// Returns [`ChassisError::RuntimeFault`] if the integrator rejects the
    /// step (non-finite pose). The caller treats this as fatal.
    pub fn tick(&mut self) -> Result<TickOutput> {
        let estimate = self
            .integrator
            .step(&self.latest_sample)
            .map_err(|e| ChassisError::RuntimeFault(e.to_string()))?;
        if !estimate.velocity.is_finite() {
            warn!(
                left_rate = self.latest_sample.left_tick_rate,
                right_rate = self.latest_sample.right_tick_rate,
                "Encoder tick rate is not finite, publishing velocity as-is"
            );
        }

        Ok(TickOutput {
            estimate,
            odometry: OdometryMsg::from_estimate(&estimate, &self.frames),
            transform: TransformStamped::from_estimate(&estimate, &self.frames),
        })
    }
}
