//! Dead-reckoning odometry from wheel encoder tick counts.
//!
//! The integrator is stepped once per fixed-rate tick with the most recent
//! [`EncoderSample`]. Each step converts the tick deltas since the previous
//! step into a distance and a heading change and applies a first-order Euler
//! update that uses the heading *after* the rotation has been added.

use core::time::Duration;
use libm::{cos, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{BodyVelocity, KinematicsError, Pose, RobotGeometry};

/// One encoder report from the motor controller.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EncoderSample {
    /// Time the sample was taken, as reported by the source.
    pub stamp: Duration,
    /// Cumulative left wheel tick count.
    pub left_ticks: i64,
    /// Cumulative right wheel tick count.
    pub right_ticks: i64,
    /// Left wheel rate (ticks/s).
    pub left_tick_rate: f64,
    /// Right wheel rate (ticks/s).
    pub right_tick_rate: f64,
}

impl EncoderSample {
    /// Construct an encoder sample.
    pub const fn new(
        stamp: Duration,
        left_ticks: i64,
        right_ticks: i64,
        left_tick_rate: f64,
        right_tick_rate: f64,
    ) -> Self {
        EncoderSample {
            stamp,
            left_ticks,
            right_ticks,
            left_tick_rate,
            right_tick_rate,
        }
    }
}

/// Mutable dead-reckoning state.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OdometryState {
    /// Accumulated pose. The heading is never wrapped.
    pub pose: Pose,
    /// Latest velocity estimate.
    pub velocity: BodyVelocity,
    /// Left tick count consumed by the previous step.
    pub prev_left_ticks: i64,
    /// Right tick count consumed by the previous step.
    pub prev_right_ticks: i64,
}

/// Result of one integration step, stamped with the source sample's time.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OdometryEstimate {
    /// Stamp of the encoder sample the estimate was computed from.
    pub stamp: Duration,
    /// Pose after the step.
    pub pose: Pose,
    /// Velocity after the step.
    pub velocity: BodyVelocity,
}

/// Stateful encoder odometry integrator.
#[derive(Debug, Clone)]
pub struct OdometryIntegrator {
    geometry: RobotGeometry,
    state: OdometryState,
}

impl OdometryIntegrator {
    /// Create an integrator starting at the origin with zero velocity and
    /// zero previous tick counts.
    pub fn new(geometry: RobotGeometry) -> Self {
        Self {
            geometry,
            state: OdometryState::default(),
        }
    }

    /// Returns the base geometry used for conversions.
    pub fn geometry(&self) -> &RobotGeometry {
        &self.geometry
    }

    /// Returns the current state.
    pub fn state(&self) -> &OdometryState {
        &self.state
    }

    /// Integrates `sample` into the estimate.
    ///
    /// Stepping twice with the same sample leaves the pose unchanged on the
    /// second step since the tick deltas are zero.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NonFiniteOdometry)` if the step would
    /// produce a non-finite pose. The state is left untouched in that case.
    /// A non-finite velocity (from a bad tick rate) is passed through since
    /// it does not feed back into later steps.
    pub fn step(&mut self, sample: &EncoderSample) -> Result<OdometryEstimate, KinematicsError> {
        let geometry = &self.geometry;
        let separation = geometry.wheel_separation();

        let left_delta_ticks = sample.left_ticks.wrapping_sub(self.state.prev_left_ticks);
        let right_delta_ticks = sample.right_ticks.wrapping_sub(self.state.prev_right_ticks);

        let delta_left = geometry.ticks_to_meters(left_delta_ticks as f64);
        let delta_right = geometry.ticks_to_meters(right_delta_ticks as f64);
        let delta_dist = (delta_right + delta_left) / 2.0;

        // angle = arc / radius
        let delta_angle = (delta_right - delta_left) / separation;
        let theta = self.state.pose.theta + delta_angle;

        let pose = Pose {
            x: self.state.pose.x + delta_dist * cos(theta),
            y: self.state.pose.y + delta_dist * sin(theta),
            theta,
        };

        let left_speed = geometry.ticks_to_meters(sample.left_tick_rate);
        let right_speed = geometry.ticks_to_meters(sample.right_tick_rate);
        let speed = (left_speed + right_speed) / 2.0;

        let velocity = BodyVelocity {
            vx: speed * cos(theta),
            vy: speed * sin(theta),
            vt: (right_speed - left_speed) / (separation / 2.0),
        };

        if !pose.is_finite() {
            return Err(KinematicsError::NonFiniteOdometry("pose"));
        }

        self.state = OdometryState {
            pose,
            velocity,
            prev_left_ticks: sample.left_ticks,
            prev_right_ticks: sample.right_ticks,
        };

        Ok(OdometryEstimate {
            stamp: sample.stamp,
            pose,
            velocity,
        })
    }
}
