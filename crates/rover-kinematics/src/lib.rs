#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for differential-drive wheel kinematics and encoder odometry."]
#![doc = ""]
#![doc = "This crate provides tick/distance unit conversion, inverse kinematics from a body"]
#![doc = "velocity command to per-wheel tick rates, and a dead-reckoning integrator fed by"]
#![doc = "encoder tick counts."]

use core::f64::consts::PI;
use core::fmt;
use libm::{cos, fabs, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub mod odometry;

pub use error::KinematicsError;
pub use odometry::{EncoderSample, OdometryEstimate, OdometryIntegrator, OdometryState};

/// A 2‑D pose `(x, y, θ)` in meters and radians (θ measured counter‑clockwise
/// from the x‑axis of the odometry frame).
///
/// The heading is an accumulated quantity. It is never wrapped, so after a
/// few full turns it lies well outside `[-PI, PI)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Odometry‑frame x position (m).
    pub x: f64,
    /// Odometry‑frame y position (m).
    pub y: f64,
    /// Accumulated heading (rad).
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose.
    ///
    /// # Arguments
    ///
    /// * `x`: Odometry-frame x position in meters.
    /// * `y`: Odometry-frame y position in meters.
    /// * `theta`: Heading in radians.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Orientation of this pose as a yaw-only quaternion.
    pub fn orientation(&self) -> Quaternion {
        Quaternion::from_yaw(self.theta)
    }

    /// Returns `true` if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.3}, y: {:.3}, θ: {:.3} rad)", self.x, self.y, self.theta)
    }
}

/// Velocity estimate of the robot expressed in the odometry frame.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyVelocity {
    /// Linear x velocity (m/s).
    pub vx: f64,
    /// Linear y velocity (m/s).
    pub vy: f64,
    /// Angular z velocity (rad/s).
    pub vt: f64,
}

impl BodyVelocity {
    /// Construct a new velocity estimate.
    pub const fn new(vx: f64, vy: f64, vt: f64) -> Self {
        BodyVelocity { vx, vy, vt }
    }

    /// Returns `true` if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.vt.is_finite()
    }
}

impl fmt::Display for BodyVelocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(vx: {:.3} m/s, vy: {:.3} m/s, ωz: {:.3} rad/s)",
            self.vx, self.vy, self.vt
        )
    }
}

/// Desired linear and angular chassis velocities.
/// This is the body velocity command fed to the inverse kinematics.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Linear speed of the chassis center along its x axis (m/s).
    pub v: f64,
    /// Angular speed of the chassis around its z axis (rad/s).
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Construct chassis speeds.
    ///
    /// # Arguments
    ///
    /// * `v`: Linear speed of the chassis center (m/s).
    /// * `omega`: Angular speed of the chassis (rad/s).
    pub const fn new(v: f64, omega: f64) -> Self {
        ChassisSpeeds { v, omega }
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.2} m/s, ω: {:.2} rad/s)", self.v, self.omega)
    }
}

/// Signed left and right wheel rate targets in encoder ticks per second.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelRateCommand {
    /// Left wheel rate (ticks/s).
    pub left: f64,
    /// Right wheel rate (ticks/s).
    pub right: f64,
}

impl WheelRateCommand {
    /// Construct a wheel rate command.
    pub const fn new(left: f64, right: f64) -> Self {
        WheelRateCommand { left, right }
    }

    /// Returns `true` if either wheel is asked to spin faster than `limit` ticks/s.
    pub fn exceeds(&self, limit: f64) -> bool {
        fabs(self.left) > limit || fabs(self.right) > limit
    }
}

impl fmt::Display for WheelRateCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(L: {:.1} ticks/s, R: {:.1} ticks/s)", self.left, self.right)
    }
}

/// Unit quaternion `(x, y, z, w)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
    /// w (scalar) component.
    pub w: f64,
}

impl Quaternion {
    /// Quaternion for a rotation of `yaw` radians about z, with zero roll and pitch.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Quaternion {
            x: 0.0,
            y: 0.0,
            z: sin(half),
            w: cos(half),
        }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::from_yaw(0.0)
    }
}

/// Physical parameters of the differential-drive base.
///
/// Fixed for the lifetime of the process. Holds the precomputed
/// meters/ticks conversion factors so that every conversion uses exactly the
/// same coefficients.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotGeometry {
    /// Wheel radius (m).
    wheel_radius: f64,
    /// Distance between the two drive wheels (m).
    wheel_separation: f64,
    /// Encoder ticks per full wheel rotation.
    ticks_per_rotation: f64,
    /// Maximum wheel speed (ticks/s).
    max_speed_tps: f64,
    m_to_tick_factor: f64,
    tick_to_m_factor: f64,
}

impl RobotGeometry {
    /// Construct the base geometry.
    ///
    /// # Arguments
    ///
    /// * `wheel_radius`: Radius of the drive wheels in meters.
    /// * `wheel_separation`: Distance between the two drive wheels in meters.
    /// * `ticks_per_rotation`: Encoder ticks per full wheel rotation.
    /// * `max_speed_mps`: Maximum wheel surface speed in meters per second.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidWheelRadius)` if `wheel_radius` is not positive.
    /// Returns `Err(KinematicsError::InvalidWheelSeparation)` if `wheel_separation` is not positive.
    /// Returns `Err(KinematicsError::InvalidTicksPerRotation)` if `ticks_per_rotation` is not positive.
    pub fn new(
        wheel_radius: f64,
        wheel_separation: f64,
        ticks_per_rotation: f64,
        max_speed_mps: f64,
    ) -> Result<Self, KinematicsError> {
        if wheel_radius.is_nan() || wheel_radius <= 0.0 {
            return Err(KinematicsError::InvalidWheelRadius("must be positive"));
        }
        if wheel_separation.is_nan() || wheel_separation <= 0.0 {
            return Err(KinematicsError::InvalidWheelSeparation("must be positive"));
        }
        if ticks_per_rotation.is_nan() || ticks_per_rotation <= 0.0 {
            return Err(KinematicsError::InvalidTicksPerRotation("must be positive"));
        }

        let m_to_tick_factor = ticks_per_rotation / (2.0 * wheel_radius * PI);
        let tick_to_m_factor = 1.0 / m_to_tick_factor;

        Ok(RobotGeometry {
            wheel_radius,
            wheel_separation,
            ticks_per_rotation,
            max_speed_tps: max_speed_mps * m_to_tick_factor,
            m_to_tick_factor,
            tick_to_m_factor,
        })
    }

    /// Returns the wheel radius (m).
    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    /// Returns the wheel separation (m).
    pub fn wheel_separation(&self) -> f64 {
        self.wheel_separation
    }

    /// Returns the encoder ticks per wheel rotation.
    pub fn ticks_per_rotation(&self) -> f64 {
        self.ticks_per_rotation
    }

    /// Returns the configured maximum wheel speed (ticks/s).
    ///
    /// [`RobotGeometry::inverse_kinematics`] does not enforce this limit.
    pub fn max_speed_tps(&self) -> f64 {
        self.max_speed_tps
    }

    /// Linear wheel travel per encoder tick (m).
    pub fn distance_per_tick(&self) -> f64 {
        self.tick_to_m_factor
    }

    /// Encoder ticks per meter of wheel travel.
    pub fn ticks_per_distance(&self) -> f64 {
        self.m_to_tick_factor
    }

    /// Converts a tick count (or tick rate) to meters (or meters per second).
    pub fn ticks_to_meters(&self, ticks: f64) -> f64 {
        ticks * self.tick_to_m_factor
    }

    /// Converts meters (or meters per second) to ticks (or ticks per second).
    pub fn meters_to_ticks(&self, meters: f64) -> f64 {
        meters * self.m_to_tick_factor
    }

    /// Calculates the per-wheel tick rates that realise the given chassis speeds.
    ///
    /// The result is not limited to [`RobotGeometry::max_speed_tps`]; callers
    /// may request rates the motors cannot reach.
    pub fn inverse_kinematics(&self, chassis_speeds: ChassisSpeeds) -> WheelRateCommand {
        // arc = angle * radius
        let rotational_speed = chassis_speeds.omega * self.wheel_separation / 2.0;

        WheelRateCommand {
            left: self.meters_to_ticks(chassis_speeds.v - rotational_speed),
            right: self.meters_to_ticks(chassis_speeds.v + rotational_speed),
        }
    }
}

impl fmt::Display for RobotGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RobotGeometry (r: {:.4} m, L: {:.3} m, {:.0} ticks/rev)",
            self.wheel_radius, self.wheel_separation, self.ticks_per_rotation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-6;

    fn rover() -> RobotGeometry {
        // 3.25 cm wheels, 16 cm track, 3840 ticks/rev, 9.15 m/s
        RobotGeometry::new(0.0325, 0.16, 3840.0, 9.15).unwrap()
    }

    #[test]
    fn test_geometry_constructor() {
        let geometry = rover();
        assert_eq!(geometry.wheel_radius(), 0.0325);
        assert_eq!(geometry.wheel_separation(), 0.16);
        assert_eq!(geometry.ticks_per_rotation(), 3840.0);
    }

    #[test]
    fn test_constructor_invalid_radius() {
        let result = RobotGeometry::new(0.0, 0.16, 3840.0, 1.0);
        assert!(matches!(result, Err(KinematicsError::InvalidWheelRadius("must be positive"))));
        let result_negative = RobotGeometry::new(-0.1, 0.16, 3840.0, 1.0);
        assert!(matches!(
            result_negative,
            Err(KinematicsError::InvalidWheelRadius("must be positive"))
        ));
        let result_nan = RobotGeometry::new(f64::NAN, 0.16, 3840.0, 1.0);
        assert!(matches!(result_nan, Err(KinematicsError::InvalidWheelRadius(_))));
    }

    #[test]
    fn test_constructor_invalid_separation_and_ticks() {
        let result = RobotGeometry::new(0.0325, 0.0, 3840.0, 1.0);
        assert!(matches!(result, Err(KinematicsError::InvalidWheelSeparation("must be positive"))));
        let result = RobotGeometry::new(0.0325, 0.16, -1.0, 1.0);
        assert!(matches!(result, Err(KinematicsError::InvalidTicksPerRotation("must be positive"))));
    }

    #[test]
    fn test_meters_to_ticks_fixture() {
        let geometry = rover();
        let expected = 3840.0 / (2.0 * PI * 0.0325);
        assert!((geometry.meters_to_ticks(1.0) - expected).abs() < EPSILON);
        assert!((geometry.ticks_to_meters(expected) - 1.0).abs() < EPSILON);
        assert!((geometry.ticks_per_distance() - expected).abs() < EPSILON);
        assert!((geometry.distance_per_tick() * expected - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_unit_conversion_round_trip() {
        let geometry = rover();
        for ticks in [-1_000_000.0, -3840.0, -1.0, 0.0, 0.5, 1.0, 1883.36, 123_456.0] {
            let back = geometry.meters_to_ticks(geometry.ticks_to_meters(ticks));
            assert!((back - ticks).abs() < 1e-9 * ticks.abs().max(1.0));
        }
        for meters in [-2.5, 0.0, 0.001, 1.0, 42.0] {
            let back = geometry.ticks_to_meters(geometry.meters_to_ticks(meters));
            assert!((back - meters).abs() < 1e-12 * meters.abs().max(1.0));
        }
    }

    #[test]
    fn test_one_rotation_is_one_circumference() {
        let geometry = rover();
        let circumference = 2.0 * PI * 0.0325;
        assert!((geometry.ticks_to_meters(3840.0) - circumference).abs() < EPSILON);
    }

    #[test]
    fn test_max_speed_in_ticks() {
        let geometry = rover();
        assert!((geometry.max_speed_tps() - geometry.meters_to_ticks(9.15)).abs() < EPSILON);
    }

    #[test]
    fn test_inverse_kinematics_straight() {
        let geometry = rover();
        let command = geometry.inverse_kinematics(ChassisSpeeds::new(0.5, 0.0));
        assert_eq!(command.left, command.right);
        assert!((command.left - geometry.meters_to_ticks(0.5)).abs() < EPSILON);
    }

    #[test]
    fn test_inverse_kinematics_pivot_turn() {
        let geometry = rover();
        // 2 rad/s on a 0.16 m track: each wheel moves at 0.16 m/s
        let command = geometry.inverse_kinematics(ChassisSpeeds::new(0.0, 2.0));
        assert!((command.left + geometry.meters_to_ticks(0.16)).abs() < EPSILON);
        assert!((command.right - geometry.meters_to_ticks(0.16)).abs() < EPSILON);
    }

    #[test]
    fn test_inverse_kinematics_gentle_turn() {
        let geometry = rover();
        // v_r = 0.3 + 0.5 * 0.08 = 0.34, v_l = 0.3 - 0.04 = 0.26
        let command = geometry.inverse_kinematics(ChassisSpeeds::new(0.3, 0.5));
        assert!((command.left - geometry.meters_to_ticks(0.26)).abs() < 1e-6);
        assert!((command.right - geometry.meters_to_ticks(0.34)).abs() < 1e-6);
    }

    #[test]
    fn test_inverse_kinematics_is_not_clamped() {
        let geometry = rover();
        let command = geometry.inverse_kinematics(ChassisSpeeds::new(50.0, 0.0));
        assert!(command.exceeds(geometry.max_speed_tps()));
        assert!((command.left - geometry.meters_to_ticks(50.0)).abs() < 1e-6);
        assert!(!WheelRateCommand::new(-10.0, 10.0).exceeds(10.0));
    }

    #[test]
    fn test_quaternion_from_yaw() {
        let q = Quaternion::from_yaw(PI / 2.0);
        assert!((q.x).abs() < EPSILON);
        assert!((q.y).abs() < EPSILON);
        assert!((q.z - (PI / 4.0).sin()).abs() < EPSILON);
        assert!((q.w - (PI / 4.0).cos()).abs() < EPSILON);

        let identity = Quaternion::default();
        assert_eq!(identity, Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 });

        // A full turn flips the sign but describes the same rotation.
        let full_turn = Pose::new(0.0, 0.0, 2.0 * PI).orientation();
        assert!((full_turn.w + 1.0).abs() < EPSILON);
    }
}
