#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library deriving range-sensor trip thresholds from robot safety margins."]
#![doc = ""]
#![doc = "Each end of the robot carries a time-of-flight sensor on a tilting servo. Given how far"]
#![doc = "ahead an obstacle and how deep a drop-off must be detected, this crate computes the"]
#![doc = "angle the sensor should look at, the servo command for that angle, and the sensor"]
#![doc = "readings at which an obstacle or a ledge is declared."]

use core::f64::consts::PI;
use core::fmt;
use libm::{atan2, cos, fabs, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::SafetyError;

/// Where a tilting sensor is mounted.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountPosition {
    /// Front bumper sensor.
    Front,
    /// Back bumper sensor.
    Back,
}

impl fmt::Display for MountPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountPosition::Front => write!(f, "front"),
            MountPosition::Back => write!(f, "back"),
        }
    }
}

/// Linear map between tilter angles (degrees) and servo command values.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoCalibration {
    lower_command: i32,
    upper_command: i32,
    lower_angle_deg: f64,
    upper_angle_deg: f64,
}

impl ServoCalibration {
    /// Construct a servo calibration.
    ///
    /// # Errors
    ///
    /// Returns `Err(SafetyError::DegenerateServoRange)` if the command bounds are equal.
    pub fn new(
        lower_command: i32,
        upper_command: i32,
        lower_angle_deg: f64,
        upper_angle_deg: f64,
    ) -> Result<Self, SafetyError> {
        if lower_command == upper_command {
            return Err(SafetyError::DegenerateServoRange(
                "lower and upper command must differ",
            ));
        }
        Ok(ServoCalibration {
            lower_command,
            upper_command,
            lower_angle_deg,
            upper_angle_deg,
        })
    }

    /// Converts a sensor angle (radians, negative when looking down) into a
    /// servo command.
    ///
    /// Non-positive angles are shifted by a full turn so that the downward
    /// looking range lands in the 270°..360° window. The result is truncated
    /// toward zero.
    ///
    /// The slope is `(upper_angle - lower_angle) / (upper_command - lower_command)`,
    /// degrees per command rather than commands per degree.
    // TODO: check on the tilter whether this slope should be inverted; the
    // threshold table on the motor controller currently assumes this form.
    pub fn angle_to_command(&self, angle_rad: f64) -> i32 {
        let angle_rad = if angle_rad <= 0.0 { angle_rad + 2.0 * PI } else { angle_rad };
        let angle_deg = angle_rad.to_degrees();

        let y0 = self.lower_command as f64;
        let y1 = self.upper_command as f64;
        let x0 = self.lower_angle_deg;
        let x1 = self.upper_angle_deg;

        let command = (x1 - x0) / (y1 - y0) * (angle_deg - x0) + y0;
        command as i32
    }
}

impl Default for ServoCalibration {
    fn default() -> Self {
        ServoCalibration {
            lower_command: 0,
            upper_command: 90,
            lower_angle_deg: 275.0,
            upper_angle_deg: 360.0,
        }
    }
}

/// Fixed mounting geometry of the tilting sensors (millimeters).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyGeometryParams {
    /// Height of the sensor's axis of rotation above the ground (mm).
    pub ground_clearance: f64,
    /// Distance from the axis of rotation to the sensor face (mm).
    pub off_axis_offset: f64,
    /// Distance from the front sensor axis to the front-most point of the robot (mm).
    pub front_wall_offset: f64,
    /// Distance from the back sensor axis to the back-most point of the robot (mm).
    pub back_wall_offset: f64,
    /// Tilter servo calibration shared by both sensors.
    pub servo: ServoCalibration,
}

impl SafetyGeometryParams {
    /// Returns the wall offset for a mounting position.
    pub fn wall_offset(&self, mount: MountPosition) -> f64 {
        match mount {
            MountPosition::Front => self.front_wall_offset,
            MountPosition::Back => self.back_wall_offset,
        }
    }
}

impl Default for SafetyGeometryParams {
    fn default() -> Self {
        SafetyGeometryParams {
            ground_clearance: 28.7,
            off_axis_offset: 15.0,
            front_wall_offset: 30.8,
            back_wall_offset: 15.0,
            servo: ServoCalibration::default(),
        }
    }
}

/// Safety margins supplied at runtime (millimeters).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyDistances {
    /// Obstacle distance, measured from the outermost point of the robot.
    pub obstacle_x: f64,
    /// Drop-off depth, measured from the ground plane the robot sits on.
    pub ledge_y: f64,
    /// Extra look-ahead covering stopping time and update latency.
    pub buffer_x: f64,
}

impl SafetyDistances {
    /// Construct safety distances.
    pub const fn new(obstacle_x: f64, ledge_y: f64, buffer_x: f64) -> Self {
        SafetyDistances {
            obstacle_x,
            ledge_y,
            buffer_x,
        }
    }
}

/// Thresholds and servo command for one sensor.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyThresholdResult {
    /// Sensor reading (mm) at or below which an obstacle is declared.
    pub obstacle_threshold: f64,
    /// Sensor reading (mm) at or above which a ledge is declared.
    pub ledge_threshold: f64,
    /// Tilter servo command aiming the sensor.
    pub servo_command: i32,
}

/// Integer thresholds for both sensors, in the order the motor controller expects.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThresholdSet {
    /// Front obstacle threshold (mm).
    pub front_obstacle: i32,
    /// Front ledge threshold (mm).
    pub front_ledge: i32,
    /// Front tilter servo command.
    pub front_servo: i32,
    /// Back obstacle threshold (mm).
    pub back_obstacle: i32,
    /// Back ledge threshold (mm).
    pub back_ledge: i32,
    /// Back tilter servo command.
    pub back_servo: i32,
}

impl ThresholdSet {
    /// Assemble the set from the per-mount results, truncating toward zero.
    pub fn from_results(front: &SafetyThresholdResult, back: &SafetyThresholdResult) -> Self {
        ThresholdSet {
            front_obstacle: front.obstacle_threshold as i32,
            front_ledge: front.ledge_threshold as i32,
            front_servo: front.servo_command,
            back_obstacle: back.obstacle_threshold as i32,
            back_ledge: back.ledge_threshold as i32,
            back_servo: back.servo_command,
        }
    }

    /// The six values in wire order.
    pub fn as_array(&self) -> [i32; 6] {
        [
            self.front_obstacle,
            self.front_ledge,
            self.front_servo,
            self.back_obstacle,
            self.back_ledge,
            self.back_servo,
        ]
    }
}

impl fmt::Display for ThresholdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "front(obstacle: {}, ledge: {}, servo: {}) back(obstacle: {}, ledge: {}, servo: {})",
            self.front_obstacle,
            self.front_ledge,
            self.front_servo,
            self.back_obstacle,
            self.back_ledge,
            self.back_servo
        )
    }
}

/// Computes the thresholds for a sensor whose axis sits `wall_offset` mm
/// behind the outermost point of the robot.
///
/// # Errors
///
/// Returns `Err(SafetyError::NegativeObstacleThreshold)` or
/// `Err(SafetyError::NegativeLedgeThreshold)` when the inputs cannot be
/// realised by the sensor geometry.
pub fn calculate_thresholds(
    params: &SafetyGeometryParams,
    distances: &SafetyDistances,
    wall_offset: f64,
) -> Result<SafetyThresholdResult, SafetyError> {
    // X coordinate the sensor is pointing at
    let gaze_x = distances.obstacle_x + distances.buffer_x + wall_offset;
    // X coordinate where the obstacle threshold starts
    let threshold_x = distances.obstacle_x + wall_offset;
    // Y threshold relative to the axis of rotation
    let offset_ledge_y = distances.ledge_y + params.ground_clearance;
    let sensor_angle = atan2(-params.ground_clearance, gaze_x);

    let obstacle_threshold = threshold_x / cos(sensor_angle) - params.off_axis_offset;
    let ledge_threshold = fabs(offset_ledge_y / sin(sensor_angle)) - params.off_axis_offset;
    let servo_command = params.servo.angle_to_command(sensor_angle);

    if obstacle_threshold.is_nan() || obstacle_threshold < 0.0 {
        return Err(SafetyError::NegativeObstacleThreshold(obstacle_threshold));
    }
    if ledge_threshold.is_nan() || ledge_threshold < 0.0 {
        return Err(SafetyError::NegativeLedgeThreshold(ledge_threshold));
    }

    Ok(SafetyThresholdResult {
        obstacle_threshold,
        ledge_threshold,
        servo_command,
    })
}

/// Computes the thresholds for the sensor at `mount`.
pub fn thresholds_for(
    params: &SafetyGeometryParams,
    distances: &SafetyDistances,
    mount: MountPosition,
) -> Result<SafetyThresholdResult, SafetyError> {
    calculate_thresholds(params, distances, params.wall_offset(mount))
}

/// Computes the front and back thresholds and packs them for the motor controller.
pub fn stopping_thresholds(
    params: &SafetyGeometryParams,
    distances: &SafetyDistances,
) -> Result<ThresholdSet, SafetyError> {
    let front = thresholds_for(params, distances, MountPosition::Front)?;
    let back = thresholds_for(params, distances, MountPosition::Back)?;
    Ok(ThresholdSet::from_results(&front, &back))
}
