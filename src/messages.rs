//! Messages exchanged with the outside world.
//!
//! Inbound: velocity commands, encoder samples (see
//! [`rover_kinematics::EncoderSample`]) and configuration updates.
//! Outbound: wheel-rate commands, odometry, transforms, and the payloads of
//! the gain and threshold service calls.

use std::time::Duration;

use rover_kinematics::{ChassisSpeeds, OdometryEstimate, Quaternion};
use rover_safety::SafetyDistances;
use serde::{Deserialize, Serialize};

/// Body velocity command (`cmd_vel`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Forward speed (m/s).
    pub linear_x: f64,
    /// Yaw rate (rad/s).
    pub angular_z: f64,
}

impl VelocityCommand {
    pub const fn new(linear_x: f64, angular_z: f64) -> Self {
        Self { linear_x, angular_z }
    }
}

impl From<VelocityCommand> for ChassisSpeeds {
    fn from(cmd: VelocityCommand) -> Self {
        ChassisSpeeds::new(cmd.linear_x, cmd.angular_z)
    }
}

/// Gains for the two wheel speed loops on the motor controller.
///
/// Forwarded as-is; nothing on this side interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGains {
    pub kp_a: f64,
    pub ki_a: f64,
    pub kd_a: f64,
    pub kp_b: f64,
    pub ki_b: f64,
    pub kd_b: f64,
    pub speed_ka: f64,
    pub speed_kb: f64,
}

impl PidGains {
    /// The eight values in wire order.
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.kp_a,
            self.ki_a,
            self.kd_a,
            self.kp_b,
            self.ki_b,
            self.kd_b,
            self.speed_ka,
            self.speed_kb,
        ]
    }
}

/// A configuration change notification.
///
/// Field names on the wire follow the reconfigure server (`kp_A`, `speed_kB`,
/// ...); lower-case aliases are accepted for settings files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    #[serde(rename = "kp_A", alias = "kp_a")]
    pub kp_a: f64,
    #[serde(rename = "ki_A", alias = "ki_a")]
    pub ki_a: f64,
    #[serde(rename = "kd_A", alias = "kd_a")]
    pub kd_a: f64,
    #[serde(rename = "kp_B", alias = "kp_b")]
    pub kp_b: f64,
    #[serde(rename = "ki_B", alias = "ki_b")]
    pub ki_b: f64,
    #[serde(rename = "kd_B", alias = "kd_b")]
    pub kd_b: f64,
    #[serde(rename = "speed_kA", alias = "speed_ka")]
    pub speed_ka: f64,
    #[serde(rename = "speed_kB", alias = "speed_kb")]
    pub speed_kb: f64,
    pub obstacle_threshold_x_mm: f64,
    pub ledge_threshold_y_mm: f64,
    pub buffer_x_mm: f64,
}

impl ConfigUpdate {
    pub fn gains(&self) -> PidGains {
        PidGains {
            kp_a: self.kp_a,
            ki_a: self.ki_a,
            kd_a: self.kd_a,
            kp_b: self.kp_b,
            ki_b: self.ki_b,
            kd_b: self.kd_b,
            speed_ka: self.speed_ka,
            speed_kb: self.speed_kb,
        }
    }

    pub fn distances(&self) -> SafetyDistances {
        SafetyDistances::new(
            self.obstacle_threshold_x_mm,
            self.ledge_threshold_y_mm,
            self.buffer_x_mm,
        )
    }
}

impl Default for ConfigUpdate {
    fn default() -> Self {
        Self {
            kp_a: 1.0,
            ki_a: 0.0,
            kd_a: 0.0,
            kp_b: 1.0,
            ki_b: 0.0,
            kd_b: 0.0,
            speed_ka: 1.0,
            speed_kb: 1.0,
            obstacle_threshold_x_mm: 50.0,
            ledge_threshold_y_mm: 20.0,
            buffer_x_mm: 10.0,
        }
    }
}

/// Parent and child frame names for odometry and its transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameIds {
    /// Fixed odometry frame (`odom`).
    pub odom_parent_frame: String,
    /// Robot body frame (`base_link`).
    pub odom_child_frame: String,
}

impl Default for FrameIds {
    fn default() -> Self {
        Self {
            odom_parent_frame: "odom".to_string(),
            odom_child_frame: "base_link".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Position and orientation in 3-D.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose3 {
    pub position: Vector3,
    pub orientation: Quaternion,
}

/// Linear and angular velocity in 3-D.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist3 {
    pub linear: Vector3,
    pub angular: Vector3,
}

/// Odometry output, one per integration tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometryMsg {
    /// Stamp of the encoder sample the estimate came from.
    pub stamp: Duration,
    pub frame_id: String,
    pub child_frame_id: String,
    pub pose: Pose3,
    pub twist: Twist3,
}

impl OdometryMsg {
    pub fn from_estimate(estimate: &OdometryEstimate, frames: &FrameIds) -> Self {
        let pose = &estimate.pose;
        let velocity = &estimate.velocity;
        Self {
            stamp: estimate.stamp,
            frame_id: frames.odom_parent_frame.clone(),
            child_frame_id: frames.odom_child_frame.clone(),
            pose: Pose3 {
                position: Vector3::new(pose.x, pose.y, 0.0),
                orientation: pose.orientation(),
            },
            twist: Twist3 {
                linear: Vector3::new(velocity.vx, velocity.vy, 0.0),
                angular: Vector3::new(0.0, 0.0, velocity.vt),
            },
        }
    }
}

/// Rigid transform from the parent to the child frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub stamp: Duration,
    pub parent_frame: String,
    pub child_frame: String,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

impl TransformStamped {
    pub fn from_estimate(estimate: &OdometryEstimate, frames: &FrameIds) -> Self {
        Self {
            stamp: estimate.stamp,
            parent_frame: frames.odom_parent_frame.clone(),
            child_frame: frames.odom_child_frame.clone(),
            translation: Vector3::new(estimate.pose.x, estimate.pose.y, 0.0),
            rotation: estimate.pose.orientation(),
        }
    }
}
