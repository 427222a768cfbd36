#![warn(missing_docs)]

//! Error types for the kinematics library.
//!
//! This module defines error types that can occur while building the robot
//! geometry and while integrating encoder odometry.

use core::fmt;

/// Errors that can occur in kinematic calculations.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for invalid wheel radius.
    /// This variant is returned when a wheel radius is provided that is not positive.
    InvalidWheelRadius(&'static str),
    /// Error for invalid wheel separation.
    /// This variant is returned when the distance between the wheels is not positive.
    InvalidWheelSeparation(&'static str),
    /// Error for invalid encoder resolution.
    /// This variant is returned when ticks per wheel rotation is not positive.
    InvalidTicksPerRotation(&'static str),
    /// Error for a non-finite odometry result.
    /// This variant is returned when an integration step would leave NaN or
    /// infinity in the pose estimate.
    NonFiniteOdometry(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidWheelRadius(msg) => write!(f, "Invalid wheel radius: {}", msg),
            KinematicsError::InvalidWheelSeparation(msg) => {
                write!(f, "Invalid wheel separation: {}", msg)
            }
            KinematicsError::InvalidTicksPerRotation(msg) => {
                write!(f, "Invalid ticks per rotation: {}", msg)
            }
            KinematicsError::NonFiniteOdometry(msg) => write!(f, "Non-finite odometry: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
