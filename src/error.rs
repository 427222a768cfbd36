//! Error types for the chassis node.

use std::time::Duration;

use rover_kinematics::KinematicsError;
use rover_safety::SafetyError;

/// Result type alias
pub type Result<T> = std::result::Result<T, ChassisError>;

/// Chassis node error types
#[derive(Debug, thiserror::Error)]
pub enum ChassisError {
    /// Safety margins and sensor geometry do not produce valid thresholds
    #[error("Inconsistent safety configuration: {0}")]
    Configuration(#[from] SafetyError),

    /// A remote service call failed or the service is not up
    #[error("Service {service} unavailable: {reason}")]
    ServiceUnavailable {
        /// Service name
        service: String,
        /// Failure description
        reason: String,
    },

    /// Unexpected failure inside the periodic odometry cycle
    #[error("Runtime fault: {0}")]
    RuntimeFault(String),

    /// A required service did not come up within the start-up deadline
    #[error("Service {service} not ready after {waited:?}")]
    StartupTimeout {
        /// Service name
        service: String,
        /// Time spent waiting
        waited: Duration,
    },

    /// Robot geometry rejected by the kinematics library
    #[error("Invalid robot geometry: {0}")]
    Kinematics(#[from] KinematicsError),

    /// Settings could not be loaded or deserialized
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
}
