//! Error types for the safety threshold library.

use core::fmt;

/// Errors raised while deriving sensor thresholds.
///
/// Any of these means the configured geometry and safety margins are
/// physically inconsistent. The thresholds must not be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyError {
    /// The obstacle trip distance came out negative (mm).
    NegativeObstacleThreshold(f64),
    /// The ledge trip distance came out negative (mm).
    NegativeLedgeThreshold(f64),
    /// Servo lower and upper command bounds are equal.
    DegenerateServoRange(&'static str),
}

impl fmt::Display for SafetyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyError::NegativeObstacleThreshold(value) => {
                write!(f, "Obstacle threshold is negative: {:.3} mm", value)
            }
            SafetyError::NegativeLedgeThreshold(value) => {
                write!(f, "Ledge threshold is negative: {:.3} mm", value)
            }
            SafetyError::DegenerateServoRange(msg) => write!(f, "Invalid servo range: {}", msg),
        }
    }
}

impl core::error::Error for SafetyError {}
