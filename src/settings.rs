//! Start-up settings.
//!
//! Read once from a TOML file (default `config/default.toml`, overridable via
//! `ROVER_CONFIG`) with `ROVER__SECTION__KEY` environment overrides on top.
//! Every key has a default, so a missing file is not an error.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use rover_kinematics::{KinematicsError, RobotGeometry};
use rover_safety::{SafetyError, SafetyGeometryParams, ServoCalibration};
use serde::Deserialize;
use tracing::{error, info};

use crate::error::{ChassisError, Result};
use crate::messages::{ConfigUpdate, FrameIds};
use crate::services::ReadinessPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RobotSettings {
    pub wheel_radius_cm: f64,
    pub wheel_distance_cm: f64,
    pub ticks_per_rotation: f64,
    pub max_speed_cps: f64,
}

impl Default for RobotSettings {
    fn default() -> Self {
        Self {
            wheel_radius_cm: 3.25,
            wheel_distance_cm: 16.0,
            ticks_per_rotation: 3840.0,
            max_speed_cps: 915.0,
        }
    }
}

/// Tilter servo calibration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServoSettings {
    pub lower_command: i32,
    pub upper_command: i32,
    pub lower_angle_deg: f64,
    pub upper_angle_deg: f64,
}

impl Default for ServoSettings {
    fn default() -> Self {
        Self {
            lower_command: 0,
            upper_command: 90,
            lower_angle_deg: 275.0,
            upper_angle_deg: 360.0,
        }
    }
}

/// Range sensor mounting geometry (mm).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SafetySettings {
    pub ground_dist_mm: f64,
    pub off_axis_mm: f64,
    pub front_wall_dist_mm: f64,
    pub back_wall_dist_mm: f64,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            ground_dist_mm: 28.7,
            off_axis_mm: 15.0,
            front_wall_dist_mm: 30.8,
            back_wall_dist_mm: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StartupSettings {
    /// Wait for the services with no deadline.
    pub wait_forever: bool,
    pub service_timeout_s: f64,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            wait_forever: false,
            service_timeout_s: 30.0,
            initial_backoff_ms: 100,
            max_backoff_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OdometrySettings {
    pub rate_hz: f64,
}

impl Default for OdometrySettings {
    fn default() -> Self {
        Self { rate_hz: 30.0 }
    }
}

/// Simulated base used by the binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    pub linear_x: f64,
    pub angular_z: f64,
    pub command_period_ms: u64,
    pub encoder_period_ms: u64,
    /// How long the simulated services stay down after start.
    pub service_startup_ms: u64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            linear_x: 0.1,
            angular_z: 0.2,
            command_period_ms: 100,
            encoder_period_ms: 10,
            service_startup_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ChassisSettings {
    pub robot: RobotSettings,
    pub frames: FrameIds,
    pub servo: ServoSettings,
    pub safety: SafetySettings,
    pub startup: StartupSettings,
    pub odometry: OdometrySettings,
    /// Configuration applied once at start, before any change notification.
    pub tuning: ConfigUpdate,
    pub sim: SimSettings,
}

impl ChassisSettings {
    pub fn robot_geometry(&self) -> std::result::Result<RobotGeometry, KinematicsError> {
        let robot = &self.robot;
        RobotGeometry::new(
            robot.wheel_radius_cm / 100.0,
            robot.wheel_distance_cm / 100.0,
            robot.ticks_per_rotation,
            robot.max_speed_cps / 100.0,
        )
    }

    pub fn safety_geometry(&self) -> std::result::Result<SafetyGeometryParams, SafetyError> {
        let servo = ServoCalibration::new(
            self.servo.lower_command,
            self.servo.upper_command,
            self.servo.lower_angle_deg,
            self.servo.upper_angle_deg,
        )?;
        Ok(SafetyGeometryParams {
            ground_clearance: self.safety.ground_dist_mm,
            off_axis_offset: self.safety.off_axis_mm,
            front_wall_offset: self.safety.front_wall_dist_mm,
            back_wall_offset: self.safety.back_wall_dist_mm,
            servo,
        })
    }

    /// # Errors
    ///
    /// Returns [`ChassisError::Settings`] if `service_timeout_s` is negative
    /// or not finite (unless `wait_forever` is set).
    pub fn readiness_policy(&self) -> Result<ReadinessPolicy> {
        let startup = &self.startup;
        let timeout = if startup.wait_forever {
            None
        } else {
            let timeout = Duration::try_from_secs_f64(startup.service_timeout_s)
                .map_err(|e| invalid("startup.service_timeout_s", startup.service_timeout_s, e))?;
            Some(timeout)
        };
        let initial_backoff = startup.initial_backoff_ms.max(1);
        Ok(ReadinessPolicy {
            timeout,
            initial_backoff: Duration::from_millis(initial_backoff),
            max_backoff: Duration::from_millis(startup.max_backoff_ms.max(initial_backoff)),
        })
    }

    /// Period of the odometry tick.
    ///
    /// # Errors
    ///
    /// Returns [`ChassisError::Settings`] if `rate_hz` is not positive and
    /// finite, or so high that the period rounds down to zero.
    pub fn odometry_period(&self) -> Result<Duration> {
        let rate = self.odometry.rate_hz;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(invalid("odometry.rate_hz", rate, "must be positive and finite"));
        }
        let period = Duration::try_from_secs_f64(1.0 / rate)
            .map_err(|e| invalid("odometry.rate_hz", rate, e))?;
        if period.is_zero() {
            return Err(invalid("odometry.rate_hz", rate, "period rounds to zero"));
        }
        Ok(period)
    }
}

fn invalid(key: &str, value: f64, reason: impl std::fmt::Display) -> ChassisError {
    ChassisError::Settings(ConfigError::Message(format!("invalid {key} = {value}: {reason}")))
}

/// Loads settings from `ROVER_CONFIG` (or the default path) plus environment.
pub fn load_settings() -> std::result::Result<ChassisSettings, ConfigError> {
    let path = std::env::var("ROVER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_settings_from(&path)
}

pub fn load_settings_from(path: &str) -> std::result::Result<ChassisSettings, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix("ROVER")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|config| config.try_deserialize::<ChassisSettings>());

    match settings {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    fn parse(toml: &str) -> ChassisSettings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = parse("");
        assert_eq!(settings, ChassisSettings::default());
        assert_eq!(settings.frames.odom_parent_frame, "odom");
        assert_eq!(settings.frames.odom_child_frame, "base_link");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let settings = parse(
            r#"
            [robot]
            wheel_radius_cm = 3.5

            [startup]
            wait_forever = true

            [tuning]
            obstacle_threshold_x_mm = 80.0
            kp_a = 0.25
            "#,
        );
        assert_eq!(settings.robot.wheel_radius_cm, 3.5);
        assert_eq!(settings.robot.wheel_distance_cm, 16.0);
        assert_eq!(settings.readiness_policy().unwrap().timeout, None);
        assert_eq!(settings.tuning.obstacle_threshold_x_mm, 80.0);
        assert_eq!(settings.tuning.kp_a, 0.25);
        assert_eq!(settings.tuning.ledge_threshold_y_mm, 20.0);
    }

    #[test]
    fn test_geometry_is_converted_to_meters() {
        let geometry = ChassisSettings::default().robot_geometry().unwrap();
        assert!((geometry.wheel_radius() - 0.0325).abs() < EPSILON);
        assert!((geometry.wheel_separation() - 0.16).abs() < EPSILON);
        assert!((geometry.max_speed_tps() - geometry.meters_to_ticks(9.15)).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let mut settings = ChassisSettings::default();
        settings.robot.wheel_distance_cm = 0.0;
        assert!(matches!(
            settings.robot_geometry(),
            Err(KinematicsError::InvalidWheelSeparation(_))
        ));

        let mut settings = ChassisSettings::default();
        settings.servo.upper_command = settings.servo.lower_command;
        assert!(settings.safety_geometry().is_err());
    }

    #[test]
    fn test_safety_geometry_matches_library_defaults() {
        let params = ChassisSettings::default().safety_geometry().unwrap();
        assert_eq!(params, SafetyGeometryParams::default());
    }

    #[test]
    fn test_timing_settings() {
        let settings = ChassisSettings::default();
        let policy = settings.readiness_policy().unwrap();
        assert_eq!(policy.timeout, Some(Duration::from_secs(30)));
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.max_backoff, Duration::from_millis(2000));

        let period = settings.odometry_period().unwrap();
        assert!((period.as_secs_f64() - 1.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let settings = load_settings_from("does/not/exist.toml").unwrap();
        assert_eq!(settings.odometry.rate_hz, 30.0);
    }

    #[test]
    fn test_unusable_odometry_rate_is_a_settings_error() {
        for rate in [1e12, 0.0, -30.0, f64::INFINITY, f64::NAN] {
            let mut settings = ChassisSettings::default();
            settings.odometry.rate_hz = rate;
            assert!(
                matches!(settings.odometry_period(), Err(ChassisError::Settings(_))),
                "rate_hz = {rate}"
            );
        }
    }

    #[test]
    fn test_unusable_service_timeout_is_a_settings_error() {
        for timeout in [f64::INFINITY, f64::NAN, -1.0] {
            let mut settings = ChassisSettings::default();
            settings.startup.service_timeout_s = timeout;
            assert!(
                matches!(settings.readiness_policy(), Err(ChassisError::Settings(_))),
                "service_timeout_s = {timeout}"
            );
        }

        // Ignored when waiting forever.
        let mut settings = ChassisSettings::default();
        settings.startup.service_timeout_s = f64::INFINITY;
        settings.startup.wait_forever = true;
        assert_eq!(settings.readiness_policy().unwrap().timeout, None);
    }
}
