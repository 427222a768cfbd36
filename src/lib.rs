//! Differential-drive rover chassis node.
//!
//! Turns body velocity commands into wheel rates, integrates encoder samples
//! into odometry at a fixed rate and forwards configuration changes to the
//! motor controller's gain and safety-threshold services.

pub mod blackboard;
pub mod bridge;
pub mod bus;
pub mod controller;
pub mod error;
pub mod messages;
pub mod node;
pub mod services;
pub mod settings;
pub mod sim;

pub use bridge::{BridgeReport, ConfigBridge};
pub use controller::ChassisController;
pub use error::{ChassisError, Result};
pub use node::{ChassisNode, NodeHandle, Outputs};
pub use settings::{ChassisSettings, load_settings};
