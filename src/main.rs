use std::{sync::Arc, time::Duration};

use rover_chassis::blackboard::{Blackboard, snapshot};
use rover_chassis::messages::VelocityCommand;
use rover_chassis::services::{RemoteService, wait_for_services};
use rover_chassis::sim::{self, LoopbackService};
use rover_chassis::{ChassisController, ChassisNode, ConfigBridge, load_settings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Rover chassis node starting (simulated base).");

    let settings = load_settings()?;
    let geometry = settings.robot_geometry()?;
    let safety = settings.safety_geometry()?;
    let policy = settings.readiness_policy()?;
    let period = settings.odometry_period()?;
    info!(%geometry, "Robot geometry");

    let startup = Duration::from_millis(settings.sim.service_startup_ms);
    let pid_service = Arc::new(LoopbackService::new("rover6_pid", startup));
    let safety_service = Arc::new(LoopbackService::new("rover6_safety", startup));

    let required: [&dyn RemoteService; 2] = [pid_service.as_ref(), safety_service.as_ref()];
    wait_for_services(&required, &policy).await?;

    let bb: Blackboard = Arc::default();
    let bridge = Arc::new(ConfigBridge::new(
        safety,
        pid_service.clone(),
        safety_service.clone(),
        bb.clone(),
    ));
    let controller = ChassisController::new(geometry, settings.frames.clone());
    let (node, handle) = ChassisNode::new(controller, bridge, bb.clone(), period);

    let encoder_rx = node.outputs().wheel_commands.subscribe();
    let monitor_rx = node.outputs().wheel_commands.subscribe();

    handle.send_config(settings.tuning).await?;

    tokio::spawn(sim::encoder_task(
        handle.clone(),
        encoder_rx,
        Duration::from_millis(settings.sim.encoder_period_ms.max(1)),
    ));
    tokio::spawn(sim::velocity_task(
        handle,
        VelocityCommand::new(settings.sim.linear_x, settings.sim.angular_z),
        Duration::from_millis(settings.sim.command_period_ms.max(1)),
    ));
    tokio::spawn(sim::wheel_monitor(monitor_rx));

    let result = tokio::select! {
        res = node.run() => res,
        sig = tokio::signal::ctrl_c() => {
            sig?;
            info!("Ctrl-C received, shutting down.");
            Ok(())
        }
    };

    let state = snapshot(&bb);
    if let Some(odometry) = state.odometry {
        info!(pose = %odometry.pose, "Final odometry");
    }
    if let Some(gains) = pid_service.last_gains() {
        info!(service = pid_service.name(), gains = ?gains.as_array(), "Last gains applied");
    }
    if let Some(thresholds) = safety_service.last_thresholds() {
        info!(service = safety_service.name(), %thresholds, "Last thresholds applied");
    }
    if !state.faults.is_empty() {
        info!(faults = ?state.faults, "Faults raised during the run");
    }

    if let Err(e) = &result {
        error!("Chassis node failed: {:?}", e);
    }
    result
}
