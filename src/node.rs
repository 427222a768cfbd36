//! The chassis node: wires inbound channels, the periodic odometry tick and
//! the configuration bridge together.
//!
//! The controller task is the single writer of the odometry state. Velocity
//! commands, encoder samples and ticks are handled one at a time in the same
//! `select!` loop. Configuration changes run on their own task so a slow
//! service call never delays a tick.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use rover_kinematics::{EncoderSample, WheelRateCommand};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::blackboard::{Blackboard, raise_fault, record_command, record_odometry};
use crate::bridge::ConfigBridge;
use crate::bus::Topic;
use crate::controller::ChassisController;
use crate::messages::{ConfigUpdate, OdometryMsg, TransformStamped, VelocityCommand};

const INBOUND_CAPACITY: usize = 64;
const CONFIG_CAPACITY: usize = 8;
const TOPIC_CAPACITY: usize = 16;

/// Messages the controller task serializes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Inbound {
    Velocity(VelocityCommand),
    Encoder(EncoderSample),
}

/// Sending side of the node's inbound channels.
///
/// Dropping every handle shuts the node down once queued messages are drained.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    inbound: mpsc::Sender<Inbound>,
    config: mpsc::Sender<ConfigUpdate>,
}

impl NodeHandle {
    pub async fn send_velocity(&self, cmd: VelocityCommand) -> anyhow::Result<()> {
        self.inbound
            .send(Inbound::Velocity(cmd))
            .await
            .map_err(|_| anyhow!("chassis node stopped"))
    }

    pub async fn send_encoder(&self, sample: EncoderSample) -> anyhow::Result<()> {
        self.inbound
            .send(Inbound::Encoder(sample))
            .await
            .map_err(|_| anyhow!("chassis node stopped"))
    }

    pub async fn send_config(&self, update: ConfigUpdate) -> anyhow::Result<()> {
        self.config
            .send(update)
            .await
            .map_err(|_| anyhow!("chassis node stopped"))
    }
}

/// Outbound topics.
#[derive(Debug, Clone)]
pub struct Outputs {
    pub wheel_commands: Topic<WheelRateCommand>,
    pub odometry: Topic<OdometryMsg>,
    pub transforms: Topic<TransformStamped>,
}

impl Default for Outputs {
    fn default() -> Self {
        Self {
            wheel_commands: Topic::new(TOPIC_CAPACITY),
            odometry: Topic::new(TOPIC_CAPACITY),
            transforms: Topic::new(TOPIC_CAPACITY),
        }
    }
}

pub struct ChassisNode {
    controller: ChassisController,
    bridge: Arc<ConfigBridge>,
    bb: Blackboard,
    period: Duration,
    outputs: Outputs,
    inbound_rx: mpsc::Receiver<Inbound>,
    config_rx: mpsc::Receiver<ConfigUpdate>,
}

impl ChassisNode {
    pub fn new(
        controller: ChassisController,
        bridge: Arc<ConfigBridge>,
        bb: Blackboard,
        period: Duration,
    ) -> (Self, NodeHandle) {
        let (inbound, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (config, config_rx) = mpsc::channel(CONFIG_CAPACITY);
        let node = Self {
            controller,
            bridge,
            bb,
            period,
            outputs: Outputs::default(),
            inbound_rx,
            config_rx,
        };
        (node, NodeHandle { inbound, config })
    }

    /// Topics to subscribe to before calling [`ChassisNode::run`].
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Runs until every [`NodeHandle`] is dropped or a tick fails.
    ///
    /// # Errors
    ///
    /// Returns the runtime fault that stopped the odometry tick.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            controller,
            bridge,
            bb,
            period,
            outputs,
            inbound_rx,
            config_rx,
        } = self;

        info!(?period, "Chassis node started");
        tokio::try_join!(
            controller_task(controller, bb, period, outputs, inbound_rx),
            config_task(bridge, config_rx),
        )?;
        info!("Chassis node finished");
        Ok(())
    }
}

async fn controller_task(
    mut controller: ChassisController,
    bb: Blackboard,
    period: Duration,
    outputs: Outputs,
    mut inbound_rx: mpsc::Receiver<Inbound>,
) -> anyhow::Result<()> {
    info!("Controller task started.");
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let out = match controller.tick() {
                    Ok(out) => out,
                    Err(e) => {
                        error!(error = %e, "Odometry tick failed, shutting down");
                        raise_fault(&bb, &e.to_string());
                        return Err(e).context("odometry tick");
                    }
                };
                record_odometry(&bb, out.estimate);
                outputs.odometry.publish(out.odometry);
                outputs.transforms.publish(out.transform);
            }
            msg = inbound_rx.recv() => match msg {
                Some(Inbound::Velocity(cmd)) => {
                    let command = controller.on_velocity_command(cmd);
                    record_command(&bb, command);
                    outputs.wheel_commands.publish(command);
                }
                Some(Inbound::Encoder(sample)) => controller.on_encoder_sample(sample),
                None => {
                    info!("Inbound channel closed, controller task exiting.");
                    return Ok(());
                }
            },
        }
    }
}

async fn config_task(
    bridge: Arc<ConfigBridge>,
    mut config_rx: mpsc::Receiver<ConfigUpdate>,
) -> anyhow::Result<()> {
    info!("Config task started.");
    while let Some(update) = config_rx.recv().await {
        debug!(?update, "Configuration change received");
        let bridge = Arc::clone(&bridge);
        let outcome = tokio::task::spawn_blocking(move || bridge.apply(&update))
            .await
            .context("configuration task panicked")?;
        match outcome {
            Ok(report) => info!(
                gains_applied = report.gains_applied,
                thresholds_applied = report.thresholds_applied,
                thresholds = %report.thresholds,
                "Configuration change applied"
            ),
            // The bridge has already raised the fault.
            Err(e) => warn!(error = %e, "Configuration change rejected"),
        }
    }
    info!("Config channel closed, config task exiting.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::snapshot;
    use crate::messages::FrameIds;
    use crate::services::testing::RecordingService;
    use rover_kinematics::RobotGeometry;
    use rover_safety::SafetyGeometryParams;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    struct Fixture {
        node: ChassisNode,
        handle: NodeHandle,
        pid: Arc<RecordingService>,
        safety: Arc<RecordingService>,
        bb: Blackboard,
    }

    fn fixture() -> Fixture {
        fixture_with(RobotGeometry::new(0.0325, 0.16, 3840.0, 9.15).unwrap())
    }

    fn fixture_with(geometry: RobotGeometry) -> Fixture {
        let pid = Arc::new(RecordingService::new("rover6_pid"));
        let safety = Arc::new(RecordingService::new("rover6_safety"));
        let bb: Blackboard = Arc::default();
        let bridge = Arc::new(ConfigBridge::new(
            SafetyGeometryParams::default(),
            pid.clone(),
            safety.clone(),
            bb.clone(),
        ));
        let controller = ChassisController::new(geometry, FrameIds::default());
        let (node, handle) =
            ChassisNode::new(controller, bridge, bb.clone(), Duration::from_millis(10));
        Fixture { node, handle, pid, safety, bb }
    }

    #[tokio::test]
    async fn test_velocity_command_is_published() {
        let f = fixture();
        let mut wheels = f.node.outputs().wheel_commands.subscribe();
        let node = tokio::spawn(f.node.run());

        f.handle.send_velocity(VelocityCommand::new(0.5, 0.0)).await.unwrap();
        let command = timeout(WAIT, wheels.recv()).await.unwrap().unwrap();
        assert_eq!(command.left, command.right);
        assert!(command.left > 0.0);
        assert_eq!(snapshot(&f.bb).last_command, Some(*command));

        drop(f.handle);
        timeout(WAIT, node).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_odometry_carries_sample_stamp() {
        let f = fixture();
        let mut odom = f.node.outputs().odometry.subscribe();
        let transforms = f.node.outputs().transforms.clone();
        let node = tokio::spawn(f.node.run());

        let stamp = Duration::from_millis(1500);
        f.handle
            .send_encoder(EncoderSample::new(stamp, 3840, 3840, 0.0, 0.0))
            .await
            .unwrap();

        let msg = timeout(WAIT, async {
            loop {
                let msg = odom.recv().await.unwrap();
                if msg.stamp == stamp {
                    return msg;
                }
            }
        })
        .await
        .unwrap();
        assert!(msg.pose.position.x > 0.0);
        assert_eq!(msg.frame_id, "odom");

        let mut tf = transforms.subscribe();
        let transform = timeout(WAIT, tf.recv()).await.unwrap().unwrap();
        assert_eq!(transform.child_frame, "base_link");

        drop(f.handle);
        timeout(WAIT, node).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_config_reaches_services() {
        let f = fixture();
        let node = tokio::spawn(f.node.run());

        f.handle.send_config(ConfigUpdate::default()).await.unwrap();
        timeout(WAIT, async {
            while f.safety.thresholds.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(*f.pid.gains.lock(), vec![ConfigUpdate::default().gains()]);
        assert_eq!(
            f.safety.thresholds.lock()[0].as_array(),
            [69, 146, 63, 54, 121, 60]
        );

        drop(f.handle);
        timeout(WAIT, node).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_rejected_config_keeps_node_running() {
        let f = fixture();
        let mut wheels = f.node.outputs().wheel_commands.subscribe();
        let node = tokio::spawn(f.node.run());

        let bad = ConfigUpdate {
            ledge_threshold_y_mm: -28.7,
            ..ConfigUpdate::default()
        };
        f.handle.send_config(bad).await.unwrap();
        f.handle.send_velocity(VelocityCommand::new(0.1, 0.0)).await.unwrap();
        timeout(WAIT, wheels.recv()).await.unwrap().unwrap();
        assert!(!node.is_finished());

        drop(f.handle);
        timeout(WAIT, node).await.unwrap().unwrap().unwrap();
        assert!(f.safety.thresholds.lock().is_empty());
    }

    #[tokio::test]
    async fn test_tick_fault_stops_node() {
        // One million ticks on an absurd wheel overflows the pose.
        let f = fixture_with(RobotGeometry::new(1e306, 0.16, 3840.0, 1.0).unwrap());
        f.handle
            .send_encoder(EncoderSample::new(Duration::ZERO, 1_000_000, 1_000_000, 0.0, 0.0))
            .await
            .unwrap();

        let result = timeout(WAIT, f.node.run()).await.unwrap();
        assert!(result.is_err());
        assert!(!snapshot(&f.bb).faults.is_empty());
        drop(f.handle);
    }

    #[tokio::test]
    async fn test_bad_tick_rate_does_not_stop_node() {
        let f = fixture();
        let mut odom = f.node.outputs().odometry.subscribe();
        let node = tokio::spawn(f.node.run());

        let stamp = Duration::from_millis(700);
        f.handle
            .send_encoder(EncoderSample::new(stamp, 3840, 3840, f64::NAN, 0.0))
            .await
            .unwrap();
        let msg = timeout(WAIT, async {
            loop {
                let msg = odom.recv().await.unwrap();
                if msg.stamp == stamp {
                    return msg;
                }
            }
        })
        .await
        .unwrap();
        assert!(msg.pose.position.x > 0.0);
        assert!(msg.twist.linear.x.is_nan());
        assert!(!node.is_finished());

        drop(f.handle);
        timeout(WAIT, node).await.unwrap().unwrap().unwrap();
    }
}
