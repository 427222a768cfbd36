//! In-process stand-in for the motor controller, used by the binary.
//!
//! Loopback services accept gains and thresholds once their start-up delay
//! has passed. The simulated encoder integrates the last published wheel
//! command into tick counts. A scripted source sends a fixed velocity command.

use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use rover_kinematics::{EncoderSample, WheelRateCommand};
use rover_safety::ThresholdSet;
use tokio::sync::broadcast::{Receiver, error::RecvError, error::TryRecvError};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::messages::{PidGains, VelocityCommand};
use crate::node::NodeHandle;
use crate::services::{GainService, RemoteService, ServiceError, ThresholdService};

/// Accepts calls after `startup` has elapsed and keeps the last values sent.
#[derive(Debug)]
pub struct LoopbackService {
    name: String,
    ready_at: Instant,
    gains: Mutex<Option<PidGains>>,
    thresholds: Mutex<Option<ThresholdSet>>,
}

impl LoopbackService {
    pub fn new(name: impl Into<String>, startup: Duration) -> Self {
        Self {
            name: name.into(),
            ready_at: Instant::now() + startup,
            gains: Mutex::new(None),
            thresholds: Mutex::new(None),
        }
    }

    pub fn last_gains(&self) -> Option<PidGains> {
        *self.gains.lock()
    }

    pub fn last_thresholds(&self) -> Option<ThresholdSet> {
        *self.thresholds.lock()
    }

    fn check_ready(&self) -> Result<(), ServiceError> {
        if self.is_ready() { Ok(()) } else { Err(ServiceError::NotReady) }
    }
}

impl RemoteService for LoopbackService {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        Instant::now() >= self.ready_at
    }
}

impl GainService for LoopbackService {
    fn set_gains(&self, gains: &PidGains) -> Result<(), ServiceError> {
        self.check_ready()?;
        debug!(service = %self.name, gains = ?gains.as_array(), "Gains received");
        *self.gains.lock() = Some(*gains);
        Ok(())
    }
}

impl ThresholdService for LoopbackService {
    fn set_thresholds(&self, thresholds: &ThresholdSet) -> Result<(), ServiceError> {
        self.check_ready()?;
        debug!(service = %self.name, %thresholds, "Thresholds received");
        *self.thresholds.lock() = Some(*thresholds);
        Ok(())
    }
}

/// Integrates wheel rates (ticks/s) into cumulative tick counts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimEncoder {
    command: WheelRateCommand,
    left: f64,
    right: f64,
}

impl SimEncoder {
    pub fn set_command(&mut self, command: WheelRateCommand) {
        self.command = command;
    }

    /// Advances by `dt` and returns the sample a real encoder would report.
    pub fn advance(&mut self, dt: Duration, stamp: Duration) -> EncoderSample {
        let dt = dt.as_secs_f64();
        self.left += self.command.left * dt;
        self.right += self.command.right * dt;
        EncoderSample::new(
            stamp,
            self.left.round() as i64,
            self.right.round() as i64,
            self.command.left,
            self.command.right,
        )
    }
}

fn now_stamp() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Feeds simulated encoder samples to the node until it stops.
pub async fn encoder_task(
    handle: NodeHandle,
    mut commands: Receiver<Arc<WheelRateCommand>>,
    period: Duration,
) -> anyhow::Result<()> {
    info!(?period, "Simulated encoder started.");
    let mut encoder = SimEncoder::default();
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = Instant::now();

    loop {
        tick.tick().await;
        loop {
            match commands.try_recv() {
                Ok(command) => encoder.set_command(*command),
                Err(TryRecvError::Lagged(n)) => warn!(skipped = n, "Simulated encoder lagged"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    info!("Wheel command topic closed, simulated encoder exiting.");
                    return Ok(());
                }
            }
        }

        let now = Instant::now();
        let sample = encoder.advance(now - last, now_stamp());
        last = now;
        if handle.send_encoder(sample).await.is_err() {
            info!("Node stopped, simulated encoder exiting.");
            return Ok(());
        }
    }
}

/// Sends the same velocity command every `period` until the node stops.
pub async fn velocity_task(
    handle: NodeHandle,
    command: VelocityCommand,
    period: Duration,
) -> anyhow::Result<()> {
    info!(linear_x = command.linear_x, angular_z = command.angular_z, "Scripted velocity source started.");
    let mut tick = interval(period);
    loop {
        tick.tick().await;
        if handle.send_velocity(command).await.is_err() {
            info!("Node stopped, velocity source exiting.");
            return Ok(());
        }
    }
}

/// Logs wheel commands the simulated base would have driven.
pub async fn wheel_monitor(mut commands: Receiver<Arc<WheelRateCommand>>) -> anyhow::Result<()> {
    loop {
        match commands.recv().await {
            Ok(command) => debug!(%command, "Wheel command"),
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "Wheel monitor lagged"),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}
