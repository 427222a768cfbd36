//! Shared, read-mostly snapshot of what the node last produced.
//!
//! The controller task is the only owner of the odometry state; it copies
//! its outputs here after each step so other tasks (and operators) can read
//! them. Best-effort failures land in `faults`.

use parking_lot::RwLock;
use std::sync::Arc;

use rover_kinematics::{OdometryEstimate, WheelRateCommand};
use rover_safety::ThresholdSet;

use crate::messages::PidGains;

/// Faults kept before the oldest is dropped.
const MAX_FAULTS: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct State {
    pub odometry: Option<OdometryEstimate>,
    pub last_command: Option<WheelRateCommand>,
    pub gains: Option<PidGains>,
    pub thresholds: Option<ThresholdSet>,
    pub faults: Vec<String>,
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn record_odometry(bb: &Blackboard, estimate: OdometryEstimate) {
    bb.write().odometry = Some(estimate);
}

pub fn record_command(bb: &Blackboard, command: WheelRateCommand) {
    bb.write().last_command = Some(command);
}

pub fn record_gains(bb: &Blackboard, gains: PidGains) {
    bb.write().gains = Some(gains);
}

pub fn record_thresholds(bb: &Blackboard, thresholds: ThresholdSet) {
    bb.write().thresholds = Some(thresholds);
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        if g.faults.len() >= MAX_FAULTS {
            g.faults.remove(0);
        }
        g.faults.push(msg.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faults_are_deduplicated() {
        let bb: Blackboard = Arc::default();
        raise_fault(&bb, "rover6_pid unavailable");
        raise_fault(&bb, "rover6_pid unavailable");
        raise_fault(&bb, "rover6_safety unavailable");
        assert_eq!(snapshot(&bb).faults.len(), 2);
    }

    #[test]
    fn test_fault_list_is_bounded() {
        let bb: Blackboard = Arc::default();
        for i in 0..(MAX_FAULTS + 5) {
            raise_fault(&bb, &format!("fault {i}"));
        }
        let faults = snapshot(&bb).faults;
        assert_eq!(faults.len(), MAX_FAULTS);
        assert_eq!(faults[0], "fault 5");
    }

    #[test]
    fn test_record_command_keeps_latest() {
        let bb: Blackboard = Arc::default();
        assert!(snapshot(&bb).last_command.is_none());
        record_command(&bb, WheelRateCommand::new(1.0, 2.0));
        record_command(&bb, WheelRateCommand::new(3.0, -3.0));
        assert_eq!(snapshot(&bb).last_command, Some(WheelRateCommand::new(3.0, -3.0)));
    }
}
