//! Committed and pending vehicle state
//!
//! A vehicle reads its committed [`VehicleState`] and writes into a
//! [`PendingState`]. At commit time the pending values are layered over the
//! committed ones with [`PendingState::coalesce`].

use super::types::LaneId;

/// Committed kinematic state of a vehicle as of the end of the last tick.
/// Every field is always defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: f64,
    pub speed: f64,
    pub lane: LaneId,
}

impl VehicleState {
    pub fn new(position: f64, speed: f64, lane: LaneId) -> Self {
        Self {
            position,
            speed,
            lane,
        }
    }
}

/// Values staged during the current tick. `None` means "not decided yet".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PendingState {
    pub position: Option<f64>,
    pub speed: Option<f64>,
    pub lane: Option<LaneId>,
}

impl PendingState {
    /// A state with nothing staged
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn is_undefined(&self) -> bool {
        self.position.is_none() && self.speed.is_none() && self.lane.is_none()
    }

    /// Fill every unset field from `committed`; staged fields win.
    pub fn coalesce(&self, committed: &VehicleState) -> VehicleState {
        VehicleState {
            position: self.position.unwrap_or(committed.position),
            speed: self.speed.unwrap_or(committed.speed),
            lane: self.lane.unwrap_or(committed.lane),
        }
    }

    /// Field-wise first-set-wins merge of two pending states, `self` first.
    pub fn merge(&self, other: &PendingState) -> PendingState {
        PendingState {
            position: self.position.or(other.position),
            speed: self.speed.or(other.speed),
            lane: self.lane.or(other.lane),
        }
    }
}
