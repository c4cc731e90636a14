//! Vehicle state staging and lane/speed decisions
//!
//! A vehicle never mutates what other vehicles can observe during a tick.
//! Getters read the committed [`VehicleState`], setters stage into the
//! [`PendingState`], and [`Vehicle::apply`] promotes the result.

use std::collections::HashMap;

use log::{trace, warn};

use super::error::{SimError, SimResult};
use super::lane::Lane;
use super::state::{PendingState, VehicleState};
use super::types::{ChangeRequest, LaneId, VehicleId, POSITION_TOLERANCE, VEHICLE_LENGTH};
use super::world::SimWorld;

/// All vehicles of a world, keyed by id
pub type VehicleTable = HashMap<VehicleId, Vehicle>;

/// Whether two vehicles would end up closer than one vehicle length
pub fn has_conflict(veh1: &Vehicle, veh2: &Vehicle) -> bool {
    (veh1.next_predicted_position() - veh2.next_predicted_position()).abs() < VEHICLE_LENGTH
}

/// A vehicle in the lane simulation.
///
/// Equality is identity: two vehicles are equal only if they share a
/// [`VehicleId`]. Use [`Vehicle::shares_spot_with`] for the positional test.
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    target_speed: f64,
    current: VehicleState,
    pending: PendingState,
}

impl PartialEq for Vehicle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Vehicle {}

impl Vehicle {
    /// Builds a vehicle cruising at its target speed. Lane registration is
    /// done by [`SimWorld::spawn_vehicle`].
    pub(crate) fn new(id: VehicleId, position: f64, target_speed: f64, lane: LaneId) -> Self {
        Self {
            id,
            target_speed,
            current: VehicleState::new(position, target_speed, lane),
            pending: PendingState::undefined(),
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    pub fn state(&self) -> &VehicleState {
        &self.current
    }

    pub fn pending(&self) -> &PendingState {
        &self.pending
    }

    pub fn speed(&self) -> f64 {
        self.current.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.pending.speed = Some(speed);
    }

    pub fn position(&self) -> f64 {
        self.current.position
    }

    pub fn set_position(&mut self, position: f64) {
        self.pending.position = Some(position);
    }

    pub fn lane(&self) -> LaneId {
        self.current.lane
    }

    pub fn set_lane(&mut self, lane: LaneId) {
        self.pending.lane = Some(lane);
    }

    /// Same committed position and lane as `other`
    pub fn shares_spot_with(&self, other: &Vehicle) -> bool {
        self.position() == other.position() && self.lane() == other.lane()
    }

    /// Where this vehicle ends up after cruising at the staged speed, or at
    /// the committed speed when nothing is staged
    pub fn next_predicted_position(&self) -> f64 {
        self.position() + self.pending.speed.unwrap_or(self.current.speed)
    }

    /// Advance along the lane, optionally staging a new speed first
    pub fn cruise(&mut self, speed: Option<f64>) {
        if let Some(speed) = speed {
            self.set_speed(speed);
        }
        let position = self.next_predicted_position();
        self.set_position(position);
    }

    /// Stage a lane (and optionally a speed); position staging is untouched
    pub fn change_lane(&mut self, lane: LaneId, speed: Option<f64>) {
        if let Some(speed) = speed {
            self.set_speed(speed);
        }
        self.set_lane(lane);
    }

    /// Decide the best (lane, speed) pair against the committed world.
    ///
    /// Candidates are the current lane, then left, then right; the first
    /// candidate reaching the highest speed wins.
    pub fn calculate(&self, world: &SimWorld) -> SimResult<ChangeRequest> {
        let own = self.lane();
        let candidates = [Some(own), world.left_of(own), world.right_of(own)];

        let mut best: Option<(LaneId, f64)> = None;
        for lane in candidates.into_iter().flatten() {
            if !self.can_change_lane(world, Some(lane)) {
                continue;
            }
            let speed = self.max_speed_on(world, Some(lane))?;
            match best {
                Some((_, best_speed)) if best_speed >= speed => {}
                _ => best = Some((lane, speed)),
            }
        }

        let (lane, speed) = best.ok_or(SimError::UnknownLane(own))?;
        trace!(
            "Vehicle {:?} at {:.2} on {:?} requests {:?} at {:.2}",
            self.id,
            self.position(),
            own,
            lane,
            speed
        );
        Ok(ChangeRequest::new(self.id, lane, speed))
    }

    /// Highest speed that keeps one vehicle length behind the predicted
    /// position of the nearest vehicle ahead on `lane` (default: own lane).
    ///
    /// Fails with [`SimError::VehicleAccident`] when the result is negative
    /// on the vehicle's own lane.
    pub fn max_speed_on(&self, world: &SimWorld, lane: Option<LaneId>) -> SimResult<f64> {
        let lane_id = lane.unwrap_or_else(|| self.lane());
        let lane = world.lane(lane_id).ok_or(SimError::UnknownLane(lane_id))?;

        let Some(ahead) = lane.first_vehicle_ahead(self.position(), world.vehicle_table()) else {
            return Ok(self.target_speed);
        };

        let threshold = ahead.next_predicted_position() - self.position() - VEHICLE_LENGTH;
        let max_speed = threshold.min(self.target_speed);
        if lane_id == self.lane() {
            return self.checked_speed(max_speed);
        }
        Ok(max_speed)
    }

    /// Reject a negative speed on the vehicle's own lane. Rounding noise
    /// below the position tolerance is not an accident.
    pub(crate) fn checked_speed(&self, speed: f64) -> SimResult<f64> {
        if speed >= 0.0 {
            return Ok(speed);
        }
        if speed > -POSITION_TOLERANCE {
            return Ok(0.0);
        }
        warn!(
            "Vehicle {:?} at {:.3} on {:?} cannot keep a safe distance (speed {:.3})",
            self.id,
            self.position(),
            self.lane(),
            speed
        );
        Err(SimError::VehicleAccident {
            vehicle: self.id,
            lane: self.lane(),
            speed,
        })
    }

    /// Whether moving into `lane` keeps one vehicle length to both the
    /// nearest vehicle ahead and behind once everyone moves
    pub fn can_change_lane(&self, world: &SimWorld, lane: Option<LaneId>) -> bool {
        let Some(lane_id) = lane else {
            return false;
        };
        if lane_id == self.lane() {
            return true;
        }
        let Some(lane) = world.lane(lane_id) else {
            return false;
        };

        let vehicles = world.vehicle_table();
        if lane.vehicle_on(self.position(), vehicles) {
            return false;
        }

        let hits_ahead = lane
            .first_vehicle_ahead(self.position(), vehicles)
            .is_some_and(|ahead| has_conflict(self, ahead));
        let hit_from_behind = lane
            .first_vehicle_behind(self.position(), vehicles)
            .is_some_and(|behind| has_conflict(self, behind));

        !hits_ahead && !hit_from_behind
    }

    /// Commit the tick: layer pending over committed, move lane membership
    /// if the lane changed and reset pending. Returns whether the vehicle
    /// switched lanes.
    pub fn apply(&mut self, lanes: &mut [Lane]) -> SimResult<bool> {
        let next = self.pending.coalesce(&self.current);
        let migrated = next.lane != self.current.lane;

        if migrated {
            if next.lane.0 >= lanes.len() {
                return Err(SimError::UnknownLane(next.lane));
            }
            if let Some(old_lane) = lanes.get_mut(self.current.lane.0) {
                old_lane.remove(self.id);
            }
            if let Some(new_lane) = lanes.get_mut(next.lane.0) {
                new_lane.add(self.id);
            }
        }

        self.current = next;
        self.pending = PendingState::undefined();
        Ok(migrated)
    }
}
