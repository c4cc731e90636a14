//! Conflict resolution between change requests of one tick
//!
//! Requests are grouped by destination lane. Within a lane they are ordered
//! front to back and every pair is checked for predicted positions closer
//! than one vehicle length. Vehicles keeping their lane have priority over
//! vehicles merging in; between two merging vehicles the one further ahead
//! stays put. A vetoed vehicle cruises on its own lane, which is then
//! resolved again.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};

use log::{debug, trace};
use ordered_float::OrderedFloat;

use super::error::SimResult;
use super::types::{ChangeRequest, LaneId, VehicleId, VEHICLE_LENGTH};
use super::vehicle::has_conflict;
use super::world::SimWorld;

/// Outcome counters of one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Lane changes that were turned down
    pub vetoes: usize,
    /// Vehicles slowed down behind a vehicle with priority on their own lane
    pub yields: usize,
}

impl SimWorld {
    /// Resolve every queued request and stage the final motion of each
    /// requesting vehicle. Must run after all vehicles have submitted.
    pub fn resolve_changes(&mut self) -> SimResult<Resolution> {
        let queued: Vec<ChangeRequest> = self
            .lane_change_targets
            .values()
            .flatten()
            .copied()
            .collect();
        for request in &queued {
            self.stage_request(request)?;
        }

        let mut resolution = Resolution::default();
        let mut worklist: BTreeSet<LaneId> = self.lane_change_targets.keys().copied().collect();
        while let Some(lane) = worklist.pop_first() {
            for request in self.resolve_changes_for_lane(lane, &mut resolution)? {
                self.lane_change_targets
                    .entry(request.lane)
                    .or_default()
                    .push(request);
                worklist.insert(request.lane);
            }
        }
        Ok(resolution)
    }

    fn stage_request(&mut self, request: &ChangeRequest) -> SimResult<()> {
        let vehicle = self.get_vehicle_mut(request.vehicle)?;
        vehicle.change_lane(request.lane, Some(request.speed));
        vehicle.cruise(None);
        Ok(())
    }

    /// Front to back by committed position, ties by id
    fn order_front_to_back(&self, requests: &mut [ChangeRequest]) {
        requests.sort_by_key(|request| {
            let position = self
                .vehicle(request.vehicle)
                .map(|vehicle| vehicle.position())
                .unwrap_or(f64::NEG_INFINITY);
            (Reverse(OrderedFloat(position)), request.vehicle)
        });
    }

    /// Check every pair of requests into `lane`. Returns the requests of
    /// vetoed lane changers, now targeting their own lanes.
    fn resolve_changes_for_lane(
        &mut self,
        lane: LaneId,
        resolution: &mut Resolution,
    ) -> SimResult<Vec<ChangeRequest>> {
        let mut requests = self.lane_change_targets.remove(&lane).unwrap_or_default();
        self.order_front_to_back(&mut requests);

        let mut vetoed: HashSet<VehicleId> = HashSet::new();
        let mut moved_out = Vec::new();

        for first in 0..requests.len() {
            for second in (first + 1)..requests.len() {
                let (change1, change2) = (requests[first], requests[second]);
                if vetoed.contains(&change1.vehicle) || vetoed.contains(&change2.vehicle) {
                    continue;
                }

                let veh1 = self.get_vehicle(change1.vehicle)?;
                let veh2 = self.get_vehicle(change2.vehicle)?;
                if !has_conflict(veh1, veh2) {
                    continue;
                }

                // A vehicle keeping its lane wins. Between two merging
                // vehicles the leading one stays in its lane.
                let (honored, yielding, yielding_index) = if change1.lane == veh1.lane() {
                    (change1, change2, second)
                } else {
                    (change2, change1, first)
                };

                let speed = self.yield_speed(yielding.vehicle, honored.vehicle, lane)?;
                let vehicle = self.get_vehicle_mut(yielding.vehicle)?;
                let own_lane = vehicle.lane();
                vehicle.change_lane(own_lane, Some(speed));
                vehicle.cruise(None);

                if own_lane == lane {
                    trace!(
                        "Vehicle {:?} slows to {:.2} behind {:?} on {:?}",
                        yielding.vehicle,
                        speed,
                        honored.vehicle,
                        lane
                    );
                    requests[yielding_index].speed = speed;
                    resolution.yields += 1;
                } else {
                    debug!(
                        "Lane change of {:?} into {:?} vetoed in favour of {:?}",
                        yielding.vehicle, lane, honored.vehicle
                    );
                    vetoed.insert(yielding.vehicle);
                    moved_out.push(ChangeRequest::new(yielding.vehicle, own_lane, speed));
                    resolution.vetoes += 1;
                }
            }
        }

        requests.retain(|request| !vetoed.contains(&request.vehicle));
        self.lane_change_targets.insert(lane, requests);
        Ok(moved_out)
    }

    /// Speed for a vehicle that gives way: never faster than what it has
    /// staged, safe on its own lane, and one vehicle length behind the
    /// vehicle it yields to when both end up on that lane.
    fn yield_speed(
        &self,
        yielding: VehicleId,
        honored: VehicleId,
        destination: LaneId,
    ) -> SimResult<f64> {
        let vehicle = self.get_vehicle(yielding)?;
        let staged = vehicle.pending().speed.unwrap_or(vehicle.speed());
        let mut speed = staged.min(vehicle.max_speed_on(self, None)?);

        let other = self.get_vehicle(honored)?;
        if vehicle.lane() == destination && other.position() > vehicle.position() {
            let gap = other.next_predicted_position() - vehicle.position() - VEHICLE_LENGTH;
            speed = speed.min(gap);
        }
        vehicle.checked_speed(speed)
    }
}
