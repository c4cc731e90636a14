//! Main simulation world that ties everything together
//!
//! Owns the lanes and vehicles, collects the per-tick change requests and
//! drives the synchronized decide / resolve / commit step.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use log::debug;
use ordered_float::OrderedFloat;

use super::error::{SimError, SimResult};
use super::lane::Lane;
use super::stats::{SimStats, StepReport};
use super::types::{ChangeRequest, LaneId, SimId, VehicleId};
use super::vehicle::{Vehicle, VehicleTable};

/// The main simulation world
#[derive(Debug)]
pub struct SimWorld {
    /// Lanes indexed by lane number
    lanes: Vec<Lane>,

    /// All vehicles
    vehicles: VehicleTable,

    /// Change requests of the current tick, grouped by destination lane
    pub(super) lane_change_targets: BTreeMap<LaneId, Vec<ChangeRequest>>,

    /// Vehicles that already submitted a request this tick
    requested: HashSet<VehicleId>,

    /// Next ID to assign
    next_id: usize,

    /// Number of committed ticks
    tick: u64,
}

impl SimWorld {
    /// Create a world with `num_lanes` parallel lanes, wired left to right
    pub fn new(num_lanes: usize) -> Self {
        let lanes = (0..num_lanes)
            .map(|index| {
                let mut lane = Lane::new(LaneId(index));
                lane.left = LaneId(index).left();
                lane.right = LaneId(index).right().filter(|right| right.0 < num_lanes);
                lane
            })
            .collect();

        Self {
            lanes,
            vehicles: VehicleTable::new(),
            lane_change_targets: BTreeMap::new(),
            requested: HashSet::new(),
            next_id: 0,
            tick: 0,
        }
    }

    fn next_vehicle_id(&mut self) -> VehicleId {
        let id = VehicleId(SimId(self.next_id));
        self.next_id += 1;
        id
    }

    /// Lane lookup; `None` for an out-of-range lane
    pub fn lane(&self, lane: LaneId) -> Option<&Lane> {
        self.lanes.get(lane.0)
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn left_of(&self, lane: LaneId) -> Option<LaneId> {
        lane.left().filter(|left| self.lane(*left).is_some())
    }

    pub fn right_of(&self, lane: LaneId) -> Option<LaneId> {
        lane.right().filter(|right| self.lane(*right).is_some())
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicle_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&id)
    }

    pub(super) fn get_vehicle(&self, id: VehicleId) -> SimResult<&Vehicle> {
        self.vehicles.get(&id).ok_or(SimError::UnknownVehicle(id))
    }

    pub(super) fn get_vehicle_mut(&mut self, id: VehicleId) -> SimResult<&mut Vehicle> {
        self.vehicles.get_mut(&id).ok_or(SimError::UnknownVehicle(id))
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn vehicle_table(&self) -> &VehicleTable {
        &self.vehicles
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Add a vehicle cruising at its target speed and register it on `lane`
    pub fn spawn_vehicle(
        &mut self,
        position: f64,
        target_speed: f64,
        lane: LaneId,
    ) -> SimResult<VehicleId> {
        if !position.is_finite() {
            return Err(SimError::InvalidPosition(position));
        }
        if !target_speed.is_finite() || target_speed < 0.0 {
            return Err(SimError::InvalidTargetSpeed(target_speed));
        }
        let lane_ref = self.lane(lane).ok_or(SimError::UnknownLane(lane))?;
        if lane_ref.vehicle_on(position, &self.vehicles) {
            return Err(SimError::PositionOccupied { lane, position });
        }

        let id = self.next_vehicle_id();
        self.vehicles
            .insert(id, Vehicle::new(id, position, target_speed, lane));
        if let Some(lane_mut) = self.lanes.get_mut(lane.0) {
            lane_mut.add(id);
        }
        Ok(id)
    }

    /// Remove a vehicle from the world. Unknown ids are ignored.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> Option<Vehicle> {
        let vehicle = self.vehicles.remove(&id)?;
        if let Some(lane) = self.lanes.get_mut(vehicle.lane().0) {
            lane.remove(id);
        }
        self.requested.remove(&id);
        for requests in self.lane_change_targets.values_mut() {
            requests.retain(|request| request.vehicle != id);
        }
        Some(vehicle)
    }

    /// Nearest vehicle ahead of `id` on its committed lane
    pub fn leader_of(&self, id: VehicleId) -> Option<VehicleId> {
        let vehicle = self.vehicle(id)?;
        self.lane(vehicle.lane())?
            .first_vehicle_ahead(vehicle.position(), &self.vehicles)
            .map(Vehicle::id)
    }

    /// Nearest vehicle behind `id` on its committed lane
    pub fn follower_of(&self, id: VehicleId) -> Option<VehicleId> {
        let vehicle = self.vehicle(id)?;
        self.lane(vehicle.lane())?
            .first_vehicle_behind(vehicle.position(), &self.vehicles)
            .map(Vehicle::id)
    }

    /// Queue a request for this tick. Each vehicle may submit once.
    pub fn request_change(&mut self, request: ChangeRequest) -> SimResult<()> {
        if !self.vehicles.contains_key(&request.vehicle) {
            return Err(SimError::UnknownVehicle(request.vehicle));
        }
        if self.lane(request.lane).is_none() {
            return Err(SimError::UnknownLane(request.lane));
        }
        if !self.requested.insert(request.vehicle) {
            return Err(SimError::DuplicateRequest(request.vehicle));
        }
        self.lane_change_targets
            .entry(request.lane)
            .or_default()
            .push(request);
        Ok(())
    }

    /// Requests queued for `lane` in the current tick
    pub fn requests_for(&self, lane: LaneId) -> &[ChangeRequest] {
        self.lane_change_targets
            .get(&lane)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn reset_lane_changes(&mut self) {
        self.lane_change_targets.clear();
        self.requested.clear();
    }

    /// Every vehicle id, lane by lane
    fn snapshot(&self) -> Vec<VehicleId> {
        self.lanes.iter().flat_map(|lane| lane.iter()).collect()
    }

    /// Decision phase: every vehicle computes its request against the
    /// committed world. Nothing is staged or queued.
    pub fn decide(&self) -> SimResult<Vec<ChangeRequest>> {
        let vehicle_ids = self.snapshot();

        #[cfg(not(feature = "parallel"))]
        let requests: SimResult<Vec<ChangeRequest>> = vehicle_ids
            .iter()
            .map(|id| self.get_vehicle(*id)?.calculate(self))
            .collect();

        #[cfg(feature = "parallel")]
        let requests: SimResult<Vec<ChangeRequest>> = {
            use rayon::prelude::*;

            vehicle_ids
                .par_iter()
                .map(|id| self.get_vehicle(*id)?.calculate(self))
                .collect()
        };

        requests
    }

    /// Commit phase: promote every vehicle's pending state and clear the
    /// request map. Returns how many vehicles switched lanes. Nothing is
    /// committed if any vehicle has staged an unknown lane.
    pub fn commit(&mut self) -> SimResult<usize> {
        let vehicle_ids = self.snapshot();
        for id in &vehicle_ids {
            let vehicle = self.get_vehicle(*id)?;
            if let Some(lane) = vehicle.pending().lane {
                if self.lane(lane).is_none() {
                    return Err(SimError::UnknownLane(lane));
                }
            }
        }

        let mut migrated = 0;
        for id in vehicle_ids {
            let vehicle = self
                .vehicles
                .get_mut(&id)
                .ok_or(SimError::UnknownVehicle(id))?;
            if vehicle.apply(&mut self.lanes)? {
                migrated += 1;
            }
        }
        self.reset_lane_changes();
        self.tick += 1;
        Ok(migrated)
    }

    /// Run one synchronized tick: decide, resolve conflicts, commit
    pub fn step(&mut self) -> SimResult<StepReport> {
        self.reset_lane_changes();
        let result = self.run_phases();
        self.reset_lane_changes();
        result
    }

    fn run_phases(&mut self) -> SimResult<StepReport> {
        let requests = self.decide()?;
        let request_count = requests.len();
        for request in requests {
            self.request_change(request)?;
        }

        let resolution = self.resolve_changes()?;
        let committed = self.vehicle_count();
        let lane_changes = self.commit()?;

        let report = StepReport {
            tick: self.tick,
            requests: request_count,
            lane_changes,
            vetoes: resolution.vetoes,
            yields: resolution.yields,
            committed,
        };
        debug!(
            "Tick {}: {} requests, {} lane changes, {} vetoes, {} yields",
            report.tick, report.requests, report.lane_changes, report.vetoes, report.yields
        );
        Ok(report)
    }

    /// Step `ticks` times, accumulating statistics
    pub fn run(&mut self, ticks: u64) -> SimResult<SimStats> {
        let mut stats = SimStats::default();
        for _ in 0..ticks {
            let report = self.step()?;
            stats.record(&report, self);
        }
        Ok(stats)
    }

    /// Positions on `lane`, sorted back to front
    pub fn positions_on(&self, lane: LaneId) -> Vec<f64> {
        let mut positions: Vec<f64> = self
            .lane(lane)
            .map(|lane| {
                lane.iter()
                    .filter_map(|id| self.vehicle(id))
                    .map(Vehicle::position)
                    .collect()
            })
            .unwrap_or_default();
        positions.sort_by_key(|position| OrderedFloat(*position));
        positions
    }

    /// Smallest committed distance between two vehicles sharing a lane
    pub fn min_same_lane_gap(&self) -> Option<f64> {
        self.lanes
            .iter()
            .flat_map(|lane| {
                let positions = self.positions_on(lane.id());
                positions
                    .windows(2)
                    .map(|pair| pair[1] - pair[0])
                    .collect::<Vec<_>>()
            })
            .min_by_key(|gap| OrderedFloat(*gap))
    }

    pub fn mean_speed(&self) -> Option<f64> {
        if self.vehicles.is_empty() {
            return None;
        }
        let total: f64 = self
            .snapshot()
            .into_iter()
            .filter_map(|id| self.vehicle(id))
            .map(Vehicle::speed)
            .sum();
        Some(total / self.vehicles.len() as f64)
    }

    /// Human readable dump of every lane, back to front
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SimWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Lane Simulation Summary ===")?;
        writeln!(
            f,
            "Tick: {}, Lanes: {}, Vehicles: {}",
            self.tick,
            self.lanes.len(),
            self.vehicles.len()
        )?;
        for lane in &self.lanes {
            writeln!(f, "--- Lane {} ({} vehicles) ---", lane.id().0, lane.len())?;

            let mut members: Vec<&Vehicle> =
                lane.iter().filter_map(|id| self.vehicle(id)).collect();
            members.sort_by_key(|vehicle| OrderedFloat(vehicle.position()));

            for vehicle in members {
                let gap = self
                    .leader_of(vehicle.id())
                    .and_then(|leader| self.vehicle(leader))
                    .map(|leader| format!("{:.2}", leader.position() - vehicle.position()))
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    f,
                    "  Vehicle {:?}: position={:.2}, speed={:.2}, target={:.2}, gap={}",
                    vehicle.id().0 .0,
                    vehicle.position(),
                    vehicle.speed(),
                    vehicle.target_speed(),
                    gap
                )?;
            }
        }
        Ok(())
    }
}
