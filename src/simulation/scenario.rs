//! Scenario construction for headless runs and tests
//!
//! Random scenarios place vehicles with a seeded RNG so runs are
//! reproducible; the fixed scenarios exercise braking and overtaking.

use anyhow::{bail, Context, Result};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::SimResult;
use super::types::{LaneId, VehicleId, VEHICLE_LENGTH};
use super::world::SimWorld;

/// Placement attempts per vehicle before giving up
const MAX_PLACEMENT_ATTEMPTS: usize = 1000;

/// Parameters of a randomly populated road
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub lanes: usize,
    pub vehicles: usize,
    /// Optional seed for reproducible placement
    pub seed: Option<u64>,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Vehicles are placed in `[0, road_length)`
    pub road_length: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            lanes: 3,
            vehicles: 12,
            seed: None,
            min_speed: 1.0,
            max_speed: 12.0,
            road_length: 200.0,
        }
    }
}

impl ScenarioConfig {
    fn validate(&self) -> Result<()> {
        if self.lanes == 0 {
            bail!("A scenario needs at least one lane");
        }
        if !(self.min_speed >= 0.0
            && self.min_speed <= self.max_speed
            && self.max_speed.is_finite())
        {
            bail!(
                "Invalid target speed range {}..={}",
                self.min_speed,
                self.max_speed
            );
        }
        if !(self.road_length.is_finite() && self.road_length > 0.0) {
            bail!("Road length must be positive, got {}", self.road_length);
        }
        Ok(())
    }

    /// Build a world with vehicles spread over the lanes, at least one
    /// vehicle length apart within each lane
    pub fn build(&self) -> Result<SimWorld> {
        self.validate()?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut world = SimWorld::new(self.lanes);

        for index in 0..self.vehicles {
            let (lane, position) = (0..MAX_PLACEMENT_ATTEMPTS)
                .map(|_| {
                    (
                        LaneId(rng.random_range(0..self.lanes)),
                        rng.random_range(0.0..self.road_length),
                    )
                })
                .find(|(lane, position)| has_room(&world, *lane, *position))
                .with_context(|| {
                    format!(
                        "Could not place vehicle {} after {} attempts; road too crowded",
                        index, MAX_PLACEMENT_ATTEMPTS
                    )
                })?;
            let target_speed = rng.random_range(self.min_speed..=self.max_speed);

            world
                .spawn_vehicle(position, target_speed, lane)
                .with_context(|| format!("Failed to spawn vehicle {}", index))?;
            debug!(
                "Placed vehicle {} on {:?} at {:.2} (target {:.2})",
                index, lane, position, target_speed
            );
        }

        Ok(world)
    }
}

fn has_room(world: &SimWorld, lane: LaneId, position: f64) -> bool {
    world
        .positions_on(lane)
        .iter()
        .all(|other| (other - position).abs() >= VEHICLE_LENGTH)
}

impl SimWorld {
    /// Two lanes: a fast vehicle closes in on a slow one in lane 0 while
    /// lane 1 is packed with vehicles at the slow speed, so overtaking never
    /// pays off. Returns the world with the (fast, slow) ids.
    pub fn create_blocked_platoon() -> SimResult<(Self, (VehicleId, VehicleId))> {
        let mut world = SimWorld::new(2);
        let fast = world.spawn_vehicle(0.0, 10.0, LaneId(0))?;
        let slow = world.spawn_vehicle(20.0, 2.0, LaneId(0))?;

        for slot in 0..30 {
            let position = -40.0 + slot as f64 * 5.0;
            world.spawn_vehicle(position, 2.0, LaneId(1))?;
        }
        Ok((world, (fast, slow)))
    }

    /// Two lanes: a fast vehicle behind a slow one with lane 1 free.
    /// Returns the world with the (fast, slow) ids.
    pub fn create_overtake() -> SimResult<(Self, (VehicleId, VehicleId))> {
        let mut world = SimWorld::new(2);
        let fast = world.spawn_vehicle(0.0, 10.0, LaneId(0))?;
        let slow = world.spawn_vehicle(20.0, 2.0, LaneId(0))?;
        Ok((world, (fast, slow)))
    }
}
