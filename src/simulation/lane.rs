//! Lanes and nearest-neighbor queries
//!
//! A lane only records which vehicles belong to it. Positions always come
//! from the vehicles' own committed state, so every query takes the world's
//! vehicle table.

use ordered_float::OrderedFloat;

use super::types::{almost_eq, LaneId, VehicleId};
use super::vehicle::{Vehicle, VehicleTable};

/// One lane of the road
#[derive(Debug, Clone)]
pub struct Lane {
    id: LaneId,
    /// Lane to the left (topology only, never validated here)
    pub(crate) left: Option<LaneId>,
    /// Lane to the right (topology only, never validated here)
    pub(crate) right: Option<LaneId>,
    vehicles: Vec<VehicleId>,
}

impl Lane {
    pub fn new(id: LaneId) -> Self {
        Self {
            id,
            left: None,
            right: None,
            vehicles: Vec::new(),
        }
    }

    pub fn id(&self) -> LaneId {
        self.id
    }

    pub fn left(&self) -> Option<LaneId> {
        self.left
    }

    pub fn right(&self) -> Option<LaneId> {
        self.right
    }

    pub fn add(&mut self, vehicle: VehicleId) {
        self.vehicles.push(vehicle);
    }

    /// Removing a vehicle that is not a member is a no-op
    pub fn remove(&mut self, vehicle: VehicleId) {
        if let Some(index) = self.vehicles.iter().position(|v| *v == vehicle) {
            self.vehicles.remove(index);
        }
    }

    pub fn contains(&self, vehicle: VehicleId) -> bool {
        self.vehicles.contains(&vehicle)
    }

    pub fn iter(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    fn members<'a>(&'a self, vehicles: &'a VehicleTable) -> impl Iterator<Item = &'a Vehicle> + 'a {
        self.vehicles.iter().filter_map(move |id| vehicles.get(id))
    }

    /// Nearest member strictly ahead of `position`
    pub fn first_vehicle_ahead<'a>(
        &'a self,
        position: f64,
        vehicles: &'a VehicleTable,
    ) -> Option<&'a Vehicle> {
        self.members(vehicles)
            .filter(|veh| veh.position() - position > 0.0)
            .min_by_key(|veh| OrderedFloat(veh.position() - position))
    }

    /// Nearest member strictly behind `position`
    pub fn first_vehicle_behind<'a>(
        &'a self,
        position: f64,
        vehicles: &'a VehicleTable,
    ) -> Option<&'a Vehicle> {
        self.members(vehicles)
            .filter(|veh| veh.position() - position < 0.0)
            .min_by_key(|veh| OrderedFloat(position - veh.position()))
    }

    /// Whether any member sits on `position` (within floating-point tolerance)
    pub fn vehicle_on(&self, position: f64, vehicles: &VehicleTable) -> bool {
        self.members(vehicles)
            .any(|veh| almost_eq(veh.position(), position))
    }
}
