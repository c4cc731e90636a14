//! Core types for the lane simulation
//!
//! Identifiers, the change request record and the shared constants.

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimId(pub usize);

/// A wrapper type for vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VehicleId(pub SimId);

/// Lane number. Doubles as the index into the world's lane array, so lane 0
/// is the leftmost lane and lane N-1 the rightmost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LaneId(pub usize);

impl LaneId {
    /// Lane to the left, if the index does not underflow
    pub fn left(self) -> Option<LaneId> {
        self.0.checked_sub(1).map(LaneId)
    }

    /// Lane to the right, if the index does not overflow (may still not
    /// exist in a given world)
    pub fn right(self) -> Option<LaneId> {
        self.0.checked_add(1).map(LaneId)
    }
}

/// A vehicle's wish for the coming tick, submitted to the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeRequest {
    pub vehicle: VehicleId,
    pub lane: LaneId,
    pub speed: f64,
}

impl ChangeRequest {
    pub fn new(vehicle: VehicleId, lane: LaneId, speed: f64) -> Self {
        Self {
            vehicle,
            lane,
            speed,
        }
    }
}

/// Length of a vehicle in meters; also the minimum separation between the
/// predicted positions of any two vehicles sharing a lane
pub const VEHICLE_LENGTH: f64 = 4.8;

/// Absolute tolerance used when checking whether a position is occupied
pub const POSITION_TOLERANCE: f64 = 1e-9;

pub(crate) fn almost_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < POSITION_TOLERANCE
}
