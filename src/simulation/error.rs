//! Error types for the lane simulation

use thiserror::Error;

use super::types::{LaneId, VehicleId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A vehicle computed a negative safe speed on its own lane. The world
    /// is in a state the safety rules should have made impossible.
    #[error("vehicle accident: {vehicle:?} computed unsafe speed {speed:.3} on its own lane {lane:?}")]
    VehicleAccident {
        vehicle: VehicleId,
        lane: LaneId,
        speed: f64,
    },

    #[error("lane {0:?} does not exist")]
    UnknownLane(LaneId),

    #[error("vehicle {0:?} does not exist")]
    UnknownVehicle(VehicleId),

    #[error("vehicle {0:?} already requested a change this tick")]
    DuplicateRequest(VehicleId),

    #[error("position {0} is not a finite number")]
    InvalidPosition(f64),

    #[error("target speed {0} must be finite and non-negative")]
    InvalidTargetSpeed(f64),

    #[error("position {position} on lane {lane:?} is already occupied")]
    PositionOccupied { lane: LaneId, position: f64 },
}

pub type SimResult<T> = Result<T, SimError>;
