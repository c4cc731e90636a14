//! Lane-based traffic simulation
//!
//! Vehicles on parallel lanes decide each tick whether to keep their lane or
//! move to a neighbor, and at which speed, against the committed state of
//! the whole world. The world then resolves conflicting requests and
//! commits every vehicle at once.

mod conflict;
mod error;
mod lane;
mod scenario;
mod state;
mod stats;
mod types;
mod vehicle;
mod world;

pub use conflict::Resolution;
pub use error::{SimError, SimResult};
pub use lane::Lane;
pub use scenario::ScenarioConfig;
pub use state::{PendingState, VehicleState};
pub use stats::{SimStats, StepReport};
pub use types::{ChangeRequest, LaneId, SimId, VehicleId, POSITION_TOLERANCE, VEHICLE_LENGTH};
pub use vehicle::{has_conflict, Vehicle, VehicleTable};
pub use world::SimWorld;
