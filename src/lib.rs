//! Lane Traffic Simulation Library
//!
//! A discrete-time microscopic traffic simulation on parallel lanes.

pub mod simulation;
