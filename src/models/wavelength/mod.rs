//! The wavelength planning program: which shortcuts to light, and with how
//! many wavelengths, so that every demand is routed over its tunnels.

pub mod model;
pub mod variables;

pub use model::{base_solution, DemandMode, PlanObjective, WavelengthAllocation, WavelengthModel};
pub use variables::{Variables, WavelengthPool};
