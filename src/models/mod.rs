pub mod failure;
pub mod program;
pub mod teavar;
pub mod utils;
pub mod wavelength;

pub use program::{Constraint, LinExpr, LinSum, ObjSense, Program, Sense, Var, VarType};
pub use wavelength::{PlanObjective, WavelengthAllocation, WavelengthModel};
