//! Backends that solve a [`Program`]. The default backend is the pure-Rust
//! `microlp` solver through `good_lp`; Gurobi is available behind the
//! `gurobi` feature.

#[cfg(feature = "gurobi")]
pub mod gurobi;
#[cfg(feature = "microlp")]
pub mod microlp;

use serde::{Deserialize, Serialize};

use crate::{
    error::SolverError,
    models::program::{LinExpr, Program, Var},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Optimal,
    Infeasible,
    Unbounded,
    /// Stopped without proving optimality, e.g. at the time limit
    NotSolved,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Relative optimality gap at which branch-and-bound may stop
    pub mip_gap: f64,
    /// Wall-clock budget in seconds
    pub time_limit: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            mip_gap: 0.001,
            time_limit: 500.0,
        }
    }
}

/// The outcome of a solve. Values are present whenever the backend found a
/// feasible point, which is always the case for [`Status::Optimal`].
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: Status,
    pub objective: Option<f64>,
    values: Vec<f64>,
}

impl Solution {
    pub fn new(status: Status, objective: Option<f64>, values: Vec<f64>) -> Self {
        Solution {
            status,
            objective,
            values,
        }
    }

    pub fn without_values(status: Status) -> Self {
        Self::new(status, None, Vec::new())
    }

    pub fn is_optimal(&self) -> bool {
        self.status == Status::Optimal
    }

    pub fn has_values(&self) -> bool {
        !self.values.is_empty()
    }

    /// The value of `var`, or zero if no feasible point is known.
    pub fn value(&self, var: Var) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(0.0)
    }

    pub fn eval(&self, expr: &LinExpr) -> f64 {
        expr.terms()
            .iter()
            .map(|&(v, c)| c * self.value(v))
            .sum::<f64>()
            + expr.constant()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

pub trait Solver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, program: &Program, settings: &SolverSettings) -> Result<Solution, SolverError>;
}

/// Gurobi if it is compiled in, otherwise microlp.
#[cfg(feature = "gurobi")]
pub fn default_solver() -> Result<Box<dyn Solver>, SolverError> {
    Ok(Box::new(gurobi::Gurobi))
}

#[cfg(all(feature = "microlp", not(feature = "gurobi")))]
pub fn default_solver() -> Result<Box<dyn Solver>, SolverError> {
    Ok(Box::new(microlp::MicroLp))
}

#[cfg(not(any(feature = "microlp", feature = "gurobi")))]
pub fn default_solver() -> Result<Box<dyn Solver>, SolverError> {
    Err(SolverError::NoBackend)
}
