use grb::{expr::LinExpr as GrbLinExpr, prelude::*};
use log::{debug, info};

use super::{Solution, Solver, SolverSettings, Status as SolveStatus};
use crate::{
    error::SolverError,
    models::program::{LinExpr, ObjSense, Program, Sense, VarType},
};

/// Gurobi through the `grb` bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gurobi;

fn linexpr(expr: &LinExpr, vars: &[Var]) -> GrbLinExpr {
    let mut out = GrbLinExpr::new();
    for &(v, c) in expr.terms() {
        out.add_term(c, vars[v.index()]);
    }
    out.add_constant(expr.constant());
    out
}

fn build(program: &Program, settings: &SolverSettings) -> grb::Result<(Model, Vec<Var>)> {
    let mut model = Model::new(program.name())?;
    model.set_param(param::OutputFlag, 0)?;
    model.set_param(param::MIPGap, settings.mip_gap)?;
    model.set_param(param::TimeLimit, settings.time_limit)?;

    let mut vars = Vec::with_capacity(program.vars().len());
    for def in program.vars() {
        let vtype = match def.vtype {
            VarType::Continuous => grb::VarType::Continuous,
            VarType::Integer => grb::VarType::Integer,
        };
        vars.push(model.add_var(&def.name, vtype, 0.0, def.lb, def.ub, std::iter::empty())?);
    }

    for (name, constr) in program.constrs() {
        let lhs = linexpr(&constr.expr, &vars);
        let constr = match constr.sense {
            Sense::Le => c!(lhs <= 0.0),
            Sense::Ge => c!(lhs >= 0.0),
            Sense::Eq => c!(lhs == 0.0),
        };
        model.add_constr(name, constr)?;
    }

    if let Some(objective) = program.objective() {
        let sense = match objective.sense {
            ObjSense::Minimize => grb::ModelSense::Minimize,
            ObjSense::Maximize => grb::ModelSense::Maximize,
        };
        model.set_objective(linexpr(&objective.expr, &vars), sense)?;
    }

    model.update()?;
    Ok((model, vars))
}

/// Every program built here has a bounded objective, so presolve's
/// infeasible-or-unbounded verdict means infeasible.
fn solve_status(status: grb::Status) -> SolveStatus {
    match status {
        grb::Status::Optimal => SolveStatus::Optimal,
        grb::Status::Infeasible | grb::Status::InfOrUnbd => SolveStatus::Infeasible,
        grb::Status::Unbounded => SolveStatus::Unbounded,
        other => {
            debug!("Gurobi stopped with status {:?}", other);
            SolveStatus::NotSolved
        }
    }
}

fn run(program: &Program, settings: &SolverSettings) -> grb::Result<Solution> {
    let (mut model, vars) = build(program, settings)?;
    info!("Solving {} with Gurobi", program.name());
    model.optimize()?;

    let status = solve_status(model.status()?);

    if model.get_attr(attr::SolCount)? == 0 {
        return Ok(Solution::without_values(status));
    }

    let values = model.get_obj_attr_batch(attr::X, vars)?;
    let objective = model.get_attr(attr::ObjVal)?;
    Ok(Solution::new(status, Some(objective), values))
}

impl Solver for Gurobi {
    fn name(&self) -> &'static str {
        "gurobi"
    }

    fn solve(&self, program: &Program, settings: &SolverSettings) -> Result<Solution, SolverError> {
        if program.objective().is_none() {
            return Err(SolverError::NoObjective);
        }
        run(program, settings).map_err(|e| SolverError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presolve_verdicts_map_to_statuses() {
        assert_eq!(solve_status(grb::Status::Optimal), SolveStatus::Optimal);
        assert_eq!(solve_status(grb::Status::Infeasible), SolveStatus::Infeasible);
        assert_eq!(solve_status(grb::Status::InfOrUnbd), SolveStatus::Infeasible);
        assert_eq!(solve_status(grb::Status::Unbounded), SolveStatus::Unbounded);
        assert_eq!(solve_status(grb::Status::TimeLimit), SolveStatus::NotSolved);
    }
}
