use good_lp::{
    constraint, solvers::microlp::microlp, variable, Expression, ProblemVariables,
    ResolutionError, Solution as _, SolverModel, Variable,
};
use log::{debug, trace};

use super::{Solution, Solver, SolverSettings, Status};
use crate::{
    error::SolverError,
    models::program::{LinExpr, ObjSense, Program, Sense, VarType},
};

/// The pure-Rust branch-and-bound solver shipped with `good_lp`. It has no
/// gap or time limit controls and always solves to optimality.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLp;

fn expression(expr: &LinExpr, vars: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant());
    for &(v, c) in expr.terms() {
        out += c * vars[v.index()];
    }
    out
}

impl Solver for MicroLp {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, program: &Program, settings: &SolverSettings) -> Result<Solution, SolverError> {
        let objective = program.objective().ok_or(SolverError::NoObjective)?;
        debug!(
            "Solving {} with microlp ({} vars, {} constrs); gap {} and time limit {}s are not enforced",
            program.name(),
            program.vars().len(),
            program.constrs().len(),
            settings.mip_gap,
            settings.time_limit
        );

        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = program
            .vars()
            .iter()
            .map(|def| {
                let mut v = variable().name(def.name.clone());
                if def.lb.is_finite() {
                    v = v.min(def.lb);
                }
                if def.ub.is_finite() {
                    v = v.max(def.ub);
                }
                if def.vtype == VarType::Integer {
                    v = v.integer();
                }
                problem.add(v)
            })
            .collect();

        let goal = expression(&objective.expr, &vars);
        let unsolved = match objective.sense {
            ObjSense::Minimize => problem.minimise(goal),
            ObjSense::Maximize => problem.maximise(goal),
        };
        let mut model = unsolved.using(microlp);

        for (name, c) in program.constrs() {
            trace!("{}", name);
            let e = expression(&c.expr, &vars);
            let constr = match c.sense {
                Sense::Le => constraint!(e <= 0.0),
                Sense::Ge => constraint!(e >= 0.0),
                Sense::Eq => constraint!(e == 0.0),
            };
            model.add_constraint(constr);
        }

        match model.solve() {
            Ok(solved) => {
                let values: Vec<f64> = vars.iter().map(|&v| solved.value(v)).collect();
                let value = objective.expr.eval(&values);
                Ok(Solution::new(Status::Optimal, Some(value), values))
            }
            Err(ResolutionError::Infeasible) => Ok(Solution::without_values(Status::Infeasible)),
            Err(ResolutionError::Unbounded) => Ok(Solution::without_values(Status::Unbounded)),
            Err(e) => Err(SolverError::Backend(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::program::Constraint;

    #[test]
    fn solves_a_small_integer_program() {
        // max x + y  s.t.  2x + 2y <= 5, x <= 1.5, y integer
        let mut program = Program::new("small");
        let x = program.cont("x");
        let y = program.integer("y");
        program.add_constr("sum", Constraint::le(2.0 * x + 2.0 * y, 5.0));
        program.add_constr("x", Constraint::le(x, 1.5));
        program.set_objective(x + y, ObjSense::Maximize);

        let solution = MicroLp.solve(&program, &SolverSettings::default()).unwrap();
        assert!(solution.is_optimal());
        assert!((solution.objective.unwrap() - 2.5).abs() < 1e-6);
        let y = solution.value(y);
        assert!((y - y.round()).abs() < 1e-6);
    }

    #[test]
    fn reports_infeasibility() {
        let mut program = Program::new("infeasible");
        let x = program.cont("x");
        program.add_constr("low", Constraint::ge(x, 2.0));
        program.add_constr("high", Constraint::le(x, 1.0));
        program.set_objective(x, ObjSense::Minimize);

        let solution = MicroLp.solve(&program, &SolverSettings::default()).unwrap();
        assert_eq!(solution.status, Status::Infeasible);
        assert!(!solution.has_values());
    }

    #[test]
    fn requires_an_objective() {
        let program = Program::new("empty");
        assert!(matches!(
            MicroLp.solve(&program, &SolverSettings::default()),
            Err(SolverError::NoObjective)
        ));
    }
}
