use crate::{
    models::program::{Program, Var, VarType},
    solver::Solution,
};

pub trait AddVars {
    type Out;

    /// Create a variable for any type
    fn vars(&self, program: &mut Program, base_name: &str, vtype: VarType, lb: f64, ub: f64)
        -> Self::Out;

    /// A continuous non-negative variable
    fn cont(&self, program: &mut Program, base_name: &str) -> Self::Out {
        self.vars(program, base_name, VarType::Continuous, 0.0, f64::INFINITY)
    }
}

impl AddVars for usize {
    type Out = Vec<Var>;

    fn vars(
        &self,
        program: &mut Program,
        base_name: &str,
        vtype: VarType,
        lb: f64,
        ub: f64,
    ) -> Self::Out {
        (0..*self)
            .map(|i| program.add_var(&format!("{}_{}", base_name, i), vtype, lb, ub))
            .collect()
    }
}

/// Trait that reads solved values back for variables
pub trait ConvertVars {
    type Out;
    fn convert(&self, solution: &Solution) -> Self::Out;
}

impl<T: ConvertVars> ConvertVars for Vec<T> {
    type Out = Vec<T::Out>;

    fn convert(&self, solution: &Solution) -> Self::Out {
        self.iter().map(|e| e.convert(solution)).collect()
    }
}

impl ConvertVars for Var {
    type Out = f64;

    fn convert(&self, solution: &Solution) -> Self::Out {
        solution.value(*self)
    }
}
