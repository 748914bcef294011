//! A solver-neutral mixed integer linear program. Models are assembled here
//! and handed to a [`Solver`](crate::solver::Solver) as a whole, which keeps
//! model construction independent of the backend and lets several programs be
//! built side by side.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Handle to a variable of a [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(usize);

impl Var {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarType {
    Continuous,
    Integer,
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub name: String,
    pub vtype: VarType,
    pub lb: f64,
    pub ub: f64,
}

/// An affine expression `Σ coeff·var + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(Var, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, coeff: f64, var: Var) -> &mut Self {
        self.terms.push((var, coeff));
        self
    }

    pub fn add_constant(&mut self, constant: f64) -> &mut Self {
        self.constant += constant;
        self
    }

    pub fn terms(&self) -> &[(Var, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluates the expression with `values[i]` as the value of variable `i`.
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(v, c)| c * values[v.0])
            .sum::<f64>()
            + self.constant
    }

    fn scale(mut self, k: f64) -> Self {
        for (_, c) in &mut self.terms {
            *c *= k;
        }
        self.constant *= k;
        self
    }
}

impl From<Var> for LinExpr {
    fn from(var: Var) -> Self {
        LinExpr {
            terms: vec![(var, 1.0)],
            constant: 0.0,
        }
    }
}

impl From<f64> for LinExpr {
    fn from(constant: f64) -> Self {
        LinExpr {
            terms: Vec::new(),
            constant,
        }
    }
}

impl<T: Into<LinExpr>> AddAssign<T> for LinExpr {
    fn add_assign(&mut self, rhs: T) {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl<T: Into<LinExpr>> Add<T> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: T) -> LinExpr {
        self += rhs;
        self
    }
}

impl<T: Into<LinExpr>> Sub<T> for LinExpr {
    type Output = LinExpr;

    fn sub(mut self, rhs: T) -> LinExpr {
        self += rhs.into().scale(-1.0);
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        self.scale(-1.0)
    }
}

impl<T: Into<LinExpr>> Add<T> for Var {
    type Output = LinExpr;

    fn add(self, rhs: T) -> LinExpr {
        LinExpr::from(self) + rhs
    }
}

impl<T: Into<LinExpr>> Sub<T> for Var {
    type Output = LinExpr;

    fn sub(self, rhs: T) -> LinExpr {
        LinExpr::from(self) - rhs
    }
}

impl Mul<Var> for f64 {
    type Output = LinExpr;

    fn mul(self, var: Var) -> LinExpr {
        LinExpr {
            terms: vec![(var, self)],
            constant: 0.0,
        }
    }
}

impl Mul<LinExpr> for f64 {
    type Output = LinExpr;

    fn mul(self, expr: LinExpr) -> LinExpr {
        expr.scale(self)
    }
}

/// Sums an iterator of variables or expressions into one expression.
pub trait LinSum {
    fn lin_sum(self) -> LinExpr;
}

impl<I, T> LinSum for I
where
    I: Iterator<Item = T>,
    T: Into<LinExpr>,
{
    fn lin_sum(self) -> LinExpr {
        let mut expr = LinExpr::new();
        for item in self {
            expr += item;
        }
        expr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// `expr (sense) 0`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub expr: LinExpr,
    pub sense: Sense,
}

impl Constraint {
    pub fn le(lhs: impl Into<LinExpr>, rhs: impl Into<LinExpr>) -> Self {
        Constraint {
            expr: lhs.into() - rhs,
            sense: Sense::Le,
        }
    }

    pub fn ge(lhs: impl Into<LinExpr>, rhs: impl Into<LinExpr>) -> Self {
        Constraint {
            expr: lhs.into() - rhs,
            sense: Sense::Ge,
        }
    }

    pub fn eq(lhs: impl Into<LinExpr>, rhs: impl Into<LinExpr>) -> Self {
        Constraint {
            expr: lhs.into() - rhs,
            sense: Sense::Eq,
        }
    }

    /// Whether the values satisfy the constraint up to `tol`.
    pub fn holds(&self, values: &[f64], tol: f64) -> bool {
        let v = self.expr.eval(values);
        match self.sense {
            Sense::Le => v <= tol,
            Sense::Ge => v >= -tol,
            Sense::Eq => v.abs() <= tol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
pub struct Objective {
    pub expr: LinExpr,
    pub sense: ObjSense,
}

#[derive(Debug, Clone)]
pub struct Program {
    name: String,
    vars: Vec<VarDef>,
    constrs: Vec<(String, Constraint)>,
    objective: Option<Objective>,
}

impl Program {
    pub fn new(name: &str) -> Self {
        Program {
            name: name.to_string(),
            vars: Vec::new(),
            constrs: Vec::new(),
            objective: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_var(&mut self, name: &str, vtype: VarType, lb: f64, ub: f64) -> Var {
        self.vars.push(VarDef {
            name: name.to_string(),
            vtype,
            lb,
            ub,
        });
        Var(self.vars.len() - 1)
    }

    /// A continuous non-negative variable
    pub fn cont(&mut self, name: &str) -> Var {
        self.add_var(name, VarType::Continuous, 0.0, f64::INFINITY)
    }

    /// A non-negative integer variable
    pub fn integer(&mut self, name: &str) -> Var {
        self.add_var(name, VarType::Integer, 0.0, f64::INFINITY)
    }

    pub fn add_constr(&mut self, name: &str, constr: Constraint) {
        self.constrs.push((name.to_string(), constr));
    }

    pub fn set_objective(&mut self, expr: impl Into<LinExpr>, sense: ObjSense) {
        self.objective = Some(Objective {
            expr: expr.into(),
            sense,
        });
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn var(&self, var: Var) -> &VarDef {
        &self.vars[var.0]
    }

    pub fn constrs(&self) -> &[(String, Constraint)] {
        &self.constrs
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    /// Names of the constraints and variable bounds the values violate.
    pub fn violations(&self, values: &[f64], tol: f64) -> Vec<String> {
        let bounds = self
            .vars
            .iter()
            .zip(values)
            .filter(|(def, &v)| v < def.lb - tol || v > def.ub + tol)
            .map(|(def, _)| def.name.clone());
        let constrs = self
            .constrs
            .iter()
            .filter(|(_, c)| !c.holds(values, tol))
            .map(|(name, _)| name.clone());
        bounds.chain(constrs).collect()
    }
}
