use std::{collections::BTreeMap, str::FromStr};

use log::{info, trace, warn};
use serde::{Deserialize, Serialize};

use super::variables::{Variables, WavelengthPool};
use crate::{
    error::ModelError,
    models::{
        program::{Constraint, LinExpr, LinSum, ObjSense, Program},
        utils::ConvertVars,
    },
    shortcuts::ShortcutPairs,
    solver::{Solution, Solver, SolverSettings, Status},
    topology::Network,
};

/// Direction of the demand constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandMode {
    /// Tunnels must carry at least the demand
    Satisfy,
    /// Tunnels may carry at most the demand
    Cap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanObjective {
    /// Maximize hop-weighted wavelengths, i.e. the router ports saved
    MaximizeBypass,
    /// Minimize hop-weighted wavelengths
    MinimizeWavelengths,
    /// Maximize the flow carried by all tunnels
    MaximizeFlow,
}

impl FromStr for PlanObjective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bypass" => Ok(PlanObjective::MaximizeBypass),
            "wavelengths" => Ok(PlanObjective::MinimizeWavelengths),
            "flow" => Ok(PlanObjective::MaximizeFlow),
            other => Err(format!("unknown objective {}", other)),
        }
    }
}

pub struct WavelengthModel {}

impl WavelengthModel {
    /// The tunnels of every demand carry at least (`Satisfy`) or at most
    /// (`Cap`) its amount.
    pub fn demand_constraints(
        label: &str,
        network: &Network,
        variables: &Variables,
        mode: DemandMode,
        program: &mut Program,
    ) -> Result<(), ModelError> {
        for demand in network.demands() {
            if demand.is_void() {
                return Err(ModelError::VoidDemand(
                    network.code(demand.src()).to_string(),
                    network.code(demand.dst()).to_string(),
                ));
            }
            let carried = demand.tunnels().iter().map(|&t| variables.flow[t]).lin_sum();
            let name = format!(
                "{}_demand_{}_{}",
                label,
                network.code(demand.src()),
                network.code(demand.dst())
            );
            let constr = match mode {
                DemandMode::Satisfy => Constraint::ge(carried, demand.amount()),
                DemandMode::Cap => Constraint::le(carried, demand.amount()),
            };
            program.add_constr(&name, constr);
        }
        Ok(())
    }

    /// On every edge of a tunnel, the tunnel's flow is covered by the edge's
    /// direct allocation plus the allocations of shortcuts over that edge.
    pub fn flow_conservation_constraints(
        label: &str,
        network: &Network,
        variables: &Variables,
        program: &mut Program,
    ) {
        for (t, tunnel) in network.tunnels().iter_enumerated() {
            for &e in tunnel.edges() {
                let bypass = network.edges()[e]
                    .shortcuts()
                    .iter()
                    .filter_map(|&s| variables.bypass.get(&(s, t)).copied());
                let covered = variables
                    .direct
                    .get(&(e, t))
                    .copied()
                    .into_iter()
                    .chain(bypass)
                    .lin_sum();
                let name = format!("{}_flow_{}_{}", label, tunnel.path(), network.edge_label(e));
                trace!("{}", name);
                program.add_constr(&name, Constraint::le(variables.flow[t], covered));
            }
        }
    }

    /// Direct allocations plus the wavelengths of shortcuts routed over an
    /// edge fit in its capacity.
    pub fn edge_capacity_constraints(
        label: &str,
        network: &Network,
        variables: &Variables,
        program: &mut Program,
    ) {
        for (e, edge) in network.edges().iter_enumerated() {
            if edge.tunnels().is_empty() && edge.shortcuts().is_empty() {
                continue;
            }
            let direct = edge
                .tunnels()
                .iter()
                .filter_map(|&t| variables.direct.get(&(e, t)).copied())
                .lin_sum();
            let lit = edge.shortcuts().iter().map(|&s| variables.wavelength[s]).lin_sum();
            let used = direct + edge.unity() as f64 * lit;
            program.add_constr(
                &format!("{}_capacity_{}", label, network.edge_label(e)),
                Constraint::le(used, edge.capacity()),
            );
        }
    }

    /// A shortcut carries no more than its lit wavelengths support.
    pub fn wavelength_integrality_constraints(
        label: &str,
        network: &Network,
        variables: &Variables,
        program: &mut Program,
    ) {
        for (s, shortcut) in network.shortcuts().iter_enumerated() {
            if shortcut.tunnels().is_empty() {
                continue;
            }
            let carried = shortcut
                .tunnels()
                .iter()
                .filter_map(|&t| variables.bypass.get(&(s, t)).copied())
                .lin_sum();
            program.add_constr(
                &format!("{}_wavelength_{}", label, shortcut.path()),
                Constraint::le(carried, shortcut.unity() as f64 * variables.wavelength[s]),
            );
        }
    }

    /// Both directions of a shortcut pair light the same number of wavelengths.
    pub fn symmetry_constraints(
        label: &str,
        network: &Network,
        pairs: &ShortcutPairs,
        variables: &Variables,
        program: &mut Program,
    ) {
        for (s, r) in pairs.mirrored() {
            program.add_constr(
                &format!("{}_symmetry_{}", label, network.shortcuts()[s].path()),
                Constraint::eq(variables.wavelength[s], variables.wavelength[r]),
            );
        }
    }

    /// All constraint families of one network instance.
    pub fn add_constrs(
        label: &str,
        network: &Network,
        pairs: &ShortcutPairs,
        variables: &Variables,
        mode: DemandMode,
        program: &mut Program,
    ) -> Result<(), ModelError> {
        Self::demand_constraints(label, network, variables, mode, program)?;
        Self::flow_conservation_constraints(label, network, variables, program);
        Self::edge_capacity_constraints(label, network, variables, program);
        Self::wavelength_integrality_constraints(label, network, variables, program);
        Self::symmetry_constraints(label, network, pairs, variables, program);
        Ok(())
    }

    /// Adds one network instance over the wavelengths in `pool`.
    pub fn add_network(
        label: &str,
        network: &Network,
        pairs: &ShortcutPairs,
        pool: &WavelengthPool,
        mode: DemandMode,
        program: &mut Program,
    ) -> Result<Variables, ModelError> {
        let variables = Variables::new(program, network, label, pool)?;
        Self::add_constrs(label, network, pairs, &variables, mode, program)?;
        Ok(variables)
    }

    /// Σ hops(s) · w(s) over all shortcuts
    pub fn wavelength_expr(network: &Network, variables: &Variables) -> LinExpr {
        network
            .shortcuts()
            .iter_enumerated()
            .map(|(s, shortcut)| shortcut.hops() as f64 * variables.wavelength[s])
            .lin_sum()
    }

    /// Σ flow(t) over all tunnels
    pub fn flow_expr(variables: &Variables) -> LinExpr {
        variables.flow.iter().copied().lin_sum()
    }

    pub fn set_objective(
        objective: PlanObjective,
        network: &Network,
        variables: &Variables,
        program: &mut Program,
    ) {
        match objective {
            PlanObjective::MaximizeBypass => program.set_objective(
                Self::wavelength_expr(network, variables),
                ObjSense::Maximize,
            ),
            PlanObjective::MinimizeWavelengths => program.set_objective(
                Self::wavelength_expr(network, variables),
                ObjSense::Minimize,
            ),
            PlanObjective::MaximizeFlow => {
                program.set_objective(Self::flow_expr(variables), ObjSense::Maximize)
            }
        }
    }

    /// Requires at least `bound` hop-weighted wavelengths.
    pub fn add_wavelength_bound(
        network: &Network,
        variables: &Variables,
        bound: f64,
        program: &mut Program,
    ) {
        program.add_constr(
            "wavelength_bound",
            Constraint::ge(Self::wavelength_expr(network, variables), bound),
        );
    }

    /// Builds the planning program for `network` with fresh wavelength
    /// variables and demands that must be met.
    pub fn build(
        network: &Network,
        pairs: &ShortcutPairs,
        objective: PlanObjective,
    ) -> Result<(Program, WavelengthPool, Variables), ModelError> {
        info!("Building wavelength model for {}", network.name());
        let mut program = Program::new(&format!("{}_wavelengths", network.name()));
        let pool = WavelengthPool::new(&mut program, network);
        let variables =
            Self::add_network("main", network, pairs, &pool, DemandMode::Satisfy, &mut program)?;
        Self::set_objective(objective, network, &variables, &mut program);
        info!(
            "Built wavelength model with {} vars and {} constrs",
            program.vars().len(),
            program.constrs().len()
        );
        Ok((program, pool, variables))
    }

    /// Solves a planning program and reads back the allocation of the main
    /// network.
    pub fn solve(
        solver: &dyn Solver,
        settings: &SolverSettings,
        program: &Program,
        network: &Network,
        variables: &Variables,
    ) -> Result<WavelengthAllocation, ModelError> {
        info!("Solving {}", program.name());
        let solution = base_solution(solver.solve(program, settings)?)?;
        info!("Finished solving {} with objective {:?}", program.name(), solution.objective);
        Ok(WavelengthAllocation::new(network, variables, &solution))
    }
}

/// Accepts a solution of a base program. Infeasibility is fatal; a program
/// stopped early is accepted if it has an incumbent.
pub fn base_solution(solution: Solution) -> Result<Solution, ModelError> {
    match solution.status {
        Status::Optimal => Ok(solution),
        Status::Infeasible => Err(ModelError::InfeasibleBase),
        Status::NotSolved if solution.has_values() => {
            warn!("Using a non-optimal incumbent");
            Ok(solution)
        }
        status => Err(ModelError::UnsolvedBase(format!("{:?}", status))),
    }
}

/// The solved values of one network instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WavelengthAllocation {
    pub objective: f64,
    /// wavelengths lit per shortcut path
    pub wavelengths: BTreeMap<String, u32>,
    /// flow per tunnel path
    pub flows: BTreeMap<String, f64>,
}

impl WavelengthAllocation {
    pub fn new(network: &Network, variables: &Variables, solution: &Solution) -> Self {
        let wavelengths = network
            .shortcuts()
            .iter_enumerated()
            .map(|(s, shortcut)| {
                let w = variables.wavelength[s].convert(solution).round().max(0.0) as u32;
                (shortcut.path().to_string(), w)
            })
            .collect();
        let flows = network
            .tunnels()
            .iter_enumerated()
            .map(|(t, tunnel)| (tunnel.path().to_string(), variables.flow[t].convert(solution)))
            .collect();
        WavelengthAllocation {
            objective: solution.objective.unwrap_or(0.0),
            wavelengths,
            flows,
        }
    }

    pub fn wavelengths(&self, path: &str) -> u32 {
        self.wavelengths.get(path).copied().unwrap_or(0)
    }

    /// Σ hops · wavelengths, the router ports saved by the plan
    pub fn ports_saved(&self, network: &Network) -> f64 {
        network
            .shortcuts()
            .iter()
            .map(|s| s.hops() as f64 * self.wavelengths(s.path()) as f64)
            .sum()
    }

    pub fn total_flow(&self) -> f64 {
        self.flows.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{shortcuts::discover_shortcuts, shortcuts::DiscoveryConfig, topology::graph::GraphView};

    fn ring(capacity: f64) -> (Network, ShortcutPairs) {
        let mut network = Network::new("ring");
        for (a, b) in [("A", "B"), ("B", "C"), ("C", "D"), ("D", "A")] {
            for (x, y) in [(a, b), (b, a)] {
                let e = network.add_edge(x, y, 200, capacity).unwrap().unwrap();
                network.set_edge_distance(e, 100.0).unwrap();
            }
        }
        network.add_demand("A", "C", 50.0, 1.0);
        network.add_tunnel(&["A", "B", "C"]).unwrap();
        let graph = GraphView::new(&network);
        let pairs =
            discover_shortcuts(&mut network, &graph, &DiscoveryConfig { max_hops: 2 }).unwrap();
        (network, pairs)
    }

    #[test]
    fn void_demand_is_fatal() {
        let (mut network, pairs) = ring(100.0);
        network.add_demand("B", "D", 1.0, 1.0);
        assert!(matches!(
            WavelengthModel::build(&network, &pairs, PlanObjective::MaximizeBypass),
            Err(ModelError::VoidDemand(a, b)) if a == "B" && b == "D"
        ));
    }

    #[test]
    fn constraint_families_are_generated() {
        let (network, pairs) = ring(100.0);
        let (program, pool, _) =
            WavelengthModel::build(&network, &pairs, PlanObjective::MaximizeBypass).unwrap();
        let names: Vec<&str> = program.constrs().iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(pool.len(), 4);
        assert!(names.contains(&"main_demand_A_C"));
        assert!(names.contains(&"main_flow_A:B:C_A-B"));
        assert!(names.contains(&"main_flow_A:B:C_B-C"));
        assert!(names.contains(&"main_capacity_A-B"));
        assert!(names.contains(&"main_wavelength_A:B:C"));
        assert_eq!(names.iter().filter(|n| n.starts_with("main_symmetry_")).count(), 2);
        // shortcuts without tunnels get no integrality row
        assert!(!names.contains(&"main_wavelength_B:C:D"));
    }

    #[test]
    fn allocation_reads_back_rounded_counts() {
        let (network, pairs) = ring(100.0);
        let (program, _, variables) =
            WavelengthModel::build(&network, &pairs, PlanObjective::MaximizeBypass).unwrap();
        let mut values = vec![0.0; program.vars().len()];
        let s = network.shortcut("A:B:C").unwrap();
        values[variables.wavelength[s].index()] = 1.9999;
        let solution = Solution::new(Status::Optimal, Some(4.0), values);
        let allocation = WavelengthAllocation::new(&network, &variables, &solution);
        assert_eq!(allocation.wavelengths("A:B:C"), 2);
        assert_eq!(allocation.ports_saved(&network), 4.0);
    }

    #[test]
    fn infeasible_base_is_fatal() {
        assert!(matches!(
            base_solution(Solution::without_values(Status::Infeasible)),
            Err(ModelError::InfeasibleBase)
        ));
        assert!(base_solution(Solution::without_values(Status::NotSolved)).is_err());
    }
}
