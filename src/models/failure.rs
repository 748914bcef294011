//! Deterministic link failures. A failure network is a copy of the planned
//! network that shares its wavelength variables, so it can only reroute over
//! the provisioning decided for the main network.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use log::{debug, info};
use rand::{seq::SliceRandom, Rng};
use rayon::prelude::*;

use crate::{
    error::ModelError,
    models::{
        program::{Constraint, Program},
        wavelength::{
            base_solution, DemandMode, PlanObjective, Variables, WavelengthAllocation,
            WavelengthModel, WavelengthPool,
        },
    },
    report::FeasibleFailures,
    shortcuts::ShortcutPairs,
    solver::{Solver, SolverSettings, Status},
    topology::{graph::GraphView, unordered, Network, NodeIndex, Tunnel},
};

/// Links that are down at the same time. Links are unordered node pairs, so
/// a failure takes out both directions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FailureSet(BTreeSet<(NodeIndex, NodeIndex)>);

impl FailureSet {
    pub fn new(links: impl IntoIterator<Item = (NodeIndex, NodeIndex)>) -> Self {
        FailureSet(links.into_iter().map(|(a, b)| unordered(a, b)).collect())
    }

    /// Parses `A-B|C-D`. Unknown markets yield `None`.
    pub fn from_label(network: &Network, label: &str) -> Option<Self> {
        let mut links = Vec::new();
        for link in label.split('|') {
            let (a, b) = link.split_once('-')?;
            links.push((network.node(a)?, network.node(b)?));
        }
        Some(Self::new(links))
    }

    pub fn label(&self, network: &Network) -> String {
        self.0
            .iter()
            .map(|&(a, b)| format!("{}-{}", network.code(a), network.code(b)))
            .join("|")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn links(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.0.contains(&unordered(a, b))
    }

    /// Whether the tunnel uses a failed link.
    pub fn hits(&self, network: &Network, tunnel: &Tunnel) -> bool {
        tunnel
            .edges()
            .iter()
            .any(|&e| self.0.contains(&network.edges()[e].unordered()))
    }
}

/// Tunnels over a failed link carry nothing.
pub fn failure_flow_constraints(
    label: &str,
    network: &Network,
    variables: &Variables,
    failure: &FailureSet,
    program: &mut Program,
) {
    for (t, tunnel) in network.tunnels().iter_enumerated() {
        if failure.hits(network, tunnel) {
            program.add_constr(
                &format!("{}_failed_{}", label, tunnel.path()),
                Constraint::le(variables.flow[t], 0.0),
            );
        }
    }
}

/// Adds a failure network over the shared wavelength pool.
pub fn add_failure_network(
    label: &str,
    network: &Network,
    pairs: &ShortcutPairs,
    pool: &WavelengthPool,
    failure: &FailureSet,
    mode: DemandMode,
    program: &mut Program,
) -> Result<Variables, ModelError> {
    let variables = WavelengthModel::add_network(label, network, pairs, pool, mode, program)?;
    failure_flow_constraints(label, network, &variables, failure, program);
    Ok(variables)
}

/// Plans wavelengths that keep every demand routable under each of the given
/// failure sets. With no failure sets this is the plain plan. With failure
/// sets attached, an infeasible program is reported as
/// [`ModelError::NotRobust`].
pub fn robust_plan(
    network: &Network,
    pairs: &ShortcutPairs,
    failures: &[FailureSet],
    objective: PlanObjective,
    solver: &dyn Solver,
    settings: &SolverSettings,
) -> Result<WavelengthAllocation, ModelError> {
    let (mut program, pool, main) = WavelengthModel::build(network, pairs, objective)?;
    for (i, failure) in failures.iter().enumerate() {
        debug!("adding failure network for {}", failure.label(network));
        add_failure_network(
            &format!("f{}", i),
            network,
            pairs,
            &pool,
            failure,
            DemandMode::Satisfy,
            &mut program,
        )?;
    }
    info!(
        "Solving plan robust to {} failure sets ({} constrs)",
        failures.len(),
        program.constrs().len()
    );
    let solution = match base_solution(solver.solve(&program, settings)?) {
        Err(ModelError::InfeasibleBase) if !failures.is_empty() => {
            return Err(ModelError::NotRobust(failures.len()))
        }
        solution => solution?,
    };
    Ok(WavelengthAllocation::new(network, &main, &solution))
}

/// The most flow the network can carry with the wavelengths of `plan` while
/// the links of `failure` are down. `None` if the program has no solution.
pub fn max_flow_under_failure(
    network: &Network,
    pairs: &ShortcutPairs,
    plan: &BTreeMap<String, u32>,
    failure: &FailureSet,
    solver: &dyn Solver,
    settings: &SolverSettings,
) -> Result<Option<f64>, ModelError> {
    let mut program = Program::new(&format!("{}_max_flow", network.name()));
    let pool = WavelengthPool::fixed(&mut program, network, plan);
    let variables =
        add_failure_network("main", network, pairs, &pool, failure, DemandMode::Cap, &mut program)?;
    WavelengthModel::set_objective(PlanObjective::MaximizeFlow, network, &variables, &mut program);

    let solution = solver.solve(&program, settings)?;
    match solution.status {
        Status::Optimal => Ok(solution.objective),
        status => {
            debug!("{} under {}: {:?}", program.name(), failure.label(network), status);
            Ok(None)
        }
    }
}

/// Max flow under each failure set, evaluated in parallel.
pub fn resilience(
    network: &Network,
    pairs: &ShortcutPairs,
    plan: &BTreeMap<String, u32>,
    failures: &[FailureSet],
    solver: &dyn Solver,
    settings: &SolverSettings,
) -> Result<Vec<Option<f64>>, ModelError> {
    info!("Evaluating {} failure sets", failures.len());
    failures
        .par_iter()
        .map(|failure| max_flow_under_failure(network, pairs, plan, failure, solver, settings))
        .collect()
}

/// Whether the network without any shortcut can still meet all demands while
/// the links of `failure` are down.
pub fn survives_without_shortcuts(
    network: &Network,
    failure: &FailureSet,
    solver: &dyn Solver,
    settings: &SolverSettings,
) -> Result<bool, ModelError> {
    let mut program = Program::new(&format!("{}_feasible_{}", network.name(), failure.label(network)));
    let pool = WavelengthPool::zero(&mut program, network);
    let variables = add_failure_network(
        "main",
        network,
        &ShortcutPairs::default(),
        &pool,
        failure,
        DemandMode::Satisfy,
        &mut program,
    )?;
    WavelengthModel::set_objective(PlanObjective::MinimizeWavelengths, network, &variables, &mut program);
    Ok(solver.solve(&program, settings)?.is_optimal())
}

/// Every single link, and every pair of links, whose failure the network
/// without shortcuts survives.
pub fn feasible_failures(
    network: &Network,
    solver: &dyn Solver,
    settings: &SolverSettings,
) -> Result<FeasibleFailures, ModelError> {
    let links = network.links();
    let singles: Vec<FailureSet> = links.iter().map(|&l| FailureSet::new([l])).collect();
    let doubles: Vec<FailureSet> = links
        .iter()
        .tuple_combinations()
        .map(|(&a, &b)| FailureSet::new([a, b]))
        .collect();
    info!(
        "Checking {} single and {} double link failures",
        singles.len(),
        doubles.len()
    );

    let survivors = |sets: &[FailureSet]| -> Result<Vec<String>, ModelError> {
        let flags = sets
            .par_iter()
            .map(|f| survives_without_shortcuts(network, f, solver, settings))
            .collect::<Result<Vec<bool>, ModelError>>()?;
        Ok(sets
            .iter()
            .zip(flags)
            .filter(|(_, ok)| *ok)
            .map(|(f, _)| f.label(network))
            .collect())
    };

    Ok(FeasibleFailures {
        single: survivors(&singles)?,
        double: survivors(&doubles)?,
    })
}

/// Two links are close when some endpoint of one is at most one hop from some
/// endpoint of the other.
pub fn close_links(
    graph: &GraphView,
    (a, b): (NodeIndex, NodeIndex),
    (c, d): (NodeIndex, NodeIndex),
) -> bool {
    [(a, c), (a, d), (b, c), (b, d)]
        .into_iter()
        .any(|(x, y)| matches!(graph.undirected_hops(x, y), Some(h) if h <= 1))
}

/// Failure sets of the given order worth planning against: the recorded
/// feasible sets, where pairs must be close, sampled down to `cap`.
pub fn viable_failures<R: Rng>(
    network: &Network,
    graph: &GraphView,
    feasible: &FeasibleFailures,
    order: usize,
    cap: usize,
    rng: &mut R,
) -> Vec<FailureSet> {
    let labels = match order {
        1 => &feasible.single,
        2 => &feasible.double,
        _ => return Vec::new(),
    };

    let mut sets: Vec<FailureSet> = Vec::new();
    for label in labels {
        let set = match FailureSet::from_label(network, label) {
            Some(set) => set,
            None => {
                debug!("skipping failure {}: unknown market", label);
                continue;
            }
        };
        // a link paired with its own reverse collapses to one link
        if set.len() != order || sets.contains(&set) {
            continue;
        }
        if order == 2 {
            let (first, second) = match set.links().collect_tuple() {
                Some(pair) => pair,
                None => continue,
            };
            if !close_links(graph, first, second) {
                continue;
            }
        }
        sets.push(set);
    }

    if sets.len() > cap {
        sets = sets.choose_multiple(rng, cap).cloned().collect();
    }
    info!("Using {} failure sets of order {}", sets.len(), order);
    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn line() -> Network {
        let mut network = Network::new("line");
        for (a, b) in [("A", "B"), ("B", "C"), ("C", "D"), ("D", "E")] {
            network.add_edge(a, b, 200, 100.0).unwrap();
            network.add_edge(b, a, 200, 100.0).unwrap();
        }
        network
    }

    #[test]
    fn failure_sets_are_unordered() {
        let network = line();
        let ab = FailureSet::from_label(&network, "B-A").unwrap();
        assert_eq!(ab, FailureSet::from_label(&network, "A-B").unwrap());
        assert_eq!(ab.label(&network), "A-B");
        assert!(FailureSet::from_label(&network, "A-Z").is_none());
        assert_eq!(FailureSet::from_label(&network, "A-B|B-A").unwrap().len(), 1);
    }

    #[test]
    fn failures_hit_tunnels_in_both_directions() {
        let mut network = line();
        let forward = network.add_tunnel(&["A", "B", "C"]).unwrap();
        let backward = network.add_tunnel(&["C", "B", "A"]).unwrap();
        let other = network.add_tunnel(&["C", "D"]).unwrap();
        let failure = FailureSet::from_label(&network, "B-C").unwrap();
        let tunnels = network.tunnels();
        assert!(failure.hits(&network, &tunnels[forward]));
        assert!(failure.hits(&network, &tunnels[backward]));
        assert!(!failure.hits(&network, &tunnels[other]));
    }

    #[test]
    fn closeness_uses_undirected_hops() {
        let network = line();
        let graph = GraphView::new(&network);
        let n = |c: &str| network.node(c).unwrap();
        assert!(close_links(&graph, (n("A"), n("B")), (n("C"), n("D"))));
        assert!(!close_links(&graph, (n("A"), n("B")), (n("D"), n("E"))));
    }

    #[test]
    fn viable_failures_filter_and_sample() {
        let network = line();
        let graph = GraphView::new(&network);
        let feasible = FeasibleFailures {
            single: vec!["A-B".into(), "B-A".into(), "C-D".into(), "X-Y".into()],
            double: vec!["A-B|B-A".into(), "A-B|C-D".into(), "A-B|D-E".into()],
        };
        let mut rng = StdRng::seed_from_u64(7);

        let singles = viable_failures(&network, &graph, &feasible, 1, 10, &mut rng);
        assert_eq!(singles.len(), 2);

        let doubles = viable_failures(&network, &graph, &feasible, 2, 10, &mut rng);
        assert_eq!(doubles.len(), 1);
        assert_eq!(doubles[0].label(&network), "A-B|C-D");

        let capped = viable_failures(&network, &graph, &feasible, 1, 1, &mut rng);
        assert_eq!(capped.len(), 1);
    }
}
