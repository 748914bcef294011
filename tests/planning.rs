use rand::{rngs::StdRng, SeedableRng};

use shoofly::{
    error::ModelError,
    models::{
        failure::{
            add_failure_network, max_flow_under_failure, resilience, robust_plan, FailureSet,
        },
        teavar::{
            init_scenarios, sweep, Scenario, ScenarioConfig, ScenarioMap, SweepConfig, TeavarModel,
        },
        wavelength::{DemandMode, PlanObjective, WavelengthAllocation, WavelengthModel},
    },
    shortcuts::{discover_shortcuts, DiscoveryConfig, ShortcutPairs},
    solver::{default_solver, SolverSettings},
    topology::{graph::GraphView, unordered, Network, NodeIndex},
};

/// A-B-C-D-A with both directions of every link. A-C is shorter through B.
fn ring(capacity: f64) -> Network {
    let mut network = Network::new("ring");
    for (a, b, km) in [("A", "B", 100.0), ("B", "C", 100.0), ("C", "D", 150.0), ("D", "A", 150.0)] {
        for (x, y) in [(a, b), (b, a)] {
            let e = network.add_edge(x, y, 200, capacity).unwrap().unwrap();
            network.set_edge_distance(e, km).unwrap();
        }
    }
    network
}

fn discover(network: &mut Network) -> ShortcutPairs {
    let graph = GraphView::new(network);
    discover_shortcuts(network, &graph, &DiscoveryConfig { max_hops: 2 }).unwrap()
}

/// One demand A -> C of 50 over A:B:C only.
fn single_path_ring() -> (Network, ShortcutPairs) {
    let mut network = ring(400.0);
    network.add_demand("A", "C", 50.0, 1.0);
    network.add_tunnel(&["A", "B", "C"]).unwrap();
    let pairs = discover(&mut network);
    (network, pairs)
}

/// Demands both ways between A and C, each over both sides of the ring.
fn two_path_ring() -> (Network, ShortcutPairs) {
    let mut network = ring(400.0);
    network.add_demand("A", "C", 50.0, 1.0);
    network.add_demand("C", "A", 50.0, 1.0);
    for path in [["A", "B", "C"], ["A", "D", "C"], ["C", "B", "A"], ["C", "D", "A"]] {
        network.add_tunnel(&path).unwrap();
    }
    let pairs = discover(&mut network);
    (network, pairs)
}

/// A-B-C with one demand A -> C of 50 over A:B:C.
fn line() -> Network {
    let mut network = Network::new("line");
    for (a, b) in [("A", "B"), ("B", "C")] {
        network.add_edge(a, b, 200, 400.0).unwrap();
        network.add_edge(b, a, 200, 400.0).unwrap();
    }
    network.add_demand("A", "C", 50.0, 1.0);
    network.add_demand("C", "A", 0.0, 1.0);
    network.add_tunnel(&["A", "B", "C"]).unwrap();
    network.add_tunnel(&["C", "B", "A"]).unwrap();
    network
}

fn link(network: &Network, a: &str, b: &str) -> (NodeIndex, NodeIndex) {
    unordered(network.node(a).unwrap(), network.node(b).unwrap())
}

#[test]
fn discovery_finds_the_two_hop_shortcut_and_its_mirror() {
    let (network, pairs) = single_path_ring();

    let ac = network.shortcut("A:B:C").unwrap();
    let ca = network.shortcut("C:B:A").unwrap();
    assert_eq!(network.shortcuts()[ac].distance(), 200.0);
    assert_eq!(network.shortcuts()[ac].unity(), 200);
    assert_eq!(pairs.get(network.node("A").unwrap(), network.node("C").unwrap()), Some(ac));
    assert_eq!(pairs.get(network.node("C").unwrap(), network.node("A").unwrap()), Some(ca));
    assert!(pairs.check_mirrored(&network).is_ok());

    // the tunnel over A:B:C may use it
    let t = network.tunnel("A:B:C").unwrap();
    assert_eq!(network.tunnels()[t].shortcuts(), &[ac]);
}

#[test]
fn discovery_is_idempotent() {
    let summary = |network: &Network| -> Vec<(String, u32, f64)> {
        network
            .shortcuts()
            .iter()
            .map(|s| (s.path().to_string(), s.unity(), s.distance()))
            .collect()
    };

    let (first, _) = single_path_ring();
    let (mut second, pairs) = single_path_ring();
    assert_eq!(summary(&first), summary(&second));

    // rediscovering on the same network registers nothing new
    let again = discover(&mut second);
    assert_eq!(again, pairs);
    assert_eq!(summary(&first), summary(&second));
}

#[test]
fn solved_plan_satisfies_every_constraint() {
    let (network, pairs) = two_path_ring();
    let solver = default_solver().unwrap();
    let (program, _, variables) =
        WavelengthModel::build(&network, &pairs, PlanObjective::MaximizeBypass).unwrap();
    let solution = solver.solve(&program, &SolverSettings::default()).unwrap();
    assert!(solution.is_optimal());

    // capacity, conservation, demand and symmetry rows all hold
    let violated = program.violations(solution.values(), 1e-6);
    assert!(violated.is_empty(), "{:?}", violated);

    let allocation = WavelengthAllocation::new(&network, &variables, &solution);
    for (s, r) in pairs.mirrored() {
        let (s, r) = (&network.shortcuts()[s], &network.shortcuts()[r]);
        assert_eq!(allocation.wavelengths(s.path()), allocation.wavelengths(r.path()));
    }
    for demand in network.demands() {
        let carried: f64 = demand
            .tunnels()
            .iter()
            .map(|&t| allocation.flows[network.tunnels()[t].path()])
            .sum();
        assert!(carried >= demand.amount() - 1e-6);
    }
}

#[test]
fn max_bypass_lights_the_shortcut_the_demand_needs() {
    let (network, pairs) = single_path_ring();
    let solver = default_solver().unwrap();
    let allocation = robust_plan(
        &network,
        &pairs,
        &[],
        PlanObjective::MaximizeBypass,
        solver.as_ref(),
        &SolverSettings::default(),
    )
    .unwrap();

    // lighting two wavelengths over B -> C leaves no direct capacity there,
    // so the demand can only be met if one of them is A:B:C
    assert!(allocation.wavelengths("A:B:C") >= 1);
    assert_eq!(allocation.wavelengths("A:B:C"), allocation.wavelengths("C:B:A"));
    assert!(allocation.ports_saved(&network) > 0.0);
}

#[test]
fn deliverable_flow_shrinks_with_more_failures() {
    let (network, pairs) = two_path_ring();
    let solver = default_solver().unwrap();
    let settings = SolverSettings::default();
    let plan = robust_plan(
        &network,
        &pairs,
        &[],
        PlanObjective::MaximizeBypass,
        solver.as_ref(),
        &settings,
    )
    .unwrap();

    let none = FailureSet::new(Vec::<(NodeIndex, NodeIndex)>::new());
    let ab = FailureSet::new([link(&network, "A", "B")]);
    let cd = FailureSet::new([link(&network, "C", "D")]);
    let both = FailureSet::new([link(&network, "A", "B"), link(&network, "C", "D")]);

    let flows = resilience(
        &network,
        &pairs,
        &plan.wavelengths,
        &[none, ab, cd],
        solver.as_ref(),
        &settings,
    )
    .unwrap();
    let flows: Vec<f64> = flows.into_iter().map(|f| f.unwrap()).collect();
    let double = max_flow_under_failure(
        &network,
        &pairs,
        &plan.wavelengths,
        &both,
        solver.as_ref(),
        &settings,
    )
    .unwrap()
    .unwrap();

    // an intact network carries every demand in full
    assert!((flows[0] - network.total_demand()).abs() < 1e-6);
    assert!(flows[1] <= flows[0] + 1e-6);
    assert!(flows[2] <= flows[0] + 1e-6);
    assert!(double <= flows[1] + 1e-6);
    assert!(double <= flows[2] + 1e-6);
    // both sides of the ring are cut
    assert!(double.abs() < 1e-6);
}

#[test]
fn generated_scenarios_form_a_distribution() {
    let network = ring(400.0);
    let mut rng = StdRng::seed_from_u64(7);
    let config = ScenarioConfig {
        scale: 0.05,
        ..Default::default()
    };
    let scenarios = init_scenarios(&network, &config, &mut rng).unwrap();

    let total: f64 = scenarios.iter().map(|s| s.probability).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(scenarios.len() > 1);
    for scenario in &scenarios {
        assert_eq!(scenario.up.len(), network.edges().len());
        // both directions of a link share a state
        for edge in network.edges() {
            let reverse = network.edge_between(edge.dst(), edge.src()).unwrap();
            let forward = network.edge_between(edge.src(), edge.dst()).unwrap();
            assert_eq!(scenario.up[forward], scenario.up[reverse]);
        }
    }
}

#[test]
fn robust_plan_carries_full_demand_under_its_failure() {
    let (network, pairs) = two_path_ring();
    let solver = default_solver().unwrap();
    let settings = SolverSettings::default();
    let ab = FailureSet::new([link(&network, "A", "B")]);

    let plan = robust_plan(
        &network,
        &pairs,
        &[ab.clone()],
        PlanObjective::MaximizeBypass,
        solver.as_ref(),
        &settings,
    )
    .unwrap();
    let carried = max_flow_under_failure(
        &network,
        &pairs,
        &plan.wavelengths,
        &ab,
        solver.as_ref(),
        &settings,
    )
    .unwrap()
    .unwrap();
    assert!((carried - network.total_demand()).abs() < 1e-6, "{}", carried);
    assert!((carried - 100.0).abs() < 1e-6);

    // the same program built by hand: every row of the failure network holds
    let (mut program, pool, _) =
        WavelengthModel::build(&network, &pairs, PlanObjective::MaximizeBypass).unwrap();
    add_failure_network("f0", &network, &pairs, &pool, &ab, DemandMode::Satisfy, &mut program)
        .unwrap();
    let solution = solver.solve(&program, &settings).unwrap();
    assert!(solution.is_optimal());
    let failure_rows: Vec<&str> = program
        .constrs()
        .iter()
        .map(|(n, _)| n.as_str())
        .filter(|n| n.starts_with("f0_"))
        .collect();
    assert!(failure_rows.contains(&"f0_demand_A_C"));
    let violated: Vec<String> = program
        .violations(solution.values(), 1e-6)
        .into_iter()
        .filter(|n| n.starts_with("f0_"))
        .collect();
    assert!(violated.is_empty(), "{:?}", violated);
}

#[test]
fn robust_plan_rejects_a_failure_that_cuts_every_tunnel() {
    let (network, pairs) = single_path_ring();
    let solver = default_solver().unwrap();
    let ab = FailureSet::new([link(&network, "A", "B")]);

    // A:B:C is the only tunnel, so no plan routes A -> C without A-B
    let result = robust_plan(
        &network,
        &pairs,
        &[ab],
        PlanObjective::MaximizeBypass,
        solver.as_ref(),
        &SolverSettings::default(),
    );
    assert!(matches!(result, Err(ModelError::NotRobust(1))), "{:?}", result.err());
}

#[test]
fn cvar_counts_a_lost_demand_beyond_the_tail() {
    let network = line();
    let solver = default_solver().unwrap();
    let scenarios = ScenarioMap::expand(
        &network,
        &[
            Scenario::all_up(2, 0.75),
            Scenario {
                up: vec![false, true],
                probability: 0.25,
            },
        ],
    )
    .unwrap();
    let (program, variables) =
        TeavarModel::build(&network, &ShortcutPairs::default(), &scenarios, 0.9, 0.0).unwrap();
    let settings = SolverSettings::default();
    let outcome = TeavarModel::solve(solver.as_ref(), &settings, &program, &variables)
        .unwrap()
        .unwrap();

    // A-B is down with probability 0.25, more than the 0.1 tail
    assert!((outcome.alpha - 1.0).abs() < 1e-6, "{:?}", outcome);
    assert!((outcome.cvar - 1.0).abs() < 1e-6, "{:?}", outcome);
}

#[test]
fn sweep_covers_every_bound_beta_and_round() {
    let (network, pairs) = two_path_ring();
    let solver = default_solver().unwrap();
    let config = SweepConfig {
        betas: vec![0.9],
        rounds: 1,
        num_bounds: 2,
        ..Default::default()
    };
    let settings = SolverSettings::default();
    let rows = sweep(&network, &pairs, 2, &config, solver.as_ref(), &settings).unwrap();

    assert_eq!(rows.len(), (config.num_bounds + 1) * config.betas.len() * config.rounds);
    let last = rows.last().unwrap();
    assert!(last.max_bound > 0);
    assert_eq!(last.bound, last.max_bound);
    assert_eq!(rows[0].bound, 0);
    assert!(rows.windows(2).all(|w| w[0].bound <= w[1].bound));
    assert!(rows.iter().all(|r| r.hops == 2));
}
