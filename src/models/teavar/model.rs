use itertools::iproduct;
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::scenarios::{init_scenarios, ScenarioConfig, ScenarioMap};
use crate::{
    error::ModelError,
    models::{
        program::{Constraint, LinSum, ObjSense, Program, Var},
        utils::{AddVars, ConvertVars},
        wavelength::{base_solution, DemandMode, PlanObjective, Variables, WavelengthModel},
    },
    report::RiskRow,
    shortcuts::ShortcutPairs,
    solver::{Solver, SolverSettings, Status},
    topology::Network,
};

pub struct TeavarModel {}

pub struct TeavarVariables {
    /// the planned network, which must meet every demand
    pub main: Variables,
    /// the network exposed to the scenarios, over the same wavelengths
    pub risk: Variables,
    /// value-at-risk threshold of the unmet demand fraction
    pub alpha: Var,
    /// loss beyond alpha in each scenario
    pub slack: Vec<Var>,
}

/// Solved value-at-risk and conditional value-at-risk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskOutcome {
    pub alpha: f64,
    pub cvar: f64,
}

impl TeavarModel {
    /// In every scenario, the fraction of each demand that enabled tunnels do
    /// not carry exceeds alpha by at most the scenario's slack.
    pub fn scenario_constraints(
        network: &Network,
        risk: &Variables,
        scenarios: &[ScenarioMap],
        alpha: Var,
        slack: &[Var],
        program: &mut Program,
    ) {
        for ((i, scenario), d) in iproduct!(scenarios.iter().enumerate(), network.demands()) {
            if d.amount() <= 0.0 {
                continue;
            }
            // slack_i >= 1 - carried / amount - alpha
            let carried = d
                .tunnels()
                .iter()
                .filter(|&&t| scenario.enabled(&network.tunnels()[t]))
                .map(|&t| risk.flow[t])
                .lin_sum();
            let lhs = slack[i] + alpha + (1.0 / d.amount()) * carried;
            program.add_constr(
                &format!("loss_{}_{}_{}", i, network.code(d.src()), network.code(d.dst())),
                Constraint::ge(lhs, 1.0),
            );
        }
    }

    /// alpha + 1/(1 - beta) Σ p_i slack_i
    pub fn set_objective(
        beta: f64,
        scenarios: &[ScenarioMap],
        alpha: Var,
        slack: &[Var],
        program: &mut Program,
    ) {
        let tail = scenarios
            .iter()
            .zip(slack)
            .map(|(s, &v)| s.probability * v)
            .lin_sum();
        program.set_objective(alpha + (1.0 / (1.0 - beta)) * tail, ObjSense::Minimize);
    }

    /// Builds the risk program: the planned network with at least `bound`
    /// hop-weighted wavelengths, and a copy of it over the same wavelengths
    /// that is exposed to the scenarios.
    pub fn build(
        network: &Network,
        pairs: &ShortcutPairs,
        scenarios: &[ScenarioMap],
        beta: f64,
        bound: f64,
    ) -> Result<(Program, TeavarVariables), ModelError> {
        info!(
            "Building teavar model for {} with beta {} and bound {}",
            network.name(),
            beta,
            bound
        );
        let (mut program, pool, main) =
            WavelengthModel::build(network, pairs, PlanObjective::MaximizeBypass)?;
        WavelengthModel::add_wavelength_bound(network, &main, bound, &mut program);

        let risk = WavelengthModel::add_network(
            "risk",
            network,
            pairs,
            &pool,
            DemandMode::Cap,
            &mut program,
        )?;
        let alpha = program.cont("alpha");
        let slack = scenarios.len().cont(&mut program, "slack");
        Self::scenario_constraints(network, &risk, scenarios, alpha, &slack, &mut program);
        Self::set_objective(beta, scenarios, alpha, &slack, &mut program);

        Ok((
            program,
            TeavarVariables {
                main,
                risk,
                alpha,
                slack,
            },
        ))
    }

    /// `None` when the program has no solution.
    pub fn solve(
        solver: &dyn Solver,
        settings: &SolverSettings,
        program: &Program,
        variables: &TeavarVariables,
    ) -> Result<Option<RiskOutcome>, ModelError> {
        let solution = solver.solve(program, settings)?;
        match solution.status {
            Status::Optimal | Status::NotSolved if solution.has_values() => Ok(Some(RiskOutcome {
                alpha: variables.alpha.convert(&solution),
                cvar: solution.objective.unwrap_or(f64::NAN),
            })),
            status => {
                debug!("{}: {:?}", program.name(), status);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub betas: Vec<f64>,
    /// independent scenario draws per beta and bound
    pub rounds: usize,
    /// the bound range [0, max] is split into this many steps
    pub num_bounds: usize,
    pub scenarios: ScenarioConfig,
    pub seed: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            betas: vec![0.9, 0.99],
            rounds: 4,
            num_bounds: 5,
            scenarios: ScenarioConfig::default(),
            seed: 0,
        }
    }
}

/// Trades provisioning against risk. The largest bypass the network supports
/// is found first; then for every bound between zero and that maximum, every
/// beta and every round, fresh scenarios are drawn and the risk program is
/// solved. Rows of unsolved programs carry no alpha or cvar.
pub fn sweep(
    network: &Network,
    pairs: &ShortcutPairs,
    hops: usize,
    config: &SweepConfig,
    solver: &dyn Solver,
    settings: &SolverSettings,
) -> Result<Vec<RiskRow>, ModelError> {
    let (program, _, _) = WavelengthModel::build(network, pairs, PlanObjective::MaximizeBypass)?;
    let max_bound = base_solution(solver.solve(&program, settings)?)?
        .objective
        .unwrap_or(0.0);
    info!("Maximum bypass is {}", max_bound);

    let jobs: Vec<(usize, f64, usize)> = iproduct!(
        0..=config.num_bounds,
        config.betas.iter().copied(),
        0..config.rounds
    )
    .collect();

    jobs.par_iter()
        .enumerate()
        .map(|(k, &(i, beta, round))| {
            let bound = if config.num_bounds == 0 {
                max_bound
            } else {
                max_bound * (i as f64 / config.num_bounds as f64)
            };
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(k as u64));
            let scenarios = init_scenarios(network, &config.scenarios, &mut rng)?;
            let (program, variables) = TeavarModel::build(network, pairs, &scenarios, beta, bound)?;
            let outcome = TeavarModel::solve(solver, settings, &program, &variables)?;
            info!("bound {} beta {} round {}: {:?}", bound, beta, round, outcome);
            Ok(RiskRow {
                beta,
                round,
                alpha: outcome.map(|o| o.alpha),
                cvar: outcome.map(|o| o.cvar),
                bound: bound as i64,
                hops,
                max_bound: max_bound as i64,
            })
        })
        .collect()
}
