use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use log::{error, info, warn};
use rand::{rngs::StdRng, SeedableRng};

use shoofly::{
    error::ModelError,
    models::{
        failure::{feasible_failures, resilience, robust_plan, viable_failures, FailureSet},
        teavar::{sweep, ScenarioConfig, SweepConfig},
        wavelength::{PlanObjective, WavelengthAllocation},
    },
    parse::{self, Format},
    report::{
        allocation_rows, nonzero_allocations, resilience_rows, write_csv, FeasibleFailures,
        ResilienceRow, Stats,
    },
    shortcuts::{discover_shortcuts, DiscoveryConfig, ShortcutPairs},
    solver::{default_solver, Solver, SolverSettings},
    topology::{graph::GraphView, Network},
    Result,
};

/// Where `feasible-failures` writes and `plan` reads by default, inside the
/// data directory.
const FEASIBLE_FAILURES_FILE: &str = "feasible_link_failures.json";

#[derive(Parser, Debug)]
#[clap(author, version, about = "Optical bypass planning for backbone networks")]
struct Cli {
    #[clap(flatten)]
    input: Input,
    #[clap(flatten)]
    solver: SolverArgs,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Input {
    /// Directory holding the input files
    #[clap(long, parse(from_os_str), default_value = "data")]
    data: PathBuf,
    /// Input layout: cpwan or teavar
    #[clap(long, default_value = "cpwan")]
    format: Format,
    /// Network name, also the sub-directory of teavar data sets
    #[clap(short, long, default_value = "cpwan")]
    network: String,
    /// Scale all demands by this factor
    #[clap(short, long, default_value_t = 1.0)]
    scale: f64,
    /// Directory results are written to
    #[clap(long, parse(from_os_str), default_value = "results")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct SolverArgs {
    /// Relative MIP gap
    #[clap(long, default_value_t = 0.001)]
    mip_gap: f64,
    /// Time limit per solve in seconds
    #[clap(long, default_value_t = 500.0)]
    time_limit: f64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan wavelengths, optionally robust to every viable set of k link failures
    Plan {
        /// Maximum number of hops of a shortcut
        hops: usize,
        /// Number of simultaneous link failures to plan for (0, 1 or 2)
        #[clap(short, long, default_value_t = 0)]
        failures: usize,
        /// Feasible failure sets as written by `feasible-failures`
        #[clap(long, parse(from_os_str))]
        feasible_failures: Option<PathBuf>,
        #[clap(long, default_value_t = 500)]
        max_failure_sets: usize,
        /// bypass, wavelengths or flow
        #[clap(long, default_value = "bypass")]
        objective: PlanObjective,
        #[clap(long, default_value_t = 0)]
        seed: u64,
    },
    /// Sweep the CVaR of unmet demand against a lower bound on bypass
    Teavar {
        hops: usize,
        #[clap(long = "beta", default_values = &["0.9", "0.99"])]
        betas: Vec<f64>,
        #[clap(long, default_value_t = 4)]
        rounds: usize,
        #[clap(long, default_value_t = 5)]
        num_bounds: usize,
        #[clap(long, default_value_t = 1e-5)]
        cutoff: f64,
        #[clap(long, default_value_t = 0.8)]
        weibull_shape: f64,
        #[clap(long, default_value_t = 1e-4)]
        weibull_scale: f64,
        #[clap(long, default_value_t = 0)]
        seed: u64,
        /// CSV to write, by default `teavar_<hops>_<scale>.csv` in the output directory
        #[clap(long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Find the single and double link failures the network survives without shortcuts
    FeasibleFailures {
        #[clap(long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Max flow of planned networks under single and double link failures
    Resilience {
        hops: usize,
        /// Failure sets evaluated per failure count
        #[clap(long, default_value_t = 10)]
        max_failure_sets: usize,
        /// Also evaluate plans robust to the failure sets in this file
        #[clap(long, parse(from_os_str))]
        feasible_failures: Option<PathBuf>,
        #[clap(long, default_value_t = 0)]
        seed: u64,
    },
}

/// Reads the network and discovers its shortcuts.
fn prepare(input: &Input, hops: usize) -> Result<(Network, GraphView, ShortcutPairs)> {
    let mut network = parse::load(input.format, &input.data, &input.network, input.scale)?;
    let graph = GraphView::new(&network);
    let pairs = discover_shortcuts(&mut network, &graph, &DiscoveryConfig { max_hops: hops })?;
    Ok((network, graph, pairs))
}

fn out_dir(input: &Input) -> PathBuf {
    input.out.join(&input.network)
}

fn read_viable(
    network: &Network,
    graph: &GraphView,
    path: &Path,
    order: usize,
    cap: usize,
    seed: u64,
) -> Result<Vec<FailureSet>> {
    let feasible = FeasibleFailures::read(path)?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(viable_failures(network, graph, &feasible, order, cap, &mut rng))
}

#[allow(clippy::too_many_arguments)]
fn run_plan(
    input: &Input,
    solver: &dyn Solver,
    settings: &SolverSettings,
    hops: usize,
    failures: usize,
    feasible: Option<PathBuf>,
    max_failure_sets: usize,
    objective: PlanObjective,
    seed: u64,
) -> Result<()> {
    let (network, graph, pairs) = prepare(input, hops)?;
    let failure_sets = if failures == 0 {
        Vec::new()
    } else {
        let path = feasible.unwrap_or_else(|| input.data.join(FEASIBLE_FAILURES_FILE));
        read_viable(&network, &graph, &path, failures, max_failure_sets, seed)?
    };

    let allocation = match robust_plan(
        &network,
        &pairs,
        &failure_sets,
        objective,
        solver,
        settings,
    ) {
        Err(e @ ModelError::NotRobust(_)) => {
            warn!("Try fewer --failures or a smaller --max-failure-sets");
            return Err(e.into());
        }
        allocation => allocation?,
    };
    let lit = nonzero_allocations(&network, &allocation);
    info!(
        "{} shortcuts lit, {} Gb/s bypassed, {} ports saved",
        lit.len(),
        lit.values().sum::<f64>(),
        allocation.ports_saved(&network)
    );

    let path = out_dir(input).join(format!(
        "shortcut_allocations_hops_{}_scale_{}_failure_{}.csv",
        hops, input.scale, failures
    ));
    write_csv(&path, &allocation_rows(&network, &allocation, failures))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn run_feasible_failures(
    input: &Input,
    solver: &dyn Solver,
    settings: &SolverSettings,
    output: Option<PathBuf>,
) -> Result<()> {
    let network = parse::load(input.format, &input.data, &input.network, input.scale)?;
    let feasible = feasible_failures(&network, solver, settings)?;
    info!(
        "{} single and {} double link failures are feasible",
        feasible.single.len(),
        feasible.double.len()
    );
    let path = output.unwrap_or_else(|| input.data.join(FEASIBLE_FAILURES_FILE));
    feasible.write(&path)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn run_teavar(
    input: &Input,
    solver: &dyn Solver,
    settings: &SolverSettings,
    hops: usize,
    config: SweepConfig,
    output: Option<PathBuf>,
) -> Result<()> {
    let (network, _, pairs) = prepare(input, hops)?;
    let rows = sweep(&network, &pairs, hops, &config, solver, settings)?;
    let unsolved = rows.iter().filter(|r| r.cvar.is_none()).count();
    if unsolved > 0 {
        warn!("{} of {} risk programs have no solution", unsolved, rows.len());
    }
    let path = output
        .unwrap_or_else(|| out_dir(input).join(format!("teavar_{}_{}.csv", hops, input.scale)));
    write_csv(&path, &rows)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Statistics rows of a plan's max flow under the given failure sets.
#[allow(clippy::too_many_arguments)]
fn evaluate(
    input: &Input,
    network: &Network,
    pairs: &ShortcutPairs,
    allocation: &WavelengthAllocation,
    failures: &[FailureSet],
    order: usize,
    hops: usize,
    name: &str,
    solver: &dyn Solver,
    settings: &SolverSettings,
) -> Result<Vec<ResilienceRow>> {
    let flows = resilience(network, pairs, &allocation.wavelengths, failures, solver, settings)?;
    let solved: Vec<f64> = flows.iter().flatten().copied().collect();
    if solved.len() < flows.len() {
        warn!("{}: {} failure sets have no solution", name, flows.len() - solved.len());
    }
    Ok(match Stats::of(&solved) {
        Some(stats) => resilience_rows(order, &stats, hops, input.scale, name),
        None => Vec::new(),
    })
}

#[allow(clippy::too_many_arguments)]
fn run_resilience(
    input: &Input,
    solver: &dyn Solver,
    settings: &SolverSettings,
    hops: usize,
    max_failure_sets: usize,
    feasible: Option<PathBuf>,
    seed: u64,
) -> Result<()> {
    let (network, graph, pairs) = prepare(input, hops)?;
    let plan = robust_plan(&network, &pairs, &[], PlanObjective::MaximizeBypass, solver, settings)?;

    let links = network.links();
    let mut rows = Vec::new();
    for order in 1..=2 {
        let failures: Vec<FailureSet> = links
            .iter()
            .copied()
            .combinations(order)
            .take(max_failure_sets)
            .map(FailureSet::new)
            .collect();
        rows.extend(evaluate(
            input, &network, &pairs, &plan, &failures, order, hops, "shoofly", solver, settings,
        )?);

        if let Some(path) = &feasible {
            let viable = read_viable(&network, &graph, path, order, max_failure_sets, seed)?;
            let robust = match robust_plan(
                &network,
                &pairs,
                &viable,
                PlanObjective::MaximizeBypass,
                solver,
                settings,
            ) {
                Ok(robust) => robust,
                Err(ModelError::NotRobust(n)) => {
                    warn!("No plan survives all {} {}-failure sets, skipping", n, order);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let name = format!("shoofly-kwise-{}", order);
            rows.extend(evaluate(
                input, &network, &pairs, &robust, &failures, order, hops, &name, solver, settings,
            )?);
        }
    }

    let path = out_dir(input).join(format!("failure_allocations_hops_{}_scale_{}.csv", hops, input.scale));
    write_csv(&path, &rows)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let solver = default_solver()?;
    let settings = SolverSettings {
        mip_gap: cli.solver.mip_gap,
        time_limit: cli.solver.time_limit,
    };
    info!("Using the {} solver", solver.name());
    let input = &cli.input;

    match cli.command {
        Command::Plan {
            hops,
            failures,
            feasible_failures,
            max_failure_sets,
            objective,
            seed,
        } => run_plan(
            input,
            solver.as_ref(),
            &settings,
            hops,
            failures,
            feasible_failures,
            max_failure_sets,
            objective,
            seed,
        ),
        Command::Teavar {
            hops,
            betas,
            rounds,
            num_bounds,
            cutoff,
            weibull_shape,
            weibull_scale,
            seed,
            output,
        } => {
            let config = SweepConfig {
                betas,
                rounds,
                num_bounds,
                scenarios: ScenarioConfig {
                    cutoff,
                    shape: weibull_shape,
                    scale: weibull_scale,
                },
                seed,
            };
            run_teavar(input, solver.as_ref(), &settings, hops, config, output)
        }
        Command::FeasibleFailures { output } => {
            run_feasible_failures(input, solver.as_ref(), &settings, output)
        }
        Command::Resilience {
            hops,
            max_failure_sets,
            feasible_failures,
            seed,
        } => run_resilience(
            input,
            solver.as_ref(),
            &settings,
            hops,
            max_failure_sets,
            feasible_failures,
            seed,
        ),
    }
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
