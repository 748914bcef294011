use thiserror::Error;

/// Structural problems with a single candidate path. These reject the
/// candidate; the batch that produced it carries on.
#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("path is empty or has a single node")]
    EmptyPath,
    #[error("edge {0}-{1} does not exist")]
    MissingEdge(String, String),
    #[error("shortcut {0} has zero unity and is not viable")]
    NotViable(String),
    #[error("shortcut {shortcut} is not contained in tunnel {tunnel}")]
    NotContained { shortcut: String, tunnel: String },
    #[error("tunnel {tunnel} does not connect {src} to {dst}")]
    EndpointMismatch {
        tunnel: String,
        src: String,
        dst: String,
    },
    #[error("path {0} visits a node more than once")]
    LoopyPath(String),
    #[error("capacity {0} is negative")]
    NegativeCapacity(f64),
    #[error("distance of edge {0}-{1} is already set")]
    DistanceAlreadySet(String, String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    /// A demand without tunnels reached constraint generation. Void demands
    /// must be pruned beforehand.
    #[error("demand {0}-{1} has no tunnels")]
    VoidDemand(String, String),
    #[error("no wavelength variable for shortcut {0} in the variable pool")]
    MissingWavelength(String),
    #[error("the base network is infeasible")]
    InfeasibleBase,
    /// The base network alone is solvable, but no plan carries every demand
    /// under all of the attached failure sets.
    #[error("no plan survives all {0} failure sets")]
    NotRobust(usize),
    #[error("the base network was not solved: {0}")]
    UnsolvedBase(String),
    #[error("shortcut pair {0} has no mirror")]
    UnpairedShortcut(String),
    #[error("scenario probabilities sum to {0}, expected 1")]
    ProbabilityMass(f64),
    #[error("scenario bitmap has {actual} entries, expected {expected}")]
    ScenarioSize { expected: usize, actual: usize },
    #[error(transparent)]
    Solver(#[from] SolverError),
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("no solver backend is enabled")]
    NoBackend,
    #[error("program has no objective")]
    NoObjective,
    #[error("solver failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{file}:{line}: {reason}")]
    Malformed {
        file: String,
        line: usize,
        reason: String,
    },
    #[error("region {region} maps to both {existing} and {new}")]
    ConflictingAlias {
        region: String,
        existing: String,
        new: String,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
