//! Risk-aware planning: the conditional value-at-risk of unmet demand over
//! probabilistic link failure scenarios.

pub mod model;
pub mod scenarios;

pub use model::{sweep, RiskOutcome, SweepConfig, TeavarModel, TeavarVariables};
pub use scenarios::{init_scenarios, subscenarios, weibull_probs, Scenario, ScenarioConfig, ScenarioMap};
