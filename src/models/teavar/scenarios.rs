//! Probabilistic failure scenarios. Links fail independently with
//! heavy-tailed probabilities; scenarios are enumerated in order of failed
//! links, dropping every branch whose probability falls below a cutoff.

use std::collections::HashMap;

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use typed_index_collections::TiVec;

use crate::{
    error::ModelError,
    topology::{EdgeIndex, Network, Tunnel},
};

/// Largest tolerated deviation of the total scenario probability from one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenarios and branches less likely than this are dropped
    pub cutoff: f64,
    /// Weibull shape of the per-link failure probability
    pub shape: f64,
    /// Weibull scale of the per-link failure probability
    pub scale: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            cutoff: 1e-5,
            shape: 0.8,
            scale: 1e-4,
        }
    }
}

/// `n` failure probabilities drawn from a Weibull distribution, clamped to
/// [0, 1].
pub fn weibull_probs<R: Rng>(n: usize, shape: f64, scale: f64, rng: &mut R) -> Vec<f64> {
    (0..n)
        .map(|_| {
            // inverse transform of a unit exponential
            let u: f64 = rng.gen();
            let z = -(1.0 - u).ln();
            (scale * z.powf(1.0 / shape)).clamp(0.0, 1.0)
        })
        .collect()
}

/// One outcome of the link failure process.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// whether link i is up
    pub up: Vec<bool>,
    pub probability: f64,
}

impl Scenario {
    pub fn all_up(n: usize, probability: f64) -> Self {
        Scenario {
            up: vec![true; n],
            probability,
        }
    }

    pub fn failed(&self) -> usize {
        self.up.iter().filter(|up| !**up).count()
    }
}

/// Probability that exactly the links in `failed` are down among the first
/// `upto` links.
fn prefix_probability(distribution: &[f64], failed: &[usize], upto: usize) -> f64 {
    distribution[..upto]
        .iter()
        .enumerate()
        .map(|(j, &p)| if failed.contains(&j) { p } else { 1.0 - p })
        .product()
}

/// Enumerates failure sets depth first. A failure set is extended only by
/// links after its last failed link, and the extension by link `n` is tried
/// only while the probability of the first `n` links matching the set stays at
/// or above `cutoff`. The all-up scenario is always kept.
fn enumerate(distribution: &[f64], cutoff: f64) -> Vec<Scenario> {
    let n = distribution.len();
    let mut scenarios = Vec::new();
    let mut stack: Vec<Vec<usize>> = vec![Vec::new()];

    while let Some(failed) = stack.pop() {
        let probability = prefix_probability(distribution, &failed, n);
        if failed.is_empty() || probability >= cutoff {
            let mut up = vec![true; n];
            for &i in &failed {
                up[i] = false;
            }
            scenarios.push(Scenario { up, probability });
        }

        let start = failed.last().map_or(0, |&last| last + 1);
        let mut prefix = prefix_probability(distribution, &failed, start);
        let mut children = Vec::new();
        for next in start..n {
            if prefix < cutoff {
                break;
            }
            let mut child = failed.clone();
            child.push(next);
            children.push(child);
            prefix *= 1.0 - distribution[next];
        }
        stack.extend(children.into_iter().rev());
    }

    scenarios
}

/// Scenarios for the given failure probabilities, with probabilities that sum
/// to one. Without `first` the all-up scenario is left out. With `last`
/// missing mass goes to an extra all-up scenario, otherwise the
/// probabilities are renormalized.
pub fn subscenarios(distribution: &[f64], cutoff: f64, first: bool, last: bool) -> Vec<Scenario> {
    let mut scenarios = enumerate(distribution, cutoff);
    if !first && !scenarios.is_empty() {
        scenarios.remove(0);
    }

    let total: f64 = scenarios.iter().map(|s| s.probability).sum();
    if total < 1.0 && last {
        scenarios.push(Scenario::all_up(distribution.len(), 1.0 - total));
    } else if total > 0.0 && total != 1.0 {
        for s in &mut scenarios {
            s.probability /= total;
        }
    }
    debug!(
        "{} scenarios over {} links, enumerated mass {:.12}",
        scenarios.len(),
        distribution.len(),
        total
    );
    scenarios
}

/// Checks that every scenario covers `links` links and that the
/// probabilities sum to one.
pub fn validate(scenarios: &[Scenario], links: usize) -> Result<(), ModelError> {
    if let Some(s) = scenarios.iter().find(|s| s.up.len() != links) {
        return Err(ModelError::ScenarioSize {
            expected: links,
            actual: s.up.len(),
        });
    }
    let total: f64 = scenarios.iter().map(|s| s.probability).sum();
    if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(ModelError::ProbabilityMass(total));
    }
    Ok(())
}

/// A scenario expanded to the directed edges of a network.
#[derive(Debug, Clone)]
pub struct ScenarioMap {
    pub up: TiVec<EdgeIndex, bool>,
    pub probability: f64,
}

impl ScenarioMap {
    /// Expands link scenarios, indexed like [`Network::links`], so that both
    /// directions of a link share its state.
    pub fn expand(network: &Network, scenarios: &[Scenario]) -> Result<Vec<ScenarioMap>, ModelError> {
        let links = network.links();
        validate(scenarios, links.len())?;
        let position: HashMap<_, usize> = links.iter().enumerate().map(|(i, &l)| (l, i)).collect();

        Ok(scenarios
            .iter()
            .map(|s| ScenarioMap {
                up: network
                    .edges()
                    .iter()
                    .map(|e| position.get(&e.unordered()).map_or(true, |&i| s.up[i]))
                    .collect(),
                probability: s.probability,
            })
            .collect())
    }

    /// A tunnel is enabled when all of its edges are up.
    pub fn enabled(&self, tunnel: &Tunnel) -> bool {
        tunnel.edges().iter().all(|&e| self.up[e])
    }
}

/// Draws failure probabilities for the links of `network` and enumerates
/// their scenarios.
pub fn init_scenarios<R: Rng>(
    network: &Network,
    config: &ScenarioConfig,
    rng: &mut R,
) -> Result<Vec<ScenarioMap>, ModelError> {
    let links = network.links().len();
    let distribution = weibull_probs(links, config.shape, config.scale, rng);
    let scenarios = subscenarios(&distribution, config.cutoff, true, true);
    info!("Generated {} scenarios over {} links", scenarios.len(), links);
    ScenarioMap::expand(network, &scenarios)
}
