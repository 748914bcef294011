//! Reading networks from flat files. Two layouts are supported: the carrier
//! CSV dumps (`cpwan`) and the public TeaVaR data sets (`teavar`).

pub mod cpwan;
pub mod geo;
pub mod teavar;

use std::{collections::HashMap, path::Path, str::FromStr};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ParseError, TopologyError},
    topology::{path_string, Network},
};

/// State shared by the ingestion steps of one network.
#[derive(Debug, Clone, Default)]
pub struct IngestContext {
    /// region code -> market it belongs to
    aliases: HashMap<String, String>,
}

impl IngestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `region` belongs to `market`. A region is tied to one
    /// market for good.
    pub fn alias(&mut self, region: &str, market: &str) -> Result<(), ParseError> {
        match self.aliases.get(region) {
            Some(existing) if existing != market => Err(ParseError::ConflictingAlias {
                region: region.to_string(),
                existing: existing.clone(),
                new: market.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.aliases.insert(region.to_string(), market.to_string());
                Ok(())
            }
        }
    }

    pub fn market(&self, region: &str) -> Option<&str> {
        self.aliases.get(region).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Collapses runs of the same node. A node that still occurs twice makes the
/// path a loop, which is rejected.
pub fn clean_path<S: AsRef<str>>(path: &[S]) -> Result<Vec<String>, TopologyError> {
    let mut cleaned: Vec<String> = Vec::with_capacity(path.len());
    for node in path {
        if cleaned.last().map(String::as_str) != Some(node.as_ref()) {
            cleaned.push(node.as_ref().to_string());
        }
    }
    let mut seen = std::collections::HashSet::new();
    if !cleaned.iter().all(|n| seen.insert(n)) {
        return Err(TopologyError::LoopyPath(path_string(&cleaned)));
    }
    Ok(cleaned)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    Cpwan,
    Teavar,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpwan" => Ok(Format::Cpwan),
            "teavar" => Ok(Format::Teavar),
            other => Err(format!("unknown input format {}", other)),
        }
    }
}

/// Reads the network `name` from `dir` and prunes demands no tunnel serves.
/// Demands are multiplied by `scale`.
pub fn load(format: Format, dir: &Path, name: &str, scale: f64) -> Result<Network, ParseError> {
    info!("Reading {:?} network {} from {}", format, name, dir.display());
    let mut network = match format {
        Format::Cpwan => cpwan::read_network(dir, name, scale)?,
        Format::Teavar => teavar::read_network(&dir.join(name), name, scale)?,
    };
    let pruned = network.prune_void_demands();
    if pruned > 0 {
        warn!("{} demands have no tunnel and were dropped", pruned);
    }
    info!(
        "Network {}: {} nodes, {} edges, {} demands, {} tunnels",
        network.name(),
        network.nodes().len(),
        network.edges().len(),
        network.demands().len(),
        network.tunnels().len()
    );
    Ok(network)
}

/// Location of a record for error messages.
pub(crate) fn malformed(file: &Path, line: usize, reason: impl Into<String>) -> ParseError {
    ParseError::Malformed {
        file: file.display().to_string(),
        line,
        reason: reason.into(),
    }
}
