//! Output records and their CSV / JSON files.

use std::{collections::BTreeMap, fs, path::Path};

use float_ord::FloatOrd;
use serde::{Deserialize, Serialize};

use crate::{error::ParseError, models::wavelength::WavelengthAllocation, topology::Network};

/// One shortcut of a solved plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutAllocationRow {
    pub shortcut: String,
    /// number of markets on the shortcut
    pub hops: usize,
    pub distance: f64,
    /// wavelengths × unity, in Gb/s
    pub capacity: f64,
    pub wavelengths: u32,
    pub unity: u32,
    /// order of the failure sets the plan is robust to
    pub failure_links: usize,
}

pub fn allocation_rows(
    network: &Network,
    allocation: &WavelengthAllocation,
    failure_links: usize,
) -> Vec<ShortcutAllocationRow> {
    network
        .shortcuts()
        .iter()
        .map(|s| {
            let wavelengths = allocation.wavelengths(s.path());
            ShortcutAllocationRow {
                shortcut: s.path().to_string(),
                hops: s.nodes().len(),
                distance: s.distance(),
                capacity: wavelengths as f64 * s.unity() as f64,
                wavelengths,
                unity: s.unity(),
                failure_links,
            }
        })
        .collect()
}

/// Bypassed capacity of every shortcut that lights at least one wavelength.
pub fn nonzero_allocations(network: &Network, allocation: &WavelengthAllocation) -> BTreeMap<String, f64> {
    network
        .shortcuts()
        .iter()
        .filter(|s| s.unity() > 0 && allocation.wavelengths(s.path()) > 0)
        .map(|s| {
            let capacity = allocation.wavelengths(s.path()) as f64 * s.unity() as f64;
            (s.path().to_string(), capacity)
        })
        .collect()
}

/// Mean, median and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
}

impl Stats {
    pub fn of(values: &[f64]) -> Option<Stats> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        let mut sorted = values.to_vec();
        sorted.sort_by_key(|&v| FloatOrd(v));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Stats { mean, median, std })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceRow {
    pub failure_num: usize,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub nhops: usize,
    pub scale: f64,
    pub name: String,
}

/// mean, median, high (mean + std) and low (mean - std) rows.
pub fn resilience_rows(
    failure_num: usize,
    stats: &Stats,
    nhops: usize,
    scale: f64,
    name: &str,
) -> Vec<ResilienceRow> {
    [
        ("mean", stats.mean),
        ("median", stats.median),
        ("high", stats.mean + stats.std),
        ("low", stats.mean - stats.std),
    ]
    .into_iter()
    .map(|(kind, value)| ResilienceRow {
        failure_num,
        value,
        kind: kind.to_string(),
        nhops,
        scale,
        name: name.to_string(),
    })
    .collect()
}

/// Failure sets the network survives without shortcuts, as `A-B` and
/// `A-B|C-D` labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibleFailures {
    #[serde(rename = "1")]
    pub single: Vec<String>,
    #[serde(rename = "2")]
    pub double: Vec<String>,
}

impl FeasibleFailures {
    pub fn read(path: &Path) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), ParseError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// One solve of the risk sweep. Unsolved programs have no alpha or cvar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRow {
    pub beta: f64,
    pub round: usize,
    pub alpha: Option<f64>,
    pub cvar: Option<f64>,
    /// lower bound on hop-weighted wavelengths
    pub bound: i64,
    pub hops: usize,
    pub max_bound: i64,
}

/// Writes rows with a header to `path`, creating parent directories.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ParseError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
