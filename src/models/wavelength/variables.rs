use std::collections::{BTreeMap, HashMap};

use typed_index_collections::TiVec;

use crate::{
    error::ModelError,
    models::program::{Program, Var, VarType},
    topology::{EdgeIndex, Network, ShortcutIndex, TunnelIndex},
};

/// Wavelength-count variables keyed by shortcut path. A pool is created once
/// for the planned network and handed to every scenario network built in the
/// same program, so all of them see the same provisioning decision.
#[derive(Debug, Clone, Default)]
pub struct WavelengthPool(HashMap<String, Var>);

impl WavelengthPool {
    /// A fresh non-negative integer variable for every shortcut.
    pub fn new(program: &mut Program, network: &Network) -> Self {
        WavelengthPool(
            network
                .shortcuts()
                .iter()
                .map(|s| (s.path().to_string(), program.integer(&format!("w_{}", s.path()))))
                .collect(),
        )
    }

    /// Variables pinned to the counts of a finished plan. Shortcuts absent
    /// from the plan are pinned to zero.
    pub fn fixed(program: &mut Program, network: &Network, plan: &BTreeMap<String, u32>) -> Self {
        WavelengthPool(
            network
                .shortcuts()
                .iter()
                .map(|s| {
                    let w = plan.get(s.path()).copied().unwrap_or(0) as f64;
                    let var = program.add_var(&format!("w_{}", s.path()), VarType::Integer, w, w);
                    (s.path().to_string(), var)
                })
                .collect(),
        )
    }

    /// Every shortcut pinned to zero wavelengths, i.e. the plain network.
    pub fn zero(program: &mut Program, network: &Network) -> Self {
        Self::fixed(program, network, &BTreeMap::new())
    }

    pub fn get(&self, path: &str) -> Option<Var> {
        self.0.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The variables of one network instance inside a program.
#[derive(Debug, Clone)]
pub struct Variables {
    /// flow carried by each tunnel
    pub flow: TiVec<TunnelIndex, Var>,
    /// capacity of edge e allocated directly to tunnel t, indexed (e, t)
    pub direct: HashMap<(EdgeIndex, TunnelIndex), Var>,
    /// capacity of shortcut s allocated to tunnel t, indexed (s, t)
    pub bypass: HashMap<(ShortcutIndex, TunnelIndex), Var>,
    /// wavelengths lit on each shortcut, taken from the pool
    pub wavelength: TiVec<ShortcutIndex, Var>,
}

impl Variables {
    /// Creates flow and allocation variables for `network`, prefixed by
    /// `label`. Wavelength variables are looked up in `pool`.
    pub fn new(
        program: &mut Program,
        network: &Network,
        label: &str,
        pool: &WavelengthPool,
    ) -> Result<Variables, ModelError> {
        let flow = network
            .tunnels()
            .iter()
            .map(|t| program.cont(&format!("{}_f_{}", label, t.path())))
            .collect();

        let mut direct = HashMap::new();
        for (e, edge) in network.edges().iter_enumerated() {
            for &t in edge.tunnels() {
                let name = format!("{}_x_{}_{}", label, network.edge_label(e), network.tunnels()[t].path());
                direct.insert((e, t), program.cont(&name));
            }
        }

        let mut bypass = HashMap::new();
        for (s, shortcut) in network.shortcuts().iter_enumerated() {
            for &t in shortcut.tunnels() {
                let name = format!("{}_y_{}_{}", label, shortcut.path(), network.tunnels()[t].path());
                bypass.insert((s, t), program.cont(&name));
            }
        }

        let wavelength = network
            .shortcuts()
            .iter()
            .map(|s| {
                pool.get(s.path())
                    .ok_or_else(|| ModelError::MissingWavelength(s.path().to_string()))
            })
            .collect::<Result<TiVec<ShortcutIndex, Var>, ModelError>>()?;

        Ok(Variables {
            flow,
            direct,
            bypass,
            wavelength,
        })
    }
}
