//! The in-memory topology: nodes, directed edges, demands, tunnels and
//! shortcuts. Entities live in typed arenas and refer to each other by index,
//! so the many-to-many bookkeeping between edges, tunnels and shortcuts never
//! needs shared ownership.

pub mod graph;

use std::collections::{BTreeSet, HashMap};

use derive_more::{Deref, From, Into};
use log::{debug, trace};
use typed_index_collections::TiVec;

use crate::error::TopologyError;

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct NodeIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct EdgeIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct DemandIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct TunnelIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct ShortcutIndex(usize);

/// Bandwidth of a single wavelength, in Gb/s.
pub type Unity = u32;
/// Traffic volume and link capacity, in Gb/s.
pub type Quantity = f64;
/// Physical distance, in km.
pub type Distance = f64;

/// The separator used in path strings, e.g. `SEA:DEN:CHI`.
pub const PATH_SEPARATOR: &str = ":";

/// Joins node codes into a path string.
pub fn path_string<S: AsRef<str>>(nodes: &[S]) -> String {
    nodes
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

/// Whether `inner` occurs as a contiguous run inside `outer`.
pub fn contains_subpath(outer: &[NodeIndex], inner: &[NodeIndex]) -> bool {
    !inner.is_empty()
        && inner.len() <= outer.len()
        && outer.windows(inner.len()).any(|w| w == inner)
}

/// A market. Attributes are only ever added to.
#[derive(Debug, Clone)]
pub struct Node {
    code: String,
    position: Option<(f64, f64)>,
    devices: BTreeSet<String>,
    regions: BTreeSet<String>,
}

impl Node {
    fn new(code: &str) -> Self {
        Node {
            code: code.to_string(),
            position: None,
            devices: BTreeSet::new(),
            regions: BTreeSet::new(),
        }
    }

    fn update(&mut self, region: Option<&str>, device: Option<&str>) {
        if let Some(region) = region {
            self.regions.insert(region.to_string());
        }
        if let Some(device) = device {
            self.devices.insert(device.to_string());
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// (latitude, longitude), once known
    pub fn position(&self) -> Option<(f64, f64)> {
        self.position
    }

    pub fn devices(&self) -> &BTreeSet<String> {
        &self.devices
    }

    pub fn regions(&self) -> &BTreeSet<String> {
        &self.regions
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    src: NodeIndex,
    dst: NodeIndex,
    unity: Unity,
    capacity: Quantity,
    distance: Option<Distance>,
    /// Shortcuts routed over this edge
    shortcuts: Vec<ShortcutIndex>,
    /// Tunnels routed over this edge
    tunnels: Vec<TunnelIndex>,
}

impl Edge {
    pub fn src(&self) -> NodeIndex {
        self.src
    }

    pub fn dst(&self) -> NodeIndex {
        self.dst
    }

    pub fn unity(&self) -> Unity {
        self.unity
    }

    pub fn capacity(&self) -> Quantity {
        self.capacity
    }

    pub fn distance(&self) -> Option<Distance> {
        self.distance
    }

    pub fn shortcuts(&self) -> &[ShortcutIndex] {
        &self.shortcuts
    }

    pub fn tunnels(&self) -> &[TunnelIndex] {
        &self.tunnels
    }

    /// The endpoints with the smaller index first.
    pub fn unordered(&self) -> (NodeIndex, NodeIndex) {
        unordered(self.src, self.dst)
    }
}

/// Normalizes a node pair so that both orientations compare equal.
pub fn unordered(a: NodeIndex, b: NodeIndex) -> (NodeIndex, NodeIndex) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone)]
pub struct Demand {
    src: NodeIndex,
    dst: NodeIndex,
    amount: Quantity,
    tunnels: Vec<TunnelIndex>,
}

impl Demand {
    pub fn src(&self) -> NodeIndex {
        self.src
    }

    pub fn dst(&self) -> NodeIndex {
        self.dst
    }

    /// The required volume, already multiplied by the demand scale.
    pub fn amount(&self) -> Quantity {
        self.amount
    }

    pub fn tunnels(&self) -> &[TunnelIndex] {
        &self.tunnels
    }

    /// A demand without tunnels cannot be routed and must be pruned.
    pub fn is_void(&self) -> bool {
        self.tunnels.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Tunnel {
    path: String,
    nodes: Vec<NodeIndex>,
    edges: Vec<EdgeIndex>,
    /// Shortcuts contained in this tunnel
    shortcuts: Vec<ShortcutIndex>,
}

impl Tunnel {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeIndex] {
        &self.edges
    }

    pub fn shortcuts(&self) -> &[ShortcutIndex] {
        &self.shortcuts
    }

    pub fn src(&self) -> NodeIndex {
        self.nodes[0]
    }

    pub fn dst(&self) -> NodeIndex {
        self.nodes[self.nodes.len() - 1]
    }
}

/// A candidate optical bypass over a contiguous run of edges.
#[derive(Debug, Clone)]
pub struct Shortcut {
    path: String,
    nodes: Vec<NodeIndex>,
    edges: Vec<EdgeIndex>,
    unity: Unity,
    distance: Distance,
    /// Tunnels that contain this shortcut
    tunnels: Vec<TunnelIndex>,
}

impl Shortcut {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeIndex] {
        &self.edges
    }

    pub fn unity(&self) -> Unity {
        self.unity
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    pub fn tunnels(&self) -> &[TunnelIndex] {
        &self.tunnels
    }

    /// The number of edges bypassed, which is also the weight of the shortcut
    /// in the wavelength objective.
    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    pub fn src(&self) -> NodeIndex {
        self.nodes[0]
    }

    pub fn dst(&self) -> NodeIndex {
        self.nodes[self.nodes.len() - 1]
    }
}

/// All entities of one topology, keyed by their string identities.
#[derive(Debug, Clone, Default)]
pub struct Network {
    name: String,
    nodes: TiVec<NodeIndex, Node>,
    edges: TiVec<EdgeIndex, Edge>,
    demands: TiVec<DemandIndex, Demand>,
    tunnels: TiVec<TunnelIndex, Tunnel>,
    shortcuts: TiVec<ShortcutIndex, Shortcut>,
    node_lookup: HashMap<String, NodeIndex>,
    edge_lookup: HashMap<(NodeIndex, NodeIndex), EdgeIndex>,
    demand_lookup: HashMap<(NodeIndex, NodeIndex), DemandIndex>,
    tunnel_lookup: HashMap<String, TunnelIndex>,
    shortcut_lookup: HashMap<String, ShortcutIndex>,
}

impl Network {
    pub fn new(name: &str) -> Self {
        Network {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &TiVec<NodeIndex, Node> {
        &self.nodes
    }

    pub fn edges(&self) -> &TiVec<EdgeIndex, Edge> {
        &self.edges
    }

    pub fn demands(&self) -> &TiVec<DemandIndex, Demand> {
        &self.demands
    }

    pub fn tunnels(&self) -> &TiVec<TunnelIndex, Tunnel> {
        &self.tunnels
    }

    pub fn shortcuts(&self) -> &TiVec<ShortcutIndex, Shortcut> {
        &self.shortcuts
    }

    pub fn node(&self, code: &str) -> Option<NodeIndex> {
        self.node_lookup.get(code).copied()
    }

    pub fn code(&self, node: NodeIndex) -> &str {
        self.nodes[node].code()
    }

    pub fn edge_between(&self, src: NodeIndex, dst: NodeIndex) -> Option<EdgeIndex> {
        self.edge_lookup.get(&(src, dst)).copied()
    }

    pub fn edge(&self, src: &str, dst: &str) -> Option<EdgeIndex> {
        self.edge_between(self.node(src)?, self.node(dst)?)
    }

    pub fn demand(&self, src: &str, dst: &str) -> Option<DemandIndex> {
        self.demand_lookup
            .get(&(self.node(src)?, self.node(dst)?))
            .copied()
    }

    pub fn tunnel(&self, path: &str) -> Option<TunnelIndex> {
        self.tunnel_lookup.get(path).copied()
    }

    pub fn shortcut(&self, path: &str) -> Option<ShortcutIndex> {
        self.shortcut_lookup.get(path).copied()
    }

    /// `src-dst` label of an edge, as used in failure records.
    pub fn edge_label(&self, edge: EdgeIndex) -> String {
        let edge = &self.edges[edge];
        format!("{}-{}", self.code(edge.src), self.code(edge.dst))
    }

    /// Upserts a node, merging in the region and device.
    pub fn add_node(&mut self, code: &str, region: Option<&str>, device: Option<&str>) -> NodeIndex {
        let index = match self.node_lookup.get(code) {
            Some(&index) => index,
            None => {
                let index = self.nodes.push_and_get_key(Node::new(code));
                self.node_lookup.insert(code.to_string(), index);
                index
            }
        };
        self.nodes[index].update(region, device);
        index
    }

    /// Sets the coordinates of a node. Later calls overwrite earlier ones.
    pub fn set_position(&mut self, node: NodeIndex, latitude: f64, longitude: f64) {
        self.nodes[node].position = Some((latitude, longitude));
    }

    /// Upserts the directed edge `src -> dst`. Declaring an existing edge again
    /// adds to its capacity. Self-loops are not edges and yield `None`.
    pub fn add_edge(
        &mut self,
        src: &str,
        dst: &str,
        unity: Unity,
        capacity: Quantity,
    ) -> Result<Option<EdgeIndex>, TopologyError> {
        if capacity < 0.0 {
            return Err(TopologyError::NegativeCapacity(capacity));
        }
        let a = self.add_node(src, None, None);
        let b = self.add_node(dst, None, None);
        if a == b {
            return Ok(None);
        }

        let index = match self.edge_lookup.get(&(a, b)) {
            Some(&index) => {
                self.edges[index].capacity += capacity;
                index
            }
            None => {
                let index = self.edges.push_and_get_key(Edge {
                    src: a,
                    dst: b,
                    unity,
                    capacity,
                    distance: None,
                    shortcuts: Vec::new(),
                    tunnels: Vec::new(),
                });
                self.edge_lookup.insert((a, b), index);
                index
            }
        };

        Ok(Some(index))
    }

    /// Records the physical length of an edge. It can be set only once.
    pub fn set_edge_distance(
        &mut self,
        edge: EdgeIndex,
        distance: Distance,
    ) -> Result<(), TopologyError> {
        if self.edges[edge].distance.is_some() {
            let e = &self.edges[edge];
            return Err(TopologyError::DistanceAlreadySet(
                self.code(e.src).to_string(),
                self.code(e.dst).to_string(),
            ));
        }
        self.edges[edge].distance = Some(distance);
        Ok(())
    }

    pub fn set_edge_unity(&mut self, edge: EdgeIndex, unity: Unity) {
        self.edges[edge].unity = unity;
    }

    /// Upserts a demand. The amount is scaled only when the demand is created.
    pub fn add_demand(&mut self, src: &str, dst: &str, amount: Quantity, scale: f64) -> DemandIndex {
        let a = self.add_node(src, None, None);
        let b = self.add_node(dst, None, None);
        match self.demand_lookup.get(&(a, b)) {
            Some(&index) => index,
            None => {
                let index = self.demands.push_and_get_key(Demand {
                    src: a,
                    dst: b,
                    amount: amount * scale,
                    tunnels: Vec::new(),
                });
                self.demand_lookup.insert((a, b), index);
                index
            }
        }
    }

    /// Resolves consecutive node pairs of a path to existing edges.
    fn resolve_path<S: AsRef<str>>(
        &self,
        path: &[S],
    ) -> Result<(Vec<NodeIndex>, Vec<EdgeIndex>), TopologyError> {
        if path.len() < 2 {
            return Err(TopologyError::EmptyPath);
        }
        let missing = |a: &S, b: &S| {
            TopologyError::MissingEdge(a.as_ref().to_string(), b.as_ref().to_string())
        };

        let mut edges = Vec::with_capacity(path.len() - 1);
        for pair in path.windows(2) {
            let edge = self
                .edge(pair[0].as_ref(), pair[1].as_ref())
                .ok_or_else(|| missing(&pair[0], &pair[1]))?;
            edges.push(edge);
        }

        let mut nodes = Vec::with_capacity(path.len());
        nodes.push(self.edges[edges[0]].src);
        nodes.extend(edges.iter().map(|&e| self.edges[e].dst));
        Ok((nodes, edges))
    }

    /// Adds a tunnel over existing edges and attaches it to the demand between
    /// its endpoints, if there is one. Adding a known path returns the
    /// existing tunnel.
    pub fn add_tunnel<S: AsRef<str>>(&mut self, path: &[S]) -> Result<TunnelIndex, TopologyError> {
        let path_str = path_string(path);
        if let Some(&index) = self.tunnel_lookup.get(&path_str) {
            return Ok(index);
        }

        let (nodes, edges) = self.resolve_path(path)?;
        let tunnel = self.tunnels.push_and_get_key(Tunnel {
            path: path_str.clone(),
            nodes,
            edges,
            shortcuts: Vec::new(),
        });
        self.tunnel_lookup.insert(path_str, tunnel);

        let edges = self.tunnels[tunnel].edges.clone();
        for e in edges {
            let tunnels = &mut self.edges[e].tunnels;
            if !tunnels.contains(&tunnel) {
                tunnels.push(tunnel);
            }
        }

        let (src, dst) = (self.tunnels[tunnel].src(), self.tunnels[tunnel].dst());
        if let Some(&demand) = self.demand_lookup.get(&(src, dst)) {
            self.attach_tunnel(demand, tunnel)?;
        }

        trace!("added tunnel {}", self.tunnels[tunnel].path);
        Ok(tunnel)
    }

    /// Makes `tunnel` usable for `demand`. The tunnel must start at the
    /// demand's source and end at its destination.
    pub fn attach_tunnel(
        &mut self,
        demand: DemandIndex,
        tunnel: TunnelIndex,
    ) -> Result<(), TopologyError> {
        let t = &self.tunnels[tunnel];
        let d = &self.demands[demand];
        if t.src() != d.src || t.dst() != d.dst {
            return Err(TopologyError::EndpointMismatch {
                tunnel: t.path.clone(),
                src: self.code(d.src).to_string(),
                dst: self.code(d.dst).to_string(),
            });
        }
        let tunnels = &mut self.demands[demand].tunnels;
        if !tunnels.contains(&tunnel) {
            tunnels.push(tunnel);
        }
        Ok(())
    }

    /// Adds a candidate shortcut and cross-links it with every tunnel that
    /// contains its node sequence. Shortcuts with zero unity are rejected.
    /// Adding a known path returns the existing shortcut.
    pub fn add_shortcut<S: AsRef<str>>(
        &mut self,
        path: &[S],
        unity: Unity,
        distance: Distance,
    ) -> Result<ShortcutIndex, TopologyError> {
        let path_str = path_string(path);
        if unity == 0 {
            return Err(TopologyError::NotViable(path_str));
        }
        if let Some(&index) = self.shortcut_lookup.get(&path_str) {
            return Ok(index);
        }

        let (nodes, edges) = self.resolve_path(path)?;
        let shortcut = self.shortcuts.push_and_get_key(Shortcut {
            path: path_str.clone(),
            nodes,
            edges,
            unity,
            distance,
            tunnels: Vec::new(),
        });
        self.shortcut_lookup.insert(path_str, shortcut);

        let edges = self.shortcuts[shortcut].edges.clone();
        for e in edges {
            let shortcuts = &mut self.edges[e].shortcuts;
            if !shortcuts.contains(&shortcut) {
                shortcuts.push(shortcut);
            }
        }

        let containing: Vec<TunnelIndex> = self
            .tunnels
            .iter_enumerated()
            .filter(|(_, t)| contains_subpath(&t.nodes, &self.shortcuts[shortcut].nodes))
            .map(|(index, _)| index)
            .collect();
        for tunnel in containing {
            self.attach_shortcut(shortcut, tunnel)?;
        }

        debug!(
            "added shortcut {} (unity {}, {:.0} km, {} tunnels)",
            self.shortcuts[shortcut].path,
            unity,
            distance,
            self.shortcuts[shortcut].tunnels.len()
        );
        Ok(shortcut)
    }

    /// Lets `tunnel` use `shortcut`. The shortcut's node sequence must be a
    /// contiguous part of the tunnel's.
    pub fn attach_shortcut(
        &mut self,
        shortcut: ShortcutIndex,
        tunnel: TunnelIndex,
    ) -> Result<(), TopologyError> {
        let s = &self.shortcuts[shortcut];
        let t = &self.tunnels[tunnel];
        if !contains_subpath(&t.nodes, &s.nodes) {
            return Err(TopologyError::NotContained {
                shortcut: s.path.clone(),
                tunnel: t.path.clone(),
            });
        }
        if !self.shortcuts[shortcut].tunnels.contains(&tunnel) {
            self.shortcuts[shortcut].tunnels.push(tunnel);
        }
        if !self.tunnels[tunnel].shortcuts.contains(&shortcut) {
            self.tunnels[tunnel].shortcuts.push(shortcut);
        }
        Ok(())
    }

    /// Removes demands that no tunnel serves. Returns how many were removed.
    pub fn prune_void_demands(&mut self) -> usize {
        let before = self.demands.len();
        let kept: Vec<Demand> = std::mem::take(&mut self.demands)
            .into_iter()
            .filter(|d| !d.is_void())
            .collect();
        self.demands = kept.into();
        self.demand_lookup = self
            .demands
            .iter_enumerated()
            .map(|(index, d)| ((d.src, d.dst), index))
            .collect();

        let removed = before - self.demands.len();
        if removed > 0 {
            debug!("pruned {} demands without tunnels", removed);
        }
        removed
    }

    /// Distinct undirected links, in order of first appearance. Both
    /// orientations of a link map to the same position.
    pub fn links(&self) -> Vec<(NodeIndex, NodeIndex)> {
        let mut seen = std::collections::HashSet::new();
        self.edges
            .iter()
            .map(Edge::unordered)
            .filter(|pair| seen.insert(*pair))
            .collect()
    }

    /// The sum of all demand volumes.
    pub fn total_demand(&self) -> Quantity {
        self.demands.iter().map(Demand::amount).sum()
    }
}
