//! Discovery of candidate optical bypasses between non-adjacent markets.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ModelError, TopologyError},
    topology::{graph::GraphView, Distance, Network, NodeIndex, ShortcutIndex, Unity},
};

/// The bandwidth of one wavelength over a path of the given length. Paths
/// longer than 5000 km cannot be lit and get zero.
pub fn unity_from_distance(distance: Distance) -> Unity {
    if distance <= 800.0 {
        200
    } else if distance <= 2500.0 {
        150
    } else if distance <= 5000.0 {
        100
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// The maximum number of edges a shortcut may bypass
    pub max_hops: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig { max_hops: 3 }
    }
}

/// The shortcut registered for each ordered endpoint pair. Every pair has its
/// mirror registered as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutPairs(BTreeMap<(NodeIndex, NodeIndex), ShortcutIndex>);

impl ShortcutPairs {
    pub fn get(&self, src: NodeIndex, dst: NodeIndex) -> Option<ShortcutIndex> {
        self.0.get(&(src, dst)).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((NodeIndex, NodeIndex), ShortcutIndex)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }

    /// Each (a -> b, b -> a) pair once, with `a < b`.
    pub fn mirrored(&self) -> impl Iterator<Item = (ShortcutIndex, ShortcutIndex)> + '_ {
        self.0
            .iter()
            .filter(|((a, b), _)| a < b)
            .filter_map(|(&(a, b), &s)| Some((s, self.get(b, a)?)))
    }

    /// Fails if some pair lacks its mirror.
    pub fn check_mirrored(&self, network: &Network) -> Result<(), ModelError> {
        for (&(a, b), &s) in &self.0 {
            if !self.0.contains_key(&(b, a)) {
                return Err(ModelError::UnpairedShortcut(
                    network.shortcuts()[s].path().to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Registers a shortcut for every ordered pair of distinct, non-adjacent
/// nodes that are joined by a hop-minimal path of at most `max_hops` edges.
/// The reverse pair reuses the mirrored path, so shortcuts always come in
/// pairs. Pairs whose path is too long to light, or whose mirror would use a
/// missing edge, are skipped.
pub fn discover_shortcuts(
    network: &mut Network,
    graph: &GraphView,
    config: &DiscoveryConfig,
) -> Result<ShortcutPairs, ModelError> {
    info!(
        "Discovering shortcuts of at most {} hops over {} nodes",
        config.max_hops,
        graph.node_count()
    );
    let mut pairs = ShortcutPairs::default();

    for a in graph.nodes() {
        for b in graph.nodes() {
            if a == b || graph.adjacent(a, b) {
                continue;
            }

            let (nodes, distance) = match pairs.get(b, a) {
                Some(mirror) => {
                    let mirror = &network.shortcuts()[mirror];
                    let mut nodes = mirror.nodes().to_vec();
                    nodes.reverse();
                    (nodes, mirror.distance())
                }
                None => match graph.shortest_path_by_distance(a, b, config.max_hops) {
                    Some(found) => found,
                    None => continue,
                },
            };

            let path: Vec<String> = nodes.iter().map(|&n| network.code(n).to_string()).collect();
            let reverse_exists = nodes.windows(2).all(|w| graph.has_edge(w[1], w[0]));
            if !reverse_exists {
                debug!("skipping {}: no reverse path", path.join(":"));
                continue;
            }

            match network.add_shortcut(&path, unity_from_distance(distance), distance) {
                Ok(shortcut) => {
                    pairs.0.insert((a, b), shortcut);
                }
                Err(TopologyError::NotViable(p)) => debug!("skipping {}: too long to light", p),
                Err(e) => warn!("skipping shortcut {}: {}", path.join(":"), e),
            }
        }
    }

    pairs.check_mirrored(network)?;
    info!("Found {} shortcuts", pairs.len());
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(lengths: [f64; 4]) -> Network {
        let mut network = Network::new("ring");
        let links = [("A", "B"), ("B", "C"), ("C", "D"), ("D", "A")];
        for ((a, b), d) in links.into_iter().zip(lengths) {
            for (x, y) in [(a, b), (b, a)] {
                let e = network.add_edge(x, y, 200, 100.0).unwrap().unwrap();
                network.set_edge_distance(e, d).unwrap();
            }
        }
        network
    }

    #[test]
    fn unity_tiers() {
        assert_eq!(unity_from_distance(0.0), 200);
        assert_eq!(unity_from_distance(800.0), 200);
        assert_eq!(unity_from_distance(800.1), 150);
        assert_eq!(unity_from_distance(2500.0), 150);
        assert_eq!(unity_from_distance(5000.0), 100);
        assert_eq!(unity_from_distance(5000.1), 0);
    }

    #[test]
    fn ring_shortcuts_come_in_mirrored_pairs() {
        let mut network = ring([100.0, 200.0, 500.0, 500.0]);
        let graph = GraphView::new(&network);
        let pairs = discover_shortcuts(&mut network, &graph, &DiscoveryConfig { max_hops: 2 })
            .unwrap();

        // A-C and B-D, both directions
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs.mirrored().count(), 2);

        let ac = network.shortcut("A:B:C").unwrap();
        let ca = network.shortcut("C:B:A").unwrap();
        assert_eq!(network.shortcuts()[ac].distance(), 300.0);
        assert_eq!(network.shortcuts()[ca].distance(), 300.0);
        assert_eq!(network.shortcuts()[ac].unity(), 200);
        assert!(network.shortcut("A:D:C").is_none());
    }

    #[test]
    fn long_paths_are_skipped() {
        let mut network = ring([3000.0, 3000.0, 3000.0, 3000.0]);
        let graph = GraphView::new(&network);
        let pairs = discover_shortcuts(&mut network, &graph, &DiscoveryConfig { max_hops: 2 })
            .unwrap();
        assert!(pairs.is_empty());
        assert!(network.shortcuts().is_empty());
    }

    #[test]
    fn hop_bound_limits_discovery() {
        let mut network = ring([1.0; 4]);
        let graph = GraphView::new(&network);
        let pairs = discover_shortcuts(&mut network, &graph, &DiscoveryConfig { max_hops: 1 })
            .unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn discovery_is_idempotent() {
        let mut network = ring([100.0, 200.0, 500.0, 500.0]);
        let graph = GraphView::new(&network);
        let config = DiscoveryConfig { max_hops: 2 };
        let first = discover_shortcuts(&mut network, &graph, &config).unwrap();
        let count = network.shortcuts().len();
        let second = discover_shortcuts(&mut network, &graph, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(network.shortcuts().len(), count);
    }
}
