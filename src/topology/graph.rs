//! A read-only `petgraph` view over a [`Network`], with the path searches the
//! discovery and ingestion steps need.

use float_ord::FloatOrd;
use petgraph::{
    algo,
    graph::{DiGraph, NodeIndex as Vertex, UnGraph},
};

use super::{Distance, Network, NodeIndex};

/// The network as a directed graph weighted by edge length, plus its
/// undirected skeleton. Vertex `i` is network node `i`.
#[derive(Debug, Clone)]
pub struct GraphView {
    directed: DiGraph<NodeIndex, Distance>,
    undirected: UnGraph<NodeIndex, ()>,
}

impl GraphView {
    pub fn new(network: &Network) -> Self {
        let mut directed = DiGraph::with_capacity(network.nodes().len(), network.edges().len());
        let mut undirected = UnGraph::with_capacity(network.nodes().len(), network.edges().len());
        for (node, _) in network.nodes().iter_enumerated() {
            directed.add_node(node);
            undirected.add_node(node);
        }
        for edge in network.edges() {
            let (a, b) = (vertex(edge.src()), vertex(edge.dst()));
            // edges without a known length count as zero
            directed.add_edge(a, b, edge.distance().unwrap_or(0.0));
            undirected.update_edge(a, b, ());
        }
        GraphView {
            directed,
            undirected,
        }
    }

    pub fn node_count(&self) -> usize {
        self.directed.node_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.directed.node_indices().map(move |v| self.directed[v])
    }

    pub fn has_edge(&self, src: NodeIndex, dst: NodeIndex) -> bool {
        self.directed.contains_edge(vertex(src), vertex(dst))
    }

    /// Whether there is an edge between the nodes in either direction.
    pub fn adjacent(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.has_edge(a, b) || self.has_edge(b, a)
    }

    /// Summed edge length along a node path.
    pub fn path_distance(&self, path: &[NodeIndex]) -> Option<Distance> {
        path.windows(2)
            .map(|w| {
                self.directed
                    .find_edge(vertex(w[0]), vertex(w[1]))
                    .map(|e| self.directed[e])
            })
            .sum()
    }

    fn nodes_of(&self, path: Vec<Vertex>) -> Vec<NodeIndex> {
        path.into_iter().map(|v| self.directed[v]).collect()
    }

    /// Simple paths with exactly `intermediate` nodes between the endpoints,
    /// sorted so ties are resolved the same way on every run.
    fn simple_paths(
        &self,
        src: NodeIndex,
        dst: NodeIndex,
        intermediate: usize,
    ) -> Vec<Vec<NodeIndex>> {
        let mut paths: Vec<Vec<NodeIndex>> = algo::all_simple_paths::<Vec<Vertex>, _>(
            &self.directed,
            vertex(src),
            vertex(dst),
            intermediate,
            Some(intermediate),
        )
        .map(|p| self.nodes_of(p))
        .collect();
        paths.sort();
        paths
    }

    /// Every hop-minimal path from `src` to `dst`, provided the minimum is at
    /// most `max_hops` edges.
    pub fn all_shortest_paths(
        &self,
        src: NodeIndex,
        dst: NodeIndex,
        max_hops: usize,
    ) -> Vec<Vec<NodeIndex>> {
        if src == dst || max_hops == 0 {
            return Vec::new();
        }
        (0..max_hops)
            .map(|intermediate| self.simple_paths(src, dst, intermediate))
            .find(|paths| !paths.is_empty())
            .unwrap_or_default()
    }

    /// Among the hop-minimal paths of at most `max_hops` edges, the one with
    /// the smallest summed distance.
    pub fn shortest_path_by_distance(
        &self,
        src: NodeIndex,
        dst: NodeIndex,
        max_hops: usize,
    ) -> Option<(Vec<NodeIndex>, Distance)> {
        self.all_shortest_paths(src, dst, max_hops)
            .into_iter()
            .filter_map(|p| {
                let d = self.path_distance(&p)?;
                Some((p, d))
            })
            .min_by_key(|(_, d)| FloatOrd(*d))
    }

    /// Up to `k` loop-free paths from `src` to `dst` in order of increasing
    /// hop count. Paths of equal length are ordered by node index.
    pub fn k_shortest_paths(
        &self,
        src: NodeIndex,
        dst: NodeIndex,
        k: usize,
    ) -> Vec<Vec<NodeIndex>> {
        if src == dst
            || k == 0
            || !algo::has_path_connecting(&self.directed, vertex(src), vertex(dst), None)
        {
            return Vec::new();
        }
        let mut paths = Vec::new();
        for intermediate in 0..self.node_count().saturating_sub(1) {
            paths.extend(self.simple_paths(src, dst, intermediate));
            if paths.len() >= k {
                break;
            }
        }
        paths.truncate(k);
        paths
    }

    /// Hop distance between two nodes, ignoring edge direction.
    pub fn undirected_hops(&self, a: NodeIndex, b: NodeIndex) -> Option<usize> {
        algo::dijkstra(&self.undirected, vertex(a), Some(vertex(b)), |_| 1usize)
            .get(&vertex(b))
            .copied()
    }
}

fn vertex(node: NodeIndex) -> Vertex {
    Vertex::new(*node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Network {
        // A - B - C
        // |       |
        // D - E - F
        let mut network = Network::new("grid");
        let links = [
            ("A", "B", 10.0),
            ("B", "C", 10.0),
            ("A", "D", 1.0),
            ("D", "E", 1.0),
            ("E", "F", 1.0),
            ("C", "F", 1.0),
        ];
        for (a, b, d) in links {
            for (x, y) in [(a, b), (b, a)] {
                let e = network.add_edge(x, y, 200, 100.0).unwrap().unwrap();
                network.set_edge_distance(e, d).unwrap();
            }
        }
        network
    }

    fn names(network: &Network, path: &[NodeIndex]) -> String {
        path.iter().map(|&n| network.code(n)).collect::<Vec<_>>().join(":")
    }

    #[test]
    fn shortest_paths_respect_hop_bound() {
        let network = grid();
        let graph = GraphView::new(&network);
        let a = network.node("A").unwrap();
        let c = network.node("C").unwrap();
        assert_eq!(graph.all_shortest_paths(a, c, 2).len(), 1);
        assert!(graph.all_shortest_paths(a, c, 1).is_empty());
    }

    #[test]
    fn ties_break_on_distance() {
        let network = grid();
        let graph = GraphView::new(&network);
        let a = network.node("A").unwrap();
        let f = network.node("F").unwrap();
        // A:B:C:F and A:D:E:F both take three hops
        assert_eq!(graph.all_shortest_paths(a, f, 3).len(), 2);
        let (path, distance) = graph.shortest_path_by_distance(a, f, 3).unwrap();
        assert_eq!(names(&network, &path), "A:D:E:F");
        assert_eq!(distance, 3.0);
    }

    #[test]
    fn k_shortest_paths_grow_by_length() {
        let network = grid();
        let graph = GraphView::new(&network);
        let a = network.node("A").unwrap();
        let c = network.node("C").unwrap();
        let paths = graph.k_shortest_paths(a, c, 5);
        let labels: Vec<String> = paths.iter().map(|p| names(&network, p)).collect();
        assert_eq!(labels, vec!["A:B:C", "A:D:E:F:C"]);
        assert_eq!(graph.k_shortest_paths(a, c, 1), paths[..1].to_vec());
        assert!(graph.k_shortest_paths(a, a, 5).is_empty());
    }

    #[test]
    fn undirected_hops_ignore_direction() {
        let mut network = Network::new("one-way");
        network.add_edge("A", "B", 200, 1.0).unwrap();
        network.add_edge("C", "B", 200, 1.0).unwrap();
        let graph = GraphView::new(&network);
        let a = network.node("A").unwrap();
        let c = network.node("C").unwrap();
        assert_eq!(graph.undirected_hops(a, c), Some(2));
        assert!(graph.all_shortest_paths(a, c, 5).is_empty());
    }
}
