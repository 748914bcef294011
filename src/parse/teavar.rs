//! The public TeaVaR data sets: a directory per network holding
//! `topology.txt` (`to_node from_node capacity ...`, Mb/s) and `demand.txt`
//! (one flattened N×N traffic matrix per line, Mb/s, nodes numbered from 1).
//! Tunnels are the k shortest simple paths between every pair of nodes.

use std::{fs, path::Path};

use log::{info, warn};

use super::malformed;
use crate::{error::ParseError, topology::graph::GraphView, topology::Network};

/// Unity of every edge; these data sets carry no coordinates.
const EDGE_UNITY: u32 = 100;
/// Tunnels per ordered node pair.
pub const TUNNELS_PER_PAIR: usize = 5;

fn data_lines(contents: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    contents
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.split_whitespace().collect::<Vec<_>>()))
        .filter(|(_, fields)| !fields.is_empty() && fields[0] != "to_node")
}

fn number(value: &str, path: &Path, line: usize) -> Result<f64, ParseError> {
    value
        .parse()
        .map_err(|_| malformed(path, line, format!("{} is not a number", value)))
}

pub fn read_topology(path: &Path, network: &mut Network) -> Result<usize, ParseError> {
    let contents = fs::read_to_string(path)?;
    let mut count = 0;
    for (line, fields) in data_lines(&contents) {
        if fields.len() < 3 {
            return Err(malformed(path, line, "expected to_node from_node capacity"));
        }
        let (to, from) = (fields[0], fields[1]);
        let capacity = number(fields[2], path, line)? / 1000.0;
        network.add_node(to, None, None);
        network.add_node(from, None, None);
        match network.add_edge(from, to, EDGE_UNITY, capacity) {
            Ok(_) => count += 1,
            Err(e) => warn!("{}:{}: {}", path.display(), line, e),
        }
    }
    Ok(count)
}

/// Each demand is the largest volume its pair sees over all matrices.
pub fn read_demands(path: &Path, network: &mut Network, scale: f64) -> Result<usize, ParseError> {
    let contents = fs::read_to_string(path)?;
    let n = network.nodes().len();
    let mut peak = vec![0.0f64; n * n];
    let mut matrices = 0;

    for (line, fields) in data_lines(&contents) {
        if fields.len() != n * n {
            return Err(malformed(
                path,
                line,
                format!("expected {} values, found {}", n * n, fields.len()),
            ));
        }
        for (i, value) in fields.iter().enumerate() {
            peak[i] = peak[i].max(number(value, path, line)? / 1000.0);
        }
        matrices += 1;
    }

    for i in 0..n {
        for j in 0..n {
            let (src, dst) = ((i + 1).to_string(), (j + 1).to_string());
            if network.node(&src).is_none() || network.node(&dst).is_none() {
                return Err(malformed(path, 0, format!("no node {} or {}", src, dst)));
            }
            if i != j && matrices > 0 {
                network.add_demand(&src, &dst, peak[i * n + j], scale);
            }
        }
    }
    Ok(matrices)
}

/// Adds the `k` shortest simple paths between every ordered pair as tunnels.
pub fn add_shortest_tunnels(network: &mut Network, k: usize) -> usize {
    let graph = GraphView::new(network);
    let mut count = 0;
    for a in graph.nodes() {
        for b in graph.nodes() {
            if a == b {
                continue;
            }
            for path in graph.k_shortest_paths(a, b, k) {
                let codes: Vec<String> = path.iter().map(|&n| network.code(n).to_string()).collect();
                match network.add_tunnel(&codes) {
                    Ok(_) => count += 1,
                    Err(e) => warn!("skipping tunnel {}: {}", codes.join(":"), e),
                }
            }
        }
    }
    count
}

pub fn read_network(dir: &Path, name: &str, scale: f64) -> Result<Network, ParseError> {
    let mut network = Network::new(name);
    let links = read_topology(&dir.join("topology.txt"), &mut network)?;
    let matrices = read_demands(&dir.join("demand.txt"), &mut network, scale)?;
    let tunnels = add_shortest_tunnels(&mut network, TUNNELS_PER_PAIR);
    info!(
        "Read {} links, {} traffic matrices, {} tunnels",
        links, matrices, tunnels
    );
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("topology.txt"),
            "to_node from_node capacity prob_failure\n\
             2 1 100000 0.001\n\
             1 2 100000 0.001\n\
             3 2 200000 0.001\n\
             2 3 200000 0.001\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("demand.txt"),
            "0 1000 2000 1000 0 0 0 0 0\n\
             0 3000 1000 0  0 0 0 500 0\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn reads_topology_and_peak_demands() {
        let dir = fixture();
        let network = read_network(dir.path(), "toy", 1.0).unwrap();

        assert_eq!(network.nodes().len(), 3);
        let e = network.edge("2", "3").unwrap();
        assert_eq!(network.edges()[e].capacity(), 200.0);
        assert_eq!(network.edges()[e].unity(), 100);

        let d = network.demand("1", "2").unwrap();
        assert_eq!(network.demands()[d].amount(), 3.0);
        let d = network.demand("3", "2").unwrap();
        assert_eq!(network.demands()[d].amount(), 0.5);

        // a line has a single simple path per pair
        assert_eq!(network.tunnels().len(), 6);
        assert!(network.tunnel("1:2:3").is_some());
        let d = network.demand("1", "3").unwrap();
        assert_eq!(network.demands()[d].tunnels().len(), 1);
    }

    #[test]
    fn short_matrices_are_rejected() {
        let dir = fixture();
        fs::write(dir.path().join("demand.txt"), "0 1 2\n").unwrap();
        let err = read_network(dir.path(), "toy", 1.0).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 1, .. }));
    }
}
