//! The carrier CSV dumps. All four files have a header row.
//!
//! * traffic: `SrcRegion,DstRegion,SrcNode,DstNode,...,Volume` (Mb/s)
//! * topology: `StartRegion,StartDevice,StartInterface,_,EndRegion,EndDevice,EndInterface,_,OpState,_,Capacity` (Mb/s)
//! * sites: `SiteCode,_,Latitude,Longitude`
//! * paths: `Source,DestinationRegion,Path` with `:`-separated region codes

use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{clean_path, geo::assign_distances, malformed, IngestContext};
use crate::{error::ParseError, topology::Network};

/// Unity of a freshly declared edge, before the distance downgrade.
const EDGE_UNITY: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpwanFiles {
    pub traffic: String,
    pub topology: String,
    pub sites: String,
    pub paths: String,
    /// Ignore links whose operational state is not `Up`
    pub up_only: bool,
}

impl Default for CpwanFiles {
    fn default() -> Self {
        CpwanFiles {
            traffic: "traffic.csv".to_string(),
            topology: "topology.csv".to_string(),
            sites: "sites.csv".to_string(),
            paths: "paths.csv".to_string(),
            up_only: false,
        }
    }
}

fn records(path: &Path) -> Result<impl Iterator<Item = (usize, csv::Result<StringRecord>)>, ParseError> {
    let reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;
    // header is line 1
    Ok(reader.into_records().enumerate().map(|(i, r)| (i + 2, r)))
}

fn field<'r>(record: &'r StringRecord, index: usize, path: &Path, line: usize) -> Result<&'r str, ParseError> {
    record
        .get(index)
        .ok_or_else(|| malformed(path, line, format!("missing column {}", index)))
}

fn number(value: &str, path: &Path, line: usize) -> Result<f64, ParseError> {
    value
        .parse()
        .map_err(|_| malformed(path, line, format!("{} is not a number", value)))
}

/// Demands between markets, in Gb/s. Also learns which market each region
/// belongs to.
pub fn read_traffic(
    path: &Path,
    network: &mut Network,
    context: &mut IngestContext,
    scale: f64,
) -> Result<usize, ParseError> {
    let mut count = 0;
    for (line, record) in records(path)? {
        let record = record?;
        let src_region = field(&record, 0, path, line)?;
        let dst_region = field(&record, 1, path, line)?;
        let src = field(&record, 2, path, line)?;
        let dst = field(&record, 3, path, line)?;
        let volume = number(field(&record, record.len().saturating_sub(1), path, line)?, path, line)?;

        if let Err(e) = context
            .alias(src_region, src)
            .and_then(|_| context.alias(dst_region, dst))
        {
            warn!("{}:{}: {}", path.display(), line, e);
            continue;
        }
        network.add_node(src, Some(src_region), None);
        network.add_node(dst, Some(dst_region), None);
        if src == dst {
            continue;
        }
        network.add_demand(src, dst, volume / 1024.0, scale);
        count += 1;
    }
    Ok(count)
}

/// Links between markets, in Gb/s. Links within a region or a market are
/// ignored, as are links of unknown regions.
pub fn read_topology(
    path: &Path,
    network: &mut Network,
    context: &IngestContext,
    up_only: bool,
) -> Result<usize, ParseError> {
    let mut count = 0;
    for (line, record) in records(path)? {
        let record = record?;
        let region_a = field(&record, 0, path, line)?;
        let device_a = field(&record, 1, path, line)?;
        let region_b = field(&record, 4, path, line)?;
        let device_b = field(&record, 5, path, line)?;
        let state = field(&record, 8, path, line)?;
        let capacity = number(field(&record, 10, path, line)?, path, line)? / 1000.0;

        if region_a == region_b || (up_only && state != "Up") {
            continue;
        }
        let (a, b) = match (context.market(region_a), context.market(region_b)) {
            (Some(a), Some(b)) => (a, b),
            (None, _) => {
                warn!("{}:{}: unknown region {}", path.display(), line, region_a);
                continue;
            }
            (_, None) => {
                warn!("{}:{}: unknown region {}", path.display(), line, region_b);
                continue;
            }
        };
        if a == b {
            continue;
        }

        network.add_node(a, Some(region_a), Some(device_a));
        network.add_node(b, Some(region_b), Some(device_b));
        match network.add_edge(a, b, EDGE_UNITY, capacity) {
            Ok(_) => count += 1,
            Err(e) => warn!("{}:{}: {}", path.display(), line, e),
        }
    }
    Ok(count)
}

/// Coordinates of sites, matched to markets directly or through a region.
pub fn read_sites(path: &Path, network: &mut Network, context: &IngestContext) -> Result<usize, ParseError> {
    let mut count = 0;
    for (line, record) in records(path)? {
        let record = record?;
        let site = field(&record, 0, path, line)?;
        let latitude = number(field(&record, 2, path, line)?, path, line)?;
        let longitude = number(field(&record, 3, path, line)?, path, line)?;

        let node = network
            .node(site)
            .or_else(|| context.market(site).and_then(|m| network.node(m)));
        if let Some(node) = node {
            network.set_position(node, latitude, longitude);
            count += 1;
        }
    }
    Ok(count)
}

/// Tunnels over market paths. Rows with unknown regions, loops or missing
/// edges are skipped.
pub fn read_paths(path: &Path, network: &mut Network, context: &IngestContext) -> Result<usize, ParseError> {
    let mut count = 0;
    for (line, record) in records(path)? {
        let record = record?;
        let hops = field(&record, 2, path, line)?;

        let markets: Option<Vec<&str>> = hops.split(':').map(|r| context.market(r)).collect();
        let markets = match markets {
            Some(markets) => markets,
            None => {
                warn!("{}:{}: path {} has an unknown region", path.display(), line, hops);
                continue;
            }
        };
        let cleaned = match clean_path(&markets) {
            Ok(cleaned) => cleaned,
            Err(e) => {
                debug!("{}:{}: skipping: {}", path.display(), line, e);
                continue;
            }
        };
        match network.add_tunnel(&cleaned) {
            Ok(_) => count += 1,
            Err(e) => warn!("{}:{}: skipping tunnel: {}", path.display(), line, e),
        }
    }
    Ok(count)
}

/// Reads all four files from `dir`.
pub fn read_network_with(
    dir: &Path,
    name: &str,
    scale: f64,
    files: &CpwanFiles,
) -> Result<Network, ParseError> {
    let mut network = Network::new(name);
    let mut context = IngestContext::new();

    let demands = read_traffic(&dir.join(&files.traffic), &mut network, &mut context, scale)?;
    let links = read_topology(&dir.join(&files.topology), &mut network, &context, files.up_only)?;
    let sites = read_sites(&dir.join(&files.sites), &mut network, &context)?;
    let lengths = assign_distances(&mut network);
    let tunnels = read_paths(&dir.join(&files.paths), &mut network, &context)?;

    info!(
        "Read {} demands, {} links, {} sites, {} edge lengths, {} tunnels ({} regions)",
        demands,
        links,
        sites,
        lengths,
        tunnels,
        context.len()
    );
    Ok(network)
}

pub fn read_network(dir: &Path, name: &str, scale: f64) -> Result<Network, ParseError> {
    read_network_with(dir, name, scale, &CpwanFiles::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "traffic.csv",
            "SrcRegion,DstRegion,SrcNode,DstNode,Volume\n\
             r-sea,r-chi,SEA,CHI,102400\n\
             r-chi,r-sea,CHI,SEA,51200\n\
             r-den,r-sea,DEN,SEA,1024\n",
        );
        write(
            dir.path(),
            "topology.csv",
            "StartRegion,StartDevice,StartInterface,x,EndRegion,EndDevice,EndInterface,y,OpState,z,Capacity\n\
             r-sea,d1,i1,,r-den,d2,i2,,Up,,400000\n\
             r-den,d2,i3,,r-sea,d1,i4,,Up,,400000\n\
             r-den,d2,i5,,r-chi,d3,i6,,Up,,400000\n\
             r-chi,d3,i7,,r-den,d2,i8,,Down,,400000\n\
             r-sea,d1,i9,,r-den,d2,i10,,Up,,100000\n\
             r-xxx,d9,i1,,r-sea,d1,i1,,Up,,100000\n",
        );
        write(
            dir.path(),
            "sites.csv",
            "SiteCode,Name,Latitude,Longitude\n\
             SEA,Seattle,47.6062,-122.3321\n\
             r-den,Denver,39.7392,-104.9903\n\
             CHI,Chicago,41.8781,-87.6298\n",
        );
        write(
            dir.path(),
            "paths.csv",
            "Source,DestinationRegion,Path\n\
             d1,r-chi,r-sea:r-den:r-den:r-chi\n\
             d3,r-sea,r-chi:r-den:r-sea\n\
             d1,r-sea,r-sea:r-den:r-sea\n\
             d1,r-chi,r-sea:r-xxx:r-chi\n",
        );
        dir
    }

    #[test]
    fn reads_a_small_network() {
        let dir = fixture();
        let network = read_network(dir.path(), "cpwan", 2.0).unwrap();

        assert_eq!(network.nodes().len(), 3);
        let d = network.demand("SEA", "CHI").unwrap();
        assert_eq!(network.demands()[d].amount(), 200.0);

        // repeated links accumulate capacity
        let sea_den = network.edge("SEA", "DEN").unwrap();
        assert_eq!(network.edges()[sea_den].capacity(), 500.0);
        // Seattle-Denver is about 1640 km
        assert_eq!(network.edges()[sea_den].unity(), 150);
        assert!(network.edges()[sea_den].distance().is_some());

        // the loop and the unknown region are skipped
        assert_eq!(network.tunnels().len(), 2);
        assert!(network.tunnel("SEA:DEN:CHI").is_some());
        assert_eq!(network.demands()[d].tunnels().len(), 1);
    }

    #[test]
    fn up_only_drops_links_that_are_down() {
        let dir = fixture();
        let files = CpwanFiles {
            up_only: true,
            ..Default::default()
        };
        let network = read_network_with(dir.path(), "cpwan", 1.0, &files).unwrap();
        assert!(network.edge("CHI", "DEN").is_none());
        assert!(network.tunnel("CHI:DEN:SEA").is_none());
    }

    #[test]
    fn bad_numbers_are_reported() {
        let dir = fixture();
        write(
            dir.path(),
            "traffic.csv",
            "SrcRegion,DstRegion,SrcNode,DstNode,Volume\nr-sea,r-chi,SEA,CHI,lots\n",
        );
        let err = read_network(dir.path(), "cpwan", 1.0).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 2, .. }), "{}", err);
    }
}
