// src/chemenv/connectivity.rs
//
// Connectivity between coordination polyhedra. Two polyhedra are linked when
// they share ligands: one shared ligand is a corner, two an edge, three or
// more a face. Periodic images are tracked so that the dimensionality of each
// connected component can be reported.

use super::geometries::symbol_family;
use super::light::{LightStructureEnvironments, SiteAssignment};
use crate::utils::linalg::translation_rank;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectivityError {
    #[error("connectivity filter is empty")]
    EmptyFilter,
    #[error("no site environment matches the filter [{0}]")]
    NoMatchingEnvironments(String),
    #[error("site {site} ({symbol}) has no neighbour set to build a polyhedron from")]
    MissingLigands { site: usize, symbol: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentNode {
    pub site_index: usize,
    pub species: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Corner,
    Edge,
    Face,
}

impl LinkKind {
    pub fn from_shared(shared: usize) -> Self {
        match shared {
            0 | 1 => LinkKind::Corner,
            2 => LinkKind::Edge,
            _ => LinkKind::Face,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkKind::Corner => write!(f, "corner"),
            LinkKind::Edge => write!(f, "edge"),
            LinkKind::Face => write!(f, "face"),
        }
    }
}

/// Edge weight. `image` is the lattice translation of the target
/// polyhedron relative to the source one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolyhedronLink {
    pub kind: LinkKind,
    pub shared_ligands: usize,
    pub image: [i32; 3],
}

/// Flat, serializable view of one graph edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRecord {
    pub from_site: usize,
    pub to_site: usize,
    #[serde(flatten)]
    pub link: PolyhedronLink,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectedComponent {
    /// Site indices in node order
    pub sites: Vec<usize>,
    /// 0 = isolated molecule-like, 3 = framework
    pub dimensionality: usize,
}

#[derive(Debug, Clone)]
pub struct StructureConnectivity {
    pub graph: UnGraph<EnvironmentNode, PolyhedronLink>,
    pub components: Vec<ConnectedComponent>,
}

impl StructureConnectivity {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn links(&self) -> Vec<LinkRecord> {
        self.graph
            .edge_references()
            .map(|e| LinkRecord {
                from_site: self.graph[e.source()].site_index,
                to_site: self.graph[e.target()].site_index,
                link: *e.weight(),
            })
            .collect()
    }
}

fn tag_matches(tag: &str, symbol: &str) -> bool {
    tag == symbol || tag == symbol_family(symbol)
}

fn image_diff(a: [i32; 3], b: [i32; 3]) -> [i32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn image_sum(a: [i32; 3], b: [i32; 3]) -> [i32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Shared-ligand counts between polyhedra `a` and `b`, keyed by the image
/// of `b` relative to `a`. For a == b only one of each ±image pair is kept.
fn shared_ligands(a: &SiteAssignment, b: &SiteAssignment, same: bool) -> BTreeMap<[i32; 3], usize> {
    let mut shared = BTreeMap::new();
    for la in &a.ligands {
        for lb in b.ligands.iter().filter(|lb| lb.site_index == la.site_index) {
            let image = image_diff(la.image, lb.image);
            if same && image <= [0, 0, 0] {
                continue;
            }
            *shared.entry(image).or_insert(0) += 1;
        }
    }
    shared
}

pub struct ConnectivityFinder;

impl ConnectivityFinder {
    /// Builds the polyhedron graph of every site whose dominant environment
    /// matches one of `filter`. A tag matches the full symbol ("O:6") or its
    /// family ("O"). Tag order sets node order; repeats are ignored.
    pub fn get_structure_connectivity(
        lse: &LightStructureEnvironments,
        filter: &[String],
    ) -> Result<StructureConnectivity, ConnectivityError> {
        if filter.is_empty() {
            return Err(ConnectivityError::EmptyFilter);
        }

        let mut graph: UnGraph<EnvironmentNode, PolyhedronLink> = UnGraph::default();
        let mut members: Vec<&SiteAssignment> = Vec::new();
        for tag in filter {
            for a in lse.assignments() {
                if !tag_matches(tag, a.label()) || members.iter().any(|m| m.site_index == a.site_index) {
                    continue;
                }
                if a.ligands.is_empty() {
                    return Err(ConnectivityError::MissingLigands {
                        site: a.site_index,
                        symbol: a.label().to_string(),
                    });
                }
                graph.add_node(EnvironmentNode {
                    site_index: a.site_index,
                    species: a.species.clone(),
                    symbol: a.label().to_string(),
                });
                members.push(a);
            }
        }

        if members.is_empty() {
            return Err(ConnectivityError::NoMatchingEnvironments(filter.join(", ")));
        }

        for ia in 0..members.len() {
            for ib in ia..members.len() {
                let shared = shared_ligands(members[ia], members[ib], ia == ib);
                for (image, count) in shared {
                    graph.add_edge(
                        NodeIndex::new(ia),
                        NodeIndex::new(ib),
                        PolyhedronLink {
                            kind: LinkKind::from_shared(count),
                            shared_ligands: count,
                            image,
                        },
                    );
                }
            }
        }

        let components = connected_components(&graph);
        log::debug!(
            "connectivity: {} nodes, {} links, {} components",
            graph.node_count(),
            graph.edge_count(),
            components.len()
        );

        Ok(StructureConnectivity { graph, components })
    }
}

fn connected_components(graph: &UnGraph<EnvironmentNode, PolyhedronLink>) -> Vec<ConnectedComponent> {
    let n = graph.node_count();
    let mut uf = UnionFind::<usize>::new(n);
    let mut adjacency: Vec<Vec<(usize, [i32; 3])>> = vec![Vec::new(); n];
    for e in graph.edge_references() {
        let (s, t) = (e.source().index(), e.target().index());
        let image = e.weight().image;
        uf.union(s, t);
        adjacency[s].push((t, image));
        adjacency[t].push((s, image_diff([0, 0, 0], image)));
    }

    // Group by root, ordered by first node
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut root_slot: BTreeMap<usize, usize> = BTreeMap::new();
    for v in 0..n {
        let root = uf.find(v);
        let slot = *root_slot.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(v);
    }

    // Place every node at a lattice offset by walking the component; links
    // that disagree with those offsets are the periodic cycles.
    let mut offsets: Vec<Option<[i32; 3]>> = vec![None; n];
    groups
        .into_iter()
        .map(|nodes| {
            let start = nodes[0];
            offsets[start] = Some([0, 0, 0]);
            let mut queue = VecDeque::from([start]);
            while let Some(u) = queue.pop_front() {
                let base = offsets[u].unwrap_or([0, 0, 0]);
                for &(v, image) in &adjacency[u] {
                    if offsets[v].is_none() {
                        offsets[v] = Some(image_sum(base, image));
                        queue.push_back(v);
                    }
                }
            }

            let mut cycles = Vec::new();
            for e in graph.edge_references() {
                let (s, t) = (e.source().index(), e.target().index());
                if !nodes.contains(&s) {
                    continue;
                }
                let os = offsets[s].unwrap_or([0, 0, 0]);
                let ot = offsets[t].unwrap_or([0, 0, 0]);
                let cycle = image_diff(image_sum(os, e.weight().image), ot);
                if cycle != [0, 0, 0] {
                    cycles.push(cycle);
                }
            }

            ConnectedComponent {
                sites: nodes.iter().map(|&v| graph[NodeIndex::new(v)].site_index).collect(),
                dimensionality: translation_rank(&cycles),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemenv::finder::{CenteringPolicy, LocalGeometryFinder, VoronoiParams};
    use crate::chemenv::fixtures::rock_salt;
    use crate::chemenv::light::LigandRef;
    use crate::chemenv::strategies::{EnvironmentGuess, StrategySpec};

    fn rock_salt_lse() -> LightStructureEnvironments {
        let se = LocalGeometryFinder::new(CenteringPolicy::CentroidIncludingCenter)
            .compute_structure_environments(&rock_salt(), &VoronoiParams::default())
            .unwrap();
        let strategy = StrategySpec::default().build().unwrap();
        LightStructureEnvironments::from_structure_environments(strategy.as_ref(), &se)
    }

    fn assignment(site: usize, symbol: &str, ligands: &[(usize, [i32; 3])]) -> SiteAssignment {
        SiteAssignment {
            site_index: site,
            species: "X".into(),
            environments: vec![EnvironmentGuess {
                symbol: symbol.into(),
                fraction: None,
                csm: Some(0.0),
            }],
            ligands: ligands
                .iter()
                .map(|&(site_index, image)| LigandRef { site_index, image })
                .collect(),
            note: None,
        }
    }

    #[test]
    fn test_rock_salt_two_frameworks() {
        let lse = rock_salt_lse();
        let sc = ConnectivityFinder::get_structure_connectivity(&lse, &["O".to_string()]).unwrap();

        assert_eq!(sc.node_count(), 8);
        assert_eq!(sc.components.len(), 2);
        for c in &sc.components {
            assert_eq!(c.sites.len(), 4);
            assert_eq!(c.dimensionality, 3);
        }
        assert_eq!(sc.components[0].sites, vec![0, 1, 2, 3]);

        // Edge sharing between face-diagonal neighbours, corner sharing along axes
        let links = sc.links();
        assert!(links.iter().any(|l| l.link.kind == LinkKind::Edge));
        assert!(links.iter().any(|l| l.link.kind == LinkKind::Corner && l.from_site == l.to_site));
        assert!(links.iter().all(|l| l.link.kind != LinkKind::Face));
    }

    #[test]
    fn test_full_symbol_and_order() {
        let lse = rock_salt_lse();
        let filter = vec!["O:6".to_string(), "O".to_string()];
        let sc = ConnectivityFinder::get_structure_connectivity(&lse, &filter).unwrap();
        assert_eq!(sc.node_count(), 8);
        assert_eq!(sc.graph[NodeIndex::new(0)].symbol, "O:6");
    }

    #[test]
    fn test_no_match_is_error() {
        let lse = rock_salt_lse();
        let err = ConnectivityFinder::get_structure_connectivity(&lse, &["T".to_string()]).unwrap_err();
        assert_eq!(err, ConnectivityError::NoMatchingEnvironments("T".into()));
        assert_eq!(
            ConnectivityFinder::get_structure_connectivity(&lse, &[]).unwrap_err(),
            ConnectivityError::EmptyFilter
        );
    }

    #[test]
    fn test_isolated_pair_is_zero_dimensional() {
        // Two tetrahedra sharing one corner (ligand 10), nothing periodic
        let lse = LightStructureEnvironments {
            strategy: "test".into(),
            sites: vec![
                Some(assignment(0, "T:4", &[(10, [0, 0, 0]), (11, [0, 0, 0]), (12, [0, 0, 0]), (13, [0, 0, 0])])),
                Some(assignment(1, "T:4", &[(10, [0, 0, 0]), (14, [0, 0, 0]), (15, [0, 0, 0]), (16, [0, 0, 0])])),
            ],
        };
        let sc = ConnectivityFinder::get_structure_connectivity(&lse, &["T".to_string()]).unwrap();
        assert_eq!(sc.components.len(), 1);
        assert_eq!(sc.components[0].dimensionality, 0);
        let links = sc.links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link.kind, LinkKind::Corner);
    }

    #[test]
    fn test_chain_is_one_dimensional() {
        // One octahedron sharing opposite corners with its own image along a
        let lse = LightStructureEnvironments {
            strategy: "test".into(),
            sites: vec![Some(assignment(
                0,
                "O:6",
                &[
                    (1, [0, 0, 0]),
                    (1, [-1, 0, 0]),
                    (2, [0, 0, 0]),
                    (3, [0, 0, 0]),
                    (4, [0, 0, 0]),
                    (5, [0, 0, 0]),
                ],
            ))],
        };
        let sc = ConnectivityFinder::get_structure_connectivity(&lse, &["O".to_string()]).unwrap();
        assert_eq!(sc.components[0].dimensionality, 1);
        assert_eq!(sc.links().len(), 1);
    }

    #[test]
    fn test_unknown_without_ligands_is_error() {
        let lse = LightStructureEnvironments {
            strategy: "test".into(),
            sites: vec![Some(assignment(0, "UNKNOWN", &[]))],
        };
        let err = ConnectivityFinder::get_structure_connectivity(&lse, &["UNKNOWN".to_string()]).unwrap_err();
        assert!(matches!(err, ConnectivityError::MissingLigands { site: 0, .. }));
    }
}
