//! Minimal grid topology representation and layout (supporting C9's
//! external topology-provider contract; full extraction lives outside this
//! crate).

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Output of the (out-of-scope) headroom predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPrediction {
    pub grid_headroom_kw: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: u32,
    pub depth: u32,
}

/// Breadth-first layering from `root`. Ties among same-depth neighbors
/// break by ascending node id, and nodes are visited in the order they are
/// first discovered: both fixed so layout is stable across runs on the
/// same topology.
pub fn bfs_layout(topology: &Topology, root: u32) -> Vec<LayoutNode> {
    let mut adjacency: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for node in &topology.nodes {
        adjacency.entry(node.id).or_default();
    }
    for edge in &topology.edges {
        adjacency.entry(edge.from).or_default().push(edge.to);
        adjacency.entry(edge.to).or_default().push(edge.from);
    }
    for neighbors in adjacency.values_mut() {
        neighbors.sort_unstable();
        neighbors.dedup();
    }

    let mut visited = BTreeMap::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();

    if adjacency.contains_key(&root) {
        visited.insert(root, 0u32);
        queue.push_back(root);
    }

    while let Some(current) = queue.pop_front() {
        let depth = visited[&current];
        order.push(LayoutNode { id: current, depth });
        if let Some(neighbors) = adjacency.get(&current) {
            for &next in neighbors {
                if !visited.contains_key(&next) {
                    visited.insert(next, depth + 1);
                    queue.push_back(next);
                }
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_topology() -> Topology {
        Topology {
            nodes: vec![
                Node { id: 1, label: "a".into() },
                Node { id: 2, label: "b".into() },
                Node { id: 3, label: "c".into() },
            ],
            edges: vec![Edge { from: 1, to: 2 }, Edge { from: 2, to: 3 }],
        }
    }

    #[test]
    fn root_has_depth_zero() {
        let layout = bfs_layout(&line_topology(), 1);
        assert_eq!(layout[0].id, 1);
        assert_eq!(layout[0].depth, 0);
    }

    #[test]
    fn depths_increase_along_the_line() {
        let layout = bfs_layout(&line_topology(), 1);
        let depth_of = |id: u32| layout.iter().find(|n| n.id == id).unwrap().depth;
        assert_eq!(depth_of(2), 1);
        assert_eq!(depth_of(3), 2);
    }

    #[test]
    fn tie_break_is_ascending_node_id() {
        let topology = Topology {
            nodes: vec![
                Node { id: 1, label: "root".into() },
                Node { id: 3, label: "c".into() },
                Node { id: 2, label: "b".into() },
            ],
            edges: vec![Edge { from: 1, to: 3 }, Edge { from: 1, to: 2 }],
        };
        let layout = bfs_layout(&topology, 1);
        let depth_one: Vec<u32> = layout.iter().filter(|n| n.depth == 1).map(|n| n.id).collect();
        assert_eq!(depth_one, vec![2, 3]);
    }

    #[test]
    fn unknown_root_yields_empty_layout() {
        let layout = bfs_layout(&line_topology(), 99);
        assert!(layout.is_empty());
    }
}
