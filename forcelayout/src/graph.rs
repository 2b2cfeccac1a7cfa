//! The slice of the graph model the layout engine consumes.
//!
//! The graph itself lives elsewhere; components arrive here as immutable
//! snapshots of node and edge identifiers. On construction a component builds
//! dense, component-local indices so the solver can work on flat arrays.

use std::collections::HashMap;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub usize);

impl NodeId {
    #[inline]
    pub fn to_index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(id: usize, source: usize, target: usize) -> Self {
        Self {
            id: EdgeId(id),
            source: NodeId(source),
            target: NodeId(target),
        }
    }

    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }

    /// The endpoint that isn't `node`. For a loop this is `node` itself.
    pub fn opposite(&self, node: NodeId) -> NodeId {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }
}

/// A connected component, in the order the graph model hands it over.
#[derive(Debug, Clone)]
pub struct Component {
    id: ComponentId,
    node_ids: Vec<NodeId>,
    edges: Vec<Edge>,
    local: HashMap<NodeId, usize>,
    // (source, target) as local indices, parallel to `edges`
    endpoints: Vec<(usize, usize)>,
    // CSR adjacency: edges incident to local node i are
    // incident[incident_offsets[i]..incident_offsets[i + 1]]
    incident_offsets: Vec<usize>,
    incident: Vec<usize>,
}

impl Component {
    pub fn new(id: ComponentId, node_ids: Vec<NodeId>, edges: Vec<Edge>) -> Result<Self> {
        let local: HashMap<NodeId, usize> = node_ids
            .iter()
            .enumerate()
            .map(|(idx, node)| (*node, idx))
            .collect();

        let mut endpoints = Vec::with_capacity(edges.len());
        let mut degree = vec![0usize; node_ids.len()];
        for edge in &edges {
            let lookup = |node: NodeId| {
                local.get(&node).copied().ok_or(Error::MissingEndpoint {
                    edge: edge.id,
                    node,
                })
            };
            let source = lookup(edge.source)?;
            let target = lookup(edge.target)?;
            degree[source] += 1;
            if source != target {
                degree[target] += 1;
            }
            endpoints.push((source, target));
        }

        let mut incident_offsets = Vec::with_capacity(node_ids.len() + 1);
        incident_offsets.push(0);
        for d in &degree {
            incident_offsets.push(incident_offsets.last().copied().unwrap_or(0) + d);
        }

        let mut fill = incident_offsets.clone();
        let mut incident = vec![0; incident_offsets[node_ids.len()]];
        for (edge_idx, &(source, target)) in endpoints.iter().enumerate() {
            incident[fill[source]] = edge_idx;
            fill[source] += 1;
            if source != target {
                incident[fill[target]] = edge_idx;
                fill[target] += 1;
            }
        }

        Ok(Self {
            id,
            node_ids,
            edges,
            local,
            endpoints,
            incident_offsets,
            incident,
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().map(|e| e.id)
    }

    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.local.contains_key(&node)
    }

    /// Component-local index of `node`.
    pub fn local_index(&self, node: NodeId) -> Option<usize> {
        self.local.get(&node).copied()
    }

    /// Local (source, target) index pairs, parallel to [`Component::edges`].
    pub fn endpoints(&self) -> &[(usize, usize)] {
        &self.endpoints
    }

    /// Indices into [`Component::edges`] of the edges touching local node `idx`,
    /// in component edge order.
    pub fn incident_edges(&self, idx: usize) -> &[usize] {
        &self.incident[self.incident_offsets[idx]..self.incident_offsets[idx + 1]]
    }

    /// Local index of the far end of edge `edge_idx` as seen from local node `idx`.
    pub fn opposite_local(&self, edge_idx: usize, idx: usize) -> usize {
        let (source, target) = self.endpoints[edge_idx];
        if source == idx { target } else { source }
    }
}

/// Splits a node/edge set into connected components, numbered in order of
/// their first node. Mostly useful to hosts without their own component
/// tracking.
pub fn connected_components(node_ids: &[NodeId], edges: &[Edge]) -> Result<Vec<Component>> {
    let index: HashMap<NodeId, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(idx, node)| (*node, idx))
        .collect();

    let mut parent: Vec<usize> = (0..node_ids.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for edge in edges {
        let lookup = |node: NodeId| {
            index.get(&node).copied().ok_or(Error::MissingEndpoint {
                edge: edge.id,
                node,
            })
        };
        let a = find(&mut parent, lookup(edge.source)?);
        let b = find(&mut parent, lookup(edge.target)?);
        if a != b {
            parent[a.max(b)] = a.min(b);
        }
    }

    let mut groups: Vec<(Vec<NodeId>, Vec<Edge>)> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for (idx, node) in node_ids.iter().enumerate() {
        let root = find(&mut parent, idx);
        let group = *group_of_root.entry(root).or_insert_with(|| {
            groups.push((Vec::new(), Vec::new()));
            groups.len() - 1
        });
        groups[group].0.push(*node);
    }
    for edge in edges {
        let root = find(&mut parent, index[&edge.source]);
        groups[group_of_root[&root]].1.push(*edge);
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(id, (nodes, edges))| Component::new(ComponentId(id), nodes, edges))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(n: usize) -> Vec<NodeId> {
        (0..n).map(NodeId).collect()
    }

    #[test]
    fn incident_edges_follow_edge_order() {
        let edges = vec![Edge::new(0, 0, 1), Edge::new(1, 2, 0), Edge::new(2, 1, 1)];
        let component = Component::new(ComponentId(0), nodes(3), edges).unwrap();

        assert_eq!(component.incident_edges(0), &[0, 1]);
        assert_eq!(component.incident_edges(1), &[0, 2]);
        assert_eq!(component.incident_edges(2), &[1]);
        assert_eq!(component.opposite_local(1, 0), 2);
        assert_eq!(component.opposite_local(2, 1), 1);
    }

    #[test]
    fn edge_outside_component_is_rejected() {
        let edges = vec![Edge::new(7, 0, 5)];
        let err = Component::new(ComponentId(0), nodes(2), edges).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingEndpoint {
                edge: EdgeId(7),
                node: NodeId(5)
            }
        ));
    }

    #[test]
    fn finds_components() {
        let edges = vec![Edge::new(0, 0, 1), Edge::new(1, 3, 4), Edge::new(2, 1, 2)];
        let components = connected_components(&nodes(6), &edges).unwrap();

        assert_eq!(components.len(), 3);
        assert_eq!(components[0].node_ids(), &[NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(components[0].num_edges(), 2);
        assert_eq!(components[1].node_ids(), &[NodeId(3), NodeId(4)]);
        assert_eq!(components[2].node_ids(), &[NodeId(5)]);
        assert_eq!(components[2].id(), ComponentId(2));
    }
}
