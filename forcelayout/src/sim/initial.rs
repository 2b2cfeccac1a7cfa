//! Cheap starting positions: a breadth-first walk that places each node's
//! unvisited neighbours on a spiral around it, facing away from where the
//! node itself was reached from.

use std::collections::VecDeque;
use std::f64::consts::TAU;

use cgmath::{InnerSpace, Vector3, Zero};

use crate::{
    constants::{SPHERE_RADIUS, SPIRAL_STEP},
    graph::Component,
};

/// Orthonormal basis a node's children are placed in.
#[derive(Debug, Clone, Copy)]
struct Frame {
    forward: Vector3<f32>,
    up: Vector3<f32>,
    right: Vector3<f32>,
}

impl Frame {
    fn identity() -> Self {
        Self {
            forward: Vector3::unit_x(),
            up: Vector3::unit_y(),
            right: Vector3::unit_z(),
        }
    }

    /// Frame whose forward axis is `forward`, which must be unit length.
    fn facing(forward: Vector3<f32>) -> Self {
        let mut up = Vector3::new(forward.z, -forward.x, forward.y);
        up -= forward * up.dot(forward);
        if up.magnitude2() < 1e-6 {
            // The permutation can land back on the forward axis
            let axis = if forward.x.abs() < 0.9 {
                Vector3::unit_x()
            } else {
                Vector3::unit_y()
            };
            up = axis - forward * axis.dot(forward);
        }
        let up = up.normalize();
        Self {
            forward,
            up,
            right: up.cross(forward),
        }
    }

    /// `offset` is (along forward, along up, along right).
    fn orient(&self, offset: Vector3<f32>) -> Vector3<f32> {
        self.forward * offset.x + self.up * offset.y + self.right * offset.z
    }
}

/// Point `index` of `total` on a spiral over the unit sphere, running from
/// the backward pole (`index == 1`) toward the forward one. `phi` carries the
/// running azimuth between calls.
fn spiral_offset(index: usize, total: usize, phi: &mut f64) -> Vector3<f32> {
    let divisor = total.saturating_sub(1).max(1) as f64;
    let h = (-1.0 + 2.0 * (index as f64 - 1.0) / divisor).clamp(-1.0, 1.0);
    let theta = h.acos();
    let ring = (total as f64 * (1.0 - h * h)).max(f64::EPSILON);
    *phi = (*phi + SPIRAL_STEP / ring.sqrt()) % TAU;
    Vector3::new(
        h as f32,
        (phi.cos() * theta.sin()) as f32,
        (phi.sin() * theta.sin()) as f32,
    )
}

/// Breadth-first placement state shared by every tree of one seeding pass.
struct Placement<'a> {
    positions: &'a mut [Vector3<f32>],
    directions: Vec<Vector3<f32>>,
    visited: Vec<bool>,
    queue: VecDeque<usize>,
}

impl Placement<'_> {
    fn place(&mut self, parent: usize, child: usize, frame: &Frame, offset: Vector3<f32>) {
        let offset = frame.orient(offset) * SPHERE_RADIUS;
        self.directions[child] = offset.normalize();
        self.positions[child] = self.positions[parent] + offset;
        self.visited[child] = true;
        self.queue.push_back(child);
    }
}

/// Give every node in `component` a position, written to `positions` by
/// component-local index. Neighbours end up [`SPHERE_RADIUS`] apart.
///
/// Nodes that cannot be reached from the first node (which a connected
/// component never has) are seeded as further trees, each placed beyond the
/// positive x extent of everything placed so far.
pub fn seed(component: &Component, positions: &mut [Vector3<f32>]) {
    let n = component.num_nodes();
    debug_assert_eq!(positions.len(), n);

    let mut state = Placement {
        positions,
        directions: vec![Vector3::zero(); n],
        visited: vec![false; n],
        queue: VecDeque::new(),
    };
    let mut max_x: Option<f32> = None;

    for root in 0..n {
        if state.visited[root] {
            continue;
        }
        state.positions[root] = match max_x {
            None => Vector3::zero(),
            Some(x) => Vector3::new(x + 2.0 * SPHERE_RADIUS, 0.0, 0.0),
        };
        state.visited[root] = true;
        state.queue.push_back(root);

        while let Some(parent) = state.queue.pop_front() {
            let parent_x = state.positions[parent].x;
            max_x = Some(max_x.map_or(parent_x, |x| x.max(parent_x)));

            let is_root = parent == root;
            let frame = if is_root {
                Frame::identity()
            } else {
                Frame::facing(state.directions[parent])
            };

            let incident = component.incident_edges(parent);
            let mut children = incident
                .iter()
                .map(|edge| component.opposite_local(*edge, parent))
                .filter(|child| *child != parent);

            // The backward slot is the root's first child; for any other node
            // it is already occupied by the node it was reached from
            let mut total = incident.len();
            if is_root {
                if let Some(child) = children.next()
                    && !state.visited[child]
                {
                    state.place(parent, child, &frame, -Vector3::unit_x());
                }
            } else {
                total += 1;
            }

            let mut placed_top = false;
            let mut phi = 0.0;
            let mut index = 2;
            for child in children {
                if state.visited[child] {
                    continue;
                }
                if !placed_top {
                    state.place(parent, child, &frame, Vector3::unit_x());
                    placed_top = true;
                    continue;
                }
                let offset = spiral_offset(index, total, &mut phi);
                state.place(parent, child, &frame, offset);
                index += 1;
            }
        }
    }
}

/// Place nodes that have no position yet next to a neighbour that does,
/// leaving everything else untouched. Nodes whose neighbourhood is entirely
/// new are reached through the nodes placed before them. Returns `false`,
/// placing nothing, when no node in the component has a position.
pub fn place_missing(component: &Component, positions: &mut [Vector3<f32>], known: &[bool]) -> bool {
    let n = component.num_nodes();
    debug_assert_eq!(positions.len(), n);
    debug_assert_eq!(known.len(), n);

    let mut placed = known.to_vec();
    let mut queue: VecDeque<usize> = (0..n).filter(|i| placed[*i]).collect();
    if queue.is_empty() {
        return false;
    }

    while let Some(parent) = queue.pop_front() {
        let incident = component.incident_edges(parent);
        let total = incident.len() + 1;
        let mut phi = 0.0;
        let mut index = 2;
        for edge in incident {
            let child = component.opposite_local(*edge, parent);
            if placed[child] {
                continue;
            }
            let offset = spiral_offset(index, total, &mut phi);
            positions[child] = positions[parent] + offset * SPHERE_RADIUS;
            placed[child] = true;
            queue.push_back(child);
            index += 1;
        }
    }

    // Anything left over is disconnected from every known node
    if placed.iter().any(|p| !*p) {
        let max_x = positions
            .iter()
            .zip(&placed)
            .filter(|(_, p)| **p)
            .map(|(position, _)| position.x)
            .fold(f32::MIN, f32::max);
        let mut offset = 2.0 * SPHERE_RADIUS;
        for (position, p) in positions.iter_mut().zip(&placed) {
            if !*p {
                *position = Vector3::new(max_x + offset, 0.0, 0.0);
                offset += 2.0 * SPHERE_RADIUS;
            }
        }
    }
    true
}
