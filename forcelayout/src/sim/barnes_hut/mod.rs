use cgmath::{InnerSpace, Vector3, Zero};

use crate::{constants::COINCIDENT_EPSILON, spatial::VolumeKind};

mod tree;

pub use tree::{BarnesHutTree, MassData};

/// Stand-in difference vectors for coincident points. Cycling through them
/// keeps stacked nodes from all escaping in the same direction.
const ESCAPE_DIRECTIONS: [Vector3<f32>; 6] = [
    Vector3::new(1.0, 0.0, 0.0),
    Vector3::new(-1.0, 0.0, 0.0),
    Vector3::new(0.0, 1.0, 0.0),
    Vector3::new(0.0, -1.0, 0.0),
    Vector3::new(0.0, 0.0, 1.0),
    Vector3::new(0.0, 0.0, -1.0),
];

/// Sequence of substitute offsets for one kernel evaluation. It is seeded
/// from the target so evaluations are reentrant, and deterministic no matter
/// how the work is spread over threads.
#[derive(Debug, Clone)]
pub struct EpsilonCycle<const D: usize> {
    next: usize,
}

impl<const D: usize> EpsilonCycle<D> {
    // Only directions within the first D axes
    const LEN: usize = 2 * D;

    pub fn new(seed: usize) -> Self {
        Self {
            next: seed % Self::LEN,
        }
    }

    /// Next substitute `(difference, distance_sq)` pair.
    pub fn next_offset(&mut self) -> (Vector3<f32>, f32) {
        let direction = ESCAPE_DIRECTIONS[self.next];
        self.next = (self.next + 1) % Self::LEN;
        (
            direction * COINCIDENT_EPSILON,
            COINCIDENT_EPSILON * COINCIDENT_EPSILON,
        )
    }
}

/// Difference from `from` to `to` and its squared length, substituting an
/// epsilon offset when the two coincide.
#[inline]
pub fn separation<const D: usize>(
    from: Vector3<f32>,
    to: Vector3<f32>,
    epsilon: &mut EpsilonCycle<D>,
) -> (Vector3<f32>, f32) {
    let difference = to - from;
    let distance_sq = difference.magnitude2();
    if distance_sq == 0.0 {
        epsilon.next_offset()
    } else {
        (difference, distance_sq)
    }
}

impl<const D: usize> BarnesHutTree<D> {
    /// Sum `kernel(mass, difference, distance_sq)` over every other point, as
    /// seen from `positions[target]`.
    ///
    /// Distant volumes are folded into a single call with their aggregate mass
    /// and centre of mass; a volume is opened instead when
    /// `extent² / distance² > theta` or when it contains the target.
    pub fn evaluate_kernel<K>(&self, positions: &[Vector3<f32>], target: usize, kernel: K) -> Vector3<f32>
    where
        K: Fn(u32, Vector3<f32>, f32) -> Vector3<f32>,
    {
        let position = positions[target];
        let mut epsilon = EpsilonCycle::<D>::new(target);
        let mut result = Vector3::zero();

        self.tree.visit_depth_first(|id, volume| match volume.kind {
            VolumeKind::Empty => false,
            VolumeKind::Leaf { .. } => {
                for &other in self.tree.leaf_points(id) {
                    if other == target {
                        continue;
                    }
                    let (difference, distance_sq) =
                        separation(position, positions[other], &mut epsilon);
                    result += kernel(1, difference, distance_sq);
                }
                false
            }
            VolumeKind::Internal { .. } => {
                let data = &volume.data;
                let difference = data.centre_of_mass - position;
                let distance_sq = difference.magnitude2();
                if distance_sq == 0.0 || volume.bounds.contains(position, D) {
                    return true;
                }
                if data.extent_sq / distance_sq > self.theta {
                    return true;
                }
                result += kernel(data.mass, difference, distance_sq);
                false
            }
        });

        result
    }
}
