use cgmath::{Vector3, Zero};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};

use crate::sim::barnes_hut::{EpsilonCycle, separation};

/// Exact O(N) sum of `kernel` over every other point, as seen from
/// `positions[target]`. Same contract as
/// [`BarnesHutTree::evaluate_kernel`](crate::sim::barnes_hut::BarnesHutTree::evaluate_kernel)
/// with every volume opened.
pub fn evaluate_kernel<const D: usize, K>(positions: &[Vector3<f32>], target: usize, kernel: K) -> Vector3<f32>
where
    K: Fn(u32, Vector3<f32>, f32) -> Vector3<f32>,
{
    let position = positions[target];
    let mut epsilon = EpsilonCycle::<D>::new(target);
    let mut result = Vector3::zero();
    for (other_idx, other) in positions.iter().enumerate() {
        if other_idx == target {
            continue;
        }
        let (difference, distance_sq) = separation(position, *other, &mut epsilon);
        result += kernel(1, difference, distance_sq);
    }
    result
}

/// O(N²) evaluation for every point, written into `out`.
pub fn iter<const D: usize, K>(positions: &[Vector3<f32>], out: &mut [Vector3<f32>], kernel: K)
where
    K: Fn(u32, Vector3<f32>, f32) -> Vector3<f32> + Sync,
{
    out.par_iter_mut().enumerate().for_each(|(i, out)| {
        *out = evaluate_kernel::<D, _>(positions, i, &kernel);
    });
}
