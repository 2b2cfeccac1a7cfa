use cgmath::{Vector3, Zero};

use crate::{
    constants::BARNES_HUT_MAX_NODES_PER_LEAF,
    spatial::{BoundingBox, SpatialTree, VolumeData},
};

/// Aggregate of everything below a volume, treated as one pseudo-body when
/// the volume is far enough away.
#[derive(Debug, Clone)]
pub struct MassData {
    pub mass: u32,
    pub centre_of_mass: Vector3<f32>,
    /// Square of the volume's largest side, kept squared so the opening test
    /// needs no square root.
    pub extent_sq: f32,
}

impl Default for MassData {
    fn default() -> Self {
        Self {
            mass: 0,
            centre_of_mass: Vector3::zero(),
            extent_sq: 0.0,
        }
    }
}

impl VolumeData for MassData {
    fn initialise(&mut self, bounds: &BoundingBox, points: &[usize], positions: &[Vector3<f32>]) {
        let mut sum = Vector3::zero();
        for i in points {
            sum += positions[*i];
        }
        self.mass = points.len() as u32;
        self.centre_of_mass = if points.is_empty() {
            bounds.centre()
        } else {
            sum / points.len() as f32
        };
        let extent = bounds.max_extent(3);
        self.extent_sq = extent * extent;
    }
}

/// Spatial tree carrying [`MassData`] on every volume, rebuilt each iteration.
#[derive(Debug)]
pub struct BarnesHutTree<const D: usize> {
    pub(super) tree: SpatialTree<D, MassData>,
    pub(super) theta: f32,
}

impl<const D: usize> BarnesHutTree<D> {
    pub fn new(theta: f32) -> Self {
        Self {
            tree: SpatialTree::new(BARNES_HUT_MAX_NODES_PER_LEAF),
            theta,
        }
    }

    pub fn theta(&self) -> f32 {
        self.theta
    }

    pub fn set_theta(&mut self, theta: f32) {
        self.theta = theta;
    }

    pub fn build(&mut self, positions: &[Vector3<f32>]) {
        self.tree.build(positions);
    }

    pub fn spatial_tree(&self) -> &SpatialTree<D, MassData> {
        &self.tree
    }
}
