use cgmath::Vector3;

use super::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeId(u32);

impl VolumeId {
    #[inline]
    pub fn to_index(self) -> usize {
        self.0 as usize
    }
}

/// Per-volume payload computed once while the tree is built.
pub trait VolumeData: Default + Send + Sync {
    /// Called for every non-empty volume with the indices of the points inside it.
    fn initialise(&mut self, bounds: &BoundingBox, points: &[usize], positions: &[Vector3<f32>]);
}

impl VolumeData for () {
    fn initialise(&mut self, _: &BoundingBox, _: &[usize], _: &[Vector3<f32>]) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Empty,
    /// Points are `SpatialTree::points[start..start + len]`.
    Leaf { start: u32, len: u32 },
    /// Children occupy 2^D consecutive slots starting at `first_child`.
    Internal { first_child: u32 },
}

#[derive(Debug)]
pub struct SubVolume<V> {
    pub bounds: BoundingBox,
    pub kind: VolumeKind,
    pub data: V,
}

impl<V> SubVolume<V> {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, VolumeKind::Leaf { .. })
    }
}

/// A quadtree (`D == 2`) or octree (`D == 3`) over a set of point indices.
///
/// Volumes live in a flat arena and refer to their children by index; the
/// arena is cleared, not freed, between builds so rebuilding every iteration
/// does not reallocate once the tree has reached its working size.
#[derive(Debug)]
pub struct SpatialTree<const D: usize, V = ()> {
    volumes: Vec<SubVolume<V>>,
    points: Vec<usize>,
    work: Vec<(VolumeId, usize, Vec<usize>)>,
    max_points_per_leaf: usize,
    depth: usize,
}

impl<const D: usize, V: VolumeData> Default for SpatialTree<D, V> {
    fn default() -> Self {
        Self::new(1)
    }
}

impl<const D: usize, V: VolumeData> SpatialTree<D, V> {
    pub const NUM_SUB_VOLUMES: usize = 1 << D;

    pub fn new(max_points_per_leaf: usize) -> Self {
        assert!(D == 2 || D == 3, "spatial trees are 2D or 3D");
        Self {
            volumes: Vec::new(),
            points: Vec::new(),
            work: Vec::new(),
            max_points_per_leaf: max_points_per_leaf.max(1),
            depth: 0,
        }
    }

    pub fn clear(&mut self) {
        self.volumes.clear();
        self.points.clear();
        self.depth = 0;
    }

    /// Rebuild the tree over every index of `positions`.
    pub fn build(&mut self, positions: &[Vector3<f32>]) {
        self.build_from((0..positions.len()).collect(), positions);
    }

    /// Rebuild the tree over the given indices into `positions`. Each index
    /// ends up in exactly one leaf.
    pub fn build_from(&mut self, indices: Vec<usize>, positions: &[Vector3<f32>]) {
        self.clear();

        let Some(bounds) = BoundingBox::from_points(indices.iter().map(|i| positions[*i])) else {
            return;
        };

        self.volumes.push(SubVolume {
            bounds: bounds.cubed(D),
            kind: VolumeKind::Empty,
            data: V::default(),
        });
        self.work.push((VolumeId(0), 1, indices));

        while let Some((id, depth, indices)) = self.work.pop() {
            self.depth = self.depth.max(depth);
            let idx = id.to_index();
            let bounds = self.volumes[idx].bounds;
            self.volumes[idx]
                .data
                .initialise(&bounds, &indices, positions);

            if indices.len() <= self.max_points_per_leaf
                || !bounds.divisible(D)
                || !distinct_positions::<D>(&indices, positions)
            {
                // Coincident points stay together in one leaf instead of
                // subdividing forever
                self.volumes[idx].kind = VolumeKind::Leaf {
                    start: self.points.len() as u32,
                    len: indices.len() as u32,
                };
                self.points.extend_from_slice(&indices);
                continue;
            }

            let first_child = self.volumes.len();
            let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); Self::NUM_SUB_VOLUMES];
            for i in indices {
                buckets[bounds.sub_index(positions[i], D)].push(i);
            }
            for sub in 0..Self::NUM_SUB_VOLUMES {
                self.volumes.push(SubVolume {
                    bounds: bounds.sub_box(sub, D),
                    kind: VolumeKind::Empty,
                    data: V::default(),
                });
            }
            self.volumes[idx].kind = VolumeKind::Internal {
                first_child: first_child as u32,
            };

            for (sub, bucket) in buckets.into_iter().enumerate().rev() {
                if !bucket.is_empty() {
                    self.work
                        .push((VolumeId((first_child + sub) as u32), depth + 1, bucket));
                }
            }
        }
    }

    pub fn root(&self) -> Option<VolumeId> {
        (!self.volumes.is_empty()).then_some(VolumeId(0))
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Number of volumes, including empty ones.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Number of levels, root included.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Upper bound on the explicit stack a depth-first traversal needs.
    pub fn traversal_stack_requirement(&self) -> usize {
        self.depth.saturating_sub(1) * (Self::NUM_SUB_VOLUMES - 1) + 1
    }

    #[inline]
    pub fn get(&self, id: VolumeId) -> &SubVolume<V> {
        &self.volumes[id.to_index()]
    }

    pub fn children(&self, id: VolumeId) -> impl Iterator<Item = VolumeId> + '_ {
        let range = match self.volumes[id.to_index()].kind {
            VolumeKind::Internal { first_child } => {
                first_child..first_child + Self::NUM_SUB_VOLUMES as u32
            }
            _ => 0..0,
        };
        range.map(VolumeId)
    }

    /// Point indices held by a leaf; empty for anything else.
    #[inline]
    pub fn leaf_points(&self, id: VolumeId) -> &[usize] {
        match self.volumes[id.to_index()].kind {
            VolumeKind::Leaf { start, len } => {
                &self.points[start as usize..(start + len) as usize]
            }
            _ => &[],
        }
    }

    /// Depth-first walk over the non-empty volumes using an explicit stack.
    /// `visitor` returns whether to descend into an internal volume's children.
    pub fn visit_depth_first<F>(&self, mut visitor: F)
    where
        F: FnMut(VolumeId, &SubVolume<V>) -> bool,
    {
        let Some(root) = self.root() else {
            return;
        };
        let mut stack = Vec::with_capacity(self.traversal_stack_requirement());
        stack.push(root);

        while let Some(id) = stack.pop() {
            let volume = self.get(id);
            let descend = visitor(id, volume);
            if let VolumeKind::Internal { first_child } = volume.kind
                && descend
            {
                for child in (first_child..first_child + Self::NUM_SUB_VOLUMES as u32).rev() {
                    if self.volumes[child as usize].kind != VolumeKind::Empty {
                        stack.push(VolumeId(child));
                    }
                }
            }
        }
    }

    /// Every non-empty leaf, in depth-first order.
    pub fn leaves(&self) -> Vec<VolumeId> {
        let mut leaves = Vec::new();
        self.visit_depth_first(|id, volume| {
            if volume.is_leaf() {
                leaves.push(id);
            }
            true
        });
        leaves
    }
}

fn distinct_positions<const D: usize>(indices: &[usize], positions: &[Vector3<f32>]) -> bool {
    let Some(first) = indices.first().map(|i| positions[*i]) else {
        return false;
    };
    indices
        .iter()
        .any(|i| (0..D).any(|axis| positions[*i][axis] != first[axis]))
}
