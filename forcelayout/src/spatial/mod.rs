use cgmath::Vector3;

mod tree;

pub use tree::{SpatialTree, SubVolume, VolumeData, VolumeId, VolumeKind};

/// Axis-aligned box. Dimensions beyond those in use are left at zero extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl BoundingBox {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vector3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self::new(first, first);
        for p in points {
            bounds.expand_to_include(p);
        }
        Some(bounds)
    }

    pub fn expand_to_include(&mut self, p: Vector3<f32>) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    #[inline]
    pub fn centre(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extent(&self, axis: usize) -> f32 {
        self.max[axis] - self.min[axis]
    }

    /// Largest side length over the first `dims` axes.
    pub fn max_extent(&self, dims: usize) -> f32 {
        (0..dims).map(|axis| self.extent(axis)).fold(0.0, f32::max)
    }

    /// Smallest cube (square, for `dims == 2`) with the same centre that
    /// encloses this box. Axes at or beyond `dims` are collapsed to zero.
    ///
    /// `centre ± half` can round to just inside the original bounds, so each
    /// side is widened back out to them where it does.
    pub fn cubed(&self, dims: usize) -> Self {
        let centre = self.centre();
        let half = self.max_extent(dims) * 0.5;
        let mut min = Vector3::new(0.0, 0.0, 0.0);
        let mut max = Vector3::new(0.0, 0.0, 0.0);
        for axis in 0..dims {
            min[axis] = (centre[axis] - half).min(self.min[axis]);
            max[axis] = (centre[axis] + half).max(self.max[axis]);
        }
        Self { min, max }
    }

    pub fn contains(&self, p: Vector3<f32>, dims: usize) -> bool {
        (0..dims).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    /// Floating point precision makes it impossible to halve a box beyond a
    /// certain size; this reports whether halving would still change anything.
    pub fn divisible(&self, dims: usize) -> bool {
        let centre = self.centre();
        (0..dims).all(|axis| {
            let c = centre[axis];
            let h = self.extent(axis) * 0.5;
            c + h != c && c - h != c
        })
    }

    /// The `index`th of the 2^`dims` equal sub-boxes. Bit `axis` of `index`
    /// selects the upper half along that axis.
    pub fn sub_box(&self, index: usize, dims: usize) -> Self {
        let centre = self.centre();
        let mut sub = *self;
        for axis in 0..dims {
            if index & (1 << axis) != 0 {
                sub.min[axis] = centre[axis];
            } else {
                sub.max[axis] = centre[axis];
            }
        }
        sub
    }

    /// Index of the sub-box that `p` falls into, see [`BoundingBox::sub_box`].
    #[inline]
    pub fn sub_index(&self, p: Vector3<f32>, dims: usize) -> usize {
        let centre = self.centre();
        (0..dims).fold(0, |index, axis| {
            index + (usize::from(p[axis] - centre[axis] >= 0.0) << axis)
        })
    }
}
