use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use cgmath::{Vector3, Zero};

use crate::{
    constants::{DEFAULT_SCALING, DEFAULT_SMOOTHING, MAX_SMOOTHING},
    graph::NodeId,
    spatial::BoundingBox,
};

/// The most recent positions of a single node, newest last.
#[derive(Debug, Clone, Copy)]
pub struct MeanPosition {
    samples: [Vector3<f32>; MAX_SMOOTHING],
    head: usize,
    len: usize,
}

impl Default for MeanPosition {
    fn default() -> Self {
        Self {
            samples: [Vector3::zero(); MAX_SMOOTHING],
            head: 0,
            len: 0,
        }
    }
}

impl MeanPosition {
    pub fn is_set(&self) -> bool {
        self.len > 0
    }

    pub fn push(&mut self, position: Vector3<f32>) {
        self.samples[self.head] = position;
        self.head = (self.head + 1) % MAX_SMOOTHING;
        self.len = (self.len + 1).min(MAX_SMOOTHING);
    }

    /// Forget the history, keeping only `position`.
    pub fn reset(&mut self, position: Vector3<f32>) {
        *self = Self::default();
        self.push(position);
    }

    pub fn newest(&self) -> Vector3<f32> {
        self.samples[(self.head + MAX_SMOOTHING - 1) % MAX_SMOOTHING]
    }

    /// Mean of the newest `samples` positions (fewer if not enough are recorded).
    pub fn mean(&self, samples: usize) -> Vector3<f32> {
        let count = samples.clamp(1, MAX_SMOOTHING).min(self.len);
        if count == 0 {
            return Vector3::zero();
        }
        let mut sum = Vector3::zero();
        for i in 0..count {
            sum += self.samples[(self.head + MAX_SMOOTHING - 1 - i) % MAX_SMOOTHING];
        }
        sum / count as f32
    }
}

/// One position per node, indexed by [`NodeId`].
#[derive(Debug, Clone)]
pub struct NodePositions {
    positions: Vec<MeanPosition>,
    scale: f32,
    smoothing: usize,
}

impl Default for NodePositions {
    fn default() -> Self {
        Self::new()
    }
}

impl NodePositions {
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            scale: DEFAULT_SCALING,
            smoothing: DEFAULT_SMOOTHING,
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.positions
            .get(node.to_index())
            .is_some_and(MeanPosition::is_set)
    }

    pub fn get(&self, node: NodeId) -> Option<Vector3<f32>> {
        self.positions
            .get(node.to_index())
            .filter(|p| p.is_set())
            .map(MeanPosition::newest)
    }

    pub fn set(&mut self, node: NodeId, position: Vector3<f32>) {
        let idx = node.to_index();
        if idx >= self.positions.len() {
            self.positions.resize(idx + 1, MeanPosition::default());
        }
        self.positions[idx].push(position);
    }

    /// Set a position without any smoothing history behind it.
    pub fn set_exact(&mut self, node: NodeId, position: Vector3<f32>) {
        self.set(node, position);
        self.positions[node.to_index()].reset(position);
    }

    pub fn remove(&mut self, node: NodeId) {
        if let Some(p) = self.positions.get_mut(node.to_index()) {
            *p = MeanPosition::default();
        }
    }

    /// Bulk update from `(node, position)` pairs.
    pub fn update(&mut self, positions: impl IntoIterator<Item = (NodeId, Vector3<f32>)>) {
        for (node, position) in positions {
            self.set(node, position);
        }
    }

    /// Project the given nodes onto the z = 0 plane.
    pub fn flatten(&mut self, nodes: &[NodeId]) {
        for node in nodes {
            if let Some(mut position) = self.get(*node) {
                position.z = 0.0;
                self.set_exact(*node, position);
            }
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    pub fn smoothing(&self) -> usize {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: usize) {
        self.smoothing = smoothing.clamp(1, MAX_SMOOTHING);
    }

    /// What a renderer should draw: the smoothed position, scaled.
    pub fn get_scaled_and_smoothed(&self, node: NodeId) -> Option<Vector3<f32>> {
        self.positions
            .get(node.to_index())
            .filter(|p| p.is_set())
            .map(|p| p.mean(self.smoothing) * self.scale)
    }

    pub fn bounding_box(&self, nodes: &[NodeId]) -> Option<BoundingBox> {
        BoundingBox::from_points(nodes.iter().filter_map(|node| self.get(*node)))
    }

    pub fn centre_of_mass(&self, nodes: &[NodeId]) -> Option<Vector3<f32>> {
        let mut sum = Vector3::zero();
        let mut count = 0usize;
        for position in nodes.iter().filter_map(|node| self.get(*node)) {
            sum += position;
            count += 1;
        }
        (count > 0).then(|| sum / count as f32)
    }
}

/// The live position store shared between the layout worker and readers.
///
/// The lock is only held while a finished batch is copied in or while a
/// reader looks at the positions; solving happens on private copies.
pub struct SharedPositions {
    positions: Mutex<NodePositions>,
    updated: AtomicBool,
}

impl Default for SharedPositions {
    fn default() -> Self {
        Self::new(NodePositions::new())
    }
}

impl SharedPositions {
    pub fn new(positions: NodePositions) -> Self {
        Self {
            positions: Mutex::new(positions),
            updated: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NodePositions> {
        self.positions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the store and flag it as updated.
    pub fn store<R>(&self, f: impl FnOnce(&mut NodePositions) -> R) -> R {
        let result = f(&mut self.lock());
        self.updated.store(true, Ordering::Release);
        result
    }

    pub fn read<R>(&self, f: impl FnOnce(&NodePositions) -> R) -> R {
        f(&self.lock())
    }

    pub fn get(&self, node: NodeId) -> Option<Vector3<f32>> {
        self.lock().get(node)
    }

    pub fn snapshot(&self) -> NodePositions {
        self.lock().clone()
    }

    /// Return whether the positions changed since the last call.
    pub fn take_updated(&self) -> bool {
        self.updated
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}
