use std::sync::atomic::{AtomicBool, Ordering};

use cgmath::{InnerSpace, Vector3, Zero};
use rayon::iter::{
    IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator, ParallelIterator,
};

use crate::{
    config::Dimensionality,
    constants::JIGGLE,
    graph::Component,
    positions::NodePositions,
    sim::{
        ForceDirectedParams, attract,
        barnes_hut::BarnesHutTree,
        convergence::{ConvergenceDetector, ConvergencePhase},
        damp_oscillations, initial, repulse,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Positions moved one step.
    Completed,
    /// Stopped early; positions are as they were before the call.
    Cancelled,
    /// Nothing to do until the layout is unfinished.
    Finished,
}

#[derive(Debug, Clone, Copy)]
struct Displacement {
    repulsive: Vector3<f32>,
    attractive: Vector3<f32>,
    /// Damped net displacement of the current iteration.
    next: Vector3<f32>,
    /// Net displacement applied in the previous iteration.
    previous: Vector3<f32>,
}

impl Default for Displacement {
    fn default() -> Self {
        Self {
            repulsive: Vector3::zero(),
            attractive: Vector3::zero(),
            next: Vector3::zero(),
            previous: Vector3::zero(),
        }
    }
}

/// Layout state of one connected component. Positions are held by local
/// index and copied out to the shared store by the scheduler.
#[derive(Debug)]
pub struct ForceDirectedLayout {
    component: Component,
    positions: Vec<Vector3<f32>>,
    displacements: Vec<Displacement>,
    // Per edge attraction, gathered onto both endpoints in the combine pass
    edge_forces: Vec<Vector3<f32>>,
    tree_2d: BarnesHutTree<2>,
    tree_3d: BarnesHutTree<3>,
    convergence: ConvergenceDetector,
    seeded: bool,
    flattened: bool,
    iterations: u64,
}

impl ForceDirectedLayout {
    /// A layout that seeds its own starting positions on the first iteration.
    pub fn new(component: Component) -> Self {
        let n = component.num_nodes();
        let m = component.num_edges();
        Self {
            component,
            positions: vec![Vector3::zero(); n],
            displacements: vec![Displacement::default(); n],
            edge_forces: vec![Vector3::zero(); m],
            tree_2d: BarnesHutTree::new(0.0),
            tree_3d: BarnesHutTree::new(0.0),
            convergence: ConvergenceDetector::new(),
            seeded: false,
            flattened: false,
            iterations: 0,
        }
    }

    /// A layout continuing from positions in `store`. Nodes the store knows
    /// nothing about are placed next to their neighbours; if it knows none of
    /// them the component is seeded as if new. Positions that all lie in the
    /// z = 0 plane count as a 2D layout, so a 3D iteration jiggles them first.
    pub fn with_known_positions(component: Component, store: &NodePositions) -> Self {
        let mut layout = Self::new(component);
        let known: Vec<bool> = layout
            .component
            .node_ids()
            .iter()
            .zip(layout.positions.iter_mut())
            .map(|(node, position)| match store.get(*node) {
                Some(p) => {
                    *position = p;
                    true
                }
                None => false,
            })
            .collect();
        layout.seeded = initial::place_missing(&layout.component, &mut layout.positions, &known);
        layout.flattened = layout.seeded
            && layout.positions.len() > 1
            && layout.positions.iter().all(|p| p.z == 0.0);
        layout
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Current positions, by component-local index.
    pub fn positions(&self) -> &[Vector3<f32>] {
        &self.positions
    }

    /// Whether every node has a position, seeded or carried over.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn phase(&self) -> ConvergencePhase {
        if self.component.num_nodes() <= 1 {
            ConvergencePhase::Finished
        } else {
            self.convergence.phase()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == ConvergencePhase::Finished
    }

    pub fn unfinish(&mut self) {
        self.convergence.unfinish();
    }

    /// Copy the positions out, keyed by node.
    pub fn write_positions(&self, store: &mut NodePositions) {
        store.update(
            self.component
                .node_ids()
                .iter()
                .copied()
                .zip(self.positions.iter().copied()),
        );
    }

    fn seed(&mut self) {
        initial::seed(&self.component, &mut self.positions);
        self.displacements.fill(Displacement::default());
        self.seeded = true;
        self.flattened = false;
    }

    fn flatten(&mut self) {
        for position in &mut self.positions {
            position.z = 0.0;
        }
        for displacement in &mut self.displacements {
            displacement.previous.z = 0.0;
        }
        self.flattened = true;
    }

    /// Move a flattened layout off the plane so 3D repulsion has a gradient
    /// to work with.
    fn jiggle(&mut self) {
        for (i, position) in self.positions.iter_mut().enumerate() {
            position.z = if i % 2 == 0 { JIGGLE } else { -JIGGLE };
        }
        self.flattened = false;
    }

    /// Run one iteration. `cancel` is polled per node and per edge; when it
    /// is seen set, no position changes.
    pub fn iterate(&mut self, params: &ForceDirectedParams, cancel: &AtomicBool) -> IterationOutcome {
        if self.is_finished() {
            return IterationOutcome::Finished;
        }

        if !self.seeded {
            self.seed();
        }
        match params.dimensionality {
            Dimensionality::TwoD if !self.flattened => self.flatten(),
            Dimensionality::ThreeD if self.flattened => self.jiggle(),
            _ => {}
        }

        let Self {
            component,
            positions,
            displacements,
            edge_forces,
            tree_2d,
            tree_3d,
            ..
        } = &mut *self;
        let dimensionality = params.dimensionality;
        match dimensionality {
            Dimensionality::TwoD => {
                tree_2d.set_theta(params.theta);
                tree_2d.build(positions);
            }
            Dimensionality::ThreeD => {
                tree_3d.set_theta(params.theta);
                tree_3d.build(positions);
            }
        }

        let component: &Component = component;
        let tree_2d: &BarnesHutTree<2> = tree_2d;
        let tree_3d: &BarnesHutTree<3> = tree_3d;
        let positions: &[Vector3<f32>] = positions;
        let cancelled = || cancel.load(Ordering::Relaxed);
        let (short_range, long_range) = (params.short_range, params.long_range);
        let kernel = move |mass: u32, difference: Vector3<f32>, distance_sq: f32| {
            difference * (mass as f32 * repulse(distance_sq, short_range, long_range))
        };

        rayon::join(
            || {
                displacements
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(i, displacement)| {
                        if cancelled() {
                            return;
                        }
                        let push = match dimensionality {
                            Dimensionality::TwoD => tree_2d.evaluate_kernel(positions, i, kernel),
                            Dimensionality::ThreeD => tree_3d.evaluate_kernel(positions, i, kernel),
                        };
                        displacement.repulsive = -push;
                    })
            },
            || {
                edge_forces
                    .par_iter_mut()
                    .zip(component.endpoints().par_iter())
                    .for_each(|(force, &(source, target))| {
                        if cancelled() {
                            return;
                        }
                        *force = if source == target {
                            Vector3::zero()
                        } else {
                            attract(positions[target] - positions[source])
                        };
                    })
            },
        );
        if cancelled() {
            return IterationOutcome::Cancelled;
        }

        let edge_forces: &[Vector3<f32>] = edge_forces;
        displacements
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, displacement)| {
                if cancelled() {
                    return;
                }
                let mut attractive = Vector3::zero();
                for &edge in component.incident_edges(i) {
                    let (source, target) = component.endpoints()[edge];
                    if source == target {
                        continue;
                    }
                    if i == target {
                        attractive -= edge_forces[edge];
                    } else {
                        attractive += edge_forces[edge];
                    }
                }
                displacement.attractive = attractive;

                let mut previous = displacement.previous;
                let mut next = displacement.repulsive + displacement.attractive;
                damp_oscillations(&mut previous, &mut next);
                displacement.next = next;
            });
        if cancelled() {
            return IterationOutcome::Cancelled;
        }

        // Serial from here so the statistics come out the same on every run
        let n = self.positions.len();
        let mut total = 0.0;
        for (position, displacement) in self.positions.iter_mut().zip(&mut self.displacements) {
            *position += displacement.next;
            displacement.previous = displacement.next;
            total += displacement.next.magnitude();
        }
        let mean = total / n as f32;
        let variance = self
            .displacements
            .iter()
            .map(|d| {
                let deviation = d.next.magnitude() - mean;
                deviation * deviation
            })
            .sum::<f32>()
            / n as f32;

        self.convergence.update(mean, variance.sqrt());
        self.iterations += 1;
        IterationOutcome::Completed
    }
}
