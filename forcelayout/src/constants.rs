// FORCES
/// Upper bound on the length of a single node's displacement per iteration.
pub const MAX_DISPLACEMENT: f32 = 10.0;
/// Attractive force per unit of squared edge length.
pub const ATTRACTION: f32 = 0.001;
/// Added to the denominator of the repulsion function so it stays finite.
pub const REPULSE_EPSILON: f32 = 0.0001;
/// Added to the long range repulsion setting before use.
pub const LONG_RANGE_OFFSET: f32 = 0.01;
/// Length of the substitute difference vector used for coincident points.
pub const COINCIDENT_EPSILON: f32 = 0.001;

// DAMPING, f(x) = A·x² + B·x + C where x is the cosine between successive displacements
pub const DAMPING_A: f32 = 0.5;
pub const DAMPING_B: f32 = 1.2;
pub const DAMPING_C: f32 = 1.0;

// BARNES-HUT
/// Opening threshold. Smaller values = more accurate, but slower.
pub const DEFAULT_THETA: f32 = 0.8;
/// Maximum number of nodes held by a leaf before it is subdivided.
pub const BARNES_HUT_MAX_NODES_PER_LEAF: usize = 1;

// SEEDING
/// Distance between a node and the children it places around itself.
pub const SPHERE_RADIUS: f32 = 10.0;
/// Golden-section-ish step used to walk the spiral around a parent.
pub const SPIRAL_STEP: f64 = 3.6;
/// Magnitude of the out-of-plane offset applied when leaving 2D mode.
pub const JIGGLE: f32 = 0.5;

// CONVERGENCE
pub const MINIMUM_STDDEV_THRESHOLD: f32 = 0.008;
pub const FINETUNE_STDDEV_DELTA: f32 = 0.000005;
pub const OSCILLATE_STDDEV_DELTA_PERCENT: f32 = 1.0;
pub const MAXIMUM_AVG_FORCE_FOR_STOP: f32 = 1.0;
pub const OSCILLATE_DELTA_SAMPLE_SIZE: usize = 500;
pub const OSCILLATE_RUN_COUNT: u32 = 5;
pub const STDDEV_INCREASES_BEFORE_SWITCH_TO_OSCILLATE: u32 = 500;
pub const FINETUNE_DELTA_SAMPLE_SIZE: usize = 50;
pub const FINETUNE_SMOOTHING_SIZE: usize = 10;
pub const INITIAL_SMOOTHING_SIZE: usize = 50;

// PRESENTATION
/// Scale applied to positions handed to readers.
pub const DEFAULT_SCALING: f32 = 0.4;
/// Number of recent positions averaged for readers.
pub const DEFAULT_SMOOTHING: usize = 4;
/// Hard cap on the smoothing history kept per node.
pub const MAX_SMOOTHING: usize = 8;
