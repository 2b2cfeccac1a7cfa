use crate::constants::{DEFAULT_SCALING, DEFAULT_SMOOTHING, DEFAULT_THETA};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimensionality {
    TwoD,
    #[default]
    ThreeD,
}

impl Dimensionality {
    pub fn dims(self) -> usize {
        match self {
            Dimensionality::TwoD => 2,
            Dimensionality::ThreeD => 3,
        }
    }
}

/// Startup configuration of a [`LayoutScheduler`](crate::LayoutScheduler).
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Barnes-Hut opening threshold.
    pub theta: f32,
    pub dimensionality: Dimensionality,
    /// Worker pool size, rayon picks one if `None`.
    pub threads: Option<usize>,
    pub scaling: f32,
    pub smoothing: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            theta: DEFAULT_THETA,
            dimensionality: Dimensionality::default(),
            threads: None,
            scaling: DEFAULT_SCALING,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}
