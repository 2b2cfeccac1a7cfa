use cgmath::{InnerSpace, Vector3};

use crate::{
    config::Dimensionality,
    constants::{
        ATTRACTION, DAMPING_A, DAMPING_B, DAMPING_C, DEFAULT_THETA, LONG_RANGE_OFFSET,
        MAX_DISPLACEMENT, REPULSE_EPSILON,
    },
    error::Result,
    settings::{LONG_RANGE_REPULSE_TERM, LayoutSettings, SHORT_RANGE_REPULSE_TERM},
};

pub mod barnes_hut;
pub mod convergence;
pub mod direct;
pub mod force_directed;
pub mod initial;

/// Everything an iteration reads from outside the solver. Snapshotted once
/// per batch so settings never change mid-iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceDirectedParams {
    pub short_range: f32,
    /// Long range term with [`LONG_RANGE_OFFSET`] already added.
    pub long_range: f32,
    pub theta: f32,
    pub dimensionality: Dimensionality,
}

impl Default for ForceDirectedParams {
    fn default() -> Self {
        let settings = LayoutSettings::force_directed();
        Self::from_settings(&settings, DEFAULT_THETA, Dimensionality::default())
            .unwrap_or(Self {
                short_range: 1_000_000.0,
                long_range: 10.0 + LONG_RANGE_OFFSET,
                theta: DEFAULT_THETA,
                dimensionality: Dimensionality::default(),
            })
    }
}

impl ForceDirectedParams {
    pub fn from_settings(
        settings: &LayoutSettings,
        theta: f32,
        dimensionality: Dimensionality,
    ) -> Result<Self> {
        Ok(Self {
            short_range: settings.value(SHORT_RANGE_REPULSE_TERM)?,
            long_range: LONG_RANGE_OFFSET + settings.value(LONG_RANGE_REPULSE_TERM)?,
            theta,
            dimensionality,
        })
    }
}

/// Repulsion magnitude per unit of difference vector. Tuned by hand: the
/// short range term dominates for close pairs, the long range term for
/// distant ones.
#[inline]
pub fn repulse(distance_sq: f32, short_range: f32, long_range: f32) -> f32 {
    (distance_sq * distance_sq * long_range + short_range)
        / (distance_sq * distance_sq * distance_sq + REPULSE_EPSILON)
}

/// Pull of an edge whose endpoints are `difference` apart, source to target.
#[inline]
pub fn attract(difference: Vector3<f32>) -> Vector3<f32> {
    difference * (difference.magnitude2() * ATTRACTION)
}

/// Clamp `next`, then hold it back if it turns away from `previous`.
/// Displacements keeping their direction may grow, reversals are suppressed.
/// `previous` becomes the damped `next`.
pub fn damp_oscillations(previous: &mut Vector3<f32>, next: &mut Vector3<f32>) {
    let previous_length = previous.magnitude();
    let mut next_length = next.magnitude();

    if next_length > MAX_DISPLACEMENT {
        *next = *next * (MAX_DISPLACEMENT / next_length);
        next_length = MAX_DISPLACEMENT;
    }

    if previous_length > 0.0 && next_length > 0.0 {
        let dot = (*previous / previous_length).dot(*next / next_length);
        let f = DAMPING_A * dot * dot + DAMPING_B * dot + DAMPING_C;
        if next_length > previous_length * f {
            *next *= f * previous_length / next_length;
        }
    }

    *previous = *next;
}
