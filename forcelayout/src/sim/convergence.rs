//! Decides when a layout has stopped improving, from the mean and standard
//! deviation of its per-node displacements.
//!
//! - `Initial`: wait for the spread of displacements to collapse, then move
//!   on to `FineTune`. A layout whose spread keeps growing is handed to
//!   `Oscillate` instead.
//! - `FineTune`: keep going while the smoothed spread still shrinks
//!   noticeably, finish once it levels off.
//! - `Oscillate`: compare the spread over long windows, finish once two
//!   successive windows agree to within a percent. Gives up and returns to
//!   `Initial` after a few windows.
//! - `Finished`: terminal until [`ConvergenceDetector::unfinish`].

use log::trace;

use crate::constants::{
    FINETUNE_DELTA_SAMPLE_SIZE, FINETUNE_SMOOTHING_SIZE, FINETUNE_STDDEV_DELTA,
    INITIAL_SMOOTHING_SIZE, MAXIMUM_AVG_FORCE_FOR_STOP, MINIMUM_STDDEV_THRESHOLD,
    OSCILLATE_DELTA_SAMPLE_SIZE, OSCILLATE_RUN_COUNT, OSCILLATE_STDDEV_DELTA_PERCENT,
    STDDEV_INCREASES_BEFORE_SWITCH_TO_OSCILLATE,
};

/// Fixed capacity ring of samples; once full, each push evicts the oldest.
#[derive(Debug, Clone)]
pub struct CircularBuffer<const N: usize> {
    samples: [f32; N],
    head: usize,
    len: usize,
}

impl<const N: usize> Default for CircularBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CircularBuffer<N> {
    pub fn new() -> Self {
        Self {
            samples: [0.0; N],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, sample: f32) {
        self.samples[self.head] = sample;
        self.head = (self.head + 1) % N;
        self.len = (self.len + 1).min(N);
    }

    /// The `index`th oldest sample.
    #[inline]
    pub fn at(&self, index: usize) -> f32 {
        debug_assert!(index < self.len);
        self.samples[(self.head + N - self.len + index) % N]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Average of samples `start..end` weighted 1, 2, ... toward the newest,
    /// divided once more by the window length. Only ever compared against
    /// values computed the same way.
    pub fn weighted_average(&self, start: usize, end: usize) -> f32 {
        let size = end - start;
        let gauss_sum = (size * (size + 1)) as f32 / 2.0;
        let mut average = 0.0;
        for i in start..end {
            average += self.at(i) * ((i - start) + 1) as f32 / gauss_sum;
        }
        average / size as f32
    }
}

/// The phases, without their bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergencePhase {
    Initial,
    FineTune,
    Oscillate,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PhaseState {
    Initial {
        /// Checks (not necessarily consecutive) where the smoothed spread grew.
        increasing_std_dev_count: u32,
    },
    FineTune,
    Oscillate {
        run_count: u32,
        previous_std_dev: f32,
    },
    Finished,
}

impl PhaseState {
    fn initial() -> Self {
        PhaseState::Initial {
            increasing_std_dev_count: 0,
        }
    }

    fn phase(&self) -> ConvergencePhase {
        match self {
            PhaseState::Initial { .. } => ConvergencePhase::Initial,
            PhaseState::FineTune => ConvergencePhase::FineTune,
            PhaseState::Oscillate { .. } => ConvergencePhase::Oscillate,
            PhaseState::Finished => ConvergencePhase::Finished,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvergenceDetector {
    state: PhaseState,
    std_devs: CircularBuffer<FINETUNE_DELTA_SAMPLE_SIZE>,
    avg_forces: CircularBuffer<FINETUNE_DELTA_SAMPLE_SIZE>,
    capture_std_devs: CircularBuffer<OSCILLATE_DELTA_SAMPLE_SIZE>,
}

impl Default for ConvergenceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvergenceDetector {
    pub fn new() -> Self {
        Self {
            state: PhaseState::initial(),
            std_devs: CircularBuffer::new(),
            avg_forces: CircularBuffer::new(),
            capture_std_devs: CircularBuffer::new(),
        }
    }

    pub fn phase(&self) -> ConvergencePhase {
        self.state.phase()
    }

    pub fn is_finished(&self) -> bool {
        self.state == PhaseState::Finished
    }

    /// Force a fresh evaluation, from any phase.
    pub fn unfinish(&mut self) {
        if self.state != PhaseState::initial() {
            trace!("Convergence: {:?} -> Initial (unfinished)", self.phase());
        }
        self.state = PhaseState::initial();
    }

    /// Feed one iteration's displacement statistics, returning the phase
    /// they leave the detector in.
    pub fn update(&mut self, mean: f32, std_dev: f32) -> ConvergencePhase {
        match self.state {
            PhaseState::Initial {
                increasing_std_dev_count,
            } => self.initial(mean, std_dev, increasing_std_dev_count),
            PhaseState::FineTune => self.fine_tune(),
            PhaseState::Oscillate {
                run_count,
                previous_std_dev,
            } => self.oscillate(run_count, previous_std_dev),
            PhaseState::Finished => {}
        }

        if !self.is_finished() {
            self.std_devs.push(std_dev);
            self.avg_forces.push(mean);
            self.capture_std_devs.push(std_dev);
        }
        self.phase()
    }

    fn initial(&mut self, mean: f32, std_dev: f32, mut increasing: u32) {
        if std_dev < MINIMUM_STDDEV_THRESHOLD && mean < MAXIMUM_AVG_FORCE_FOR_STOP {
            trace!("Convergence: Initial -> FineTune (std dev {std_dev}, mean {mean})");
            self.state = PhaseState::FineTune;
            return;
        }

        let capture = &self.capture_std_devs;
        if capture.is_full() {
            let len = capture.len();
            let current = capture.weighted_average(len - INITIAL_SMOOTHING_SIZE, len);
            let previous = capture.weighted_average(
                len - 2 * INITIAL_SMOOTHING_SIZE,
                len - INITIAL_SMOOTHING_SIZE,
            );

            if increasing >= STDDEV_INCREASES_BEFORE_SWITCH_TO_OSCILLATE {
                trace!("Convergence: Initial -> Oscillate after {increasing} increases");
                self.state = PhaseState::Oscillate {
                    run_count: 0,
                    previous_std_dev: 0.0,
                };
                return;
            }
            if current > previous {
                increasing += 1;
            }
        }

        self.state = PhaseState::Initial {
            increasing_std_dev_count: increasing,
        };
    }

    fn fine_tune(&mut self) {
        if !(self.avg_forces.is_full() && self.std_devs.is_full()) {
            return;
        }

        let len = self.std_devs.len();
        let previous = self.std_devs.weighted_average(
            len - 2 * FINETUNE_SMOOTHING_SIZE,
            len - FINETUNE_SMOOTHING_SIZE,
        );
        let current = self
            .std_devs
            .weighted_average(len - FINETUNE_SMOOTHING_SIZE, len);

        let delta = previous - current;
        if (0.0..FINETUNE_STDDEV_DELTA).contains(&delta) {
            trace!("Convergence: FineTune -> Finished (delta {delta})");
            self.finish();
        }
    }

    fn oscillate(&mut self, mut run_count: u32, previous_std_dev: f32) {
        if !self.capture_std_devs.is_full() {
            return;
        }

        let average = self
            .capture_std_devs
            .weighted_average(0, OSCILLATE_DELTA_SAMPLE_SIZE);
        let percent_delta = if previous_std_dev != 0.0 {
            (previous_std_dev - average) / previous_std_dev * 100.0
        } else {
            OSCILLATE_STDDEV_DELTA_PERCENT
        };

        if percent_delta.abs() < OSCILLATE_STDDEV_DELTA_PERCENT {
            trace!("Convergence: Oscillate -> Finished ({percent_delta}%)");
            self.finish();
            return;
        }

        self.capture_std_devs.clear();
        run_count += 1;
        self.state = if run_count >= OSCILLATE_RUN_COUNT {
            trace!("Convergence: Oscillate -> Initial after {run_count} runs");
            PhaseState::initial()
        } else {
            PhaseState::Oscillate {
                run_count,
                previous_std_dev: average,
            }
        };
    }

    fn finish(&mut self) {
        self.state = PhaseState::Finished;
        self.std_devs.clear();
        self.avg_forces.clear();
        self.capture_std_devs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_buffer_keeps_newest() {
        let mut buffer = CircularBuffer::<4>::new();
        for i in 0..6 {
            buffer.push(i as f32);
        }
        assert!(buffer.is_full());
        assert_eq!(
            (0..4).map(|i| buffer.at(i)).collect::<Vec<_>>(),
            [2.0, 3.0, 4.0, 5.0]
        );
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn weighted_average_favours_newest() {
        let mut buffer = CircularBuffer::<3>::new();
        for v in [3.0, 0.0, 6.0] {
            buffer.push(v);
        }
        // (3·1 + 0·2 + 6·3) / 6 / 3
        assert!((buffer.weighted_average(0, 3) - 21.0 / 18.0).abs() < 1e-6);

        let mut constant = CircularBuffer::<10>::new();
        for _ in 0..10 {
            constant.push(4.0);
        }
        assert!((constant.weighted_average(0, 10) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn settles_through_fine_tune() {
        let mut detector = ConvergenceDetector::new();
        assert_eq!(detector.update(0.5, 0.001), ConvergencePhase::FineTune);

        let mut updates = 1;
        while !detector.is_finished() {
            assert_eq!(detector.phase(), ConvergencePhase::FineTune);
            detector.update(0.5, 0.001);
            updates += 1;
            assert!(updates < 100);
        }
        // The fine tune windows need a full buffer before the first check
        assert_eq!(updates, FINETUNE_DELTA_SAMPLE_SIZE + 1);
    }

    #[test]
    fn fine_tune_waits_while_spread_shrinks() {
        let mut detector = ConvergenceDetector::new();
        detector.update(0.5, 0.001);

        let mut finished_at = None;
        for i in 0..2000 {
            detector.update(0.5, 1.0 / (1.0 + i as f32));
            if detector.is_finished() {
                finished_at = Some(i);
                break;
            }
            assert_eq!(detector.phase(), ConvergencePhase::FineTune);
        }
        let finished_at = finished_at.unwrap();
        assert!(finished_at > 2 * FINETUNE_DELTA_SAMPLE_SIZE);
    }

    #[test]
    fn finished_is_terminal_until_unfinished() {
        let mut detector = ConvergenceDetector::new();
        for _ in 0..60 {
            detector.update(0.5, 0.001);
        }
        assert!(detector.is_finished());
        assert!(detector.std_devs.is_empty());

        assert_eq!(detector.update(100.0, 100.0), ConvergencePhase::Finished);
        assert!(detector.capture_std_devs.is_empty());

        detector.unfinish();
        assert_eq!(detector.phase(), ConvergencePhase::Initial);
    }

    #[test]
    fn growing_spread_switches_to_oscillate_then_settles() {
        let mut detector = ConvergenceDetector::new();
        let mut updates = 0;
        while detector.phase() == ConvergencePhase::Initial {
            detector.update(10.0, 1.0 + updates as f32 * 0.001);
            updates += 1;
            assert!(updates <= 2000);
        }
        assert_eq!(detector.phase(), ConvergencePhase::Oscillate);
        // One full capture buffer, then one increase per further iteration
        assert_eq!(
            updates,
            OSCILLATE_DELTA_SAMPLE_SIZE + STDDEV_INCREASES_BEFORE_SWITCH_TO_OSCILLATE as usize + 1
        );

        let mut settle = 0;
        while !detector.is_finished() {
            assert_eq!(detector.phase(), ConvergencePhase::Oscillate);
            detector.update(10.0, 5.0);
            settle += 1;
            assert!(settle <= 1500);
        }
    }

    #[test]
    fn oscillate_gives_up_after_run_count() {
        let mut detector = ConvergenceDetector::new();
        detector.state = PhaseState::Oscillate {
            run_count: 0,
            previous_std_dev: 0.0,
        };

        let mut saw_initial = false;
        for i in 0..3000 {
            let std_dev = 2.0f32.powi(i / 500);
            if detector.update(10.0, std_dev) == ConvergencePhase::Initial {
                saw_initial = true;
                break;
            }
        }
        assert!(saw_initial);
    }
}
