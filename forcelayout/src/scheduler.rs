//! Runs the per-component layouts on a dedicated thread.
//!
//! Lock order is `control` then `registry` then the position store. The
//! worker holds `registry` for a whole batch, but never while it waits on
//! `control`.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    thread::JoinHandle,
};

use cgmath::{Vector3, Zero};
use log::{debug, error};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    config::{Dimensionality, LayoutConfig},
    error::{Error, Result},
    graph::{Component, ComponentId, NodeId},
    perf::PerformanceCounter,
    positions::{NodePositions, SharedPositions},
    settings::{LayoutSetting, LayoutSettings},
    sim::{
        ForceDirectedParams,
        force_directed::{ForceDirectedLayout, IterationOutcome},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutEvent {
    /// A batch of iterations finished and positions moved.
    Executed,
    PausedChanged(bool),
    SettingChanged(String),
}

#[derive(Debug)]
struct Control {
    started: bool,
    /// Pause requested.
    pause: bool,
    /// The worker is asleep.
    paused: bool,
    stop: bool,
    layout_potentially_required: bool,
    unfinish_pending: bool,
    has_unfinished: bool,
    dimensionality: Dimensionality,
}

impl Control {
    fn work_to_do(&self) -> bool {
        self.has_unfinished || self.unfinish_pending
    }
}

#[derive(Debug, Default)]
struct Registry {
    layouts: BTreeMap<ComponentId, ForceDirectedLayout>,
    // Components that have had at least one iteration
    executed: HashSet<ComponentId>,
    all_executed: bool,
}

impl Registry {
    fn has_unfinished(&self) -> bool {
        self.layouts.values().any(|layout| !layout.is_finished())
    }

    fn is_executed(&self, id: ComponentId) -> bool {
        self.all_executed || self.executed.contains(&id)
    }

    /// One iteration of every unfinished layout, publishing what moved.
    /// Returns how many layouts moved.
    fn iterate(
        &mut self,
        params: &ForceDirectedParams,
        unfinish: bool,
        cancel: &AtomicBool,
        positions: &SharedPositions,
    ) -> usize {
        if unfinish {
            for layout in self.layouts.values_mut() {
                layout.unfinish();
            }
        }

        let mut iterated = Vec::new();
        for (id, layout) in self.layouts.iter_mut() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            if layout.iterate(params, cancel) == IterationOutcome::Completed {
                self.executed.insert(*id);
                iterated.push(*id);
            }
        }

        if !iterated.is_empty() {
            positions.store(|store| {
                for id in &iterated {
                    if let Some(layout) = self.layouts.get(id) {
                        layout.write_positions(store);
                    }
                }
            });
        }
        iterated.len()
    }
}

struct Shared {
    control: Mutex<Control>,
    wait_for_resume: Condvar,
    wait_for_pause: Condvar,
    cancel: AtomicBool,
    registry: Mutex<Registry>,
    positions: Arc<SharedPositions>,
    settings: RwLock<LayoutSettings>,
    theta: f32,
    pool: ThreadPool,
    subscribers: Mutex<Vec<Sender<LayoutEvent>>>,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings(&self) -> LayoutSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn params(&self, dimensionality: Dimensionality) -> ForceDirectedParams {
        let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        ForceDirectedParams::from_settings(&settings, self.theta, dimensionality).unwrap_or_else(
            |e| {
                error!("Falling back to default layout settings: {e}");
                ForceDirectedParams {
                    theta: self.theta,
                    dimensionality,
                    ..ForceDirectedParams::default()
                }
            },
        )
    }

    fn emit(&self, event: LayoutEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Request a pause and cancel the batch in flight.
    fn pause_locked(&self, control: &mut Control) {
        control.pause = true;
        if control.started && !control.paused {
            self.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Clear any pause request and wake the worker if there is anything to
    /// do. Layouts are unfinished first if something they depend on changed.
    fn resume_locked(&self, control: &mut Control) {
        if !control.work_to_do() && !control.layout_potentially_required {
            return;
        }
        if control.pause && !control.paused {
            // Pause requested but not reached yet, call it off
            self.cancel.store(false, Ordering::Relaxed);
        }
        control.pause = false;
        if control.layout_potentially_required {
            control.unfinish_pending = true;
        }
        self.wait_for_resume.notify_all();
    }
}

fn run(shared: Arc<Shared>) {
    debug!("Layout thread started");
    let mut perf = PerformanceCounter::new();

    let mut control = loop {
        let (params, unfinish) = {
            let mut control = shared.control();
            let unfinish = std::mem::take(&mut control.unfinish_pending);
            if unfinish {
                control.layout_potentially_required = false;
            }
            (shared.params(control.dimensionality), unfinish)
        };

        let active = {
            let mut guard = shared.registry();
            let registry: &mut Registry = &mut guard;
            shared.pool.install(|| {
                registry.iterate(&params, unfinish, &shared.cancel, &shared.positions)
            })
        };

        if active > 0 {
            if let Some(rate) = perf.tick() {
                debug!("Layout: {rate:.1} iterations/s, {active} active layouts");
            }
            shared.emit(LayoutEvent::Executed);
        }

        let mut control = shared.control();
        control.has_unfinished = shared.registry().has_unfinished();
        if control.stop {
            break control;
        }

        if control.pause || !control.work_to_do() {
            let reason = if control.pause { "requested" } else { "no work" };
            debug!("Layout paused ({reason})");
            control.paused = true;
            shared.cancel.store(false, Ordering::Relaxed);
            shared.wait_for_pause.notify_all();
            shared.emit(LayoutEvent::PausedChanged(true));
            perf.reset();

            control = shared
                .wait_for_resume
                .wait_while(control, |c| !c.stop && (c.pause || !c.work_to_do()))
                .unwrap_or_else(PoisonError::into_inner);
            if control.stop {
                break control;
            }

            debug!("Layout resumed");
            control.paused = false;
            shared.emit(LayoutEvent::PausedChanged(false));
        }
    };

    shared.registry().layouts.clear();
    control.started = false;
    control.paused = true;
    shared.cancel.store(false, Ordering::Relaxed);
    shared.wait_for_pause.notify_all();
    shared.wait_for_resume.notify_all();
    debug!("Layout thread stopped");
}

/// Owns one [`ForceDirectedLayout`] per component and iterates them on a
/// background thread until they converge.
pub struct LayoutScheduler {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl LayoutScheduler {
    pub fn new(config: LayoutConfig) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("layout-worker-{i}"));
        if let Some(threads) = config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        let mut positions = NodePositions::new();
        positions.set_scale(config.scaling);
        positions.set_smoothing(config.smoothing);

        Ok(Self {
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    started: false,
                    pause: false,
                    paused: true,
                    stop: false,
                    layout_potentially_required: false,
                    unfinish_pending: false,
                    has_unfinished: false,
                    dimensionality: config.dimensionality,
                }),
                wait_for_resume: Condvar::new(),
                wait_for_pause: Condvar::new(),
                cancel: AtomicBool::new(false),
                registry: Mutex::new(Registry::default()),
                positions: Arc::new(SharedPositions::new(positions)),
                settings: RwLock::new(LayoutSettings::force_directed()),
                theta: config.theta,
                pool,
                subscribers: Mutex::new(Vec::new()),
            }),
            thread: Mutex::new(None),
        })
    }

    /// The live position store.
    pub fn positions(&self) -> Arc<SharedPositions> {
        self.shared.positions.clone()
    }

    pub fn subscribe(&self) -> Receiver<LayoutEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn start(&self, control: &mut Control) -> Result<()> {
        let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        // A previous worker may still be tearing down after stop()
        if let Some(handle) = thread.take()
            && handle.join().is_err()
        {
            error!("Previous layout thread panicked");
        }

        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("layout".to_owned())
            .spawn(move || run(shared))
            .map_err(Error::Spawn)?;
        *thread = Some(handle);

        control.started = true;
        control.stop = false;
        control.paused = false;
        self.shared.cancel.store(false, Ordering::Relaxed);
        if control.layout_potentially_required {
            control.unfinish_pending = true;
        }
        Ok(())
    }

    /// Start the worker if needed and let it run. Does nothing to a started
    /// scheduler with nothing left to lay out.
    pub fn resume(&self) -> Result<()> {
        let mut control = self.shared.control();
        if !control.started {
            debug!("Starting layout");
            control.pause = false;
            return self.start(&mut control);
        }
        debug!("Resuming layout");
        self.shared.resume_locked(&mut control);
        Ok(())
    }

    /// Ask the worker to stop after the batch in flight, which is cancelled.
    pub fn pause(&self) {
        let mut control = self.shared.control();
        debug!("Pausing layout");
        self.shared.pause_locked(&mut control);
    }

    /// [`pause`](Self::pause), then block until the worker is asleep.
    pub fn pause_and_wait(&self) {
        let mut control = self.shared.control();
        self.shared.pause_locked(&mut control);
        let _control = self
            .shared
            .wait_for_pause
            .wait_while(control, |c| c.started && !c.paused)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Terminate the worker and drop every layout.
    pub fn stop(&self) {
        {
            let mut control = self.shared.control();
            if !control.started {
                self.shared.registry().layouts.clear();
                control.has_unfinished = false;
                return;
            }
            debug!("Stopping layout");
            control.stop = true;
            self.shared.cancel.store(true, Ordering::Relaxed);
            self.shared.wait_for_resume.notify_all();
        }

        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("Layout thread panicked");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.control().paused
    }

    /// Whether every layout has converged and nothing is pending, including a
    /// restart flagged by a change that has not been picked up yet.
    pub fn finished(&self) -> bool {
        let control = self.shared.control();
        !control.unfinish_pending
            && !control.layout_potentially_required
            && !self.shared.registry().has_unfinished()
    }

    pub fn is_component_iterating(&self, id: ComponentId) -> bool {
        let control = self.shared.control();
        !control.paused
            && self
                .shared
                .registry()
                .layouts
                .get(&id)
                .is_some_and(|layout| !layout.is_finished())
    }

    pub fn contains_component(&self, id: ComponentId) -> bool {
        self.shared.registry().layouts.contains_key(&id)
    }

    pub fn add_component(&self, component: Component) {
        let mut control = self.shared.control();
        let mut registry = self.shared.registry();
        let id = component.id();

        let layout = if registry.is_executed(id) {
            let layout = self
                .shared
                .positions
                .read(|store| ForceDirectedLayout::with_known_positions(component, store));
            if layout.is_seeded() {
                self.shared.positions.store(|store| layout.write_positions(store));
            }
            layout
        } else {
            ForceDirectedLayout::new(component)
        };

        if let [node] = layout.component().node_ids() {
            let node: NodeId = *node;
            self.shared.positions.store(|store| {
                if !store.contains(node) {
                    store.set_exact(node, Vector3::zero());
                }
            });
        }

        if !layout.is_finished() {
            control.has_unfinished = true;
            self.shared.wait_for_resume.notify_all();
        }
        debug!("Adding layout for {id:?} ({} nodes)", layout.component().num_nodes());
        registry.layouts.insert(id, layout);
    }

    pub fn add_all_components(&self, components: impl IntoIterator<Item = Component>) -> Result<()> {
        for component in components {
            self.add_component(component);
        }
        self.resume()
    }

    /// Drop the layout of `id`, pausing a running worker around the removal.
    pub fn remove_component(&self, id: ComponentId) -> Result<()> {
        let was_running = {
            let control = self.shared.control();
            control.started && !control.pause && !control.paused
        };
        if was_running {
            self.pause_and_wait();
        }

        let removed = {
            let mut control = self.shared.control();
            let mut registry = self.shared.registry();
            let removed = registry.layouts.remove(&id);
            registry.executed.remove(&id);
            control.has_unfinished = registry.has_unfinished();
            removed
        };

        if was_running {
            self.carry_on();
        }
        removed.map(|_| ()).ok_or(Error::UnknownComponent(id))
    }

    /// `old` has split into `new_ids`; the pieces keep the positions the old
    /// component already had rather than being seeded afresh.
    pub fn on_component_split(&self, old: ComponentId, new_ids: &[ComponentId]) {
        let mut registry = self.shared.registry();
        if registry.executed.contains(&old) {
            registry.executed.extend(new_ids.iter().copied());
        }
    }

    /// The graph changed in a way that may have unsettled converged layouts.
    /// They are restarted on the next [`resume`](Self::resume).
    pub fn on_graph_changed(&self) {
        self.shared.control().layout_potentially_required = true;
    }

    /// Replace the live positions and carry on from them. Components added
    /// later are treated as already laid out as well.
    pub fn set_starting_positions(
        &self,
        positions: impl IntoIterator<Item = (NodeId, Vector3<f32>)>,
    ) -> Result<()> {
        let was_running = {
            let control = self.shared.control();
            control.started && !control.pause && !control.paused
        };
        if was_running {
            self.pause_and_wait();
        }

        self.shared.positions.store(|store| {
            for (node, position) in positions {
                store.set_exact(node, position);
            }
        });

        {
            let mut control = self.shared.control();
            let mut registry = self.shared.registry();
            registry.all_executed = true;
            let ids: Vec<ComponentId> = registry.layouts.keys().copied().collect();
            for id in ids {
                if let Some(layout) = registry.layouts.remove(&id) {
                    let component = layout.component().clone();
                    let reloaded = self
                        .shared
                        .positions
                        .read(|store| ForceDirectedLayout::with_known_positions(component, store));
                    registry.layouts.insert(id, reloaded);
                }
            }
            control.has_unfinished = registry.has_unfinished();
        }

        if was_running {
            self.carry_on();
        }
        Ok(())
    }

    /// Undo a pause this scheduler made itself, even if there is nothing
    /// left to do.
    fn carry_on(&self) {
        let mut control = self.shared.control();
        control.pause = false;
        self.shared.resume_locked(&mut control);
    }

    pub fn dimensionality(&self) -> Dimensionality {
        self.shared.control().dimensionality
    }

    pub fn set_dimensionality(&self, dimensionality: Dimensionality) {
        let mut control = self.shared.control();
        if control.dimensionality == dimensionality {
            return;
        }
        debug!("Layout dimensionality {dimensionality:?}");
        control.dimensionality = dimensionality;
        control.layout_potentially_required = true;
        if control.started {
            self.shared.resume_locked(&mut control);
        }
    }

    pub fn settings(&self) -> LayoutSettings {
        self.shared.settings()
    }

    pub fn setting(&self, name: &str) -> Result<LayoutSetting> {
        self.shared.settings().get(name).cloned()
    }

    pub fn set_setting_value(&self, name: &str, value: f32) -> Result<()> {
        self.change_setting(name, |settings| settings.set_value(name, value))
    }

    pub fn set_setting_normalised_value(&self, name: &str, normalised: f32) -> Result<()> {
        self.change_setting(name, |settings| settings.set_normalised_value(name, normalised))
    }

    pub fn reset_setting_value(&self, name: &str) -> Result<()> {
        self.change_setting(name, |settings| settings.reset_value(name))
    }

    fn change_setting(
        &self,
        name: &str,
        change: impl FnOnce(&mut LayoutSettings) -> Result<()>,
    ) -> Result<()> {
        {
            let mut settings = self
                .shared
                .settings
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            change(&mut settings)?;
        }

        self.shared.emit(LayoutEvent::SettingChanged(name.to_owned()));
        let mut control = self.shared.control();
        control.layout_potentially_required = true;
        if control.started {
            self.shared.resume_locked(&mut control);
        }
        Ok(())
    }
}

impl Drop for LayoutScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
