use std::{
    sync::mpsc::Receiver,
    time::{Duration, Instant},
};

use cgmath::{InnerSpace, Vector3};
use forcelayout::{
    Component, ComponentId, Dimensionality, Edge, Error, LayoutConfig, LayoutEvent,
    LayoutScheduler, NodeId,
    settings::{LONG_RANGE_REPULSE_TERM, SHORT_RANGE_REPULSE_TERM},
};

const TIMEOUT: Duration = Duration::from_secs(60);

fn config() -> LayoutConfig {
    LayoutConfig {
        threads: Some(2),
        ..LayoutConfig::default()
    }
}

fn component(id: usize, nodes: &[usize], edges: &[(usize, usize)]) -> Component {
    let node_ids = nodes.iter().copied().map(NodeId).collect();
    let edges = edges
        .iter()
        .enumerate()
        .map(|(i, (source, target))| Edge::new(i, *source, *target))
        .collect();
    Component::new(ComponentId(id), node_ids, edges).unwrap()
}

fn chain(id: usize, first: usize, len: usize) -> Component {
    let nodes: Vec<usize> = (first..first + len).collect();
    let edges: Vec<(usize, usize)> = nodes.windows(2).map(|w| (w[0], w[1])).collect();
    component(id, &nodes, &edges)
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < TIMEOUT, "timed out");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn wait_for_event(events: &Receiver<LayoutEvent>, wanted: &LayoutEvent) {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if &event == wanted => return,
            Ok(_) => {}
            Err(e) => panic!("no {wanted:?}: {e}"),
        }
    }
}

fn distance(scheduler: &LayoutScheduler, a: usize, b: usize) -> f32 {
    let positions = scheduler.positions();
    let a = positions.get(NodeId(a)).unwrap();
    let b = positions.get(NodeId(b)).unwrap();
    (a - b).magnitude()
}

#[test]
fn single_node_components_are_finished_at_origin() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    scheduler
        .add_all_components([component(0, &[0], &[]), component(1, &[1], &[])])
        .unwrap();

    assert!(scheduler.finished());
    let positions = scheduler.positions();
    assert_eq!(positions.get(NodeId(0)), Some(Vector3::new(0.0, 0.0, 0.0)));
    assert_eq!(positions.get(NodeId(1)), Some(Vector3::new(0.0, 0.0, 0.0)));
    assert!(!scheduler.is_component_iterating(ComponentId(0)));
}

#[test]
fn edge_converges_and_publishes_positions() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    let events = scheduler.subscribe();
    scheduler.add_all_components([chain(0, 0, 2)]).unwrap();

    wait_for_event(&events, &LayoutEvent::Executed);
    wait_until(|| scheduler.finished());

    let length = distance(&scheduler, 0, 1);
    assert!(length > 1.0 && length < 100.0, "edge length {length}");
    wait_until(|| scheduler.is_paused());
}

#[test]
fn resume_does_not_restart_finished_layouts() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    scheduler.add_all_components([chain(0, 0, 3)]).unwrap();
    wait_until(|| scheduler.finished() && scheduler.is_paused());

    let before = scheduler.positions().snapshot();
    let events = scheduler.subscribe();
    scheduler.pause();
    scheduler.resume().unwrap();

    assert!(
        events.recv_timeout(Duration::from_millis(200)).is_err(),
        "worker woke up"
    );
    assert!(scheduler.finished());
    for node in 0..3 {
        assert_eq!(
            scheduler.positions().get(NodeId(node)),
            before.get(NodeId(node))
        );
    }
}

#[test]
fn removing_a_component_drops_its_layout() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    scheduler
        .add_all_components([chain(0, 0, 20), chain(1, 20, 20)])
        .unwrap();

    scheduler.remove_component(ComponentId(0)).unwrap();
    assert!(!scheduler.contains_component(ComponentId(0)));
    assert!(scheduler.contains_component(ComponentId(1)));
    assert!(matches!(
        scheduler.remove_component(ComponentId(0)),
        Err(Error::UnknownComponent(ComponentId(0)))
    ));

    wait_until(|| scheduler.finished());
}

#[test]
fn changing_a_setting_restarts_finished_layouts() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    scheduler.add_all_components([chain(0, 0, 4)]).unwrap();
    wait_until(|| scheduler.finished() && scheduler.is_paused());
    let before = distance(&scheduler, 0, 3);

    let events = scheduler.subscribe();
    scheduler
        .set_setting_value(LONG_RANGE_REPULSE_TERM, 0.0)
        .unwrap();

    wait_for_event(
        &events,
        &LayoutEvent::SettingChanged(LONG_RANGE_REPULSE_TERM.to_owned()),
    );
    wait_for_event(&events, &LayoutEvent::Executed);
    wait_until(|| scheduler.finished() && scheduler.is_paused());

    assert_eq!(
        scheduler.setting(LONG_RANGE_REPULSE_TERM).unwrap().value(),
        0.0
    );
    assert_ne!(distance(&scheduler, 0, 3), before);
}

#[test]
fn unknown_setting_is_rejected() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    let events = scheduler.subscribe();

    assert!(matches!(
        scheduler.set_setting_value("Gravity", 1.0),
        Err(Error::UnknownSetting(name)) if name == "Gravity"
    ));
    assert!(events.try_recv().is_err());
}

#[test]
fn two_dimensional_layouts_stay_flat() {
    let scheduler = LayoutScheduler::new(LayoutConfig {
        dimensionality: Dimensionality::TwoD,
        ..config()
    })
    .unwrap();
    let star: Vec<(usize, usize)> = (1..12).map(|leaf| (0, leaf)).collect();
    let nodes: Vec<usize> = (0..12).collect();
    scheduler
        .add_all_components([component(0, &nodes, &star)])
        .unwrap();
    wait_until(|| scheduler.finished());

    let positions = scheduler.positions();
    for node in nodes {
        assert_eq!(positions.get(NodeId(node)).unwrap().z, 0.0);
    }
}

#[test]
fn pause_and_wait_stops_the_worker() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    let nodes: Vec<usize> = (0..300).collect();
    let edges: Vec<(usize, usize)> = (1..300).map(|i| (i / 2, i)).collect();
    scheduler
        .add_all_components([component(0, &nodes, &edges)])
        .unwrap();

    scheduler.pause_and_wait();
    assert!(scheduler.is_paused());
    let frozen = scheduler.positions().snapshot();
    std::thread::sleep(Duration::from_millis(100));
    for node in 0..300 {
        assert_eq!(
            scheduler.positions().get(NodeId(node)),
            frozen.get(NodeId(node))
        );
    }

    scheduler.resume().unwrap();
    wait_until(|| !scheduler.is_paused() || scheduler.finished());
    scheduler.stop();
    assert!(scheduler.finished());
}

fn max_abs_z(scheduler: &LayoutScheduler, nodes: impl IntoIterator<Item = usize>) -> f32 {
    let positions = scheduler.positions();
    nodes
        .into_iter()
        .map(|node| positions.get(NodeId(node)).unwrap().z.abs())
        .fold(0.0, f32::max)
}

fn random_tree(id: usize, n: usize) -> Component {
    let nodes: Vec<usize> = (0..n).collect();
    let edges: Vec<(usize, usize)> = (1..n).map(|i| ((i * 7 + 3) % i, i)).collect();
    component(id, &nodes, &edges)
}

#[test]
fn dimensionality_switch_flattens_and_restores_depth() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    scheduler.add_all_components([random_tree(0, 25)]).unwrap();
    wait_until(|| scheduler.finished() && scheduler.is_paused());
    assert!(max_abs_z(&scheduler, 0..25) > 0.0);

    scheduler.set_dimensionality(Dimensionality::TwoD);
    assert_eq!(scheduler.dimensionality(), Dimensionality::TwoD);
    wait_until(|| scheduler.finished() && scheduler.is_paused());
    assert_eq!(max_abs_z(&scheduler, 0..25), 0.0);

    scheduler.set_dimensionality(Dimensionality::ThreeD);
    wait_until(|| scheduler.finished() && scheduler.is_paused());
    assert!(max_abs_z(&scheduler, 0..25) > 0.0);
    let positions = scheduler.positions();
    for node in 0..25 {
        let p = positions.get(NodeId(node)).unwrap();
        assert!(p.x.is_finite() && p.y.is_finite() && p.z.is_finite());
    }
}

#[test]
fn split_pieces_keep_their_positions_and_leave_the_plane() {
    let scheduler = LayoutScheduler::new(LayoutConfig {
        dimensionality: Dimensionality::TwoD,
        ..config()
    })
    .unwrap();
    scheduler.add_all_components([chain(0, 0, 8)]).unwrap();
    wait_until(|| scheduler.finished() && scheduler.is_paused());
    let before = scheduler.positions().snapshot();

    scheduler.pause_and_wait();
    scheduler.on_component_split(ComponentId(0), &[ComponentId(1), ComponentId(2)]);
    scheduler.remove_component(ComponentId(0)).unwrap();
    scheduler.add_component(chain(1, 0, 4));
    scheduler.add_component(chain(2, 4, 4));

    for node in 0..8 {
        assert_eq!(
            scheduler.positions().get(NodeId(node)),
            before.get(NodeId(node))
        );
    }

    scheduler.set_dimensionality(Dimensionality::ThreeD);
    wait_until(|| scheduler.finished() && scheduler.is_paused());
    assert!(max_abs_z(&scheduler, 0..4) > 0.0);
    assert!(max_abs_z(&scheduler, 4..8) > 0.0);
}

#[test]
fn starting_positions_are_used_and_flat_ones_gain_depth() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    let start: Vec<(NodeId, Vector3<f32>)> = (0..10)
        .map(|i| (NodeId(i), Vector3::new(i as f32 * 10.0, (i % 3) as f32, 0.0)))
        .collect();
    scheduler.set_starting_positions(start.clone()).unwrap();
    scheduler.add_component(chain(0, 0, 10));

    for (node, position) in &start {
        assert_eq!(scheduler.positions().get(*node), Some(*position));
    }

    scheduler.resume().unwrap();
    wait_until(|| scheduler.finished() && scheduler.is_paused());
    assert!(max_abs_z(&scheduler, 0..10) > 0.0);
}

#[test]
fn graph_change_restarts_finished_layouts_on_resume() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    scheduler.add_all_components([chain(0, 0, 5)]).unwrap();
    wait_until(|| scheduler.finished() && scheduler.is_paused());

    let events = scheduler.subscribe();
    scheduler.on_graph_changed();
    assert!(!scheduler.finished());

    scheduler.resume().unwrap();
    wait_for_event(&events, &LayoutEvent::Executed);
    wait_until(|| scheduler.finished() && scheduler.is_paused());
}

#[test]
fn normalised_and_reset_settings_reach_the_layout() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    scheduler.add_all_components([chain(0, 0, 4)]).unwrap();
    wait_until(|| scheduler.finished() && scheduler.is_paused());

    let events = scheduler.subscribe();
    scheduler
        .set_setting_normalised_value(SHORT_RANGE_REPULSE_TERM, 0.0)
        .unwrap();
    wait_for_event(
        &events,
        &LayoutEvent::SettingChanged(SHORT_RANGE_REPULSE_TERM.to_owned()),
    );
    let local = scheduler.setting(SHORT_RANGE_REPULSE_TERM).unwrap();
    assert!((local.value() - 1000.0).abs() < 0.5, "{}", local.value());
    assert!(local.normalised_value().abs() < 1e-4);
    wait_for_event(&events, &LayoutEvent::Executed);
    wait_until(|| scheduler.finished() && scheduler.is_paused());

    scheduler.reset_setting_value(SHORT_RANGE_REPULSE_TERM).unwrap();
    wait_for_event(
        &events,
        &LayoutEvent::SettingChanged(SHORT_RANGE_REPULSE_TERM.to_owned()),
    );
    assert_eq!(
        scheduler.setting(SHORT_RANGE_REPULSE_TERM).unwrap().value(),
        1_000_000.0
    );
    wait_until(|| scheduler.finished() && scheduler.is_paused());
}

#[test]
fn stop_before_start_releases_layouts() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    scheduler.add_component(chain(0, 0, 3));
    assert!(scheduler.contains_component(ComponentId(0)));
    assert!(!scheduler.finished());

    scheduler.stop();
    assert!(!scheduler.contains_component(ComponentId(0)));
    assert!(scheduler.finished());
}

#[test]
fn pending_graph_change_is_not_finished() {
    let scheduler = LayoutScheduler::new(config()).unwrap();
    assert!(scheduler.finished());
    scheduler.on_graph_changed();
    assert!(!scheduler.finished());

    scheduler.resume().unwrap();
    wait_until(|| scheduler.finished());
}
