use std::time::Duration;

use forcelayout::{
    Edge, LayoutConfig, LayoutEvent, LayoutScheduler, NodeId, connected_components,
};
use log::info;

const NUM_NODES: usize = 2000;
const NUM_EDGES: usize = 3000;

fn gen_random_graph(nodes: usize, edges: usize) -> (Vec<NodeId>, Vec<Edge>) {
    let node_ids = (0..nodes).map(NodeId).collect();
    let edges = (0..edges)
        .map(|id| {
            Edge::new(
                id,
                rand::random_range(0..nodes),
                rand::random_range(0..nodes),
            )
        })
        .collect();
    (node_ids, edges)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (node_ids, edges) = gen_random_graph(NUM_NODES, NUM_EDGES);
    let components = connected_components(&node_ids, &edges)?;
    info!(
        "Laying out {} nodes, {} edges in {} components",
        node_ids.len(),
        edges.len(),
        components.len()
    );

    let scheduler = LayoutScheduler::new(LayoutConfig::default())?;
    let events = scheduler.subscribe();
    scheduler.add_all_components(components)?;

    let mut batches = 0u64;
    while !scheduler.finished() {
        match events.recv_timeout(Duration::from_secs(1)) {
            Ok(LayoutEvent::Executed) => batches += 1,
            Ok(event) => info!("{event:?}"),
            Err(_) => {}
        }
    }

    let positions = scheduler.positions();
    let bounds = positions.read(|p| p.bounding_box(&node_ids));
    info!("Finished after {batches} batches, bounds {bounds:?}");

    scheduler.stop();
    Ok(())
}
