pub mod config;
pub mod constants;
pub mod error;
pub mod graph;
pub mod perf;
pub mod positions;
pub mod scheduler;
pub mod settings;
pub mod sim;
pub mod spatial;

pub use config::{Dimensionality, LayoutConfig};
pub use error::{Error, Result};
pub use graph::{Component, ComponentId, Edge, EdgeId, NodeId, connected_components};
pub use positions::{NodePositions, SharedPositions};
pub use scheduler::{LayoutEvent, LayoutScheduler};
pub use settings::{LayoutSetting, LayoutSettings, ScaleType};
pub use sim::{
    ForceDirectedParams,
    barnes_hut::BarnesHutTree,
    convergence::{ConvergenceDetector, ConvergencePhase},
    force_directed::{ForceDirectedLayout, IterationOutcome},
};
