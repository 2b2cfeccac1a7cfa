use crate::graph::{ComponentId, EdgeId, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no layout setting named {0:?}")]
    UnknownSetting(String),
    #[error("edge {edge:?} references node {node:?} which is not part of the component")]
    MissingEndpoint { edge: EdgeId, node: NodeId },
    #[error("component {0:?} is not being laid out")]
    UnknownComponent(ComponentId),
    #[error("failed to build layout worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to spawn layout thread")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
