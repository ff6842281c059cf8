use thiserror::Error;

use crate::graph::EdgeType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// No metapath starts and ends at the requested category.
    #[error("no metapath found for category `{0}`")]
    NoMetapaths(String),

    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),

    #[error("unknown edge type {0}")]
    UnknownEdgeType(EdgeType),

    #[error("node type `{category}` has no data field `{field}`")]
    MissingNodeData { category: String, field: String },

    #[error("node index {index} out of range for `{category}` ({num_nodes} nodes)")]
    NodeIndexOutOfRange {
        category: String,
        index: u32,
        num_nodes: usize,
    },

    #[error("unknown model `{0}`")]
    UnknownModel(String),

    #[error("dataset array `{0}` is missing")]
    MissingArray(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
