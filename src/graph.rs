mod metapath;
pub use metapath::{two_hop_metapaths, EdgeType, Metapath};
mod hetero;
pub use hetero::{GraphId, HeteroGraph, HeteroGraphView};
mod homo;
pub use homo::HomoGraph;
