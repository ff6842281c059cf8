use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use candle_core::{DType, Device, IndexOp, Tensor};
use itertools::Itertools;

use super::{EdgeType, HomoGraph, Metapath};
use crate::{Error, Result};

/// Identity of a graph instance. Two handles compare equal only if they were
/// issued for the same instance; contents are never compared.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct GraphId(u64);

impl GraphId {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a heterogeneous model reads from its input graph.
pub trait HeteroGraphView {
    fn graph_id(&self) -> GraphId;
    fn canonical_etypes(&self) -> Vec<EdgeType>;
    fn num_nodes(&self, category: &str) -> Result<usize>;
    fn node_data(&self, category: &str, field: &str) -> Result<&Tensor>;
    /// Projects the graph onto the end category of `metapath`: `u -> v` iff a
    /// walk following the metapath connects `u` to `v`.
    fn metapath_reachable_graph(&self, metapath: &Metapath) -> Result<HomoGraph>;
}

#[derive(Debug)]
pub struct HeteroGraph {
    id: GraphId,
    device: Device,
    num_nodes: BTreeMap<String, usize>,
    node_data: HashMap<String, HashMap<String, Tensor>>,
    edge_index: BTreeMap<EdgeType, Tensor>,
}

impl Clone for HeteroGraph {
    /// The copy is a distinct instance and gets its own identity.
    fn clone(&self) -> Self {
        Self {
            id: GraphId::fresh(),
            device: self.device.clone(),
            num_nodes: self.num_nodes.clone(),
            node_data: self.node_data.clone(),
            edge_index: self.edge_index.clone(),
        }
    }
}

impl HeteroGraph {
    pub fn new<I, S>(num_nodes: I, device: &Device) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        Self {
            id: GraphId::fresh(),
            device: device.clone(),
            num_nodes: num_nodes.into_iter().map(|(s, n)| (s.into(), n)).collect(),
            node_data: HashMap::new(),
            edge_index: BTreeMap::new(),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.num_nodes.keys().map(String::as_str)
    }

    /// Adds (or replaces) a relation from a `(2, E)` edge index tensor.
    ///
    /// Changing the edge structure issues a new [`GraphId`].
    pub fn add_relation(&mut self, edge_type: impl Into<EdgeType>, edge_index: Tensor) -> Result<()> {
        let edge_type = edge_type.into();
        let (two, _) = edge_index.dims2()?;
        if two != 2 {
            return Err(Error::DimensionMismatch {
                what: format!("edge_index rows of {edge_type}"),
                expected: 2,
                got: two,
            });
        }
        let edge_index = edge_index.to_dtype(DType::U32)?.to_device(&self.device)?;
        for (row, category) in [(0usize, &edge_type.src), (1, &edge_type.dst)] {
            let num_nodes = self.num_nodes(category)?;
            if let Some(&index) = edge_index
                .i(row)?
                .to_vec1::<u32>()?
                .iter()
                .find(|&&v| v as usize >= num_nodes)
            {
                return Err(Error::NodeIndexOutOfRange {
                    category: category.clone(),
                    index,
                    num_nodes,
                });
            }
        }
        self.edge_index.insert(edge_type, edge_index);
        self.id = GraphId::fresh();
        Ok(())
    }

    pub fn add_edges(&mut self, edge_type: impl Into<EdgeType>, edges: &[(u32, u32)]) -> Result<()> {
        let (src, dst): (Vec<u32>, Vec<u32>) = edges.iter().copied().unzip();
        let edge_index = Tensor::from_vec(
            src.into_iter().chain(dst).collect::<Vec<_>>(),
            (2, edges.len()),
            &self.device,
        )?;
        self.add_relation(edge_type, edge_index)
    }

    pub fn edge_index(&self, edge_type: &EdgeType) -> Result<&Tensor> {
        self.edge_index
            .get(edge_type)
            .ok_or_else(|| Error::UnknownEdgeType(edge_type.clone()))
    }

    /// Stores a per-node tensor. The identity is kept: features do not
    /// affect metapath projections.
    pub fn set_node_data(&mut self, category: &str, field: &str, data: Tensor) -> Result<()> {
        let num_nodes = self.num_nodes(category)?;
        let rows = data.dims().first().copied().unwrap_or(0);
        if rows != num_nodes {
            return Err(Error::DimensionMismatch {
                what: format!("rows of `{category}.{field}`"),
                expected: num_nodes,
                got: rows,
            });
        }
        self.node_data
            .entry(category.to_owned())
            .or_default()
            .insert(field.to_owned(), data.to_device(&self.device)?);
        Ok(())
    }

    fn adjacency(&self, edge_type: &EdgeType) -> Result<Vec<Vec<u32>>> {
        let edge_index = self.edge_index(edge_type)?;
        let src = edge_index.i((0, ..))?.to_vec1::<u32>()?;
        let dst = edge_index.i((1, ..))?.to_vec1::<u32>()?;
        let mut adj = vec![Vec::new(); self.num_nodes(&edge_type.src)?];
        for (u, v) in src.into_iter().zip(dst) {
            adj[u as usize].push(v);
        }
        Ok(adj)
    }
}

impl HeteroGraphView for HeteroGraph {
    fn graph_id(&self) -> GraphId {
        self.id
    }

    fn canonical_etypes(&self) -> Vec<EdgeType> {
        self.edge_index.keys().cloned().collect()
    }

    fn num_nodes(&self, category: &str) -> Result<usize> {
        self.num_nodes
            .get(category)
            .copied()
            .ok_or_else(|| Error::UnknownNodeType(category.to_owned()))
    }

    fn node_data(&self, category: &str, field: &str) -> Result<&Tensor> {
        self.num_nodes(category)?;
        self.node_data
            .get(category)
            .and_then(|data| data.get(field))
            .ok_or_else(|| Error::MissingNodeData {
                category: category.to_owned(),
                field: field.to_owned(),
            })
    }

    fn metapath_reachable_graph(&self, metapath: &Metapath) -> Result<HomoGraph> {
        if metapath.start() != metapath.end() {
            return Err(Error::InvalidConfig(format!(
                "metapath {metapath} does not return to `{}`",
                metapath.start()
            )));
        }
        let num_nodes = self.num_nodes(metapath.start())?;

        // reach[u] = nodes at the end of the current prefix starting at u
        let mut reach: Vec<BTreeSet<u32>> = (0..num_nodes as u32).map(|u| [u].into()).collect();
        for hop in metapath.hops() {
            let adj = self.adjacency(hop)?;
            for frontier in reach.iter_mut() {
                *frontier = frontier
                    .iter()
                    .flat_map(|&v| adj[v as usize].iter().copied())
                    .collect();
            }
        }
        let edges = reach
            .iter()
            .enumerate()
            .flat_map(|(u, vs)| vs.iter().map(move |&v| (u as u32, v)))
            .collect_vec();
        Ok(HomoGraph::from_edges(num_nodes, &edges, &self.device)?)
    }
}
