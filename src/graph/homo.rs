use candle_core::{DType, Device, IndexOp, Result, Tensor};

/// Homogeneous graph over the nodes of a single category.
///
/// `edge_index` is a `(2, E)` `u32` tensor; row 0 holds sources, row 1 destinations.
#[derive(Clone, Debug)]
pub struct HomoGraph {
    num_nodes: usize,
    edge_index: Tensor,
}
impl HomoGraph {
    pub fn new(num_nodes: usize, edge_index: Tensor) -> Result<Self> {
        let (two, _) = edge_index.dims2()?;
        if two != 2 {
            candle_core::bail!("edge_index must have shape (2, E), got {:?}", edge_index.shape());
        }
        let edge_index = edge_index.to_dtype(DType::U32)?;
        if let Some(v) = edge_index
            .flatten_all()?
            .to_vec1::<u32>()?
            .into_iter()
            .find(|&v| v as usize >= num_nodes)
        {
            candle_core::bail!("node index {v} out of range for a graph of {num_nodes} nodes");
        }
        Ok(Self {
            num_nodes,
            edge_index,
        })
    }
    pub fn from_edges(num_nodes: usize, edges: &[(u32, u32)], device: &Device) -> Result<Self> {
        let (src, dst): (Vec<u32>, Vec<u32>) = edges.iter().copied().unzip();
        let num_edges = edges.len();
        let data = src.into_iter().chain(dst).collect::<Vec<_>>();
        Self::new(num_nodes, Tensor::from_vec(data, (2, num_edges), device)?)
    }
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }
    pub fn num_edges(&self) -> usize {
        self.edge_index.dims()[1]
    }
    pub fn edge_index(&self) -> &Tensor {
        &self.edge_index
    }
    pub fn src(&self) -> Result<Tensor> {
        self.edge_index.i((0, ..))
    }
    pub fn dst(&self) -> Result<Tensor> {
        self.edge_index.i((1, ..))
    }
    pub fn edges(&self) -> Result<Vec<(u32, u32)>> {
        let src = self.src()?.to_vec1::<u32>()?;
        let dst = self.dst()?.to_vec1::<u32>()?;
        Ok(src.into_iter().zip(dst).collect())
    }
    pub fn in_degrees(&self) -> Result<Vec<u32>> {
        let mut degrees = vec![0u32; self.num_nodes];
        for v in self.dst()?.to_vec1::<u32>()? {
            degrees[v as usize] += 1;
        }
        Ok(degrees)
    }
}
