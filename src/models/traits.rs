use std::collections::HashMap;

use candle_core::{Result, Tensor};

use crate::graph::{HeteroGraphView, HomoGraph};

pub trait GnnModule {
    fn forward_t(&self, x: &Tensor, graph: &HomoGraph, train: bool) -> Result<Tensor>;
    fn forward(&self, x: &Tensor, graph: &HomoGraph) -> Result<Tensor> {
        self.forward_t(x, graph, false)
    }
}

/// A model over a heterogeneous graph, producing one tensor per output category.
pub trait HeteroGnnModule {
    fn forward_t(
        &self,
        g: &dyn HeteroGraphView,
        train: bool,
    ) -> crate::Result<HashMap<String, Tensor>>;
    fn category(&self) -> &str;
}
