use candle_core::Tensor;

use crate::graph::HeteroGraph;

/// Node classification on one category of a heterogeneous graph.
pub trait NodeClassificationDataset {
    fn graph(&self) -> &HeteroGraph;
    fn category(&self) -> &str;
    fn num_classes(&self) -> usize;
    /// `u32` labels for every node of [`Self::category`].
    fn labels(&self) -> &Tensor;
    fn train_index(&self) -> &Tensor;
    fn val_index(&self) -> &Tensor;
    fn test_index(&self) -> &Tensor;
}
