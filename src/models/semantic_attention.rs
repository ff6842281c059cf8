use candle_core::{Result, Tensor};
use candle_nn::{ops, Linear, Module, VarBuilder};

use super::utils::{linear, linear_no_bias};

pub const DEFAULT_SEMANTIC_HIDDEN_DIM: usize = 128;

/// Softmax-weighted combination of per-metapath embeddings.
///
/// Takes `(N, M, F)` and returns `(N, F)`. The `M` weights are shared by all
/// nodes: each metapath is scored by the node-averaged `q . tanh(W z + b)`.
pub struct SemanticAttention {
    project: Linear,
    score: Linear,
}
impl SemanticAttention {
    pub fn new(in_dim: usize, hidden_dim: usize, vs: VarBuilder) -> Result<Self> {
        Ok(Self {
            project: linear(in_dim, hidden_dim, vs.pp("project"))?,
            score: linear_no_bias(hidden_dim, 1, vs.pp("score"))?,
        })
    }

    /// Per-metapath weights, shape `(M,)`, summing to one.
    pub fn weights(&self, z: &Tensor) -> Result<Tensor> {
        let (_, num_metapaths, _) = z.dims3()?;
        if num_metapaths == 0 {
            candle_core::bail!("semantic attention needs at least one metapath embedding");
        }
        let w = self
            .score
            .forward(&self.project.forward(z)?.tanh()?)? // (n, m, 1)
            .mean(0)?
            .squeeze(1)?; // (m,)
        ops::softmax(&w, 0)
    }
}
impl Module for SemanticAttention {
    fn forward(&self, z: &Tensor) -> Result<Tensor> {
        let (_, num_metapaths, _) = z.dims3()?;
        let beta = self.weights(z)?.reshape((1, num_metapaths, 1))?;
        z.broadcast_mul(&beta)?.sum(1)
    }
}
