use candle_core::{DType, IndexOp, Result, Tensor, D};
use candle_nn::{ops, Activation, Dropout, Linear, Module, VarBuilder};

use super::traits::GnnModule;
use super::utils::xavier_normal;
use crate::graph::HomoGraph;

#[derive(Clone, Debug)]
pub struct GatParams {
    pub feat_drop: f32,
    pub attn_drop: f32,
    pub negative_slope: f64,
    pub activation: Option<Activation>,
    pub bias: bool,
}
impl Default for GatParams {
    fn default() -> Self {
        Self {
            feat_drop: 0.0,
            attn_drop: 0.0,
            negative_slope: 0.2,
            activation: Some(Activation::Elu(1.0)),
            bias: true,
        }
    }
}

/// Multi-head graph attention convolution.
///
/// Every head maps `in_dim` to `out_dim`; heads are concatenated so the
/// output is `(N, num_heads * out_dim)`. Nodes without incoming edges get
/// `activation(bias)`.
pub struct GatConv {
    in_dim: usize,
    out_dim: usize,
    num_heads: usize,
    negative_slope: f64,
    feat_drop: Dropout,
    attn_drop: Dropout,
    activation: Option<Activation>,
    lin: Linear,
    att_src: Tensor,
    att_dst: Tensor,
    bias: Option<Tensor>,
}
impl GatConv {
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        num_heads: usize,
        params: GatParams,
        vs: VarBuilder,
    ) -> Result<Self> {
        let gain = 2f64.sqrt();
        let width = num_heads * out_dim;
        let weight = vs.get_with_hints(
            (width, in_dim),
            "lin.weight",
            xavier_normal(in_dim, width, gain),
        )?;
        // fans of a (1, H, D) tensor as torch computes them
        let init_att = xavier_normal(num_heads * out_dim, out_dim, gain);
        let bias = if params.bias {
            Some(vs.get_with_hints((1, num_heads, out_dim), "bias", candle_nn::Init::Const(0.0))?)
        } else {
            None
        };
        Ok(Self {
            in_dim,
            out_dim,
            num_heads,
            negative_slope: params.negative_slope,
            feat_drop: Dropout::new(params.feat_drop),
            attn_drop: Dropout::new(params.attn_drop),
            activation: params.activation,
            lin: Linear::new(weight, None),
            att_src: vs.get_with_hints((1, num_heads, out_dim), "att_src", init_att)?,
            att_dst: vs.get_with_hints((1, num_heads, out_dim), "att_dst", init_att)?,
            bias,
        })
    }
    pub fn num_heads(&self) -> usize {
        self.num_heads
    }
    pub fn output_dim(&self) -> usize {
        self.num_heads * self.out_dim
    }
}
impl GnnModule for GatConv {
    fn forward_t(&self, x: &Tensor, graph: &HomoGraph, train: bool) -> Result<Tensor> {
        let (num_nodes, in_dim) = x.dims2()?;
        if in_dim != self.in_dim {
            candle_core::bail!("GatConv expects {} input features, got {}", self.in_dim, in_dim);
        }
        if num_nodes != graph.num_nodes() {
            candle_core::bail!(
                "GatConv got {} feature rows for a graph of {} nodes",
                num_nodes,
                graph.num_nodes()
            );
        }

        let x = self.feat_drop.forward(x, train)?;
        let h = self
            .lin
            .forward(&x)?
            .reshape((num_nodes, self.num_heads, self.out_dim))?;

        let h = if graph.num_edges() == 0 {
            h.zeros_like()?
        } else {
            let source = graph.src()?;
            let target = graph.dst()?;

            // compute attention
            let a_src = h.broadcast_mul(&self.att_src)?.sum_keepdim(D::Minus1)?; // (n, h, 1)
            let a_dst = h.broadcast_mul(&self.att_dst)?.sum_keepdim(D::Minus1)?;
            let logits = ops::leaky_relu(
                &(a_src.i(&source)? + a_dst.i(&target)?)?,
                self.negative_slope,
            )?; // (e, h, 1)
            // shift by the max over each destination's incoming edges so that
            // every destination keeps at least one exp(0) term
            let shift = destination_max(&logits, &target, num_nodes)?.i(&target)?;
            let a_edge = (logits - shift)?.exp()?;
            let a_sum = Tensor::zeros((num_nodes, self.num_heads, 1), x.dtype(), x.device())?
                .index_add(&target, &a_edge, 0)?;
            let attention = self
                .attn_drop
                .forward(&(a_edge / a_sum.i(&target)?)?, train)?;

            h.zeros_like()?
                .index_add(&target, &h.i(&source)?.broadcast_mul(&attention)?, 0)?
        };
        let h = match &self.bias {
            Some(bias) => h.broadcast_add(bias)?,
            None => h,
        };
        let h = match &self.activation {
            Some(activation) => activation.forward(&h)?,
            None => h,
        };
        h.reshape((num_nodes, self.num_heads * self.out_dim))
    }
}

/// Max of the `(E, H, 1)` edge logits over the incoming edges of every node,
/// as a constant `(N, H, 1)` tensor. Nodes without incoming edges get 0.
fn destination_max(logits: &Tensor, target: &Tensor, num_nodes: usize) -> Result<Tensor> {
    let (_, num_heads, _) = logits.dims3()?;
    let values = logits.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
    let mut max = vec![f32::NEG_INFINITY; num_nodes * num_heads];
    for (v, row) in target
        .to_vec1::<u32>()?
        .into_iter()
        .zip(values.chunks_exact(num_heads))
    {
        let v = v as usize;
        for (m, &logit) in max[v * num_heads..(v + 1) * num_heads].iter_mut().zip(row) {
            *m = m.max(logit);
        }
    }
    for m in max.iter_mut().filter(|m| **m == f32::NEG_INFINITY) {
        *m = 0.0;
    }
    Tensor::from_vec(max, (num_nodes, num_heads, 1), logits.device())?.to_dtype(logits.dtype())
}
