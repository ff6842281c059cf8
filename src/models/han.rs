//! Heterogeneous Graph Attention Network.
//!
//! https://arxiv.org/abs/1903.07293
//! - node-level attention: one [`GatConv`] per metapath-projected graph
//! - semantic-level attention: [`SemanticAttention`] over the metapaths

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use candle_core::Tensor;
use candle_nn::{Linear, Module, VarBuilder};
use tracing::debug;

use super::gat::{GatConv, GatParams};
use super::semantic_attention::{SemanticAttention, DEFAULT_SEMANTIC_HIDDEN_DIM};
use super::traits::{GnnModule, HeteroGnnModule};
use super::utils::linear;
use crate::config::ModelArgs;
use crate::graph::{two_hop_metapaths, GraphId, HeteroGraphView, HomoGraph, Metapath};
use crate::{Error, Result};

/// Node feature field read from the target category.
pub const FEATURE_FIELD: &str = "h";

#[derive(Default)]
struct SubgraphCache {
    graph: Option<GraphId>,
    subgraphs: HashMap<Metapath, HomoGraph>,
}

pub struct HanLayer {
    meta_paths: Vec<Metapath>,
    gat_layers: Vec<GatConv>,
    semantic_attention: SemanticAttention,
    cache: Mutex<SubgraphCache>,
}
impl HanLayer {
    pub fn new(
        meta_paths: &[Metapath],
        in_size: usize,
        out_size: usize,
        num_heads: usize,
        dropout: f32,
        vs: VarBuilder,
    ) -> Result<Self> {
        Self::with_params(
            meta_paths,
            in_size,
            out_size,
            num_heads,
            GatParams {
                feat_drop: dropout,
                attn_drop: dropout,
                ..Default::default()
            },
            DEFAULT_SEMANTIC_HIDDEN_DIM,
            vs,
        )
    }

    pub fn with_params(
        meta_paths: &[Metapath],
        in_size: usize,
        out_size: usize,
        num_heads: usize,
        gat_params: GatParams,
        semantic_hidden_dim: usize,
        vs: VarBuilder,
    ) -> Result<Self> {
        let Some(first) = meta_paths.first() else {
            return Err(Error::InvalidConfig("HanLayer needs at least one metapath".into()));
        };
        if let Some(mp) = meta_paths.iter().find(|mp| mp.start() != first.start() || mp.end() != first.start()) {
            return Err(Error::InvalidConfig(format!(
                "metapath {mp} does not start and end at `{}`",
                first.start()
            )));
        }
        let mut gat_layers = Vec::with_capacity(meta_paths.len());
        for i in 0..meta_paths.len() {
            gat_layers.push(GatConv::new(
                in_size,
                out_size,
                num_heads,
                gat_params.clone(),
                vs.pp(format!("gat.{i}")),
            )?);
        }
        Ok(Self {
            meta_paths: meta_paths.to_vec(),
            gat_layers,
            semantic_attention: SemanticAttention::new(
                out_size * num_heads,
                semantic_hidden_dim,
                vs.pp("semantic_attention"),
            )?,
            cache: Mutex::new(SubgraphCache::default()),
        })
    }

    pub fn meta_paths(&self) -> &[Metapath] {
        &self.meta_paths
    }

    pub fn output_dim(&self) -> usize {
        self.gat_layers[0].output_dim()
    }

    /// Projected graphs for `g`, in metapath order. Recomputes all of them
    /// when `g` is not the instance they were derived from.
    fn subgraphs<G: HeteroGraphView + ?Sized>(&self, g: &G) -> Result<Vec<HomoGraph>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.graph != Some(g.graph_id()) {
            debug!(
                graph = ?g.graph_id(),
                num_meta_paths = self.meta_paths.len(),
                "projecting metapath graphs"
            );
            let subgraphs = self
                .meta_paths
                .iter()
                .map(|mp| Ok((mp.clone(), g.metapath_reachable_graph(mp)?)))
                .collect::<Result<HashMap<_, _>>>()?;
            *cache = SubgraphCache {
                graph: Some(g.graph_id()),
                subgraphs,
            };
        }
        Ok(self
            .meta_paths
            .iter()
            .map(|mp| cache.subgraphs[mp].clone())
            .collect())
    }

    /// Per-metapath embeddings stacked as `(N, M, heads * out_size)`.
    pub fn metapath_embeddings<G: HeteroGraphView + ?Sized>(
        &self,
        g: &G,
        h: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let semantic_embeddings = self
            .subgraphs(g)?
            .iter()
            .zip(&self.gat_layers)
            .map(|(subgraph, gat)| gat.forward_t(h, subgraph, train))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Tensor::stack(&semantic_embeddings, 1)?)
    }

    /// Semantic attention weights, one per metapath.
    pub fn semantic_weights<G: HeteroGraphView + ?Sized>(&self, g: &G, h: &Tensor) -> Result<Tensor> {
        let z = self.metapath_embeddings(g, h, false)?;
        Ok(self.semantic_attention.weights(&z)?)
    }

    pub fn forward_t<G: HeteroGraphView + ?Sized>(&self, g: &G, h: &Tensor, train: bool) -> Result<Tensor> {
        let z = self.metapath_embeddings(g, h, train)?; // (N, M, D * K)
        Ok(self.semantic_attention.forward(&z)?) // (N, D * K)
    }
}

pub struct Han {
    category: String,
    in_size: usize,
    layers: Vec<HanLayer>,
    linear: Linear,
}
impl Han {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        meta_paths: &[Metapath],
        category: &str,
        in_size: usize,
        hidden_size: usize,
        out_size: usize,
        num_heads: &[usize],
        dropout: f32,
        vs: VarBuilder,
    ) -> Result<Self> {
        let args = ModelArgs {
            category: category.to_owned(),
            in_dim: in_size,
            hidden_dim: hidden_size,
            out_dim: out_size,
            num_heads: num_heads.to_vec(),
            dropout,
            ..Default::default()
        };
        Self::with_args(meta_paths, &args, vs)
    }

    pub fn with_args(meta_paths: &[Metapath], args: &ModelArgs, vs: VarBuilder) -> Result<Self> {
        args.validate()?;
        if meta_paths.is_empty() {
            return Err(Error::NoMetapaths(args.category.clone()));
        }
        if let Some(mp) = meta_paths.iter().find(|mp| mp.start() != args.category) {
            return Err(Error::InvalidConfig(format!(
                "metapath {mp} does not start at `{}`",
                args.category
            )));
        }
        let gat_params = GatParams {
            feat_drop: args.dropout,
            attn_drop: args.dropout,
            negative_slope: args.negative_slope,
            ..Default::default()
        };
        let mut layers = Vec::with_capacity(args.num_heads.len());
        let mut in_size = args.in_dim;
        for (l, &heads) in args.num_heads.iter().enumerate() {
            layers.push(HanLayer::with_params(
                meta_paths,
                in_size,
                args.hidden_dim,
                heads,
                gat_params.clone(),
                args.semantic_hidden_dim,
                vs.pp(format!("layer_{l}")),
            )?);
            in_size = args.hidden_dim * heads;
        }
        Ok(Self {
            category: args.category.clone(),
            in_size: args.in_dim,
            layers,
            linear: linear(in_size, args.out_dim, vs.pp("linear"))?,
        })
    }

    /// Builds the model with every two-hop metapath of `g` rooted at `args.category`.
    pub fn from_args<G: HeteroGraphView + ?Sized>(args: &ModelArgs, g: &G, vs: VarBuilder) -> Result<Self> {
        let meta_paths = two_hop_metapaths(&g.canonical_etypes(), &args.category);
        debug!(
            category = %args.category,
            meta_paths = ?meta_paths.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "enumerated metapaths"
        );
        Self::with_args(&meta_paths, args, vs)
    }

    pub fn layers(&self) -> &[HanLayer] {
        &self.layers
    }

    pub fn meta_paths(&self) -> &[Metapath] {
        self.layers[0].meta_paths()
    }

    pub fn forward_t<G: HeteroGraphView + ?Sized>(&self, g: &G, train: bool) -> Result<HashMap<String, Tensor>> {
        let mut h = g.node_data(&self.category, FEATURE_FIELD)?.clone();
        let width = h.dims().get(1).copied().unwrap_or(0);
        if h.rank() != 2 || width != self.in_size {
            return Err(Error::DimensionMismatch {
                what: format!("`{}.{}` feature width", self.category, FEATURE_FIELD),
                expected: self.in_size,
                got: width,
            });
        }
        for gnn in &self.layers {
            h = gnn.forward_t(g, &h, train)?;
        }
        Ok(HashMap::from([(self.category.clone(), self.linear.forward(&h)?)]))
    }
}
impl HeteroGnnModule for Han {
    fn forward_t(&self, g: &dyn HeteroGraphView, train: bool) -> Result<HashMap<String, Tensor>> {
        Han::forward_t(self, g, train)
    }
    fn category(&self) -> &str {
        &self.category
    }
}
