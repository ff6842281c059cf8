use std::collections::HashMap;

use candle_nn::VarBuilder;

use super::han::Han;
use super::traits::HeteroGnnModule;
use crate::config::ModelArgs;
use crate::graph::HeteroGraphView;
use crate::{Error, Result};

pub type ModelBuilder =
    fn(&ModelArgs, &dyn HeteroGraphView, VarBuilder) -> Result<Box<dyn HeteroGnnModule>>;

/// Name to constructor lookup for heterogeneous models.
pub struct ModelRegistry {
    builders: HashMap<String, ModelBuilder>,
}
impl ModelRegistry {
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }
    /// Registers `builder` under `name`, returning the builder it replaced.
    pub fn register(&mut self, name: &str, builder: ModelBuilder) -> Option<ModelBuilder> {
        self.builders.insert(name.to_owned(), builder)
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
    pub fn build(
        &self,
        name: &str,
        args: &ModelArgs,
        g: &dyn HeteroGraphView,
        vs: VarBuilder,
    ) -> Result<Box<dyn HeteroGnnModule>> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| Error::UnknownModel(name.to_owned()))?;
        builder(args, g, vs)
    }
}
impl Default for ModelRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("HAN", build_han);
        registry
    }
}

fn build_han(
    args: &ModelArgs,
    g: &dyn HeteroGraphView,
    vs: VarBuilder,
) -> Result<Box<dyn HeteroGnnModule>> {
    Ok(Box::new(Han::from_args(args, g, vs)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::HeteroGraph;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::VarMap;

    #[test]
    fn builds_registered_han() -> Result<()> {
        let mut g = HeteroGraph::new([("author", 2), ("paper", 1)], &Device::Cpu);
        g.add_edges(("author", "write", "paper"), &[(0, 0), (1, 0)])?;
        g.add_edges(("paper", "written-by", "author"), &[(0, 0), (0, 1)])?;
        g.set_node_data("author", "h", Tensor::ones((2, 3), DType::F32, &Device::Cpu)?)?;

        let registry = ModelRegistry::default();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["HAN"]);

        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let args = ModelArgs {
            category: "author".into(),
            in_dim: 3,
            out_dim: 2,
            num_heads: vec![2],
            ..Default::default()
        };
        let model = registry.build("HAN", &args, &g, vs)?;
        assert_eq!(model.category(), "author");
        assert_eq!(model.forward_t(&g, false)?["author"].dims(), &[2, 2]);
        Ok(())
    }

    #[test]
    fn unknown_model_name() {
        let g = HeteroGraph::new([("author", 1)], &Device::Cpu);
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let result = ModelRegistry::default().build("RGCN", &ModelArgs::default(), &g, vs);
        assert!(matches!(result, Err(Error::UnknownModel(name)) if name == "RGCN"));
    }

    #[test]
    fn graph_without_metapaths_fails_at_build() {
        let mut g = HeteroGraph::new([("author", 2), ("paper", 1)], &Device::Cpu);
        g.add_edges(("author", "write", "paper"), &[(0, 0)]).unwrap();
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let args = ModelArgs {
            category: "author".into(),
            in_dim: 3,
            out_dim: 2,
            ..Default::default()
        };
        let result = ModelRegistry::default().build("HAN", &args, &g, vs);
        assert!(matches!(result, Err(Error::NoMetapaths(c)) if c == "author"));
    }
}
