use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};

use super::traits::NodeClassificationDataset;
use crate::graph::{EdgeType, HeteroGraph};
use crate::models::FEATURE_FIELD;
use crate::utils::mask_to_index;
use crate::{Error, Result};

pub const AUTHOR: &str = "author";
pub const PAPER: &str = "paper";
pub const TERM: &str = "term";
pub const CONFERENCE: &str = "conference";
pub const TO: &str = "to";

const NUM_CONFERENCES: usize = 20;

// ```python
// dataset = torch_geometric.datasets.DBLP(root="data/DBLP")[0]
// data = {f"{t}_x": dataset[t].x.numpy() for t in ["author", "paper", "term"]}
// data |= {f"author_{k}": dataset["author"][k].numpy() for k in ["y", "train_mask", "val_mask", "test_mask"]}
// data |= {f"{s}_to_{d}_edge_index": dataset[s, d].edge_index.numpy() for s, _, d in dataset.edge_types}
// with open("dblp.npz", "wb") as f:
//     np.savez(f, **data)
// ```
#[derive(Clone, Debug)]
pub struct Dblp {
    pub graph: HeteroGraph,
    pub y: Tensor,
    pub train_index: Tensor,
    pub val_index: Tensor,
    pub test_index: Tensor,
    num_classes: usize,
}
impl Dblp {
    /// As the conference nodes have no features, we add one-hot vectors.
    pub fn from_file<P: AsRef<Path>>(path: P, device: &Device) -> Result<Self> {
        let mut arrays: HashMap<String, Tensor> = HashMap::from_iter(Tensor::read_npz(path.as_ref())?);
        let mut take = |name: &str| {
            arrays
                .remove(name)
                .ok_or_else(|| Error::MissingArray(name.to_owned()))
        };

        let features = [
            (AUTHOR, take("author_x")?),
            (PAPER, take("paper_x")?),
            (TERM, take("term_x")?),
            (CONFERENCE, Tensor::eye(NUM_CONFERENCES, DType::F32, device)?),
        ];
        let num_nodes = features
            .iter()
            .map(|(category, x)| -> Result<(&'static str, usize)> { Ok((*category, x.dims2()?.0)) })
            .collect::<Result<Vec<_>>>()?;
        let mut graph = HeteroGraph::new(num_nodes, device);
        for (category, x) in features {
            graph.set_node_data(category, FEATURE_FIELD, x.to_dtype(DType::F32)?)?;
        }
        for (src, dst) in [
            (AUTHOR, PAPER),
            (PAPER, AUTHOR),
            (PAPER, TERM),
            (TERM, PAPER),
            (PAPER, CONFERENCE),
            (CONFERENCE, PAPER),
        ] {
            let edge_index = take(format!("{src}_to_{dst}_edge_index").as_str())?;
            graph.add_relation(EdgeType::new(src, TO, dst), edge_index)?;
        }

        let y = take("author_y")?.to_dtype(DType::U32)?.to_device(device)?;
        let num_classes = y.max(0)?.to_scalar::<u32>()? as usize + 1;
        let train_index = mask_to_index(&take("author_train_mask")?)?.to_device(device)?;
        let val_index = mask_to_index(&take("author_val_mask")?)?.to_device(device)?;
        let test_index = mask_to_index(&take("author_test_mask")?)?.to_device(device)?;
        Ok(Self {
            graph,
            y,
            train_index,
            val_index,
            test_index,
            num_classes,
        })
    }
}
impl NodeClassificationDataset for Dblp {
    fn graph(&self) -> &HeteroGraph {
        &self.graph
    }
    fn category(&self) -> &str {
        AUTHOR
    }
    fn num_classes(&self) -> usize {
        self.num_classes
    }
    fn labels(&self) -> &Tensor {
        &self.y
    }
    fn train_index(&self) -> &Tensor {
        &self.train_index
    }
    fn val_index(&self) -> &Tensor {
        &self.val_index
    }
    fn test_index(&self) -> &Tensor {
        &self.test_index
    }
}
