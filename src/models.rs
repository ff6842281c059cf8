mod traits;
pub use traits::{GnnModule, HeteroGnnModule};
mod utils;

mod gat;
pub use gat::{GatConv, GatParams};
mod semantic_attention;
pub use semantic_attention::{SemanticAttention, DEFAULT_SEMANTIC_HIDDEN_DIM};
mod han;
pub use han::{Han, HanLayer, FEATURE_FIELD};
mod registry;
pub use registry::{ModelBuilder, ModelRegistry};
