mod dblp;
pub use dblp::*;

mod traits;
pub use traits::*;
