pub mod error;
pub mod tokenizer;
pub mod tree;
pub mod writer;

pub use error::{JsonError, JsonResult};
pub use tokenizer::{tokenize, Token};
pub use tree::{JsonTree, NodeId, Value};
pub use writer::JsonWriter;
