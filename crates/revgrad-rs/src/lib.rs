pub mod backend;
pub mod graph;
pub mod ops;
pub mod profiling;
pub mod tensor;

pub use backend::spec::ArrayBackend;
pub use graph::{GraphError, GraphExecutor, GraphResult, OpNode, ValueMap};
pub use tensor::{Shape, TensorArena, TensorId, TensorRef};
