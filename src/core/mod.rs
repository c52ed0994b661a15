//! Graph construction: parameters, the XML codec, node building, graph
//! assembly and model persistence.
pub mod codec;
pub mod graph;
pub mod model;
pub mod node;
pub mod params;

pub use graph::{GraphAssembler, GraphEntry, NodeIdAllocator};
pub use model::{GpfModel, ModelInput, ModelNode, ModelOutput, OperatorLookup};
pub use params::{GpfAlgorithm, Parameter, ParameterKind, ParameterSpec, ParameterValue};
