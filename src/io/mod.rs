//! File-format concerns: graph XML and operator description files.
pub mod description;
pub mod xml;

pub use description::{DescriptionError, OperatorRegistry};
pub use xml::XmlError;
