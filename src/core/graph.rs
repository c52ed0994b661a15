//! Assembly of complete GPF graph documents from ordered algorithm lists.
//!
//! Node ids come from an allocator owned by the assembler, so parallel test
//! runs and repeated builds never share counter state. Algorithms are handed
//! over as an explicit ordered list in dependency order; an upstream step
//! simply precedes its consumer.
use std::collections::HashSet;

use tracing::info;

use crate::core::node::NodeBuilder;
use crate::core::params::GpfAlgorithm;
use crate::error::{Error, Result};
use crate::io::xml::Element;
use crate::types::Toolbox;

pub const GRAPH_VERSION: &str = "1.0";

/// Monotonic id source for one assembler instance. Ids stay unique for the
/// assembler's lifetime, never across instances.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    pub fn new() -> Self {
        NodeIdAllocator::default()
    }

    pub fn bump(&mut self) -> u64 {
        let n = self.next;
        self.next += 1;
        n
    }

    /// `<operator>_<counter>` id for a new node.
    pub fn node_id(&mut self, operator: &str) -> String {
        format!("{}_{}", operator, self.bump())
    }
}

/// One entry of the ordered algorithm list: the algorithm plus an optional
/// model-supplied node id.
#[derive(Debug, Clone)]
pub struct GraphEntry {
    pub algorithm: GpfAlgorithm,
    pub node_id: Option<String>,
}

impl GraphEntry {
    pub fn new(algorithm: GpfAlgorithm) -> Self {
        GraphEntry {
            algorithm,
            node_id: None,
        }
    }

    pub fn with_id(algorithm: GpfAlgorithm, node_id: impl Into<String>) -> Self {
        GraphEntry {
            algorithm,
            node_id: Some(node_id.into()),
        }
    }
}

pub struct GraphAssembler {
    toolbox: Toolbox,
    ids: NodeIdAllocator,
}

impl GraphAssembler {
    pub fn new(toolbox: Toolbox) -> Self {
        GraphAssembler {
            toolbox,
            ids: NodeIdAllocator::new(),
        }
    }

    pub fn allocate_id(&mut self, operator: &str) -> String {
        self.ids.node_id(operator)
    }

    /// Fresh `<graph>` scaffold with the fixed version child.
    pub fn empty_graph(graph_id: &str) -> Element {
        let mut graph = Element::new("graph");
        graph.set_attr("id", graph_id);
        graph.push_child(Element::with_text("version", GRAPH_VERSION));
        graph
    }

    /// Assembles the entries, in order, into one validated graph document.
    /// A terminal `Write` node is appended for every algorithm with a bound
    /// output, unless the algorithm itself is the `Write` operator.
    pub fn assemble(&mut self, graph_id: &str, entries: &[GraphEntry]) -> Result<Element> {
        let mut graph = Self::empty_graph(graph_id);
        for entry in entries {
            let node_id = match &entry.node_id {
                Some(id) => id.clone(),
                None => self.ids.node_id(&entry.algorithm.operator),
            };
            let mut builder = NodeBuilder::new(&mut graph, &mut self.ids, self.toolbox);
            builder.add_node(&entry.algorithm, &node_id);
            if entry.algorithm.operator != "Write" {
                if let Some(output) = entry.algorithm.outputs.iter().find(|o| o.value.is_some()) {
                    let path = output.value.clone().unwrap_or_default();
                    let mut builder = NodeBuilder::new(&mut graph, &mut self.ids, self.toolbox);
                    builder.add_write_node(&node_id, &path);
                }
            }
        }
        validate(&graph)?;
        info!(graph = graph_id, nodes = graph.find_all("node").count(), "assembled GPF graph");
        Ok(graph)
    }

    /// Assembles a linear pipeline: each algorithm's first open raster slot
    /// is wired to the node before it.
    pub fn assemble_pipeline(&mut self, graph_id: &str, algorithms: Vec<GpfAlgorithm>) -> Result<Element> {
        let mut entries = Vec::with_capacity(algorithms.len());
        let mut previous_id: Option<String> = None;
        for mut alg in algorithms {
            let node_id = self.ids.node_id(&alg.operator);
            if let Some(prev) = &previous_id {
                if let Some(slot) = alg.open_raster_slot() {
                    slot.set_value(prev.as_str());
                }
            }
            previous_id = Some(node_id.clone());
            entries.push(GraphEntry::with_id(alg, node_id));
        }
        self.assemble(graph_id, &entries)
    }
}

/// Checks graph invariants: unique node ids and resolvable `refid` sources.
pub fn validate(graph: &Element) -> Result<()> {
    let mut ids = HashSet::new();
    for node in graph.find_all("node") {
        let id = node.attr("id").unwrap_or_default().to_string();
        if !ids.insert(id.clone()) {
            return Err(Error::DuplicateNodeId(id));
        }
    }
    for node in graph.find_all("node") {
        let node_id = node.attr("id").unwrap_or_default();
        if let Some(sources) = node.find("sources") {
            for source in &sources.children {
                if let Some(refid) = source.attr("refid") {
                    if !ids.contains(refid) {
                        return Err(Error::UnresolvedSource {
                            node: node_id.to_string(),
                            refid: refid.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Collects `(write-node id, file path)` pairs from a graph's `Write` nodes,
/// the raw material for mapping declared outputs to result files.
pub fn write_outputs(graph: &Element) -> Vec<(String, String)> {
    graph
        .find_all("node")
        .filter(|n| n.find("operator").map(Element::text_or_empty) == Some("Write"))
        .filter_map(|n| {
            let file = n.find_path("parameters/file")?;
            Some((
                n.attr("id").unwrap_or_default().to_string(),
                file.text_or_empty().to_string(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::{OutputSpec, Parameter, ParameterKind, ParameterSpec};

    fn alg_with_source(operator: &str) -> GpfAlgorithm {
        let mut alg = GpfAlgorithm::new(operator);
        alg.parameters.push(Parameter::new(ParameterSpec::new(
            "sourceProduct",
            "Source product",
            ParameterKind::Raster,
        )));
        alg
    }

    #[test]
    fn ids_are_monotonic_per_allocator() {
        let mut a = NodeIdAllocator::new();
        assert_eq!(a.node_id("Read"), "Read_0");
        assert_eq!(a.node_id("Write"), "Write_1");
        let mut b = NodeIdAllocator::new();
        assert_eq!(b.node_id("Read"), "Read_0");
    }

    #[test]
    fn pipeline_wires_downstream_refid_to_upstream_id() {
        let a = alg_with_source("Calibration");
        let b = alg_with_source("Speckle-Filter");
        let mut assembler = GraphAssembler::new(Toolbox::Snap);
        let graph = assembler
            .assemble_pipeline("Graph", vec![a, b])
            .unwrap();

        let nodes: Vec<&Element> = graph.find_all("node").collect();
        assert_eq!(nodes.len(), 2);
        let upstream_id = nodes[0].attr("id").unwrap();
        let source = nodes[1].find_path("sources/sourceProduct").unwrap();
        assert_eq!(source.attr("refid"), Some(upstream_id));

        let mut seen = HashSet::new();
        assert!(graph.find_all("node").all(|n| seen.insert(n.attr("id"))));
    }

    #[test]
    fn bound_output_appends_write_node() {
        let mut alg = alg_with_source("Calibration");
        let mut out = OutputSpec::new("-out", "Output image");
        out.value = Some("/out/result.dim".into());
        alg.outputs.push(out);

        let mut assembler = GraphAssembler::new(Toolbox::Snap);
        let graph = assembler
            .assemble("Graph", &[GraphEntry::new(alg)])
            .unwrap();
        let outputs = write_outputs(&graph);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].1, "/out/result.dim");
    }

    #[test]
    fn write_operator_gets_no_extra_write_node() {
        let mut alg = GpfAlgorithm::new("Write");
        alg.outputs.push(OutputSpec {
            name: "file".into(),
            description: "Output file".into(),
            value: Some("/out/x.tif".into()),
        });
        let mut assembler = GraphAssembler::new(Toolbox::Snap);
        let graph = assembler
            .assemble("Graph", &[GraphEntry::new(alg)])
            .unwrap();
        assert_eq!(graph.find_all("node").count(), 1);
    }

    #[test]
    fn dangling_refid_fails_validation() {
        let mut alg = alg_with_source("Calibration");
        if let Some(slot) = alg.open_raster_slot() {
            slot.set_value("NoSuchNode_9");
        }
        let mut assembler = GraphAssembler::new(Toolbox::Snap);
        let err = assembler
            .assemble("Graph", &[GraphEntry::new(alg)])
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedSource { refid, .. } if refid == "NoSuchNode_9"));
    }

    #[test]
    fn duplicate_ids_fail_validation() {
        let a = GpfAlgorithm::new("Read");
        let b = GpfAlgorithm::new("Read");
        let mut assembler = GraphAssembler::new(Toolbox::Snap);
        let err = assembler
            .assemble(
                "Graph",
                &[
                    GraphEntry::with_id(a, "Read_0"),
                    GraphEntry::with_id(b, "Read_0"),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateNodeId(id) if id == "Read_0"));
    }
}
