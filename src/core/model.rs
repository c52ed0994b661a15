//! Persistence of multi-node graphs as reusable models.
//!
//! A model file is a plain GPF graph the external tool can run directly,
//! plus attribute extensions the tool ignores: `qgisModelInputPos` and
//! `qgisModelInputVars` on parameters exposed as model inputs (the latter a
//! JSON-serialized [`ParameterSpec`], an explicit versioned schema), a
//! `qgisModelOutputName` on parameters exposed as model results, and an
//! `applicationData[@id="Presentation"]` block with the model's name, group
//! and per-node layout positions.
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::core::graph::{self, GraphAssembler, GraphEntry};
use crate::core::params::{GpfAlgorithm, ParameterKind, ParameterSpec, ParameterValue};
use crate::error::{Error, Result};
use crate::io::xml::{self, Element};
use crate::types::Toolbox;

const INPUT_POS_ATTR: &str = "qgisModelInputPos";
const INPUT_VARS_ATTR: &str = "qgisModelInputVars";
const OUTPUT_NAME_ATTR: &str = "qgisModelOutputName";

/// Resolves operator names to algorithm definitions during model loading.
pub trait OperatorLookup {
    fn by_operator(&self, operator: &str) -> Option<&GpfAlgorithm>;
}

/// A parameter of one model node exposed as a model-level input.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    /// Name of the node parameter the input binds to.
    pub parameter: String,
    /// Full definition of the model-level parameter, round-tripped through
    /// the `qgisModelInputVars` attribute.
    pub spec: ParameterSpec,
    pub position: (f64, f64),
}

/// A node parameter exposed as a model-level result.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub parameter: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct ModelNode {
    pub node_id: String,
    /// Resolved algorithm with the node's static parameter values bound.
    pub algorithm: GpfAlgorithm,
    pub position: (f64, f64),
    pub inputs: Vec<ModelInput>,
    pub outputs: Vec<ModelOutput>,
    /// `sources` edges: (source element tag, upstream node id).
    pub connections: Vec<(String, String)>,
}

impl ModelNode {
    pub fn new(node_id: impl Into<String>, algorithm: GpfAlgorithm) -> Self {
        ModelNode {
            node_id: node_id.into(),
            algorithm,
            position: (0.0, 0.0),
            inputs: Vec::new(),
            outputs: Vec::new(),
            connections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GpfModel {
    pub name: String,
    pub group: String,
    pub toolbox: Toolbox,
    pub nodes: Vec<ModelNode>,
}

impl GpfModel {
    pub fn new(name: impl Into<String>, group: impl Into<String>, toolbox: Toolbox) -> Self {
        GpfModel {
            name: name.into(),
            group: group.into(),
            toolbox,
            nodes: Vec::new(),
        }
    }

    /// Serializes the model to pretty-printed graph XML.
    pub fn to_xml(&self) -> Result<String> {
        let mut assembler = GraphAssembler::new(self.toolbox);
        let entries: Vec<GraphEntry> = self
            .nodes
            .iter()
            .map(|node| GraphEntry::with_id(self.storable_algorithm(node), &node.node_id))
            .collect();
        let mut graph = assembler.assemble("Graph", &entries)?;
        apply_connections(&mut graph, &self.nodes)?;
        graph::validate(&graph)?;

        for node in &self.nodes {
            let Some(node_el) = graph.find_by_attr_mut("node", "id", &node.node_id) else {
                continue;
            };
            let Some(parameters) = node_el.find_mut("parameters") else {
                continue;
            };
            for input in &node.inputs {
                let el = ensure_path(parameters, &element_path(&input.parameter));
                el.set_attr(INPUT_VARS_ATTR, serde_json::to_string(&input.spec)?);
                el.set_attr(
                    INPUT_POS_ATTR,
                    format!("{},{}", input.position.0, input.position.1),
                );
            }
            for output in &node.outputs {
                let el = ensure_path(parameters, &element_path(&output.parameter));
                el.set_attr(OUTPUT_NAME_ATTR, &output.label);
            }
        }

        let presentation = graph.push_child(Element::new("applicationData"));
        presentation.set_attr("id", "Presentation");
        presentation.set_attr("name", &self.name);
        presentation.set_attr("group", &self.group);
        presentation.push_child(Element::new("Description"));
        for node in &self.nodes {
            let entry = presentation.push_child(Element::new("node"));
            entry.set_attr("id", &node.node_id);
            let pos = entry.push_child(Element::new("displayPosition"));
            pos.set_attr("x", node.position.0.to_string());
            pos.set_attr("y", node.position.1.to_string());
        }

        Ok(xml::to_pretty_string(&graph)?)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_xml()?)?;
        info!(model = %self.name, file = %path.display(), "saved GPF model");
        Ok(())
    }

    /// Reconstructs a model from graph XML, resolving each node's operator
    /// through `lookup`. Fails with [`Error::WrongModel`] when an operator
    /// is unknown.
    pub fn from_xml(xml_text: &str, lookup: &dyn OperatorLookup, toolbox: Toolbox) -> Result<Self> {
        let root = xml::parse(xml_text)?;
        if root.tag != "graph" || root.attr("id") != Some("Graph") {
            return Err(Error::InvalidModel(
                "root element is not <graph id=\"Graph\">".to_string(),
            ));
        }

        let mut model = GpfModel::new("Unknown", "Uncategorized", toolbox);
        for node_el in root.find_all("node") {
            model.nodes.push(read_node(node_el, lookup)?);
        }

        if let Some(presentation) = root.find_by_attr("applicationData", "id", "Presentation") {
            if let Some(name) = presentation.attr("name") {
                model.name = name.to_string();
            }
            if let Some(group) = presentation.attr("group") {
                model.group = group.to_string();
            }
            for node in &mut model.nodes {
                let Some(entry) = presentation.find_by_attr("node", "id", &node.node_id) else {
                    continue;
                };
                if let Some(pos) = entry.find("displayPosition") {
                    node.position = (
                        pos.attr("x").and_then(|v| v.parse().ok()).unwrap_or(0.0),
                        pos.attr("y").and_then(|v| v.parse().ok()).unwrap_or(0.0),
                    );
                }
            }
        }

        promote_plain_endpoints(&mut model);
        Ok(model)
    }

    pub fn from_file(path: &Path, lookup: &dyn OperatorLookup, toolbox: Toolbox) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut model = Self::from_xml(&text, lookup, toolbox)?;
        if model.name == "Unknown" {
            if let Some(stem) = path.file_stem() {
                model.name = stem.to_string_lossy().into_owned();
            }
        }
        Ok(model)
    }

    /// Declared model inputs, in node order.
    pub fn inputs(&self) -> impl Iterator<Item = &ModelInput> {
        self.nodes.iter().flat_map(|n| n.inputs.iter())
    }

    /// Declared model outputs (label per exposed result), in node order.
    pub fn outputs(&self) -> impl Iterator<Item = &ModelOutput> {
        self.nodes.iter().flat_map(|n| n.outputs.iter())
    }

    /// Builds the executable graph for this model, binding `inputs` (by
    /// model-input name) and `outputs` (destination path by output label).
    pub fn prepare_execution(
        &self,
        inputs: &HashMap<String, ParameterValue>,
        outputs: &HashMap<String, String>,
    ) -> Result<Element> {
        let mut assembler = GraphAssembler::new(self.toolbox);
        let mut entries = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut alg = node.algorithm.clone();
            for input in &node.inputs {
                match inputs.get(&input.spec.name) {
                    Some(value) => {
                        alg.set_parameter(&input.parameter, value.clone());
                    }
                    None => match &input.spec.default {
                        Some(default) => {
                            alg.set_parameter(&input.parameter, default.as_str());
                        }
                        None => {
                            return Err(Error::MissingInput {
                                name: input.spec.name.clone(),
                            });
                        }
                    },
                }
            }
            for output in &node.outputs {
                let path = outputs.get(&output.label).ok_or_else(|| Error::MissingInput {
                    name: output.label.clone(),
                })?;
                if !alg.set_parameter(&output.parameter, path.as_str()) {
                    alg.set_output(&output.parameter, path.as_str());
                }
            }
            entries.push(GraphEntry::with_id(alg, &node.node_id));
        }
        let mut graph = assembler.assemble("Graph", &entries)?;
        apply_connections(&mut graph, &self.nodes)?;
        graph::validate(&graph)?;
        Ok(graph)
    }

    /// Maps output labels to the file paths an executed graph writes to.
    pub fn resolve_outputs(&self, graph: &Element) -> HashMap<String, String> {
        let write_nodes = graph::write_outputs(graph);
        let mut resolved = HashMap::new();
        for node in &self.nodes {
            for output in &node.outputs {
                let path = if node.algorithm.operator == "Write" {
                    graph
                        .find_by_attr("node", "id", &node.node_id)
                        .and_then(|n| n.find_path("parameters/file"))
                        .map(|f| f.text_or_empty().to_string())
                } else {
                    // the terminal Write node appended for this node carries
                    // an id derived from it
                    write_nodes
                        .iter()
                        .find(|(id, _)| id.starts_with(&format!("{}_write_", node.node_id)))
                        .map(|(_, path)| path.clone())
                };
                if let Some(path) = path {
                    resolved.insert(output.label.clone(), path);
                }
            }
        }
        resolved
    }

    /// Copy of the node's algorithm suitable for persistence: model-input
    /// parameters fall back to their defaults so the carrier element for the
    /// model attributes exists in the stored graph.
    fn storable_algorithm(&self, node: &ModelNode) -> GpfAlgorithm {
        let mut alg = node.algorithm.clone();
        for input in &node.inputs {
            if let Some(param) = alg.parameter_mut(&input.parameter) {
                if !param.is_bound() {
                    if let Some(default) = param.spec.default.clone() {
                        param.set_value(default);
                    }
                }
            }
        }
        alg
    }
}

/// Converts a parameter name with nesting markers into an element path.
fn element_path(name: &str) -> String {
    name.replace('!', "").replace('>', "/")
}

/// Walks `path` below `root`, creating missing elements along the way.
fn ensure_path<'a>(root: &'a mut Element, path: &str) -> &'a mut Element {
    let mut cur = root;
    for segment in path.split('/') {
        cur = if cur.find(segment).is_some() {
            cur.find_mut(segment).expect("just found")
        } else {
            cur.push_child(Element::new(segment))
        };
    }
    cur
}

fn apply_connections(graph: &mut Element, nodes: &[ModelNode]) -> Result<()> {
    for node in nodes {
        if node.connections.is_empty() {
            continue;
        }
        let node_el = graph
            .find_by_attr_mut("node", "id", &node.node_id)
            .ok_or_else(|| Error::InvalidModel(format!("node `{}` missing from graph", node.node_id)))?;
        if node_el.find("sources").is_none() {
            node_el.push_child(Element::new("sources"));
        }
        let Some(sources) = node_el.find_mut("sources") else {
            continue;
        };
        for (tag, refid) in &node.connections {
            if let Some(existing) = sources.find_mut(tag) {
                existing.set_attr("refid", refid);
            } else {
                let source = sources.push_child(Element::new(tag));
                source.set_attr("refid", refid);
            }
        }
    }
    Ok(())
}

fn read_node(node_el: &Element, lookup: &dyn OperatorLookup) -> Result<ModelNode> {
    let operator = node_el
        .find("operator")
        .map(Element::text_or_empty)
        .unwrap_or_default()
        .to_string();
    if operator.is_empty() {
        return Err(Error::InvalidModel("node without operator".to_string()));
    }
    let algorithm = lookup
        .by_operator(&operator)
        .cloned()
        .ok_or_else(|| Error::WrongModel {
            operator: operator.clone(),
        })?;
    let node_id = node_el
        .attr("id")
        .ok_or_else(|| Error::InvalidModel(format!("node for `{operator}` has no id")))?;
    let mut node = ModelNode::new(node_id, algorithm);
    debug!(node = %node.node_id, operator = %operator, "loading model node");

    if let Some(parameters) = node_el.find("parameters") {
        for param in &mut node.algorithm.parameters {
            let Some(el) = parameters.find_path(&element_path(&param.spec.name)) else {
                continue;
            };
            if el.attr(INPUT_POS_ATTR).is_some() && el.attr(INPUT_VARS_ATTR).is_some() {
                let spec: ParameterSpec =
                    serde_json::from_str(el.attr(INPUT_VARS_ATTR).unwrap_or_default())?;
                node.inputs.push(ModelInput {
                    parameter: param.spec.name.clone(),
                    spec,
                    position: parse_position(el.attr(INPUT_POS_ATTR).unwrap_or_default()),
                });
            } else if let Some(value) = parse_parameter_value(&param.spec, el.text_or_empty())? {
                param.value = Some(value);
            }
        }
        let mut labelled = Vec::new();
        collect_output_labels(parameters, "", &mut labelled);
        for (path, label) in labelled {
            let parameter = node
                .algorithm
                .parameters
                .iter()
                .find(|p| element_path(&p.spec.name) == path)
                .map(|p| p.spec.name.clone())
                .unwrap_or_else(|| path.replace('/', ">"));
            node.outputs.push(ModelOutput { parameter, label });
        }
    }

    if let Some(sources) = node_el.find("sources") {
        for source in &sources.children {
            if let Some(refid) = source.attr("refid") {
                node.connections.push((source.tag.clone(), refid.to_string()));
            }
        }
    }

    Ok(node)
}

/// Output labels can sit on nested parameter elements, so the whole
/// subtree is searched; `prefix` is the slash-joined path walked so far.
fn collect_output_labels(el: &Element, prefix: &str, found: &mut Vec<(String, String)>) {
    for child in &el.children {
        let path = if prefix.is_empty() {
            child.tag.clone()
        } else {
            format!("{prefix}/{}", child.tag)
        };
        if let Some(label) = child.attr(OUTPUT_NAME_ATTR) {
            found.push((path.clone(), label.to_string()));
        }
        collect_output_labels(child, &path, found);
    }
}

/// Graphs authored directly in the external tool carry no model metadata;
/// their raw `Read`/`Write` endpoints still have to surface as model inputs
/// and outputs to make the loaded model usable.
fn promote_plain_endpoints(model: &mut GpfModel) {
    for node in &mut model.nodes {
        match node.algorithm.operator.as_str() {
            "Read" if !node.inputs.iter().any(|i| i.parameter == "file") => {
                let mut spec = ParameterSpec::new("file", "Source product", ParameterKind::Raster);
                spec.name = format!("file_{}", node.node_id);
                node.inputs.push(ModelInput {
                    parameter: "file".to_string(),
                    spec,
                    position: (
                        (node.position.0 - 50.0).max(0.0),
                        (node.position.1 - 50.0).max(0.0),
                    ),
                });
            }
            "Write" if !node.outputs.iter().any(|o| o.parameter == "file") => {
                node.outputs.push(ModelOutput {
                    parameter: "file".to_string(),
                    label: "Output file".to_string(),
                });
            }
            _ => {}
        }
    }
}

fn parse_position(raw: &str) -> (f64, f64) {
    let mut parts = raw.split(',');
    let x = parts.next().and_then(|v| v.trim().parse().ok()).unwrap_or(0.0);
    let y = parts.next().and_then(|v| v.trim().parse().ok()).unwrap_or(0.0);
    (x, y)
}

fn polygon_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"POLYGON\s*\(\((.*)\)\)").expect("hard-coded pattern"))
}

/// Reads a stored parameter text back into a raw value, inverting the
/// codec's type-specific formatting.
fn parse_parameter_value(spec: &ParameterSpec, text: &str) -> Result<Option<ParameterValue>> {
    if text.is_empty() {
        return Ok(None);
    }
    match spec.kind {
        ParameterKind::Boolean => Ok(Some(ParameterValue::Bool(text == "True"))),
        ParameterKind::Selection => {
            let idx = spec
                .options
                .iter()
                .position(|opt| opt == text)
                .ok_or_else(|| {
                    Error::InvalidModel(format!(
                        "unknown option `{text}` for parameter `{}`",
                        spec.name
                    ))
                })?;
            Ok(Some(ParameterValue::Int(idx as i64)))
        }
        ParameterKind::Extent => Ok(wkt_to_extent(text).map(ParameterValue::Text)),
        _ => Ok(Some(ParameterValue::Text(text.to_string()))),
    }
}

/// Recovers `xmin,xmax,ymin,ymax` from a stored WKT polygon.
fn wkt_to_extent(text: &str) -> Option<String> {
    let caps = polygon_pattern().captures(text)?;
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    for point in caps[1].split(',') {
        let mut coords = point.trim().split(' ');
        let x: f64 = coords.next()?.parse().ok()?;
        let y: f64 = coords.next()?.parse().ok()?;
        bounds = Some(match bounds {
            None => (x, x, y, y),
            Some((xmin, xmax, ymin, ymax)) => {
                (xmin.min(x), xmax.max(x), ymin.min(y), ymax.max(y))
            }
        });
    }
    bounds.map(|(xmin, xmax, ymin, ymax)| format!("{xmin},{xmax},{ymin},{ymax}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::{OutputSpec, Parameter};

    struct TestRegistry {
        algorithms: Vec<GpfAlgorithm>,
    }

    impl OperatorLookup for TestRegistry {
        fn by_operator(&self, operator: &str) -> Option<&GpfAlgorithm> {
            self.algorithms.iter().find(|a| a.operator == operator)
        }
    }

    fn registry() -> TestRegistry {
        let mut read = GpfAlgorithm::new("Read");
        read.parameters.push(Parameter::new(ParameterSpec::new(
            "file",
            "Source product",
            ParameterKind::Raster,
        )));

        let mut calibration = GpfAlgorithm::new("Calibration");
        calibration.parameters.push(Parameter::new(ParameterSpec::new(
            "sourceProduct",
            "Source product",
            ParameterKind::Raster,
        )));
        let mut sel = ParameterSpec::new("auxFile", "Auxiliary file", ParameterKind::Selection);
        sel.options = vec!["Latest Auxiliary File".into(), "Product Auxiliary File".into()];
        calibration
            .parameters
            .push(Parameter::new(sel));
        calibration.parameters.push(Parameter::new(ParameterSpec::new(
            "outputSigmaBand",
            "Output sigma band",
            ParameterKind::Boolean,
        )));
        calibration.outputs.push(OutputSpec::new("-out", "Calibrated image"));

        let mut write = GpfAlgorithm::new("Write");
        write.parameters.push(Parameter::new(ParameterSpec::new(
            "file",
            "Output file",
            ParameterKind::Literal,
        )));
        write.parameters.push(Parameter::new(ParameterSpec::new(
            "formatName",
            "Format",
            ParameterKind::Literal,
        )));

        TestRegistry {
            algorithms: vec![read, calibration, write],
        }
    }

    fn sample_model(reg: &TestRegistry) -> GpfModel {
        let mut model = GpfModel::new("Sigma0", "SAR preprocessing", Toolbox::Snap);

        let read_alg = reg.by_operator("Read").unwrap().clone();
        let mut read = ModelNode::new("Read_0", read_alg);
        read.position = (100.0, 50.0);
        read.inputs.push(ModelInput {
            parameter: "file".to_string(),
            spec: ParameterSpec::new("source", "Input product", ParameterKind::Raster),
            position: (50.0, 0.0),
        });
        model.nodes.push(read);

        let mut cal_alg = reg.by_operator("Calibration").unwrap().clone();
        cal_alg.set_parameter("auxFile", ParameterValue::Int(1));
        cal_alg.set_parameter("outputSigmaBand", true);
        let mut cal = ModelNode::new("Calibration_1", cal_alg);
        cal.position = (100.0, 150.0);
        cal.connections.push(("sourceProduct".to_string(), "Read_0".to_string()));
        model.nodes.push(cal);

        let mut write_alg = reg.by_operator("Write").unwrap().clone();
        write_alg.set_parameter("formatName", "BEAM-DIMAP");
        let mut write = ModelNode::new("Write_2", write_alg);
        write.position = (100.0, 250.0);
        write.connections.push(("source".to_string(), "Calibration_1".to_string()));
        write.outputs.push(ModelOutput {
            parameter: "file".to_string(),
            label: "Calibrated product".to_string(),
        });
        model.nodes.push(write);

        model
    }

    #[test]
    fn model_round_trips_through_xml() {
        let reg = registry();
        let model = sample_model(&reg);
        let xml_text = model.to_xml().unwrap();
        let back = GpfModel::from_xml(&xml_text, &reg, Toolbox::Snap).unwrap();

        assert_eq!(back.name, model.name);
        assert_eq!(back.group, model.group);
        assert_eq!(back.nodes.len(), model.nodes.len());
        for (a, b) in model.nodes.iter().zip(back.nodes.iter()) {
            assert_eq!(a.node_id, b.node_id);
            assert_eq!(a.algorithm.operator, b.algorithm.operator);
            assert_eq!(a.connections, b.connections);
            assert_eq!(a.outputs, b.outputs);
            assert_eq!(a.inputs.len(), b.inputs.len());
            for (ai, bi) in a.inputs.iter().zip(b.inputs.iter()) {
                assert_eq!(ai.parameter, bi.parameter);
                assert_eq!(ai.spec, bi.spec);
                assert!((ai.position.0 - bi.position.0).abs() < 1e-9);
                assert!((ai.position.1 - bi.position.1).abs() < 1e-9);
            }
            assert!((a.position.0 - b.position.0).abs() < 1e-9);
            assert!((a.position.1 - b.position.1).abs() < 1e-9);
        }

        // bound static values survive, including selection index form
        let cal = &back.nodes[1].algorithm;
        assert_eq!(
            cal.parameter("auxFile").unwrap().value,
            Some(ParameterValue::Int(1))
        );
        assert_eq!(
            cal.parameter("outputSigmaBand").unwrap().value,
            Some(ParameterValue::Bool(true))
        );
    }

    #[test]
    fn unknown_operator_is_a_wrong_model_error() {
        let reg = registry();
        let xml_text = "<graph id=\"Graph\">\n  <version>1.0</version>\n  <node id=\"Mystery_0\">\n    <operator>Mystery-Operator</operator>\n    <sources/>\n    <parameters/>\n  </node>\n</graph>\n";
        let err = GpfModel::from_xml(xml_text, &reg, Toolbox::Snap).unwrap_err();
        assert!(matches!(err, Error::WrongModel { operator } if operator == "Mystery-Operator"));
    }

    #[test]
    fn non_graph_document_is_rejected() {
        let reg = registry();
        let err = GpfModel::from_xml("<model id=\"Graph\"/>", &reg, Toolbox::Snap).unwrap_err();
        assert!(matches!(err, Error::InvalidModel(_)));
    }

    #[test]
    fn plain_snap_graph_gets_promoted_endpoints() {
        let reg = registry();
        // authored in the external tool: no model attributes at all
        let xml_text = "<graph id=\"Graph\">\n  <version>1.0</version>\n  <node id=\"Read_0\">\n    <operator>Read</operator>\n    <sources/>\n    <parameters/>\n  </node>\n  <node id=\"Write_1\">\n    <operator>Write</operator>\n    <sources>\n      <source refid=\"Read_0\"/>\n    </sources>\n    <parameters/>\n  </node>\n</graph>\n";
        let model = GpfModel::from_xml(xml_text, &reg, Toolbox::Snap).unwrap();
        assert_eq!(model.nodes[0].inputs.len(), 1);
        assert_eq!(model.nodes[0].inputs[0].parameter, "file");
        assert_eq!(model.nodes[1].outputs.len(), 1);
        assert_eq!(model.nodes[1].outputs[0].label, "Output file");
        assert_eq!(
            model.nodes[1].connections,
            vec![("source".to_string(), "Read_0".to_string())]
        );
    }

    #[test]
    fn prepare_execution_binds_inputs_and_outputs() {
        let reg = registry();
        let model = sample_model(&reg);
        let mut inputs = HashMap::new();
        inputs.insert(
            "source".to_string(),
            ParameterValue::Text("Read_0_placeholder".into()),
        );
        let mut outputs = HashMap::new();
        outputs.insert("Calibrated product".to_string(), "/out/result.dim".to_string());

        let graph = model.prepare_execution(&inputs, &outputs).unwrap();
        let write = graph.find_by_attr("node", "id", "Write_2").unwrap();
        assert_eq!(
            write.find_path("parameters/file").unwrap().text_or_empty(),
            "/out/result.dim"
        );
        let resolved = model.resolve_outputs(&graph);
        assert_eq!(
            resolved.get("Calibrated product"),
            Some(&"/out/result.dim".to_string())
        );
    }

    #[test]
    fn sentinel_defaults_stay_out_of_the_graph() {
        let reg = registry();
        let mut model = sample_model(&reg);
        let mut spec = ParameterSpec::new("aux", "External auxiliary file", ParameterKind::Literal);
        spec.default = Some("99999".into());
        model.nodes[1]
            .algorithm
            .parameters
            .push(Parameter::new(ParameterSpec::new(
                "externalAuxFile",
                "External auxiliary file",
                ParameterKind::Literal,
            )));
        model.nodes[1].inputs.push(ModelInput {
            parameter: "externalAuxFile".to_string(),
            spec,
            position: (0.0, 0.0),
        });

        let inputs = HashMap::from([(
            "source".to_string(),
            ParameterValue::Text("/in/product.zip".into()),
        )]);
        let outputs = HashMap::from([(
            "Calibrated product".to_string(),
            "/out/result.dim".to_string(),
        )]);
        // "aux" is not supplied, so its textual sentinel default applies
        let graph = model.prepare_execution(&inputs, &outputs).unwrap();
        let cal = graph.find_by_attr("node", "id", "Calibration_1").unwrap();
        assert!(cal.find_path("parameters/externalAuxFile").is_none());
    }

    #[test]
    fn missing_input_is_reported_by_name() {
        let reg = registry();
        let model = sample_model(&reg);
        let outputs = HashMap::from([(
            "Calibrated product".to_string(),
            "/out/result.dim".to_string(),
        )]);
        let err = model.prepare_execution(&HashMap::new(), &outputs).unwrap_err();
        assert!(matches!(err, Error::MissingInput { name } if name == "source"));
    }

    #[test]
    fn nested_output_labels_survive_reload() {
        let mut export = GpfAlgorithm::new("Export");
        export.parameters.push(Parameter::new(ParameterSpec::new(
            "sourceProduct",
            "Source product",
            ParameterKind::Raster,
        )));
        export.parameters.push(Parameter::new(ParameterSpec::new(
            "target>file",
            "Target file",
            ParameterKind::Literal,
        )));
        let reg = TestRegistry {
            algorithms: vec![export],
        };

        let mut model = GpfModel::new("Export model", "IO", Toolbox::Snap);
        let mut node = ModelNode::new("Export_0", reg.by_operator("Export").unwrap().clone());
        node.outputs.push(ModelOutput {
            parameter: "target>file".to_string(),
            label: "Exported".to_string(),
        });
        model.nodes.push(node);

        let xml_text = model.to_xml().unwrap();
        let back = GpfModel::from_xml(&xml_text, &reg, Toolbox::Snap).unwrap();
        assert_eq!(
            back.nodes[0].outputs,
            vec![ModelOutput {
                parameter: "target>file".to_string(),
                label: "Exported".to_string(),
            }]
        );
    }

    #[test]
    fn wkt_extent_recovers_bounds() {
        assert_eq!(
            wkt_to_extent("POLYGON((0 0, 0 5, 10 5, 10 0, 0 0))"),
            Some("0,10,0,5".to_string())
        );
        assert_eq!(wkt_to_extent("not a polygon"), None);
    }
}
