//! Construction of individual `<node>` elements and their satellite
//! `Read` / `ProductSet-Reader` / `Write` adapter nodes.
//!
//! Raster parameters are the interesting case: a value naming an existing
//! file gets loaded through an auto-created `Read` node (or appended to a
//! shared `ProductSet-Reader` when the parameter name asks for one), while
//! any other value is taken as a reference to another node's id and wired as
//! a `refid` source. Everything else goes through the parameter codec.
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::core::codec;
use crate::core::graph::NodeIdAllocator;
use crate::core::params::{GpfAlgorithm, ParameterKind};
use crate::io::xml::Element;
use crate::types::Toolbox;

/// Matches parameter names that route their file through a shared
/// ProductSet-Reader node: an optional digit prefix, the literal marker,
/// then the real source-parameter name.
fn product_set_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d*ProductSet-Reader>(.*)").expect("hard-coded pattern"))
}

/// Builds nodes into a graph element, appending satellite nodes as needed.
pub struct NodeBuilder<'a> {
    graph: &'a mut Element,
    ids: &'a mut NodeIdAllocator,
    toolbox: Toolbox,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(graph: &'a mut Element, ids: &'a mut NodeIdAllocator, toolbox: Toolbox) -> Self {
        NodeBuilder { graph, ids, toolbox }
    }

    /// Adds one node for `alg` under the given id. Satellite `Read` and
    /// `ProductSet-Reader` nodes are appended to the graph before the node
    /// itself, matching the order the external tool expects to resolve
    /// references in.
    pub fn add_node(&mut self, alg: &GpfAlgorithm, node_id: &str) -> String {
        let mut sources = Element::new("sources");
        let mut parameters = Element::new("parameters");

        for param in &alg.parameters {
            if !param.is_bound() {
                continue;
            }
            if param.spec.kind == ParameterKind::Raster && alg.operator != "Read" {
                let value = param
                    .value
                    .as_ref()
                    .map(|v| v.as_text())
                    .unwrap_or_default();
                if Path::new(&value).is_file() {
                    // load the file through an adapter node
                    let (source_name, source_id) =
                        match product_set_pattern().captures(&param.spec.name) {
                            Some(caps) => {
                                let name = caps[1].to_string();
                                let id = self.add_product_set_reader(node_id, &value);
                                (name, id)
                            }
                            None => (param.spec.name.clone(), self.add_read_node(node_id, &value)),
                        };
                    if sources.find(&source_name).is_none() {
                        let source = sources.push_child(Element::new(source_name));
                        source.set_attr("refid", source_id);
                    }
                } else {
                    // not a file on disk: the value names another node
                    debug!(operator = %alg.operator, source = %value, "wiring node reference");
                    let source = sources.push_child(Element::new(&param.spec.name));
                    source.set_attr("refid", value);
                }
            } else if let Some(encoded) = codec::encode(param) {
                codec::apply(&mut parameters, &encoded);
            }
        }

        if self.toolbox == Toolbox::Snap {
            split_band_elements(&mut parameters);
        }

        let mut node = Element::new("node");
        node.set_attr("id", node_id);
        node.push_child(Element::with_text("operator", &alg.operator));
        node.children.push(sources);
        node.children.push(parameters);
        self.graph.children.push(node);
        node_id.to_string()
    }

    /// Creates a fresh `Read` node for `file` and returns its id.
    fn add_read_node(&mut self, base_id: &str, file: &str) -> String {
        let id = format!("{base_id}_read_{}", self.ids.bump());
        let mut node = Element::new("node");
        node.set_attr("id", &id);
        node.push_child(Element::with_text("operator", "Read"));
        node.push_child(Element::new("sources"));
        let parameters = node.push_child(Element::new("parameters"));
        parameters.push_child(Element::with_text("file", file));
        self.graph.children.push(node);
        id
    }

    /// Returns the shared ProductSet-Reader node for `base_id`, creating it
    /// on first use, and appends `file` to its comma-joined file list.
    fn add_product_set_reader(&mut self, base_id: &str, file: &str) -> String {
        let id = format!("{base_id}_ProductSet-Reader");
        match self.graph.find_by_attr_mut("node", "id", &id) {
            Some(node) => {
                if let Some(list) = node.find_descendant_mut("fileList") {
                    let joined = format!("{},{}", list.text_or_empty(), file);
                    list.text = Some(joined);
                }
            }
            None => {
                let mut node = Element::new("node");
                node.set_attr("id", &id);
                node.push_child(Element::with_text("operator", "ProductSet-Reader"));
                node.push_child(Element::new("sources"));
                let parameters = node.push_child(Element::new("parameters"));
                parameters.push_child(Element::with_text("fileList", file));
                self.graph.children.push(node);
            }
        }
        id
    }

    /// Appends the terminal `Write` node persisting `node_id`'s output.
    pub fn add_write_node(&mut self, node_id: &str, output_path: &str) -> String {
        let id = format!("{node_id}_write_{}", self.ids.bump());
        let mut node = Element::new("node");
        node.set_attr("id", &id);
        node.push_child(Element::with_text("operator", "Write"));
        let sources = node.push_child(Element::new("sources"));
        let source = sources.push_child(Element::new("source"));
        source.set_attr("refid", node_id);
        let parameters = node.push_child(Element::new("parameters"));
        parameters.push_child(Element::with_text("file", output_path));
        parameters.push_child(Element::with_text(
            "formatName",
            format_name(output_path, self.toolbox),
        ));
        self.graph.children.push(node);
        id
    }
}

/// `formatName` by destination extension; the plain-raster default differs
/// between toolbox generations and must stay that way.
fn format_name(path: &str, toolbox: Toolbox) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".dim") {
        "BEAM-DIMAP"
    } else if lower.ends_with(".hdr") {
        "ENVI"
    } else {
        toolbox.default_raster_format()
    }
}

/// SNAP's schema wants one `<band>` element per band, but band-list
/// parameters arrive comma-joined. Replaces every `<band>` element holding a
/// list with one element per non-empty entry, in place.
fn split_band_elements(parameters: &mut Element) {
    for child in &mut parameters.children {
        split_band_elements(child);
    }
    if parameters.children.iter().any(|c| c.tag == "band") {
        let mut rebuilt = Vec::with_capacity(parameters.children.len());
        for child in parameters.children.drain(..) {
            if child.tag == "band" {
                for band in child.text_or_empty().split(',') {
                    if !band.is_empty() {
                        rebuilt.push(Element::with_text("band", band));
                    }
                }
            } else {
                rebuilt.push(child);
            }
        }
        parameters.children = rebuilt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::{Parameter, ParameterSpec, ParameterValue};
    use std::io::Write as _;

    fn graph_root() -> Element {
        let mut graph = Element::new("graph");
        graph.set_attr("id", "Graph");
        graph.push_child(Element::with_text("version", "1.0"));
        graph
    }

    fn raster(name: &str, value: &str) -> Parameter {
        Parameter::with_value(
            ParameterSpec::new(name, name, ParameterKind::Raster),
            ParameterValue::Text(value.into()),
        )
    }

    #[test]
    fn existing_file_routes_through_read_node() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let mut alg = GpfAlgorithm::new("Calibration");
        alg.parameters.push(raster("sourceProduct", &path));

        let mut graph = graph_root();
        let mut ids = NodeIdAllocator::new();
        let node_id = ids.node_id("Calibration");
        NodeBuilder::new(&mut graph, &mut ids, Toolbox::Snap).add_node(&alg, &node_id);

        let nodes: Vec<&Element> = graph.find_all("node").collect();
        assert_eq!(nodes.len(), 2);
        let read = nodes[0];
        assert_eq!(read.find("operator").unwrap().text_or_empty(), "Read");
        assert_eq!(
            read.find_path("parameters/file").unwrap().text_or_empty(),
            path
        );
        let main = nodes[1];
        let source = main.find_path("sources/sourceProduct").unwrap();
        assert_eq!(source.attr("refid"), read.attr("id"));
    }

    #[test]
    fn non_file_value_is_a_node_reference() {
        let mut alg = GpfAlgorithm::new("Terrain-Correction");
        alg.parameters.push(raster("sourceProduct", "Calibration_0"));

        let mut graph = graph_root();
        let mut ids = NodeIdAllocator::new();
        let node_id = ids.node_id("Terrain-Correction");
        NodeBuilder::new(&mut graph, &mut ids, Toolbox::Snap).add_node(&alg, &node_id);

        assert_eq!(graph.find_all("node").count(), 1);
        let source = graph
            .find("node")
            .unwrap()
            .find_path("sources/sourceProduct")
            .unwrap();
        assert_eq!(source.attr("refid"), Some("Calibration_0"));
    }

    #[test]
    fn product_set_reader_accumulates_files() {
        let mut f1 = tempfile::NamedTempFile::new().unwrap();
        let mut f2 = tempfile::NamedTempFile::new().unwrap();
        writeln!(f1, "a").unwrap();
        writeln!(f2, "b").unwrap();
        let p1 = f1.path().to_string_lossy().into_owned();
        let p2 = f2.path().to_string_lossy().into_owned();

        let mut alg = GpfAlgorithm::new("Back-Geocoding");
        alg.parameters.push(raster("1ProductSet-Reader>sourceProduct", &p1));
        alg.parameters.push(raster("2ProductSet-Reader>sourceProduct", &p2));

        let mut graph = graph_root();
        let mut ids = NodeIdAllocator::new();
        let node_id = ids.node_id("Back-Geocoding");
        NodeBuilder::new(&mut graph, &mut ids, Toolbox::Snap).add_node(&alg, &node_id);

        // one shared reader node, comma-joined file list
        let readers: Vec<&Element> = graph
            .find_all("node")
            .filter(|n| n.find("operator").map(Element::text_or_empty) == Some("ProductSet-Reader"))
            .collect();
        assert_eq!(readers.len(), 1);
        let list = readers[0].find_path("parameters/fileList").unwrap();
        assert_eq!(list.text_or_empty(), format!("{p1},{p2}"));
        // only one source entry survives: both route to the same reader and
        // duplicate source names are suppressed
        let main = graph.find_by_attr("node", "id", &node_id).unwrap();
        assert_eq!(main.find("sources").unwrap().children.len(), 1);
    }

    #[test]
    fn read_operator_keeps_raster_as_parameter() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let mut alg = GpfAlgorithm::new("Read");
        alg.parameters.push(raster("file", &path));

        let mut graph = graph_root();
        let mut ids = NodeIdAllocator::new();
        let node_id = ids.node_id("Read");
        NodeBuilder::new(&mut graph, &mut ids, Toolbox::Snap).add_node(&alg, &node_id);

        assert_eq!(graph.find_all("node").count(), 1);
        let node = graph.find("node").unwrap();
        assert_eq!(node.find_path("parameters/file").unwrap().text_or_empty(), path);
        assert!(node.find("sources").unwrap().children.is_empty());
    }

    #[test]
    fn write_node_format_follows_extension_and_toolbox() {
        let cases = [
            ("/out/product.dim", Toolbox::Snap, "BEAM-DIMAP"),
            ("/out/product.hdr", Toolbox::Snap, "ENVI"),
            ("/out/product.tif", Toolbox::Beam, "GeoTIFF"),
            ("/out/product.tif", Toolbox::Snap, "GeoTIFF-BigTIFF"),
        ];
        for (path, toolbox, expected) in cases {
            let mut graph = graph_root();
            let mut ids = NodeIdAllocator::new();
            NodeBuilder::new(&mut graph, &mut ids, toolbox).add_write_node("Calibration_0", path);
            let write = graph.find("node").unwrap();
            assert_eq!(
                write.find_path("parameters/formatName").unwrap().text_or_empty(),
                expected,
                "{path} on {toolbox}"
            );
            assert_eq!(
                write
                    .find_path("sources/source")
                    .unwrap()
                    .attr("refid"),
                Some("Calibration_0")
            );
        }
    }

    #[test]
    fn snap_band_lists_split_into_repeated_elements() {
        let mut alg = GpfAlgorithm::new("BandSelect");
        alg.parameters.push(Parameter::with_value(
            ParameterSpec::new("band", "Bands", ParameterKind::BandExpression),
            ParameterValue::Text("Sigma0_VV,Sigma0_VH".into()),
        ));

        let mut graph = graph_root();
        let mut ids = NodeIdAllocator::new();
        let node_id = ids.node_id("BandSelect");
        NodeBuilder::new(&mut graph, &mut ids, Toolbox::Snap).add_node(&alg, &node_id);

        let parameters = graph.find("node").unwrap().find("parameters").unwrap();
        let bands: Vec<&str> = parameters
            .find_all("band")
            .map(Element::text_or_empty)
            .collect();
        assert_eq!(bands, vec!["Sigma0_VV", "Sigma0_VH"]);
    }
}
