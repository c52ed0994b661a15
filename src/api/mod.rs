//! High-level library API: build graphs for single operators or saved
//! models and run them through `gpt`. Prefer these entrypoints over the
//! low-level assembly modules when embedding the crate.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::GpfConfig;
use crate::core::graph::{GraphAssembler, GraphEntry};
use crate::core::model::GpfModel;
use crate::core::params::{GpfAlgorithm, ParameterValue};
use crate::error::Result;
use crate::exec::{ExecutionReport, GptRunner, ProgressSink};
use crate::io::xml::Element;
use crate::types::Toolbox;

/// Outcome of a run: the process report plus the produced files, checked
/// for existence. A clean exit with missing outputs still counts as a
/// failure, mirroring how the tool reports graph errors on stdout rather
/// than through its exit code.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub report: ExecutionReport,
    /// Declared output name (model output label, or the operator's output
    /// name) to produced file path.
    pub outputs: HashMap<String, PathBuf>,
    pub missing_outputs: Vec<PathBuf>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.report.exit_code.is_none_or(|c| c == 0) && self.missing_outputs.is_empty()
    }
}

/// Builds the graph for a single algorithm, honoring bound outputs.
pub fn build_operator_graph(toolbox: Toolbox, algorithm: GpfAlgorithm) -> Result<Element> {
    let mut assembler = GraphAssembler::new(toolbox);
    assembler.assemble("Graph", &[GraphEntry::new(algorithm)])
}

/// Runs a single algorithm end to end.
pub fn run_operator(
    config: &GpfConfig,
    toolbox: Toolbox,
    algorithm: GpfAlgorithm,
    sink: &mut dyn ProgressSink,
    timeout: Option<Duration>,
) -> Result<ExecutionResult> {
    let expected = declared_outputs(&algorithm);
    let graph = build_operator_graph(toolbox, algorithm)?;
    execute(config, toolbox, &graph, expected, sink, timeout)
}

/// Declared output name to bound destination path. The `Write` operator
/// carries its destination in the `file` parameter rather than a declared
/// output.
fn declared_outputs(algorithm: &GpfAlgorithm) -> HashMap<String, PathBuf> {
    let mut expected: HashMap<String, PathBuf> = algorithm
        .outputs
        .iter()
        .filter_map(|o| o.value.as_ref().map(|v| (o.name.clone(), PathBuf::from(v))))
        .collect();
    if algorithm.operator == "Write" {
        if let Some(value) = algorithm.parameter("file").and_then(|p| p.value.as_ref()) {
            expected.insert("file".to_string(), PathBuf::from(value.as_text()));
        }
    }
    expected
}

/// Runs a saved model with the given input values and output destinations.
pub fn run_model(
    config: &GpfConfig,
    model: &GpfModel,
    inputs: &HashMap<String, ParameterValue>,
    outputs: &HashMap<String, String>,
    sink: &mut dyn ProgressSink,
    timeout: Option<Duration>,
) -> Result<ExecutionResult> {
    let graph = model.prepare_execution(inputs, outputs)?;
    let expected = model
        .resolve_outputs(&graph)
        .into_iter()
        .map(|(label, path)| (label, PathBuf::from(path)))
        .collect();
    execute(config, model.toolbox, &graph, expected, sink, timeout)
}

fn execute(
    config: &GpfConfig,
    toolbox: Toolbox,
    graph: &Element,
    expected: HashMap<String, PathBuf>,
    sink: &mut dyn ProgressSink,
    timeout: Option<Duration>,
) -> Result<ExecutionResult> {
    let gpt = config.gpt_path(toolbox)?;
    let mut runner = GptRunner::new(gpt, config.threads);
    if let Some(timeout) = timeout {
        runner = runner.with_timeout(timeout);
    }
    let xml_text = crate::io::xml::to_pretty_string(graph)?;
    let report = runner.run(&xml_text, sink)?;

    let missing_outputs: Vec<PathBuf> = expected
        .values()
        .filter(|path| !output_exists(path))
        .cloned()
        .collect();
    if missing_outputs.is_empty() {
        info!(toolbox = %toolbox, outputs = expected.len(), "graph run complete");
    } else {
        warn!(toolbox = %toolbox, ?missing_outputs, "graph run produced no output");
    }
    Ok(ExecutionResult {
        report,
        outputs: expected,
        missing_outputs,
    })
}

/// BEAM-DIMAP destinations materialize as a `.dim` header next to a `.data`
/// directory; accept either spelling of the path.
fn output_exists(path: &Path) -> bool {
    if path.exists() {
        return true;
    }
    path.extension().and_then(|e| e.to_str()) == Some("dim")
        && path.with_extension("data").exists()
}
