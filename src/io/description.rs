//! Loading operator definitions from description files.
//!
//! A description file is a small hand-maintained text format: four header
//! lines (operator, description, display name, group), then one line per
//! parameter or output until a blank line or end of file. Parameter lines
//! are pipe-separated, `TypeName|name|description|...`, with a leading `*`
//! marking the parameter as advanced.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::core::model::OperatorLookup;
use crate::core::params::{GpfAlgorithm, OutputSpec, Parameter, ParameterKind, ParameterSpec};

#[derive(Debug, thiserror::Error)]
pub enum DescriptionError {
    #[error("failed to read description file: {0}")]
    Io(#[from] std::io::Error),
    #[error("{file}:{line_no}: unrecognized line `{line}`")]
    Malformed {
        file: String,
        line_no: usize,
        line: String,
    },
    #[error("{file}: missing header lines (operator, description, name, group)")]
    Truncated { file: String },
}

/// Parses one description file into an algorithm definition.
pub fn load_description(path: &Path) -> Result<GpfAlgorithm, DescriptionError> {
    let text = fs::read_to_string(path)?;
    let file = path.display().to_string();
    let mut lines = text.lines().map(str::trim);

    let mut header = || {
        lines
            .next()
            .map(str::to_string)
            .ok_or_else(|| DescriptionError::Truncated { file: file.clone() })
    };
    let operator = header()?;
    let description = header()?;
    let display_name = header()?;
    let group = header()?;

    let mut alg = GpfAlgorithm::new(operator);
    alg.description = description;
    alg.display_name = display_name;
    alg.group = group;

    for (idx, line) in text.lines().map(str::trim).enumerate().skip(4) {
        if line.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix("OutputRaster|") {
            let mut tokens = rest.split('|');
            let name = tokens.next().unwrap_or_default();
            let description = tokens.next().unwrap_or(name);
            alg.outputs.push(OutputSpec::new(name, description));
            continue;
        }
        match parse_parameter_line(line) {
            Some(param) => alg.parameters.push(param),
            None => {
                return Err(DescriptionError::Malformed {
                    file,
                    line_no: idx + 1,
                    line: line.to_string(),
                });
            }
        }
    }
    Ok(alg)
}

/// Parses a pipe-separated parameter line; `None` for unknown type names.
fn parse_parameter_line(line: &str) -> Option<Parameter> {
    let (advanced, line) = match line.strip_prefix('*') {
        Some(rest) => (true, rest),
        None => (false, line),
    };
    let tokens: Vec<&str> = line.split('|').collect();
    if tokens.len() < 3 {
        return None;
    }
    let type_name = tokens[0];
    let name = tokens[1];
    let description = tokens[2];
    // "None" placeholders stand for absent values
    let token = |i: usize| tokens.get(i).copied().filter(|t| !t.is_empty() && *t != "None");

    let kind = match type_name {
        "ParameterRaster" | "ParameterSnapRasterLayer" | "QgsProcessingParameterRasterLayer" => {
            ParameterKind::Raster
        }
        "ParameterBoolean" | "QgsProcessingParameterBoolean" => ParameterKind::Boolean,
        "ParameterSelection" | "QgsProcessingParameterEnum" => ParameterKind::Selection,
        "ParameterExtent" | "QgsProcessingParameterExtent" => ParameterKind::Extent,
        "ParameterBandExpression" => ParameterKind::BandExpression,
        "ParameterPolarisations" => ParameterKind::Polarisations,
        "ParameterPixelSize" => ParameterKind::PixelSize,
        "ParameterString"
        | "ParameterNumber"
        | "ParameterFile"
        | "ParameterCrs"
        | "QgsProcessingParameterString"
        | "QgsProcessingParameterNumber" => ParameterKind::Literal,
        _ => return None,
    };

    let mut spec = ParameterSpec::new(name, description, kind);
    spec.advanced = advanced;
    match kind {
        ParameterKind::Selection => {
            spec.options = token(3)
                .map(|opts| opts.split(';').map(str::to_string).collect())
                .unwrap_or_default();
            spec.default = token(4).map(str::to_string);
        }
        ParameterKind::Boolean => {
            spec.default = token(3).map(str::to_string);
        }
        ParameterKind::Literal if type_name.contains("Number") => {
            // ParameterNumber|name|description|min|max|default
            spec.default = token(5).map(str::to_string);
        }
        ParameterKind::Literal => {
            spec.default = token(3).map(str::to_string);
        }
        _ => {}
    }
    Some(Parameter::new(spec))
}

/// All operators known to a toolbox, keyed by exact operator name.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    algorithms: HashMap<String, GpfAlgorithm>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        OperatorRegistry::default()
    }

    pub fn insert(&mut self, algorithm: GpfAlgorithm) {
        self.algorithms.insert(algorithm.operator.clone(), algorithm);
    }

    /// Loads every description file in `dir`. Files that fail to parse are
    /// logged and skipped so one bad descriptor does not hide the rest.
    pub fn load_dir(dir: &Path) -> std::io::Result<Self> {
        let mut registry = OperatorRegistry::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            match load_description(&path) {
                Ok(alg) => {
                    debug!(operator = %alg.operator, file = %path.display(), "loaded operator");
                    registry.insert(alg);
                }
                Err(err) => warn!(file = %path.display(), %err, "skipping description file"),
            }
        }
        Ok(registry)
    }

    pub fn by_operator(&self, operator: &str) -> Option<&GpfAlgorithm> {
        self.algorithms.get(operator)
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GpfAlgorithm> {
        self.algorithms.values()
    }
}

impl OperatorLookup for OperatorRegistry {
    fn by_operator(&self, operator: &str) -> Option<&GpfAlgorithm> {
        self.algorithms.get(operator)
    }
}
