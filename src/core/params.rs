//! Parameter and algorithm data model.
//!
//! Operators are described declaratively as an ordered list of named, typed
//! parameters plus declared outputs. `ParameterKind` is a closed enum, so
//! every encoding path is an exhaustive `match` checked at compile time.
//! `ParameterSpec` is the explicit, versioned schema that survives model
//! round trips (serialized to JSON inside model files).
use serde::{Deserialize, Serialize};

/// Integer sentinel meaning "no value provided, let the operator default apply".
pub const NO_VALUE_INT: i64 = 99999;
/// Floating-point form of the unset sentinel.
pub const NO_VALUE_FLOAT: f64 = 99999.9;

/// Version of the serialized `ParameterSpec` schema stored in model files.
pub const PARAMETER_SCHEMA_VERSION: u32 = 1;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// A raster product: a file to load, or a reference to another node's output.
    Raster,
    Boolean,
    /// Drop-down selection; the stored value is the option index, not the label.
    Selection,
    /// Four comma-separated bounds `xmin,xmax,ymin,ymax`, encoded as a WKT polygon.
    Extent,
    /// Comma-separated band list (split into repeated `<band>` elements for SNAP).
    BandExpression,
    /// Comma-separated polarisation list.
    Polarisations,
    PixelSize,
    /// Plain string or number passed through verbatim.
    Literal,
}

fn schema_version() -> u32 {
    PARAMETER_SCHEMA_VERSION
}

/// Immutable description of one operator parameter, as loaded from a
/// description file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(default = "schema_version")]
    pub schema: u32,
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
    /// Ordered labels for `Selection` parameters; index is the stored value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub advanced: bool,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: ParameterKind) -> Self {
        ParameterSpec {
            schema: PARAMETER_SCHEMA_VERSION,
            name: name.into(),
            description: description.into(),
            kind,
            options: Vec::new(),
            default: None,
            advanced: false,
        }
    }
}

/// A raw user- or model-supplied parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ParameterValue {
    /// True for the well-known "use the operator default" sentinels and for
    /// empty text. Unset values contribute nothing to the output graph.
    ///
    /// Description-file defaults and command-line bindings arrive as text,
    /// so the sentinels are recognized in their textual spellings too.
    pub fn is_unset(&self) -> bool {
        match self {
            ParameterValue::Int(v) => *v == NO_VALUE_INT,
            ParameterValue::Float(v) => *v == NO_VALUE_FLOAT,
            ParameterValue::Bool(_) => false,
            ParameterValue::Text(s) => {
                let s = s.trim();
                s.is_empty()
                    || s.parse::<i64>().is_ok_and(|v| v == NO_VALUE_INT)
                    || s.parse::<f64>().is_ok_and(|v| v == NO_VALUE_FLOAT)
            }
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            ParameterValue::Int(v) => v.to_string(),
            ParameterValue::Float(v) => v.to_string(),
            ParameterValue::Bool(v) => v.to_string(),
            ParameterValue::Text(s) => s.clone(),
        }
    }

    /// Interprets the value as a selection index.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            ParameterValue::Int(v) => usize::try_from(*v).ok(),
            ParameterValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as usize),
            ParameterValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(s: &str) -> Self {
        ParameterValue::Text(s.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(s: String) -> Self {
        ParameterValue::Text(s)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

/// One parameter instance: the spec plus the value bound for this run.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub spec: ParameterSpec,
    pub value: Option<ParameterValue>,
}

impl Parameter {
    pub fn new(spec: ParameterSpec) -> Self {
        Parameter { spec, value: None }
    }

    pub fn with_value(spec: ParameterSpec, value: impl Into<ParameterValue>) -> Self {
        Parameter {
            spec,
            value: Some(value.into()),
        }
    }

    pub fn set_value(&mut self, value: impl Into<ParameterValue>) {
        self.value = Some(value.into());
    }

    pub fn clear_value(&mut self) {
        self.value = None;
    }

    /// A parameter is bound when it has a value other than the unset sentinels.
    pub fn is_bound(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_unset())
    }
}

/// A declared output: the destination file the terminal `Write` node receives.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub name: String,
    pub description: String,
    pub value: Option<String>,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        OutputSpec {
            name: name.into(),
            description: description.into(),
            value: None,
        }
    }
}

/// One processing algorithm: an operator of the external toolbox plus its
/// parameter list, as loaded from a description file.
#[derive(Debug, Clone, PartialEq)]
pub struct GpfAlgorithm {
    pub operator: String,
    pub description: String,
    pub display_name: String,
    pub group: String,
    pub parameters: Vec<Parameter>,
    pub outputs: Vec<OutputSpec>,
}

impl GpfAlgorithm {
    pub fn new(operator: impl Into<String>) -> Self {
        let operator = operator.into();
        GpfAlgorithm {
            description: operator.clone(),
            display_name: operator.clone(),
            group: String::new(),
            operator,
            parameters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.spec.name == name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.spec.name == name)
    }

    /// Binds a parameter value by name; false if the operator has no such
    /// parameter.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParameterValue>) -> bool {
        match self.parameter_mut(name) {
            Some(param) => {
                param.set_value(value);
                true
            }
            None => false,
        }
    }

    pub fn set_output(&mut self, name: &str, path: impl Into<String>) -> bool {
        match self.outputs.iter_mut().find(|o| o.name == name) {
            Some(out) => {
                out.value = Some(path.into());
                true
            }
            None => false,
        }
    }

    /// First unbound raster parameter, the slot pipeline chaining wires to
    /// the upstream node.
    pub fn open_raster_slot(&mut self) -> Option<&mut Parameter> {
        self.parameters
            .iter_mut()
            .find(|p| p.spec.kind == ParameterKind::Raster && !p.is_bound())
    }
}
