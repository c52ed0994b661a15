#![doc = r#"
gpfgraph — a builder and runner for ESA Graph Processing Framework graphs.

This crate turns typed operator descriptions into the XML graphs consumed by
the BEAM and SNAP toolboxes, persists multi-node graphs as reusable models,
and supervises the external `gpt` command-line tool while it runs them. It
powers the gpfgraph CLI and can be embedded in your own Rust applications.

Stability
---------
The public library API is experimental in initial releases. Breaking changes
can occur while the crate stabilizes.

Requirements
------------
- A BEAM or SNAP installation providing the `gpt` launcher (only needed for
  execution; graphs can be built and saved without one).
- Rust 2024 edition toolchain.

Add dependency
--------------
```toml
[dependencies]
gpfgraph = "0.1"
```

Quick start: build and run a single operator
--------------------------------------------
```rust,no_run
use std::path::Path;
use gpfgraph::api::run_operator;
use gpfgraph::config::GpfConfig;
use gpfgraph::exec::ConsoleSink;
use gpfgraph::io::OperatorRegistry;
use gpfgraph::Toolbox;

fn main() -> gpfgraph::Result<()> {
    let registry = OperatorRegistry::load_dir(Path::new("descriptions/snap"))?;
    let mut alg = registry
        .by_operator("Calibration")
        .cloned()
        .expect("descriptor present");
    alg.set_parameter("sourceProduct", "/data/S1A_example.zip");
    alg.set_parameter("outputSigmaBand", true);
    alg.set_output("-out", "/out/calibrated.tif");

    let config = GpfConfig::default();
    let mut sink = ConsoleSink::new();
    let result = run_operator(&config, Toolbox::Snap, alg, &mut sink, None)?;
    assert!(result.success());
    Ok(())
}
```

Build a graph without executing it
----------------------------------
```rust
use gpfgraph::api::build_operator_graph;
use gpfgraph::core::{GpfAlgorithm, Parameter, ParameterKind, ParameterSpec};
use gpfgraph::io::xml;
use gpfgraph::Toolbox;

fn main() -> gpfgraph::Result<()> {
    let mut alg = GpfAlgorithm::new("Subset");
    alg.parameters.push(Parameter::new(ParameterSpec::new(
        "geoRegionExtent",
        "Subset extent",
        ParameterKind::Extent,
    )));
    alg.set_parameter("geoRegionExtent", "10.1,10.9,45.0,45.4");

    let graph = build_operator_graph(Toolbox::Snap, alg)?;
    println!("{}", xml::to_pretty_string(&graph)?);
    Ok(())
}
```

Models
------
A model is a saved multi-node graph with some node parameters exposed as
model-level inputs and some destinations exposed as outputs. Model files are
plain graph XML the toolbox itself can run; the model metadata travels in
attributes the toolbox ignores.

```rust,no_run
use std::collections::HashMap;
use std::path::Path;
use gpfgraph::api::run_model;
use gpfgraph::config::GpfConfig;
use gpfgraph::core::{GpfModel, ParameterValue};
use gpfgraph::exec::ConsoleSink;
use gpfgraph::io::OperatorRegistry;
use gpfgraph::Toolbox;

fn main() -> gpfgraph::Result<()> {
    let registry = OperatorRegistry::load_dir(Path::new("descriptions/snap"))?;
    let model = GpfModel::from_file(Path::new("models/sigma0.xml"), &registry, Toolbox::Snap)?;

    let inputs = HashMap::from([(
        "source".to_string(),
        ParameterValue::Text("/data/S1A_example.zip".to_string()),
    )]);
    let outputs = HashMap::from([(
        "Calibrated product".to_string(),
        "/out/sigma0.dim".to_string(),
    )]);

    let mut sink = ConsoleSink::new();
    let result = run_model(&GpfConfig::default(), &model, &inputs, &outputs, &mut sink, None)?;
    assert!(result.success());
    Ok(())
}
```

Error handling
--------------
All public functions return `gpfgraph::Result<T>`; match on `gpfgraph::Error`
to handle specific cases, e.g. an unknown operator in a model file or a
missing `gpt` launcher.

Useful modules
--------------
- [`api`] — high-level entry points.
- [`core`] — parameters, the XML codec, node and graph assembly, models.
- [`exec`] — the `gpt` process supervisor and output parser.
- [`io`] — graph XML and description-file formats.
- [`config`] — toolbox folders and execution settings.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod exec;
pub mod io;
pub mod types;

// Curated public API surface
pub use config::GpfConfig;
pub use core::{
    GpfAlgorithm, GpfModel, GraphAssembler, Parameter, ParameterKind, ParameterSpec,
    ParameterValue,
};
pub use error::{Error, Result};
pub use exec::{ConsoleSink, ExecutionReport, GptRunner, OutputParser, ProgressSink};
pub use io::{DescriptionError, OperatorRegistry, XmlError};
pub use types::Toolbox;

// High-level API re-exports
pub use api::{ExecutionResult, build_operator_graph, run_model, run_operator};
