use std::collections::HashMap;
use std::time::Duration;

use tracing::{info, warn};

use gpfgraph::api;
use gpfgraph::config::GpfConfig;
use gpfgraph::core::{GpfModel, ParameterValue};
use gpfgraph::exec::ConsoleSink;
use gpfgraph::io::xml;
use gpfgraph::io::OperatorRegistry;
use gpfgraph::Toolbox;

use super::args::CliArgs;
use super::errors::AppError;

fn parse_bindings(raw: &[String]) -> Result<Vec<(String, String)>, AppError> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .ok_or_else(|| AppError::InvalidParam { raw: entry.clone() })
        })
        .collect()
}

fn load_config(args: &CliArgs) -> Result<GpfConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => GpfConfig::from_file(path)?,
        None => GpfConfig::default(),
    };
    if let Some(dir) = &args.gpt_dir {
        match args.toolbox {
            Toolbox::Beam => config.beam_folder = Some(dir.clone()),
            Toolbox::Snap => config.snap_folder = Some(dir.clone()),
        }
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    Ok(config)
}

fn run_operator_mode(
    args: &CliArgs,
    config: &GpfConfig,
    registry: &OperatorRegistry,
    operator: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut alg = registry
        .by_operator(operator)
        .cloned()
        .ok_or_else(|| AppError::UnknownOperator {
            operator: operator.to_string(),
        })?;

    for (name, value) in parse_bindings(&args.params)? {
        if !alg.set_parameter(&name, value.as_str()) {
            return Err(AppError::UnknownParameter { name }.into());
        }
    }
    if let Some(input) = &args.input {
        let path = input.display().to_string();
        match alg.open_raster_slot() {
            Some(slot) => slot.set_value(path),
            None => warn!("--input given but {} has no open raster slot", operator),
        }
    }
    for entry in &args.output {
        let (name, path) = entry.split_once('=').unwrap_or(("", entry));
        if name.is_empty() {
            let bound = match alg.outputs.first().map(|o| o.name.clone()) {
                Some(first) => alg.set_output(&first, path),
                // the Write operator takes its destination as a parameter
                None => alg.set_parameter("file", path),
            };
            if !bound {
                return Err(AppError::InvalidParam { raw: entry.clone() }.into());
            }
        } else if !alg.set_output(name, path) {
            return Err(AppError::UnknownParameter {
                name: name.to_string(),
            }
            .into());
        }
    }

    if args.print_graph {
        let graph = api::build_operator_graph(args.toolbox, alg)?;
        println!("{}", xml::to_pretty_string(&graph).map_err(gpfgraph::Error::from)?);
        return Ok(());
    }

    let mut sink = ConsoleSink::new();
    let timeout = args.timeout.map(Duration::from_secs);
    let result = api::run_operator(config, args.toolbox, alg, &mut sink, timeout)?;
    finish(result)
}

fn run_model_mode(
    args: &CliArgs,
    config: &GpfConfig,
    registry: &OperatorRegistry,
    path: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    // a bare file name is looked up in the configured models folder
    let resolved = match (&config.models_folder, path.exists()) {
        (Some(folder), false) => folder.join(path),
        _ => path.to_path_buf(),
    };
    let model = GpfModel::from_file(&resolved, registry, args.toolbox)?;
    info!(model = %model.name, nodes = model.nodes.len(), "loaded model");

    let mut inputs: HashMap<String, ParameterValue> = parse_bindings(&args.params)?
        .into_iter()
        .map(|(name, value)| (name, ParameterValue::Text(value)))
        .collect();
    if let Some(input) = &args.input {
        if let Some(first) = model.inputs().next() {
            inputs
                .entry(first.spec.name.clone())
                .or_insert_with(|| ParameterValue::Text(input.display().to_string()));
        }
    }

    let mut outputs: HashMap<String, String> = HashMap::new();
    for entry in &args.output {
        match entry.split_once('=') {
            Some((label, path)) => {
                outputs.insert(label.to_string(), path.to_string());
            }
            None => {
                // a bare path is unambiguous only with a single declared output
                let mut declared = model.outputs();
                match (declared.next(), declared.next()) {
                    (Some(only), None) => {
                        outputs.insert(only.label.clone(), entry.clone());
                    }
                    _ => return Err(AppError::InvalidParam { raw: entry.clone() }.into()),
                }
            }
        }
    }

    if args.print_graph {
        let graph = model.prepare_execution(&inputs, &outputs)?;
        println!("{}", xml::to_pretty_string(&graph).map_err(gpfgraph::Error::from)?);
        return Ok(());
    }

    let mut sink = ConsoleSink::new();
    let timeout = args.timeout.map(Duration::from_secs);
    let result = api::run_model(config, &model, &inputs, &outputs, &mut sink, timeout)?;
    finish(result)
}

fn finish(result: api::ExecutionResult) -> Result<(), Box<dyn std::error::Error>> {
    if result.success() {
        for (label, path) in &result.outputs {
            info!("{label}: {}", path.display());
        }
        return Ok(());
    }
    let mut reason = match result.report.exit_code {
        Some(code) if code != 0 => format!("gpt exited with status {code}"),
        _ => "gpt run did not complete".to_string(),
    };
    if !result.missing_outputs.is_empty() {
        reason = format!(
            "{reason}; {} expected output(s) missing",
            result.missing_outputs.len()
        );
    }
    Err(AppError::ExecutionFailed { reason }.into())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if args.log { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&args)?;
    let registry = OperatorRegistry::load_dir(&args.descriptions).map_err(AppError::Io)?;
    info!(operators = registry.len(), "loaded operator descriptions");

    match (&args.operator, &args.model) {
        (Some(operator), None) => run_operator_mode(&args, &config, &registry, operator),
        (None, Some(model)) => run_model_mode(&args, &config, &registry, model),
        _ => Err(AppError::MissingArgument {
            arg: "exactly one of --operator or --model".to_string(),
        }
        .into()),
    }
}
