use clap::Parser;
use std::path::PathBuf;

use gpfgraph::Toolbox;

#[derive(Parser)]
#[command(name = "gpfgraph", version, about = "GPF graph builder and gpt runner")]
pub struct CliArgs {
    /// Operator to run (single-operator mode)
    #[arg(short = 'O', long)]
    pub operator: Option<String>,

    /// Saved model file to run (model mode)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Directory of operator description files
    #[arg(short, long)]
    pub descriptions: PathBuf,

    /// Toolbox generation (beam or snap)
    #[arg(long, value_enum, default_value_t = Toolbox::Snap)]
    pub toolbox: Toolbox,

    /// Parameter or model input value, repeatable
    #[arg(short, long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Source product for the first open raster slot
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output destination: a bare path in operator mode, LABEL=PATH in
    /// model mode (repeatable)
    #[arg(short, long, value_name = "[LABEL=]PATH")]
    pub output: Vec<String>,

    /// Print the assembled graph XML instead of executing it
    #[arg(long, default_value_t = false)]
    pub print_graph: bool,

    /// Configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Toolbox install folder, overriding the configuration
    #[arg(long)]
    pub gpt_dir: Option<PathBuf>,

    /// Worker threads passed to gpt via -q
    #[arg(long)]
    pub threads: Option<u32>,

    /// Abort the run after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(long, default_value_t = false)]
    pub log: bool,
}
