//! gpfgraph CLI entrypoint.
//!
//! Thin wrapper over the `cli` module: parse arguments, build or run the
//! requested graph, and exit with an appropriate status. For programmatic
//! use, prefer the library API (`gpfgraph::api`).

use clap::Parser;

mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
