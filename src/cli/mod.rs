//! Command line layer: argument parsing (`args`), error types (`errors`)
//! and orchestration (`runner`). The CLI builds a graph for one operator or
//! a saved model, optionally prints it, and otherwise hands it to `gpt`.
//!
//! If you are embedding this crate into another application, prefer the
//! library API in `gpfgraph::api` over calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
