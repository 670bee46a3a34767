//! Layered configuration: a TOML file plus `LATCHKEY__SECTION__KEY` environment overrides.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
