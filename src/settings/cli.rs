use super::Parser;

#[derive(Parser, Debug)]
pub struct Cli {
    /// Path to a settings file; defaults to `settings/dev.toml` in debug builds.
    #[arg(long)]
    pub settings: Option<String>,
    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}
