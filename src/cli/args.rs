use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "vischat")]
#[command(
    about = "Terminal chat assistant that turns questions about tabular data into plots",
    long_about = "Terminal chat assistant that turns questions about tabular data into plots\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default probe path when --config is not provided:\n    1. $XDG_CONFIG_HOME/vischat/config.toml\n    2. ~/.config/vischat/config.toml\n\nStart a message with Show, Describe or Explore to pick a request path."
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Preload a CSV file as a dataset (repeatable). The last one is active.
    #[arg(long = "dataset", value_name = "PATH")]
    pub datasets: Vec<PathBuf>,

    /// Directory for rendered PNG files.
    #[arg(long, value_name = "DIR")]
    pub plot_dir: Option<PathBuf>,

    /// Log provider HTTP traffic to stderr with secrets redacted.
    #[arg(long)]
    pub verbose: bool,

    /// Check the embedded Python plotting stack and exit.
    #[arg(long)]
    pub smoke_python: bool,
}
