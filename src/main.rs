use anyhow::Result;
use clap::Parser;
use vischat::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    vischat::run(args).await
}
