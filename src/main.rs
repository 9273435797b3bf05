mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use darkroom::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    darkroom::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = match args.config.clone() {
                Some(path) => Config::load_from_path(path)?,
                None => Config::load()?,
            };
            darkroom::api::run(config, args.address).await?
        }
    }

    Ok(())
}
