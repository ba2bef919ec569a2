mod cli;
mod config;
mod errors;
mod extract;
mod fetch;
mod frame;
mod grid;
mod parquet;
mod pipeline;
mod request;
mod retry;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};
use env_logger::Env;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(Env::new().filter_or("CROPETL_LOG", "info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { config } => match command::run(config).await {
            Ok(files) => {
                for file in files {
                    println!("File saved to `{}`", file);
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        },
        Commands::Inspect { file, rows } => match command::inspect(file, *rows) {
            Ok(table) => println!("{}", table),
            Err(e) => eprintln!("Error: {}", e),
        },
    }

    Ok(())
}
