// Operator CLI. The HTTP server lives in ../api.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use docqa::{Config, RagPipeline};

#[derive(Parser)]
#[command(name = "docqa", about = "Ask questions about a folder of PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the index over the data directory (reuses a persisted one when current)
    Index,
    /// Answer a single question
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pipeline = RagPipeline::from_config(&config);

    let Some(engine) = pipeline.initialize().await? else {
        bail!(
            "No PDF files found in {}. Add documents and try again.",
            pipeline.data_dir().display()
        );
    };

    match cli.command {
        Command::Index => {
            println!(
                "Indexed {} chunks from {} documents into {}",
                engine.index().len(),
                engine.index().docstore().documents().len(),
                pipeline.storage().dir().display()
            );
        }
        Command::Ask { question } => {
            let answer = engine.query(&question.join(" ")).await?;
            println!("{}", answer);
        }
    }

    Ok(())
}
