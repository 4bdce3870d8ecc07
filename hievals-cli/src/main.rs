use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod interactive;

#[derive(Parser)]
#[command(name = "hievals", about = "Run coding agent evaluations")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run evals: select prompts and a model, then execute
    Run(commands::run::RunArgs),
    /// Resume or re-run previous evals from the evals/ folder
    Resume(commands::resume::ResumeArgs),
    /// Browse, check and save models
    Models(commands::models::ModelsArgs),
    /// List all prompts in prompts.json
    List,
    /// Add a new prompt
    Add,
    /// Edit an existing prompt
    Edit,
    /// Remove a prompt
    Remove,
    /// Stop stale agent daemons left listening in our port range
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Resume(args) => commands::resume::run(args).await,
        Commands::Models(args) => commands::models::run(args).await,
        Commands::List => commands::prompts::list(),
        Commands::Add => commands::prompts::add(),
        Commands::Edit => commands::prompts::edit(),
        Commands::Remove => commands::prompts::remove(),
        Commands::Cleanup => commands::cleanup::run().await,
    }
}
