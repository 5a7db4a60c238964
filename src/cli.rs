use anyhow::Result;
use clap::{Parser, Subcommand};
use file_search_core::query::default_questions;

use crate::load_config::load_settings;
use crate::steps::{self, StepOutcome};

/// CLI for file-search-demo: walk through the Gemini File Search API one step at a time.
#[derive(Parser, Debug)]
#[clap(
    name = "file-search-demo",
    version,
    about = "Create a Gemini File Search store, upload metadata-tagged documents and ask grounded questions"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Step 1: check that the environment is configured
    Setup,
    /// Step 2: build the API client and test the credential
    InitClient,
    /// Step 3: list stores and create the configured store if missing
    ManageStore,
    /// Step 4: upload every file in UPLOAD_PATH, replacing earlier versions
    Upload,
    /// Step 5: ask questions against the store (built-in questions when none are given)
    Query {
        /// Questions to ask, in order
        questions: Vec<String>,
    },
    /// Run steps 1 to 5 in order, stopping at the first failure
    RunAll {
        /// Question for the query step; repeat for several
        #[clap(long = "question")]
        questions: Vec<String>,
    },
}

fn questions_or_default(questions: Vec<String>) -> Vec<String> {
    if questions.is_empty() {
        default_questions()
    } else {
        questions
    }
}

/// Async CLI entrypoint shared by main() and the integration tests.
///
/// Configuration errors surface as `Err`; step failures are reported on
/// stdout and come back as [`StepOutcome::Failure`].
pub async fn run(cli: Cli) -> Result<StepOutcome> {
    let settings = load_settings()?;
    tracing::info!(command = ?cli.command, "Running command");

    let outcome = match cli.command {
        Commands::Setup => steps::setup(&settings),
        Commands::InitClient => steps::init_client(&settings).await,
        Commands::ManageStore => steps::manage_store(&settings).await,
        Commands::Upload => steps::upload(&settings).await,
        Commands::Query { questions } => {
            steps::query(&settings, &questions_or_default(questions)).await
        }
        Commands::RunAll { questions } => {
            steps::run_all(&settings, &questions_or_default(questions)).await
        }
    };
    Ok(outcome)
}
