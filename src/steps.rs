//! The five demo steps and the run-all orchestrator.
//!
//! Each step prints a human-readable report to stdout and returns a
//! [`StepOutcome`]; diagnostics go through `tracing` to stderr. The `*_with`
//! variants take any [`FileSearchApi`] so they can run against test doubles.

use std::path::Path;
use std::process::ExitCode;

use file_search_core::config::Settings;
use file_search_core::contract::{FileSearchApi, Store};
use file_search_core::query::{run_queries, QueryProgress};
use file_search_core::store::{get_store, list_all_stores, resolve_or_create_store};
use file_search_core::upload::{discover_files, upload_files, UploadProgress};
use file_search_core::{Error, Result};
use tracing::{error, info};

use crate::gemini::GeminiClient;

const RULE_WIDTH: usize = 80;
const BIN: &str = "file-search-demo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure,
}

impl StepOutcome {
    pub fn is_success(self) -> bool {
        self == StepOutcome::Success
    }
}

impl From<StepOutcome> for ExitCode {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Success => ExitCode::SUCCESS,
            StepOutcome::Failure => ExitCode::FAILURE,
        }
    }
}

fn rule(c: char) -> String {
    c.to_string().repeat(RULE_WIDTH)
}

fn banner(title: &str) {
    println!("{}", rule('='));
    println!("{title}");
    println!("{}", rule('='));
    println!();
}

/// Print `err` followed by its chain of sources.
fn print_error(context: &str, err: &dyn std::error::Error) {
    println!("❌ {context}: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        println!("   caused by: {cause}");
        source = cause.source();
    }
}

pub fn print_store_info(store: &Store) {
    println!("  Name: {}", store.name);
    println!(
        "  Display Name: {}",
        store.display_name.as_deref().unwrap_or("(none)")
    );
    if let Some(created) = &store.create_time {
        println!("  Created: {created}");
    }
}

fn store_missing(settings: &Settings) -> StepOutcome {
    let err = Error::StoreNotFound(settings.store_name.clone());
    error!(error = %err, "Step needs an existing store");
    println!("❌ Store '{}' not found.", settings.store_name);
    println!("   Please run '{BIN} manage-store' first.");
    StepOutcome::Failure
}

/// Step 1: report the configuration and check the API key is present.
pub fn setup(settings: &Settings) -> StepOutcome {
    banner("STEP 1: Setup and Environment Check");
    println!("{}", settings.status_report());
    println!();

    if settings.api_key.is_none() {
        error!("GEMINI_API_KEY is not set");
        println!("❌ ERROR: GEMINI_API_KEY is not set!");
        println!("   Please create a .env file with your Gemini API key.");
        println!("   Example: export GEMINI_API_KEY='your-api-key-here'");
        return StepOutcome::Failure;
    }

    println!("✓ All required environment variables are set");
    println!();
    println!("Next step: Run '{BIN} init-client'");
    StepOutcome::Success
}

/// The API client for `settings`, or a configuration error before any network call.
pub fn get_client(settings: &Settings) -> Result<GeminiClient> {
    GeminiClient::from_settings(settings)
}

/// Step 2: build the client and prove the credential works by listing stores.
pub async fn init_client(settings: &Settings) -> StepOutcome {
    banner("STEP 2: Initialize Gemini Client");

    println!("Initializing Gemini client...");
    let client = match get_client(settings) {
        Ok(client) => client,
        Err(e) => {
            print_error("Configuration Error", &e);
            println!();
            println!("Please run '{BIN} setup' first to check your configuration.");
            return StepOutcome::Failure;
        }
    };
    println!("✓ Client initialized: GeminiClient ({})", client.base_url());
    println!();

    init_client_with(&client).await
}

pub async fn init_client_with<A>(api: &A) -> StepOutcome
where
    A: FileSearchApi + ?Sized,
{
    println!("Testing client connection...");
    match list_all_stores(api).await {
        Ok(stores) => {
            println!(
                "✓ Client connection successful (found {} existing store(s))",
                stores.len()
            );
            println!();
            println!("Next step: Run '{BIN} manage-store'");
            StepOutcome::Success
        }
        Err(e) => {
            print_error("Error initializing client", &e);
            println!();
            println!("Please check:");
            println!("  1. Your GEMINI_API_KEY is valid");
            println!("  2. You have internet connectivity");
            println!("  3. GEMINI_API_BASE_URL (if set) points at the Gemini API");
            StepOutcome::Failure
        }
    }
}

/// Step 3: list every store, then find or create the configured one.
pub async fn manage_store(settings: &Settings) -> StepOutcome {
    banner("STEP 3: Manage File Search Store");
    match get_client(settings) {
        Ok(client) => manage_store_with(&client, settings).await,
        Err(e) => {
            print_error("Error", &e);
            StepOutcome::Failure
        }
    }
}

pub async fn manage_store_with<A>(api: &A, settings: &Settings) -> StepOutcome
where
    A: FileSearchApi + ?Sized,
{
    println!("Listing all file search stores:");
    println!("{}", rule('-'));
    match list_all_stores(api).await {
        Ok(stores) if stores.is_empty() => println!("No stores found."),
        Ok(stores) => {
            for (i, store) in stores.iter().enumerate() {
                println!();
                println!("Store {}:", i + 1);
                print_store_info(store);
            }
        }
        Err(e) => {
            print_error("Error listing stores", &e);
            return StepOutcome::Failure;
        }
    }
    println!();

    println!("Checking for store: '{}'", settings.store_name);
    println!("{}", rule('-'));
    match resolve_or_create_store(api, &settings.store_name).await {
        Ok(resolved) if resolved.created => {
            println!("Store '{}' did not exist.", settings.store_name);
            println!("✓ Successfully created store:");
            print_store_info(&resolved.store);
        }
        Ok(resolved) => {
            println!("✓ Store '{}' already exists", settings.store_name);
            print_store_info(&resolved.store);
        }
        Err(e) => {
            print_error("Error creating store", &e);
            return StepOutcome::Failure;
        }
    }

    println!();
    println!("Next step: Run '{BIN} upload'");
    StepOutcome::Success
}

/// Step 4: upload every file in the upload directory into the existing store.
pub async fn upload(settings: &Settings) -> StepOutcome {
    banner("STEP 4: Upload Files to File Search Store");
    match get_client(settings) {
        Ok(client) => upload_with(&client, settings).await,
        Err(e) => {
            print_error("Error", &e);
            StepOutcome::Failure
        }
    }
}

pub async fn upload_with<A>(api: &A, settings: &Settings) -> StepOutcome
where
    A: FileSearchApi + ?Sized,
{
    let store = match get_store(api, &settings.store_name).await {
        Ok(Some(store)) => store,
        Ok(None) => return store_missing(settings),
        Err(e) => {
            print_error("Error", &e);
            return StepOutcome::Failure;
        }
    };

    let upload_path = settings.upload_path.display();
    println!(
        "Uploading files to store: {}",
        store.display_name.as_deref().unwrap_or(&store.name)
    );
    println!("Upload path: {upload_path}");
    println!();

    let files = match discover_files(&settings.upload_path) {
        Ok(files) => files,
        Err(e) => {
            print_error("Error reading upload directory", &e);
            return StepOutcome::Failure;
        }
    };
    if files.is_empty() {
        println!("❌ No files found in {upload_path}");
        println!("   Please ensure files exist in the '{upload_path}' directory");
        return StepOutcome::Failure;
    }
    println!("Found {} file(s) to upload:", files.len());
    for f in &files {
        println!("  - {}", f.display());
    }
    println!();

    let result = upload_files(api, settings, &store, &files, print_upload_progress).await;

    match result {
        Ok(report) => {
            info!(store = %report.store.name, uploaded = report.documents.len(), "Upload step complete");
            println!("{}", rule('='));
            println!("✓ Upload complete!");
            println!();
            println!("Next step: Run '{BIN} query'");
            StepOutcome::Success
        }
        Err(e) => {
            print_error("Error uploading files", &e);
            StepOutcome::Failure
        }
    }
}

fn print_upload_progress(progress: UploadProgress<'_>) {
    match progress {
        UploadProgress::Starting { path, .. } => print_processing(path),
        UploadProgress::DuplicateDeleted { document, .. } => {
            println!(
                "♻️  Deleted duplicate: '{}' (ID: {})",
                document.display_name.as_deref().unwrap_or(""),
                document.name
            );
        }
        UploadProgress::ExtractingMetadata { file_name } => {
            println!("Extracting metadata from {file_name}...");
        }
        UploadProgress::MetadataExtracted { metadata, .. } => {
            println!("  Title: {}", metadata.title);
            println!("  Author: {}", metadata.author);
            println!("  Abstract: {}", metadata.abstract_text);
        }
        UploadProgress::Importing { file_name } => {
            println!("Importing {file_name} into the store...");
        }
        UploadProgress::Uploaded(doc) => {
            println!("✓ {} successfully uploaded and indexed", doc.file_name);
            println!();
        }
    }
}

fn print_processing(path: &Path) {
    println!("{}", rule('-'));
    println!("Processing: {}", path.display());
    println!("{}", rule('-'));
}

/// Step 5: ask each question against the existing store.
pub async fn query(settings: &Settings, questions: &[String]) -> StepOutcome {
    banner("STEP 5: Query File Search Store");
    match get_client(settings) {
        Ok(client) => query_with(&client, settings, questions).await,
        Err(e) => {
            print_error("Error", &e);
            StepOutcome::Failure
        }
    }
}

pub async fn query_with<A>(api: &A, settings: &Settings, questions: &[String]) -> StepOutcome
where
    A: FileSearchApi + ?Sized,
{
    let store = match get_store(api, &settings.store_name).await {
        Ok(Some(store)) => store,
        Ok(None) => return store_missing(settings),
        Err(e) => {
            print_error("Error", &e);
            return StepOutcome::Failure;
        }
    };

    println!(
        "Querying store: {}",
        store.display_name.as_deref().unwrap_or(&store.name)
    );
    println!("Store ID: {}", store.name);
    println!();

    let result = run_queries(api, &settings.model, &store, questions, |progress| match progress {
        QueryProgress::Asking {
            index,
            total,
            question,
        } => {
            println!();
            println!("{}", rule('='));
            println!("Query {}/{}", index + 1, total);
            println!("{}", rule('='));
            println!();
            println!("Question: {question}");
            println!("{}", rule('-'));
        }
        QueryProgress::Answered(outcome) => {
            println!();
            println!("Response:");
            println!("{}", outcome.answer.text);
            println!();
            let chunks = outcome.answer.chunk_count();
            if chunks > 0 {
                println!("Found {chunks} relevant chunk(s) in the store");
                println!();
            }
        }
    })
    .await;

    match result {
        Ok(_) => {
            println!("{}", rule('='));
            println!("✓ All queries completed successfully!");
            println!();
            println!("Demo complete! The File Search Store is working correctly.");
            StepOutcome::Success
        }
        Err(e) => {
            print_error("Query failed", &e);
            StepOutcome::Failure
        }
    }
}

/// The steps `run-all` chains, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Setup,
    InitClient,
    ManageStore,
    Upload,
    Query,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Setup,
        Step::InitClient,
        Step::ManageStore,
        Step::Upload,
        Step::Query,
    ];

    /// Subcommand name of the step.
    pub fn name(self) -> &'static str {
        match self {
            Step::Setup => "setup",
            Step::InitClient => "init-client",
            Step::ManageStore => "manage-store",
            Step::Upload => "upload",
            Step::Query => "query",
        }
    }

    pub async fn run(self, settings: &Settings, questions: &[String]) -> StepOutcome {
        match self {
            Step::Setup => setup(settings),
            Step::InitClient => init_client(settings).await,
            Step::ManageStore => manage_store(settings).await,
            Step::Upload => upload(settings).await,
            Step::Query => query(settings, questions).await,
        }
    }
}

/// Run steps 1 to 5 in order, stopping at the first failure.
pub async fn run_all(settings: &Settings, questions: &[String]) -> StepOutcome {
    banner("Running All Demo Steps");

    for step in Step::ALL {
        let name = step.name();
        println!();
        println!("{}", rule('='));
        println!("Running: {name}");
        println!("{}", rule('='));
        println!();

        let outcome = step.run(settings, questions).await;
        info!(step = name, ?outcome, "Step finished");

        if !outcome.is_success() {
            error!(step = name, "Run-all stopped at failing step");
            println!();
            println!("❌ Failed at step: {name}");
            println!("Please check the error messages above.");
            return outcome;
        }
    }

    println!();
    println!("{}", rule('='));
    println!("✓ All steps completed successfully!");
    println!("{}", rule('='));
    StepOutcome::Success
}
