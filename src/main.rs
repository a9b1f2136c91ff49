use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use authorchat::backend::HttpBackend;
use authorchat::cli::{ask, list, session, show, upload};
use authorchat::config::Config;
use authorchat::selection::SelectionSlot;
use authorchat::{App, Error, Store, Workspace};

#[derive(Parser)]
#[command(name = "authorchat")]
#[command(about = "Chat with your documents, one session at a time")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "authorchat.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new chat session and select it
    New,

    /// List sessions, newest first
    List,

    /// Show a session's files and chat history
    Show {
        /// Session ID, ID prefix or "Chat N" label (defaults to the selected session)
        session: Option<String>,
    },

    /// Select a session
    Switch {
        /// Session ID, ID prefix or "Chat N" label
        session: String,
    },

    /// Ask a question in the selected session
    Ask {
        /// Question text
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Upload documents to the selected session
    Upload {
        /// Files to upload
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Delete a session with all its chats and files
    Delete {
        /// Session ID, ID prefix or "Chat N" label
        session: String,
    },
}

fn open_store(config: &Config) -> Result<Store> {
    match Store::open(&config.database_path()) {
        Ok(store) => Ok(store),
        Err(Error::StorageUnavailable(reason)) => {
            warn!(%reason, "persistent storage unavailable, using in-memory store");
            eprintln!("⚠ Storage unavailable ({}). Nothing will be saved.", reason);
            Ok(Store::open_in_memory()?)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("authorchat=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load config
    let config = Config::load_or_default(&cli.config);

    // Initialize store and session workspace
    let store = open_store(&config)?;
    let workspace = Workspace::new(store)?.with_policy(config.writes.non_critical);

    let backend = HttpBackend::new(&config.backend.base_url, config.backend_timeout())?;
    let selection = SelectionSlot::new(config.selection_path());
    let mut app = App::start(workspace, backend, selection)?;

    match cli.command {
        Commands::New => {
            session::new(&mut app).await?;
        }
        Commands::List => {
            list::run(&app)?;
        }
        Commands::Show { session } => {
            show::run(&app, session)?;
        }
        Commands::Switch { session } => {
            session::switch(&mut app, session)?;
        }
        Commands::Ask { question } => {
            ask::run(&mut app, question.join(" ")).await?;
        }
        Commands::Upload { files } => {
            upload::run(&mut app, files).await?;
        }
        Commands::Delete { session } => {
            session::delete(&mut app, session)?;
        }
    }

    app.close()?;
    Ok(())
}
