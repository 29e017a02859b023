//! Command-line front end for translation notes.
//!
//! # Responsibility
//! - Drive one translation session per invocation against a SQLite file.
//! - Print the resulting list, or the notice raised by the operation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use transnote_core::{
    default_log_level, init_logging, Intent, SessionInteractors, SessionState,
    SqlitePreferenceStore, StoreTranslationRepository, TranslationEntry, TranslationSession,
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "transnote", version, about = "Manage translation notes")]
struct Cli {
    /// SQLite file holding the translation list.
    #[arg(long, env = "TRANSNOTE_DB_PATH", default_value = "transnote.sqlite3")]
    db: PathBuf,
    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, env = "TRANSNOTE_LOG_DIR")]
    log_dir: Option<String>,
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current list.
    List,
    /// Append an empty group.
    AddGroup { title: String },
    /// Append a translation pair.
    AddTranslation { from: String, to: String },
    /// Remove the entry at a zero-based position.
    DeleteGroup { position: usize },
    /// Remove a translation at a zero-based position.
    DeleteTranslation { position: usize },
}

impl Command {
    fn into_intent(self) -> Option<Intent> {
        match self {
            Command::List => None,
            Command::AddGroup { title } => Some(Intent::NewGroup(title)),
            Command::AddTranslation { from, to } => Some(Intent::NewTranslation { from, to }),
            Command::DeleteGroup { position } => Some(Intent::DeleteGroupAtPosition(position)),
            Command::DeleteTranslation { position } => {
                Some(Intent::DeleteTranslationAtPosition(position))
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(state) => {
            print_state(&state);
            if state.notice.is_some() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<SessionState, String> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let store = SqlitePreferenceStore::open(&cli.db).map_err(|err| err.to_string())?;
    let repository = Arc::new(StoreTranslationRepository::new(Arc::new(store)));
    let session = TranslationSession::start(SessionInteractors::from_repository(repository), None);
    settle(&session, 0).await?;

    if let Some(intent) = cli.command.into_intent() {
        let revision = session.snapshot().revision;
        session.dispatch(intent).await;
        settle(&session, revision).await?;
    }

    let state = session.snapshot();
    session.shutdown();
    Ok(state)
}

async fn settle(session: &TranslationSession, revision: u64) -> Result<(), String> {
    let mut rx = session.watch();
    let answered = rx.wait_for(|state| state.revision > revision);
    let result = match tokio::time::timeout(SETTLE_TIMEOUT, answered).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err("session closed before answering".to_string()),
        Err(_) => Err(format!("no answer within {}s", SETTLE_TIMEOUT.as_secs())),
    };
    result
}

fn print_state(state: &SessionState) {
    if state.translations.is_empty() {
        println!("(empty)");
    }
    for (position, entry) in state.translations.iter().enumerate() {
        match entry {
            TranslationEntry::Group(group) => println!(
                "{position:>3}  [group] {} ({} pairs)",
                group.title,
                group.translations.len()
            ),
            TranslationEntry::Pair(pair) => {
                println!("{position:>3}  {} -> {}", pair.from, pair.to)
            }
        }
    }
    if let Some(notice) = &state.notice {
        eprintln!("notice: {} failed: {}", notice.operation, notice.message);
    }
}
