use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fincore::core::{LedgerStore, MemoryStore, PolicySettings, portfolio_summary};
use fincore::discipline::{DisciplineEngine, Instruction, InstructionError};
use fincore::import::categories::DEFAULT_SIMILARITY_THRESHOLD;
use fincore::import::{CategoryMapper, CommitOverrides, DedupConfig, read_raw_rows};

#[derive(Deserialize)]
struct ImportConfig {
    /// Raw label -> canonical category.
    #[serde(default)]
    aliases: HashMap<String, String>,
    /// Canonical taxonomy entries without an alias of their own.
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default = "default_similarity")]
    similarity_threshold: f64,
    #[serde(default)]
    dedup: DedupConfig,
}

fn default_similarity() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            aliases: HashMap::new(),
            categories: Vec::new(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            dedup: DedupConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct Config {
    #[serde(default = "default_ledger_path")]
    ledger_path: PathBuf,
    policy: PolicySettings,
    #[serde(default)]
    import: ImportConfig,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("ledger.json")
}

/// On-disk ledger snapshot: store state plus the instruction log.
#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    store: MemoryStore,
    instructions: Vec<Instruction>,
}

#[derive(Parser)]
#[command(name = "fincore", about = "Staged investment discipline over a personal ledger")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "fincore.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the discipline status view
    Status,
    /// List accounts and the portfolio summary
    Accounts,
    /// Generate the instructions due on a date
    Generate {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Reconcile a statement file against an account
    Import {
        #[arg(long)]
        file: PathBuf,
        /// Account name or id
        #[arg(long)]
        account: String,
        /// Commit rows with status ready after previewing
        #[arg(long)]
        commit_ready: bool,
    },
    /// Mark an instruction as executed
    MarkExecuted {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config: Config = toml::from_str(&fs::read_to_string(&cli.config)?)?;
    let snapshot: Snapshot = match fs::read_to_string(&config.ledger_path) {
        Ok(contents) => serde_json::from_str(&contents)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
        Err(e) => return Err(e.into()),
    };
    let engine = DisciplineEngine::with_log(
        snapshot.store,
        config.policy.clone(),
        snapshot.instructions,
    )?;
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Status => {
            let status = engine.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Accounts => {
            let (accounts, holdings) = engine.with_store(|s| (s.accounts(), s.holdings()));
            for account in &accounts {
                println!(
                    "{} | {} | {:?} | {} {}",
                    account.id, account.name, account.kind, account.balance, account.currency
                );
            }
            let summary = portfolio_summary(&holdings);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Generate { as_of } => {
            let fresh = engine.run_generation(as_of.unwrap_or(today));
            if fresh.is_empty() {
                println!("nothing due");
            }
            for instruction in &fresh {
                println!("{} | {}", instruction.id, instruction.text);
            }
            save(&config.ledger_path, engine)?;
        }
        Commands::Import {
            file,
            account,
            commit_ready,
        } => {
            let account_id = resolve_account(&engine, &account)?;
            let mapper = CategoryMapper::new(
                config.import.aliases.clone(),
                config.import.categories.clone(),
                config.import.similarity_threshold,
            );
            let rows = read_raw_rows(&file)?;
            let batch = engine.reconcile(&rows, account_id, &mapper, &config.import.dedup);
            println!("{}", serde_json::to_string_pretty(&batch)?);
            if commit_ready {
                let committed =
                    engine.commit_import(&batch, account_id, &CommitOverrides::default())?;
                println!("committed {} transactions", committed.len());
                save(&config.ledger_path, engine)?;
            }
        }
        Commands::MarkExecuted { id, date } => {
            match engine.mark_executed(id, date.unwrap_or(today)) {
                Ok(()) => println!("marked {id} executed"),
                // Both are recoverable; report and leave the log untouched.
                Err(InstructionError::AlreadyExecuted) => {
                    println!("{id} was already executed; nothing changed")
                }
                Err(InstructionError::NotFound) => println!("no instruction {id}"),
            }
            save(&config.ledger_path, engine)?;
        }
    }

    Ok(())
}

fn resolve_account(
    engine: &DisciplineEngine<MemoryStore>,
    needle: &str,
) -> Result<Uuid, Box<dyn std::error::Error>> {
    if let Ok(id) = Uuid::parse_str(needle) {
        return Ok(id);
    }
    let accounts = engine.with_store(|s| s.accounts());
    accounts
        .iter()
        .find(|a| a.name == needle)
        .map(|a| a.id)
        .ok_or_else(|| format!("no account named {needle}").into())
}

fn save(
    path: &PathBuf,
    engine: DisciplineEngine<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (store, instructions) = engine.into_parts();
    let snapshot = Snapshot {
        store,
        instructions,
    };
    fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
    Ok(())
}
