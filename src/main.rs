// 🃏 Card Studio CLI - character card catalog authoring
//
// card-studio --config ./card-studio.toml <command>
//
// Commands:
// - init                   create the catalog (and a starter config if missing)
// - folder create <path>   register an output folder
// - portrait add <path>    register a portrait asset
// - import <csv>           create / update cards from a CSV sheet
// - validate               check cards against the authoring rules
// - export <csv>           write cards back as CSV
// - db <action>            manage named card databases
// - create                 create a single card

use anyhow::{bail, Context, Result};
use card_studio::{
    collect, create_card, export_csv_file, load_config, validate_cards, write_starter_config,
    AssetStore, CardDatabase, CardDraft, CardId, CardSources, Config, CreateOutcome, CsvImporter,
    ImportOutcome, SqliteStore,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "card-studio",
    about = "Card Studio - character card catalog authoring tool",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./card-studio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog database (idempotent). Writes a starter config
    /// when the config file does not exist yet.
    Init,

    /// Manage output folders.
    Folder {
        #[command(subcommand)]
        action: FolderAction,
    },

    /// Manage portrait assets.
    Portrait {
        #[command(subcommand)]
        action: PortraitAction,
    },

    /// Import cards from a CSV file.
    Import {
        /// CSV file with a header row
        csv: PathBuf,

        /// Output folder for new cards (defaults to import.output_folder)
        #[arg(long)]
        folder: Option<String>,

        /// Overwrite cards that already exist
        #[arg(long, conflicts_with = "no_update")]
        update_existing: bool,

        /// Leave existing cards untouched
        #[arg(long)]
        no_update: bool,
    },

    /// Validate cards from a folder, a database and/or explicit ids.
    Validate {
        #[arg(long)]
        folder: Option<String>,

        #[arg(long)]
        database: Option<String>,

        /// Explicit card id (repeatable)
        #[arg(long = "card")]
        cards: Vec<CardId>,
    },

    /// Export cards to a CSV file.
    Export {
        output: PathBuf,

        #[arg(long)]
        folder: Option<String>,

        #[arg(long)]
        database: Option<String>,
    },

    /// Manage card databases.
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Create a single card.
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        house: String,

        #[arg(long, default_value = "")]
        title: String,

        /// Output folder (defaults to import.output_folder)
        #[arg(long)]
        folder: Option<String>,

        /// Portrait file name or stem
        #[arg(long)]
        portrait: Option<String>,

        /// Asset name instead of "{name}_{house}"
        #[arg(long)]
        asset_name: Option<String>,
    },
}

#[derive(Subcommand)]
enum FolderAction {
    Create { path: String },
}

#[derive(Subcommand)]
enum PortraitAction {
    Add { path: String },
}

#[derive(Subcommand)]
enum DbAction {
    /// Create an empty database
    Create { name: String },
    /// Append a card
    Add { name: String, card: CardId },
    /// Append every card of a folder not already indexed
    AddFolder { name: String, folder: String },
    /// Remove a card reference
    Remove { name: String, card: CardId },
    /// Remove every reference
    Clear { name: String },
    /// Drop references to deleted cards
    Prune { name: String },
    /// List cards, optionally filtered by name or house
    List {
        name: String,
        #[arg(long)]
        filter: Option<String>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if matches!(cli.command, Commands::Init) && write_starter_config(&cli.config)? {
        println!("📝 Wrote starter config {}", cli.config.display());
    }
    let config = load_config(&cli.config)?;
    let mut store = open_store(&config.store.path)?;

    match cli.command {
        Commands::Init => {
            if let Some(folder) = &config.import.output_folder {
                store.create_folder(folder)?;
                println!("📁 Output folder ready: {}", folder);
            }
            println!("✅ Catalog ready at {}", config.store.path.display());
        }
        Commands::Folder { action: FolderAction::Create { path } } => {
            store.create_folder(&path)?;
            println!("📁 Folder created: {}", path);
        }
        Commands::Portrait { action: PortraitAction::Add { path } } => {
            let portrait = store.register_portrait(&path)?;
            println!("🖼️  Portrait registered: {}", portrait.path());
        }
        Commands::Import { csv, folder, update_existing, no_update } => {
            run_import(&mut store, &config, &csv, folder, update_existing, no_update)?;
        }
        Commands::Validate { folder, database, cards } => {
            run_validate(&store, &config, folder, database, &cards)?;
        }
        Commands::Export { output, folder, database } => {
            let database = load_named_database(&store, database.as_deref())?;
            let sources = sources_for(folder.as_deref(), database.as_ref(), &[]);
            let working_set = collect(&store, &sources)?;
            let rows = export_csv_file(&working_set, &output)?;
            println!("📤 Exported {} cards to {}", rows, output.display());
        }
        Commands::Db { action } => run_db(&mut store, action)?,
        Commands::Create { name, house, title, folder, portrait, asset_name } => {
            let folder = output_folder(&config, folder)?;
            let mut draft = CardDraft::new(name, house).with_title(title);
            draft.asset_name_override = asset_name;
            if let Some(text) = portrait {
                match store.resolve_portrait_by_name(&text)? {
                    Some(found) => draft = draft.with_portrait(found),
                    None => println!("⚠️  Portrait not found: {}", text),
                }
            }

            match create_card(&mut store, &folder, &draft)? {
                CreateOutcome::Created(card) => {
                    println!("🃏 Created {} ({})", card.asset_name, card.id);
                }
                CreateOutcome::InvalidFolder(folder) => {
                    bail!("Output folder is invalid: {}", folder);
                }
            }
        }
    }

    Ok(())
}

fn open_store(path: &Path) -> Result<SqliteStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    SqliteStore::open(path)
}

fn output_folder(config: &Config, flag: Option<String>) -> Result<String> {
    match flag.or_else(|| config.import.output_folder.clone()) {
        Some(folder) => Ok(folder),
        None => bail!("No output folder: pass --folder or set import.output_folder"),
    }
}

fn load_named_database(store: &SqliteStore, name: Option<&str>) -> Result<Option<CardDatabase>> {
    let Some(name) = name else {
        return Ok(None);
    };
    match store.load_database(name)? {
        Some(database) => Ok(Some(database)),
        None => bail!("Card database not found: {}", name),
    }
}

fn sources_for<'a>(
    folder: Option<&'a str>,
    database: Option<&'a CardDatabase>,
    explicit: &'a [CardId],
) -> CardSources<'a> {
    let mut sources = CardSources::new().with_explicit(explicit);
    if let Some(folder) = folder {
        sources = sources.with_folder(folder);
    }
    if let Some(database) = database {
        sources = sources.with_database(database);
    }
    sources
}

fn run_import(
    store: &mut SqliteStore,
    config: &Config,
    csv: &Path,
    folder: Option<String>,
    update_existing: bool,
    no_update: bool,
) -> Result<()> {
    let folder = output_folder(config, folder)?;
    let update = if no_update {
        false
    } else {
        update_existing || config.import.update_existing
    };

    let raw = std::fs::read_to_string(csv)
        .with_context(|| format!("Failed to read CSV file: {}", csv.display()))?;

    println!("📂 Importing {} → {}", csv.display(), folder);
    let outcome = CsvImporter::new(&folder)
        .with_update_existing(update)
        .import(store, &raw)?;

    match &outcome {
        ImportOutcome::Completed(summary) => {
            println!("✓ {}", outcome.message());
            if summary.skipped > 0 {
                println!("  Skipped (already exist): {}", summary.skipped);
            }
            info!(cards = store.verify_count()?, "catalog size");
        }
        ImportOutcome::NoDataRows => println!("⚠️  {}", outcome.message()),
        ImportOutcome::InvalidOutputFolder(_) => bail!(outcome.message()),
    }

    Ok(())
}

fn run_validate(
    store: &SqliteStore,
    config: &Config,
    folder: Option<String>,
    database: Option<String>,
    cards: &[CardId],
) -> Result<()> {
    // Config defaults apply only when no source flag was given
    let (folder, database) = if folder.is_none() && database.is_none() && cards.is_empty() {
        (config.validate.folder.clone(), config.validate.database.clone())
    } else {
        (folder, database)
    };

    let database = load_named_database(store, database.as_deref())?;
    let sources = sources_for(folder.as_deref(), database.as_ref(), cards);
    let working_set = collect(store, &sources)?;

    let report = validate_cards(&working_set);
    println!("🔍 Validation Report");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for line in report.lines() {
        println!("{}", line);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", report.summary());

    Ok(())
}

fn run_db(store: &mut SqliteStore, action: DbAction) -> Result<()> {
    match action {
        DbAction::Create { name } => {
            if store.load_database(&name)?.is_some() {
                bail!("Card database already exists: {}", name);
            }
            store.save_database(&CardDatabase::new(&name))?;
            println!("📚 Created card database {}", name);
        }
        DbAction::Add { name, card } => {
            let mut database = require_database(store, &name)?;
            if store.load_card(card)?.is_none() {
                bail!("Card not found: {}", card);
            }
            database.add(card);
            store.save_database(&database)?;
            println!("✓ {} entries", database.len());
        }
        DbAction::AddFolder { name, folder } => {
            let mut database = require_database(store, &name)?;
            let added = database.add_folder(&*store, &folder)?;
            store.save_database(&database)?;
            println!("✓ Added {} cards from {}", added, folder);
        }
        DbAction::Remove { name, card } => {
            let mut database = require_database(store, &name)?;
            if database.remove(card) {
                store.save_database(&database)?;
                println!("✓ Removed {}", card);
            } else {
                println!("⚠️  {} is not in {}", card, name);
            }
        }
        DbAction::Clear { name } => {
            let mut database = require_database(store, &name)?;
            database.clear();
            store.save_database(&database)?;
            println!("✓ Cleared {}", name);
        }
        DbAction::Prune { name } => {
            let mut database = require_database(store, &name)?;
            let pruned = database.prune_stale(&*store)?;
            store.save_database(&database)?;
            println!("✓ Pruned {} stale entries", pruned);
        }
        DbAction::List { name, filter } => {
            let database = require_database(store, &name)?;
            let cards = database.filter(&*store, filter.as_deref().unwrap_or(""))?;
            println!("📚 {} ({} entries)", database.name, database.len());
            for card in cards {
                println!("  {} | {} | {} | {}", card.id, card.asset_name, card.name, card.house);
            }
        }
    }

    Ok(())
}

fn require_database(store: &SqliteStore, name: &str) -> Result<CardDatabase> {
    store
        .load_database(name)?
        .with_context(|| format!("Card database not found: {}", name))
}
