// Card Studio - Core Library
// Exposes all modules for use in the CLI and tests

pub mod entities;    // Card, CardId, CardDraft, CardDatabase
pub mod parser;      // CSV tokenizer + column mapper
pub mod list_field;  // ";"-separated list cells
pub mod store;       // AssetStore capability + MemoryStore
pub mod db;          // SqliteStore + audit events
pub mod catalog;     // Working-set aggregation + card authoring
pub mod validation;  // Authoring rules
pub mod import;      // CSV → cards
pub mod export;      // cards → CSV
pub mod config;      // card-studio.toml

// Re-export commonly used types
pub use entities::{
    make_safe_name, Card, CardDatabase, CardDraft, CardId, NaturalKey, PortraitRef,
};
pub use parser::{split_lines, tokenize_line, HeaderMap};
pub use store::{AssetStore, MemoryStore};
pub use db::{
    CardEvent, CardEventKind, SqliteStore,
    setup_database, record_card_event, card_history,
};
pub use catalog::{
    apply_to_existing, collect, create_card, find_by_key,
    CardSources, CreateOutcome, WorkingSet,
};
pub use validation::{
    validate, validate_cards, IssueKind, ValidationIssue, ValidationReport, CLEAN_REPORT,
};
pub use import::{import_csv, CsvImporter, ImportOutcome, ImportSummary, COLUMNS};
pub use export::{export_csv, export_csv_file};
pub use config::{load_config, write_starter_config, Config};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
