use crate::entities::{unique_asset_name, Card, CardDatabase, CardId, PortraitRef};
use crate::store::{folder_ancestry, normalize_folder, AssetStore};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

// ============================================================================
// CARD HISTORY
// ============================================================================

/// What happened to a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardEventKind {
    Created,
    Updated,
    Deleted,
}

impl CardEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardEventKind::Created => "card_created",
            CardEventKind::Updated => "card_updated",
            CardEventKind::Deleted => "card_deleted",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "card_created" => Some(CardEventKind::Created),
            "card_updated" => Some(CardEventKind::Updated),
            "card_deleted" => Some(CardEventKind::Deleted),
            _ => None,
        }
    }
}

/// One row of a card's history.
///
/// `snapshot` holds where the card lived and what it was keyed by at that
/// version: `{asset_name, folder, name, house}`. Deletions carry `{}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardEvent {
    pub event_id: uuid::Uuid,
    pub recorded_at: DateTime<Utc>,
    pub kind: CardEventKind,
    pub card_id: CardId,
    /// Card version after the change (0 for deletions)
    pub version: i64,
    pub snapshot: serde_json::Value,
    pub actor: String,
}

impl CardEvent {
    fn for_card(kind: CardEventKind, card: &Card) -> Self {
        CardEvent {
            event_id: uuid::Uuid::new_v4(),
            recorded_at: Utc::now(),
            kind,
            card_id: card.id,
            version: card.version,
            snapshot: serde_json::json!({
                "asset_name": card.asset_name,
                "folder": card.folder,
                "name": card.name,
                "house": card.house,
            }),
            actor: ACTOR.to_string(),
        }
    }

    fn deleted(card_id: CardId) -> Self {
        CardEvent {
            event_id: uuid::Uuid::new_v4(),
            recorded_at: Utc::now(),
            kind: CardEventKind::Deleted,
            card_id,
            version: 0,
            snapshot: serde_json::json!({}),
            actor: ACTOR.to_string(),
        }
    }
}

const ACTOR: &str = "card_studio";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Folders (cards can only be created inside a known folder)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS folders (
            path TEXT PRIMARY KEY
        )",
        [],
    )?;

    // ==========================================================================
    // Cards Table (list columns stored as JSON arrays)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_uuid TEXT UNIQUE NOT NULL,
            asset_name TEXT NOT NULL,
            folder TEXT NOT NULL,
            name TEXT NOT NULL,
            title TEXT NOT NULL,
            house TEXT NOT NULL,
            loyalty TEXT NOT NULL,
            age INTEGER NOT NULL,
            health INTEGER NOT NULL,
            xp INTEGER NOT NULL,
            influence_rate INTEGER NOT NULL,
            special_ability TEXT NOT NULL,
            oath_slots TEXT NOT NULL,
            status TEXT NOT NULL,
            portrait TEXT,
            content_hash TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL,
            UNIQUE (folder, asset_name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS portraits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Card databases (named, ordered indexes of card references)
    // Entries are NOT foreign keys: a deleted card leaves a stale entry.
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS card_databases (
            name TEXT PRIMARY KEY
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS card_database_entries (
            database_name TEXT NOT NULL,
            position INTEGER NOT NULL,
            card_uuid TEXT NOT NULL,
            PRIMARY KEY (database_name, position)
        )",
        [],
    )?;

    // ==========================================================================
    // Card history (one row per persisted change)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            recorded_at TEXT NOT NULL,
            kind TEXT NOT NULL,
            card_uuid TEXT NOT NULL,
            version INTEGER NOT NULL,
            snapshot TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cards_folder ON cards(folder)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_card ON events(card_uuid)",
        [],
    )?;

    Ok(())
}

/// Append a card change to the history table
pub fn record_card_event(conn: &Connection, event: &CardEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO events (
            event_id, recorded_at, kind, card_uuid, version, snapshot, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id.to_string(),
            event.recorded_at.to_rfc3339(),
            event.kind.as_str(),
            event.card_id.to_string(),
            event.version,
            serde_json::to_string(&event.snapshot)?,
            event.actor,
        ],
    )
    .with_context(|| format!("Failed to record {} for card {}", event.kind.as_str(), event.card_id))?;

    Ok(())
}

/// History of one card, newest first
pub fn card_history(conn: &Connection, card_id: CardId) -> Result<Vec<CardEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, recorded_at, kind, card_uuid, version, snapshot, actor
         FROM events
         WHERE card_uuid = ?1
         ORDER BY id DESC",
    )?;

    let history = stmt
        .query_map([card_id.to_string()], |row| {
            let event_id: String = row.get(0)?;
            let recorded_at: String = row.get(1)?;
            let kind: String = row.get(2)?;
            let card_uuid: String = row.get(3)?;
            let snapshot: String = row.get(5)?;

            Ok(CardEvent {
                event_id: event_id.parse().map_err(|e| conversion_error(0, e))?,
                recorded_at: parse_timestamp(1, &recorded_at)?,
                kind: CardEventKind::parse(&kind).ok_or_else(|| {
                    rusqlite::Error::InvalidColumnType(2, kind.clone(), Type::Text)
                })?,
                card_id: card_uuid.parse().map_err(|e| conversion_error(3, e))?,
                version: row.get(4)?,
                snapshot: serde_json::from_str(&snapshot).map_err(|e| conversion_error(5, e))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to load history for card {}", card_id))?;

    Ok(history)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

const CARD_COLUMNS: &str = "card_uuid, asset_name, folder, name, title, house, loyalty,
    age, health, xp, influence_rate, special_ability, oath_slots, status, portrait,
    version, updated_at";

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    let uuid_str: String = row.get(0)?;
    let oath_json: String = row.get(12)?;
    let status_json: String = row.get(13)?;
    let portrait: Option<String> = row.get(14)?;
    let updated_at_str: String = row.get(16)?;

    Ok(Card {
        id: uuid_str.parse().map_err(|e| conversion_error(0, e))?,
        asset_name: row.get(1)?,
        folder: row.get(2)?,
        name: row.get(3)?,
        title: row.get(4)?,
        house: row.get(5)?,
        loyalty: row.get(6)?,
        age: row.get(7)?,
        health: row.get(8)?,
        xp: row.get(9)?,
        influence_rate: row.get(10)?,
        special_ability: row.get(11)?,
        oath_slots: serde_json::from_str(&oath_json).map_err(|e| conversion_error(12, e))?,
        status: serde_json::from_str(&status_json).map_err(|e| conversion_error(13, e))?,
        portrait: portrait.map(PortraitRef::new),
        version: row.get(15)?,
        updated_at: parse_timestamp(16, &updated_at_str)?,
    })
}

fn insert_card(conn: &Connection, card: &Card) -> Result<()> {
    conn.execute(
        "INSERT INTO cards (
            card_uuid, asset_name, folder, name, title, house, loyalty,
            age, health, xp, influence_rate, special_ability, oath_slots, status, portrait,
            content_hash, version, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            card.id.to_string(),
            card.asset_name,
            card.folder,
            card.name,
            card.title,
            card.house,
            card.loyalty,
            card.age,
            card.health,
            card.xp,
            card.influence_rate,
            card.special_ability,
            serde_json::to_string(&card.oath_slots)?,
            serde_json::to_string(&card.status)?,
            card.portrait.as_ref().map(|p| p.path()),
            card.content_hash(),
            card.version,
            card.updated_at.to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to insert card {}", card.asset_name))?;

    Ok(())
}

fn update_card(conn: &Connection, card: &Card) -> Result<()> {
    conn.execute(
        "UPDATE cards SET
            asset_name = ?2, folder = ?3, name = ?4, title = ?5, house = ?6, loyalty = ?7,
            age = ?8, health = ?9, xp = ?10, influence_rate = ?11, special_ability = ?12,
            oath_slots = ?13, status = ?14, portrait = ?15,
            content_hash = ?16, version = ?17, updated_at = ?18
         WHERE card_uuid = ?1",
        params![
            card.id.to_string(),
            card.asset_name,
            card.folder,
            card.name,
            card.title,
            card.house,
            card.loyalty,
            card.age,
            card.health,
            card.xp,
            card.influence_rate,
            card.special_ability,
            serde_json::to_string(&card.oath_slots)?,
            serde_json::to_string(&card.status)?,
            card.portrait.as_ref().map(|p| p.path()),
            card.content_hash(),
            card.version,
            card.updated_at.to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to update card {}", card.asset_name))?;

    Ok(())
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SqliteStore - on-disk catalog, enumeration order = insertion order
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a catalog database file
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog database: {}", path.display()))?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn verify_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Names of every card database, sorted
    pub fn database_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM card_databases ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn asset_names_in_folder(&self, folder: &str) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT asset_name FROM cards WHERE folder = ?1")?;
        let names = stmt
            .query_map([folder], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(names)
    }
}

impl AssetStore for SqliteStore {
    fn create_folder(&mut self, folder: &str) -> Result<()> {
        let paths = folder_ancestry(folder);
        if paths.is_empty() {
            bail!("Folder path is empty");
        }
        for path in paths {
            self.conn
                .execute("INSERT OR IGNORE INTO folders (path) VALUES (?1)", [&path])?;
        }
        Ok(())
    }

    fn is_valid_folder(&self, folder: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM folders WHERE path = ?1",
                [normalize_folder(folder)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn all_cards(&self) -> Result<Vec<Card>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM cards ORDER BY id", CARD_COLUMNS))?;
        let cards = stmt
            .query_map([], card_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load cards")?;
        Ok(cards)
    }

    fn load_card(&self, id: CardId) -> Result<Option<Card>> {
        let card = self
            .conn
            .query_row(
                &format!("SELECT {} FROM cards WHERE card_uuid = ?1", CARD_COLUMNS),
                [id.to_string()],
                card_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to load card {}", id))?;
        Ok(card)
    }

    fn create_record(&mut self, folder: &str, asset_name: &str) -> Result<Card> {
        if !self.is_valid_folder(folder)? {
            bail!("Output folder is invalid: {}", folder);
        }

        let folder = normalize_folder(folder);
        let taken = self.asset_names_in_folder(&folder)?;
        let asset_name = unique_asset_name(asset_name, |candidate| taken.contains(candidate));

        let card = Card::new(folder, asset_name);
        insert_card(&self.conn, &card)?;
        record_card_event(&self.conn, &CardEvent::for_card(CardEventKind::Created, &card))?;

        debug!(asset = %card.asset_name, id = %card.id, "created card record");
        Ok(card)
    }

    fn persist(&mut self, batch: &[Card]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;

        for card in batch {
            let stored: Option<(String, i64)> = tx
                .query_row(
                    "SELECT content_hash, version FROM cards WHERE card_uuid = ?1",
                    [card.id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match stored {
                Some((hash, _)) if hash == card.content_hash() => continue,
                Some((_, version)) => {
                    let mut next = card.clone();
                    next.version = version;
                    let next = next.next_version();
                    update_card(&tx, &next)?;
                    record_card_event(&tx, &CardEvent::for_card(CardEventKind::Updated, &next))?;
                }
                None => {
                    insert_card(&tx, card)?;
                    record_card_event(&tx, &CardEvent::for_card(CardEventKind::Created, card))?;
                }
            }
            written += 1;
        }

        tx.commit().context("Failed to commit card batch")?;
        debug!(batch = batch.len(), written, "persisted card batch");
        Ok(written)
    }

    fn delete_card(&mut self, id: CardId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM cards WHERE card_uuid = ?1", [id.to_string()])?;
        if deleted > 0 {
            record_card_event(&self.conn, &CardEvent::deleted(id))?;
        }
        Ok(deleted > 0)
    }

    fn register_portrait(&mut self, path: &str) -> Result<PortraitRef> {
        let portrait = PortraitRef::new(path.trim());
        if portrait.path().is_empty() {
            bail!("Portrait path is empty");
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO portraits (path) VALUES (?1)",
            [portrait.path()],
        )?;
        Ok(portrait)
    }

    fn resolve_portrait_by_name(&self, text: &str) -> Result<Option<PortraitRef>> {
        let mut stmt = self.conn.prepare("SELECT path FROM portraits ORDER BY id")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(paths
            .into_iter()
            .map(PortraitRef::new)
            .find(|p| p.matches_name(text)))
    }

    fn load_database(&self, name: &str) -> Result<Option<CardDatabase>> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM card_databases WHERE name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT card_uuid FROM card_database_entries
             WHERE database_name = ?1
             ORDER BY position",
        )?;
        let entries = stmt
            .query_map([name], |row| {
                let uuid_str: String = row.get(0)?;
                uuid_str.parse::<CardId>().map_err(|e| conversion_error(0, e))
            })?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to load card database {}", name))?;

        Ok(Some(CardDatabase {
            name: name.to_string(),
            entries,
        }))
    }

    fn save_database(&mut self, database: &CardDatabase) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO card_databases (name) VALUES (?1)",
            [&database.name],
        )?;
        tx.execute(
            "DELETE FROM card_database_entries WHERE database_name = ?1",
            [&database.name],
        )?;
        for (position, id) in database.entries.iter().enumerate() {
            tx.execute(
                "INSERT INTO card_database_entries (database_name, position, card_uuid)
                 VALUES (?1, ?2, ?3)",
                params![database.name, position as i64, id.to_string()],
            )?;
        }

        tx.commit()
            .with_context(|| format!("Failed to save card database {}", database.name))?;
        Ok(())
    }
}
