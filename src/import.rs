// 📥 CSV Importer - Create or update cards from a spreadsheet export
//
// Pipeline: raw text → lines → tokenizer → header map → card values
//
// Resolution by natural key (name, house):
// - not found                      → create new card       (created += 1)
// - found, update_existing = false → leave it alone        (skipped += 1)
// - found, update_existing = true  → overwrite its values  (updated += 1)
//
// Rows are processed in source order. A later row with the same key as an
// earlier row of the SAME import resolves against the card that row
// produced. All touched cards are persisted in one batch at the end.

use crate::entities::{make_safe_name, Card, PortraitRef};
use crate::list_field;
use crate::parser::{parse_int_or, split_lines, tokenize_line, HeaderMap};
use crate::store::AssetStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const BYTE_ORDER_MARK: char = '\u{feff}';

// ============================================================================
// COLUMNS
// ============================================================================

pub const COL_NAME: &str = "Name";
pub const COL_TITLE: &str = "Title";
pub const COL_HOUSE: &str = "House";
pub const COL_LOYALTY: &str = "Loyalty";
pub const COL_AGE: &str = "Age";
pub const COL_HEALTH: &str = "Health";
pub const COL_SPECIAL_ABILITY: &str = "SpecialAbility";
pub const COL_XP: &str = "XP";
pub const COL_INFLUENCE_RATE: &str = "InfluenceRate";
pub const COL_OATH_SLOTS: &str = "OathSlots";
pub const COL_STATUS: &str = "Status";
pub const COL_PORTRAIT: &str = "Portrait";

/// Canonical column order (used by the exporter)
pub const COLUMNS: [&str; 12] = [
    COL_NAME,
    COL_TITLE,
    COL_HOUSE,
    COL_LOYALTY,
    COL_AGE,
    COL_HEALTH,
    COL_SPECIAL_ABILITY,
    COL_XP,
    COL_INFLUENCE_RATE,
    COL_OATH_SLOTS,
    COL_STATUS,
    COL_PORTRAIT,
];

// Numeric fallbacks for blank or unparsable cells
const FALLBACK_AGE: i32 = 0;
const FALLBACK_HEALTH: i32 = 100;
const FALLBACK_XP: i32 = 0;
const FALLBACK_INFLUENCE_RATE: i32 = 0;

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    /// Rows matching an existing card while updates were disabled
    pub skipped: usize,
}

impl ImportSummary {
    pub fn summary(&self) -> String {
        format!("Import done. Created: {}, Updated: {}", self.created, self.updated)
    }
}

/// Outcome of one import call. Preconditions are outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Output folder missing or not a folder; nothing attempted
    InvalidOutputFolder(String),
    /// Fewer than 2 non-empty lines; nothing attempted
    NoDataRows,
    Completed(ImportSummary),
}

impl ImportOutcome {
    /// Counts for display, zero when nothing was attempted
    pub fn counts(&self) -> ImportSummary {
        match self {
            ImportOutcome::Completed(summary) => *summary,
            _ => ImportSummary::default(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ImportOutcome::InvalidOutputFolder(folder) => {
                format!("Output folder is invalid: {}", folder)
            }
            ImportOutcome::NoDataRows => "CSV has no data rows.".to_string(),
            ImportOutcome::Completed(summary) => summary.summary(),
        }
    }
}

// ============================================================================
// IMPORTER
// ============================================================================

#[derive(Debug, Clone)]
pub struct CsvImporter {
    /// Folder new cards are created in
    pub output_folder: String,
    /// Overwrite cards that already exist (matched by name + house)
    pub update_existing: bool,
}

impl CsvImporter {
    pub fn new(output_folder: impl Into<String>) -> Self {
        CsvImporter {
            output_folder: output_folder.into(),
            update_existing: true,
        }
    }

    /// Builder pattern: set update behaviour
    pub fn with_update_existing(mut self, update_existing: bool) -> Self {
        self.update_existing = update_existing;
        self
    }

    /// Import raw CSV text into the store
    pub fn import(&self, store: &mut dyn AssetStore, raw_text: &str) -> Result<ImportOutcome> {
        if !store.is_valid_folder(&self.output_folder)? {
            return Ok(ImportOutcome::InvalidOutputFolder(self.output_folder.clone()));
        }

        // "CSV UTF-8" exports start with a byte-order mark
        let raw_text = raw_text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(raw_text);
        let lines = split_lines(raw_text);
        if lines.len() < 2 {
            return Ok(ImportOutcome::NoDataRows);
        }

        let header = HeaderMap::build(&tokenize_line(lines[0]));
        let mut summary = ImportSummary::default();
        // Touched cards in first-touch order; later rows overwrite in place
        let mut batch: Vec<Card> = Vec::new();

        for (line_index, line) in lines.iter().enumerate().skip(1) {
            let row = tokenize_line(line);

            let name = header.get(&row, COL_NAME);
            let house = header.get(&row, COL_HOUSE);
            if name.trim().is_empty() {
                debug!(line = line_index + 1, "skipping row without a name");
                continue;
            }

            let slot = match batch.iter().position(|c| c.matches_key(name, house)) {
                Some(pos) if !self.update_existing => {
                    debug!(line = line_index + 1, asset = %batch[pos].asset_name, "card exists, updates disabled");
                    summary.skipped += 1;
                    continue;
                }
                Some(pos) => {
                    summary.updated += 1;
                    pos
                }
                None => match store.find_by_natural_key(name, house)? {
                    Some(existing) if !self.update_existing => {
                        debug!(line = line_index + 1, asset = %existing.asset_name, "card exists, updates disabled");
                        summary.skipped += 1;
                        continue;
                    }
                    Some(existing) => {
                        summary.updated += 1;
                        batch.push(existing);
                        batch.len() - 1
                    }
                    None => {
                        let asset_name = make_safe_name(&format!("{}_{}", name, house));
                        let card = store
                            .create_record(&self.output_folder, &asset_name)
                            .with_context(|| format!("Failed to create card for CSV line {}", line_index + 1))?;
                        summary.created += 1;
                        batch.push(card);
                        batch.len() - 1
                    }
                },
            };

            let card = &mut batch[slot];
            apply_row(card, &header, &row);
            if let Some(portrait) = resolve_portrait(&*store, header.get(&row, COL_PORTRAIT))? {
                card.portrait = Some(portrait);
            }
            debug!(line = line_index + 1, asset = %card.asset_name, "applied row");
        }

        let written = store
            .persist(&batch)
            .context("Failed to persist imported cards")?;

        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            written,
            "CSV import finished"
        );
        Ok(ImportOutcome::Completed(summary))
    }
}

/// Write scalar and list columns onto a card.
/// The portrait is resolved separately (it needs the store).
fn apply_row(card: &mut Card, header: &HeaderMap, row: &[String]) {
    card.name = header.get(row, COL_NAME).to_string();
    card.title = header.get(row, COL_TITLE).to_string();
    card.house = header.get(row, COL_HOUSE).to_string();
    card.loyalty = header.get(row, COL_LOYALTY).to_string();
    card.age = parse_int_or(header.get(row, COL_AGE), FALLBACK_AGE);
    card.health = parse_int_or(header.get(row, COL_HEALTH), FALLBACK_HEALTH);
    card.xp = parse_int_or(header.get(row, COL_XP), FALLBACK_XP);
    card.influence_rate = parse_int_or(header.get(row, COL_INFLUENCE_RATE), FALLBACK_INFLUENCE_RATE);
    card.special_ability = header.get(row, COL_SPECIAL_ABILITY).to_string();
    card.oath_slots = list_field::decode(header.get(row, COL_OATH_SLOTS));
    card.status = list_field::decode(header.get(row, COL_STATUS));
}

/// Blank cell or failed lookup → `None` (caller keeps the current portrait)
fn resolve_portrait(store: &dyn AssetStore, cell: &str) -> Result<Option<PortraitRef>> {
    if cell.trim().is_empty() {
        return Ok(None);
    }
    store.resolve_portrait_by_name(cell)
}

/// Convenience wrapper: `import_csv(store, folder, text, update_existing)`
pub fn import_csv(
    store: &mut dyn AssetStore,
    output_folder: &str,
    raw_text: &str,
    update_existing: bool,
) -> Result<ImportOutcome> {
    CsvImporter::new(output_folder)
        .with_update_existing(update_existing)
        .import(store, raw_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{collect, CardSources};
    use crate::store::MemoryStore;

    const HEADER: &str =
        "Name,Title,House,Loyalty,Age,Health,SpecialAbility,XP,InfluenceRate,OathSlots,Status,Portrait";

    fn sample_csv() -> String {
        format!(
            "{}\n{}\n{}\n",
            HEADER,
            r#"Jonn Stone,Wrongchild,Storm,Edward Storm,20,100,Swordman,200,0,"Edward Storm","Weak;Hated",Jonn_Stone.png"#,
            r#"Ana Vale,"Lady, of the Vale",Stone,None,31,80,Healer,50,3,,Blessed,"#,
        )
    }

    fn setup_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.create_folder("Cards").unwrap();
        store.register_portrait("Art/Portraits/Jonn_Stone.png").unwrap();
        store
    }

    fn snapshot(store: &MemoryStore) -> Vec<Card> {
        let mut cards = collect(store, &CardSources::new().with_folder("Cards"))
            .unwrap()
            .into_cards();
        cards.sort_by(|a, b| a.name.cmp(&b.name));
        cards
    }

    #[test]
    fn test_import_creates_cards() {
        let mut store = setup_store();

        let outcome = import_csv(&mut store, "Cards", &sample_csv(), true).unwrap();

        assert_eq!(
            outcome,
            ImportOutcome::Completed(ImportSummary { created: 2, updated: 0, skipped: 0 })
        );

        let jonn = store.find_by_natural_key("jonn stone", "storm").unwrap().unwrap();
        assert_eq!(jonn.asset_name, "Jonn_Stone_Storm");
        assert_eq!(jonn.title, "Wrongchild");
        assert_eq!(jonn.loyalty, "Edward Storm");
        assert_eq!(jonn.age, 20);
        assert_eq!(jonn.health, 100);
        assert_eq!(jonn.xp, 200);
        assert_eq!(jonn.special_ability, "Swordman");
        assert_eq!(jonn.oath_slots, vec!["Edward Storm"]);
        assert_eq!(jonn.status, vec!["Weak", "Hated"]);
        assert_eq!(jonn.portrait.unwrap().path(), "Art/Portraits/Jonn_Stone.png");

        let ana = store.find_by_natural_key("Ana Vale", "Stone").unwrap().unwrap();
        assert_eq!(ana.title, "Lady, of the Vale");
        assert_eq!(ana.influence_rate, 3);
        assert!(ana.oath_slots.is_empty());
        assert_eq!(ana.status, vec!["Blessed"]);
        assert!(ana.portrait.is_none());
    }

    #[test]
    fn test_import_twice_with_updates_is_idempotent() {
        let mut store = setup_store();
        let csv = sample_csv();

        let first = import_csv(&mut store, "Cards", &csv, true).unwrap();
        let after_first = snapshot(&store);
        let second = import_csv(&mut store, "Cards", &csv, true).unwrap();
        let after_second = snapshot(&store);

        assert_eq!(first.counts(), ImportSummary { created: 2, updated: 0, skipped: 0 });
        assert_eq!(second.counts(), ImportSummary { created: 0, updated: 2, skipped: 0 });
        assert_eq!(store.count(), 2);

        for (a, b) in after_first.iter().zip(&after_second) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.content_hash(), b.content_hash());
        }
    }

    #[test]
    fn test_import_without_updates_leaves_existing_cards_alone() {
        let mut store = setup_store();
        import_csv(&mut store, "Cards", &sample_csv(), true).unwrap();
        let before = snapshot(&store);

        let edited = sample_csv().replace("Wrongchild", "Kingslayer");
        let outcome = import_csv(&mut store, "Cards", &edited, false).unwrap();

        assert_eq!(outcome.counts(), ImportSummary { created: 0, updated: 0, skipped: 2 });
        assert_eq!(snapshot(&store), before);
    }

    #[test]
    fn test_numeric_fallbacks() {
        let mut store = setup_store();
        let csv = format!("{}\nJon,Bastard,Storm,,old,strong,,x,?,,,\n", HEADER);

        import_csv(&mut store, "Cards", &csv, true).unwrap();

        let jon = store.find_by_natural_key("Jon", "Storm").unwrap().unwrap();
        assert_eq!(jon.age, 0);
        assert_eq!(jon.health, 100);
        assert_eq!(jon.xp, 0);
        assert_eq!(jon.influence_rate, 0);
    }

    #[test]
    fn test_flexible_column_order_and_missing_columns() {
        let mut store = setup_store();
        let csv = "house, NAME ,status\nStorm,Jon,Weak\n";

        let outcome = import_csv(&mut store, "Cards", csv, true).unwrap();
        assert_eq!(outcome.counts().created, 1);

        let jon = store.find_by_natural_key("Jon", "Storm").unwrap().unwrap();
        assert_eq!(jon.status, vec!["Weak"]);
        assert_eq!(jon.title, "");
        assert_eq!(jon.health, 100);
    }

    #[test]
    fn test_rows_without_name_are_skipped() {
        let mut store = setup_store();
        let csv = format!("{}\n,Nobody,Storm\n   ,Blank,Storm\nJon,,Storm\n", HEADER);

        let outcome = import_csv(&mut store, "Cards", &csv, true).unwrap();
        assert_eq!(outcome.counts(), ImportSummary { created: 1, updated: 0, skipped: 0 });
    }

    #[test]
    fn test_header_only_is_nothing_to_import() {
        let mut store = setup_store();

        assert_eq!(
            import_csv(&mut store, "Cards", HEADER, true).unwrap(),
            ImportOutcome::NoDataRows
        );
        assert_eq!(
            import_csv(&mut store, "Cards", "\r\n\r\n", true).unwrap(),
            ImportOutcome::NoDataRows
        );
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_invalid_output_folder() {
        let mut store = setup_store();

        let outcome = import_csv(&mut store, "Missing", &sample_csv(), true).unwrap();

        assert_eq!(outcome, ImportOutcome::InvalidOutputFolder("Missing".to_string()));
        assert_eq!(outcome.counts(), ImportSummary::default());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_failed_portrait_lookup_keeps_existing_portrait() {
        let mut store = setup_store();
        import_csv(&mut store, "Cards", &sample_csv(), true).unwrap();

        let csv = format!("{}\nJonn Stone,Wrongchild,Storm,,,,,,,,,Unknown.png\n", HEADER);
        import_csv(&mut store, "Cards", &csv, true).unwrap();

        let jonn = store.find_by_natural_key("Jonn Stone", "Storm").unwrap().unwrap();
        assert_eq!(jonn.portrait.unwrap().path(), "Art/Portraits/Jonn_Stone.png");
    }

    #[test]
    fn test_later_row_with_same_key_overwrites_earlier_row() {
        let mut store = setup_store();
        let csv = "Name,Title,House\nJon,First,Storm\nJON,Second,storm\n";

        let outcome = import_csv(&mut store, "Cards", csv, true).unwrap();

        assert_eq!(outcome.counts(), ImportSummary { created: 1, updated: 1, skipped: 0 });
        assert_eq!(store.count(), 1);
        let jon = store.find_by_natural_key("jon", "storm").unwrap().unwrap();
        assert_eq!(jon.title, "Second");
        assert_eq!(jon.name, "JON");
    }

    #[test]
    fn test_same_key_twice_without_updates_keeps_first_row() {
        let mut store = setup_store();
        let csv = "Name,Title,House\nJon,First,Storm\nJon,Second,Storm\n";

        let outcome = import_csv(&mut store, "Cards", csv, false).unwrap();

        assert_eq!(outcome.counts(), ImportSummary { created: 1, updated: 0, skipped: 1 });
        let jon = store.find_by_natural_key("Jon", "Storm").unwrap().unwrap();
        assert_eq!(jon.title, "First");
    }

    #[test]
    fn test_import_strips_byte_order_mark() {
        let mut store = setup_store();
        let csv = "\u{feff}Name,Title,House\r\nJon,Bastard,Storm\r\n";

        let outcome = import_csv(&mut store, "Cards", csv, true).unwrap();

        assert_eq!(outcome.counts().created, 1);
        let jon = store.find_by_natural_key("Jon", "Storm").unwrap().unwrap();
        assert_eq!(jon.title, "Bastard");
    }

    #[test]
    fn test_update_reaches_card_outside_output_folder() {
        let mut store = setup_store();
        store.create_folder("Legacy/Storm").unwrap();
        let mut legacy = store.create_record("Legacy/Storm", "Old_Jon").unwrap();
        legacy.name = "Jon".to_string();
        legacy.house = "Storm".to_string();
        store.persist(&[legacy.clone()]).unwrap();

        let csv = "Name,Title,House\nJON,Lord Commander,storm\n";
        let outcome = import_csv(&mut store, "Cards", csv, true).unwrap();

        assert_eq!(outcome.counts(), ImportSummary { created: 0, updated: 1, skipped: 0 });
        let updated = store.load_card(legacy.id).unwrap().unwrap();
        assert_eq!(updated.folder, "Legacy/Storm");
        assert_eq!(updated.title, "Lord Commander");
        assert_eq!(updated.name, "JON");
        assert!(store.find_cards_in_folder("Cards").unwrap().is_empty());
    }

    #[test]
    fn test_outcome_messages() {
        let outcome = ImportOutcome::Completed(ImportSummary { created: 2, updated: 1, skipped: 0 });
        assert_eq!(outcome.message(), "Import done. Created: 2, Updated: 1");
        assert_eq!(ImportOutcome::NoDataRows.message(), "CSV has no data rows.");
    }
}
