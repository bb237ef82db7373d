// 📤 CSV Export - Write cards back in the import format
//
// The output re-imports to the same values: canonical header, list columns
// through the list-field codec, portrait as its file name.

use crate::entities::Card;
use crate::import::COLUMNS;
use crate::list_field;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Write cards as CSV to any writer. Returns the number of rows written.
pub fn export_csv<'a, W, I>(cards: I, writer: W) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Card>,
{
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    wtr.write_record(COLUMNS)
        .context("Failed to write CSV header")?;

    let mut rows = 0;
    for card in cards {
        wtr.write_record(card_row(card))
            .with_context(|| format!("Failed to write CSV row for {}", card.asset_name))?;
        rows += 1;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(rows)
}

/// Export to a file on disk
pub fn export_csv_file<'a, I>(cards: I, path: &Path) -> Result<usize>
where
    I: IntoIterator<Item = &'a Card>,
{
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let rows = export_csv(cards, file)?;
    info!(rows, path = %path.display(), "exported cards to CSV");
    Ok(rows)
}

/// One record in `COLUMNS` order
fn card_row(card: &Card) -> [String; 12] {
    [
        card.name.clone(),
        card.title.clone(),
        card.house.clone(),
        card.loyalty.clone(),
        card.age.to_string(),
        card.health.to_string(),
        card.special_ability.clone(),
        card.xp.to_string(),
        card.influence_rate.to_string(),
        list_field::encode(&card.oath_slots),
        list_field::encode(&card.status),
        card.portrait
            .as_ref()
            .map(|p| p.file_name().to_string())
            .unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PortraitRef;
    use crate::import::import_csv;
    use crate::store::{AssetStore, MemoryStore};

    fn create_test_card() -> Card {
        let mut card = Card::new("Cards", "Ana_Vale_Stone");
        card.name = "Ana Vale".to_string();
        card.title = "Lady, of the \"Vale\"".to_string();
        card.house = "Stone".to_string();
        card.age = 31;
        card.health = 80;
        card.oath_slots = vec!["Edward Storm".to_string(), "The Vale".to_string()];
        card.status = vec!["Blessed".to_string()];
        card.portrait = Some(PortraitRef::new("Art/Ana_Vale.png"));
        card
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let card = create_test_card();
        let mut out = Vec::new();

        let rows = export_csv([&card], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(rows, 1);
        assert!(text.starts_with(
            "Name,Title,House,Loyalty,Age,Health,SpecialAbility,XP,InfluenceRate,OathSlots,Status,Portrait\r\n"
        ));
        assert!(text.contains(r#""Lady, of the ""Vale""""#));
        assert!(text.contains("Edward Storm;The Vale"));
        assert!(text.contains("Ana_Vale.png"));
    }

    #[test]
    fn test_exported_csv_reimports_to_same_values() {
        let card = create_test_card();
        let mut out = Vec::new();
        export_csv([&card], &mut out).unwrap();

        let mut store = MemoryStore::new();
        store.create_folder("Imported").unwrap();
        store.register_portrait("Art/Ana_Vale.png").unwrap();
        let outcome = import_csv(&mut store, "Imported", &String::from_utf8(out).unwrap(), true).unwrap();
        assert_eq!(outcome.counts().created, 1);

        let imported = store.find_by_natural_key("Ana Vale", "Stone").unwrap().unwrap();
        assert_eq!(imported.content_hash(), card.content_hash());
    }

    #[test]
    fn test_export_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.csv");

        let rows = export_csv_file(&[create_test_card()], &path).unwrap();

        assert_eq!(rows, 1);
        assert!(std::fs::read_to_string(&path).unwrap().contains("Ana Vale"));
    }
}
