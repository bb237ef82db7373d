// 🗄️ Asset Store - Persistent storage capability
//
// Everything the catalog needs from persistent storage goes through this
// trait. The core never touches files or SQL directly.
//
// Implementations:
// - MemoryStore (this file): tests and dry runs
// - SqliteStore (db.rs): on-disk catalog

use crate::entities::{unique_asset_name, Card, CardDatabase, CardId, PortraitRef};
use anyhow::{bail, Result};
use std::collections::BTreeSet;

// ============================================================================
// CAPABILITY TRAIT
// ============================================================================

/// AssetStore - persistent storage, folder scans and reference resolution
///
/// All calls are synchronous and blocking. Errors are store-level failures
/// (I/O, SQL) and are propagated, never recovered by the caller.
pub trait AssetStore {
    /// Create a folder (and its parents)
    fn create_folder(&mut self, folder: &str) -> Result<()>;

    /// Check that a folder exists and can receive new cards
    fn is_valid_folder(&self, folder: &str) -> Result<bool>;

    /// Every stored card, in store enumeration order
    fn all_cards(&self) -> Result<Vec<Card>>;

    /// Resolve a card reference; `None` means the reference is stale
    fn load_card(&self, id: CardId) -> Result<Option<Card>>;

    /// Create an empty card in `folder`, registered immediately.
    /// The asset name is made unique within the folder.
    fn create_record(&mut self, folder: &str, asset_name: &str) -> Result<Card>;

    /// Write a batch of cards. Returns how many rows actually changed.
    fn persist(&mut self, batch: &[Card]) -> Result<usize>;

    /// Remove a card from storage (index entries pointing at it go stale)
    fn delete_card(&mut self, id: CardId) -> Result<bool>;

    /// Make a portrait asset resolvable by name
    fn register_portrait(&mut self, path: &str) -> Result<PortraitRef>;

    /// Approximate portrait lookup by file name or stem
    fn resolve_portrait_by_name(&self, text: &str) -> Result<Option<PortraitRef>>;

    fn load_database(&self, name: &str) -> Result<Option<CardDatabase>>;

    fn save_database(&mut self, database: &CardDatabase) -> Result<()>;

    /// All cards living in `folder` or below it
    fn find_cards_in_folder(&self, folder: &str) -> Result<Vec<Card>> {
        let folder = normalize_folder(folder);
        Ok(self
            .all_cards()?
            .into_iter()
            .filter(|card| card.is_in_folder(&folder))
            .collect())
    }

    /// Catalog-wide lookup by natural key.
    ///
    /// Ties resolve to the first match in store enumeration order.
    fn find_by_natural_key(&self, name: &str, house: &str) -> Result<Option<Card>> {
        Ok(self
            .all_cards()?
            .into_iter()
            .find(|card| card.matches_key(name, house)))
    }
}

/// "Cards/Storm/" → "Cards/Storm"
pub fn normalize_folder(folder: &str) -> String {
    folder.trim().trim_matches('/').replace('\\', "/")
}

/// "Cards/Storm" → ["Cards", "Cards/Storm"]
pub fn folder_ancestry(folder: &str) -> Vec<String> {
    let normalized = normalize_folder(folder);
    let mut paths = Vec::new();
    let mut current = String::new();

    for part in normalized.split('/').filter(|p| !p.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(part);
        paths.push(current.clone());
    }

    paths
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// MemoryStore - whole catalog held in memory, enumeration order = insertion order
#[derive(Debug, Default)]
pub struct MemoryStore {
    folders: BTreeSet<String>,
    cards: Vec<Card>,
    portraits: Vec<PortraitRef>,
    databases: Vec<CardDatabase>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.cards.len()
    }
}

impl AssetStore for MemoryStore {
    fn create_folder(&mut self, folder: &str) -> Result<()> {
        let paths = folder_ancestry(folder);
        if paths.is_empty() {
            bail!("Folder path is empty");
        }
        self.folders.extend(paths);
        Ok(())
    }

    fn is_valid_folder(&self, folder: &str) -> Result<bool> {
        Ok(self.folders.contains(&normalize_folder(folder)))
    }

    fn all_cards(&self) -> Result<Vec<Card>> {
        Ok(self.cards.clone())
    }

    fn load_card(&self, id: CardId) -> Result<Option<Card>> {
        Ok(self.cards.iter().find(|c| c.id == id).cloned())
    }

    fn create_record(&mut self, folder: &str, asset_name: &str) -> Result<Card> {
        if !self.is_valid_folder(folder)? {
            bail!("Output folder is invalid: {}", folder);
        }

        let folder = normalize_folder(folder);
        let asset_name = unique_asset_name(asset_name, |candidate| {
            self.cards
                .iter()
                .any(|c| c.folder == folder && c.asset_name == candidate)
        });

        let card = Card::new(folder, asset_name);
        self.cards.push(card.clone());
        Ok(card)
    }

    fn persist(&mut self, batch: &[Card]) -> Result<usize> {
        let mut written = 0;

        for card in batch {
            match self.cards.iter_mut().find(|c| c.id == card.id) {
                Some(stored) => {
                    if stored.content_hash() == card.content_hash() {
                        continue;
                    }
                    let mut next = card.clone();
                    next.version = stored.version;
                    *stored = next.next_version();
                }
                None => self.cards.push(card.clone()),
            }
            written += 1;
        }

        Ok(written)
    }

    fn delete_card(&mut self, id: CardId) -> Result<bool> {
        let before = self.cards.len();
        self.cards.retain(|c| c.id != id);
        Ok(self.cards.len() < before)
    }

    fn register_portrait(&mut self, path: &str) -> Result<PortraitRef> {
        let portrait = PortraitRef::new(path.trim());
        if portrait.path().is_empty() {
            bail!("Portrait path is empty");
        }
        if !self.portraits.contains(&portrait) {
            self.portraits.push(portrait.clone());
        }
        Ok(portrait)
    }

    fn resolve_portrait_by_name(&self, text: &str) -> Result<Option<PortraitRef>> {
        Ok(self
            .portraits
            .iter()
            .find(|p| p.matches_name(text))
            .cloned())
    }

    fn load_database(&self, name: &str) -> Result<Option<CardDatabase>> {
        Ok(self.databases.iter().find(|d| d.name == name).cloned())
    }

    fn save_database(&mut self, database: &CardDatabase) -> Result<()> {
        match self.databases.iter_mut().find(|d| d.name == database.name) {
            Some(stored) => *stored = database.clone(),
            None => self.databases.push(database.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_folder(folder: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.create_folder(folder).unwrap();
        store
    }

    #[test]
    fn test_folder_ancestry() {
        assert_eq!(folder_ancestry("Cards/Storm/"), vec!["Cards", "Cards/Storm"]);
        assert!(folder_ancestry("  ").is_empty());
    }

    #[test]
    fn test_create_folder_registers_parents() {
        let store = store_with_folder("Cards/Storm");

        assert!(store.is_valid_folder("Cards").unwrap());
        assert!(store.is_valid_folder("Cards/Storm/").unwrap());
        assert!(!store.is_valid_folder("Cards/Stone").unwrap());
    }

    #[test]
    fn test_create_record_requires_valid_folder() {
        let mut store = MemoryStore::new();
        assert!(store.create_record("Missing", "Jon_Storm").is_err());
    }

    #[test]
    fn test_create_record_generates_unique_names() {
        let mut store = store_with_folder("Cards");

        let a = store.create_record("Cards", "Jon_Storm").unwrap();
        let b = store.create_record("Cards", "Jon_Storm").unwrap();

        assert_eq!(a.asset_name, "Jon_Storm");
        assert_eq!(b.asset_name, "Jon_Storm 1");
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_persist_skips_unchanged_cards() {
        let mut store = store_with_folder("Cards");
        let mut card = store.create_record("Cards", "Jon").unwrap();

        assert_eq!(store.persist(&[card.clone()]).unwrap(), 0);

        card.name = "Jon".to_string();
        assert_eq!(store.persist(&[card.clone()]).unwrap(), 1);

        let stored = store.load_card(card.id).unwrap().unwrap();
        assert_eq!(stored.name, "Jon");
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn test_find_by_natural_key_returns_first_match() {
        let mut store = store_with_folder("Cards");
        let mut first = store.create_record("Cards", "A").unwrap();
        let mut second = store.create_record("Cards", "B").unwrap();
        first.name = "Jon".to_string();
        first.house = "Storm".to_string();
        second.name = "JON".to_string();
        second.house = "storm".to_string();
        store.persist(&[first.clone(), second]).unwrap();

        let found = store.find_by_natural_key("jon", "STORM").unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert!(store.find_by_natural_key("Jon", "Stone").unwrap().is_none());
    }

    #[test]
    fn test_find_cards_in_folder() {
        let mut store = store_with_folder("Cards/Storm");
        store.create_folder("Other").unwrap();
        store.create_record("Cards/Storm", "A").unwrap();
        store.create_record("Other", "B").unwrap();

        let found = store.find_cards_in_folder("Cards").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].asset_name, "A");
    }

    #[test]
    fn test_portrait_resolution() {
        let mut store = MemoryStore::new();
        store.register_portrait("Art/Jonn_Stone.png").unwrap();

        let found = store.resolve_portrait_by_name("jonn_stone.png").unwrap();
        assert_eq!(found.unwrap().path(), "Art/Jonn_Stone.png");
        assert!(store.resolve_portrait_by_name("Nobody.png").unwrap().is_none());
    }

    #[test]
    fn test_delete_card() {
        let mut store = store_with_folder("Cards");
        let card = store.create_record("Cards", "A").unwrap();

        assert!(store.delete_card(card.id).unwrap());
        assert!(!store.delete_card(card.id).unwrap());
        assert!(store.load_card(card.id).unwrap().is_none());
    }
}
