// 📚 Card Database - Named, ordered index of card references
//
// The index stores ids only. A card deleted from the store leaves a stale
// entry behind; readers skip stale entries, `prune_stale` drops them.

use super::card::{Card, CardId};
use crate::store::AssetStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDatabase {
    pub name: String,
    pub entries: Vec<CardId>,
}

impl CardDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        CardDatabase {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: CardId) -> bool {
        self.entries.contains(&id)
    }

    pub fn add(&mut self, id: CardId) {
        self.entries.push(id);
    }

    /// Remove every entry pointing at `id`
    pub fn remove(&mut self, id: CardId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| *entry != id);
        self.entries.len() < before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append every card of `folder` that isn't indexed yet
    pub fn add_folder(&mut self, store: &dyn AssetStore, folder: &str) -> Result<usize> {
        let mut added = 0;
        for card in store.find_cards_in_folder(folder)? {
            if !self.contains(card.id) {
                self.entries.push(card.id);
                added += 1;
            }
        }
        debug!(database = %self.name, folder, added, "added folder to card database");
        Ok(added)
    }

    /// Resolve every entry in index order; stale entries resolve to `None`
    pub fn resolve(&self, store: &dyn AssetStore) -> Result<Vec<Option<Card>>> {
        self.entries.iter().map(|id| store.load_card(*id)).collect()
    }

    /// Drop entries whose card no longer exists
    pub fn prune_stale(&mut self, store: &dyn AssetStore) -> Result<usize> {
        let mut kept = Vec::with_capacity(self.entries.len());
        for id in &self.entries {
            if store.load_card(*id)?.is_some() {
                kept.push(*id);
            }
        }
        let removed = self.entries.len() - kept.len();
        self.entries = kept;
        Ok(removed)
    }

    /// Live cards whose name or house contains `text` (case-insensitive).
    /// A blank filter matches everything.
    pub fn filter(&self, store: &dyn AssetStore, text: &str) -> Result<Vec<Card>> {
        let needle = text.trim().to_lowercase();
        Ok(self
            .resolve(store)?
            .into_iter()
            .flatten()
            .filter(|card| {
                needle.is_empty()
                    || card.name.to_lowercase().contains(&needle)
                    || card.house.to_lowercase().contains(&needle)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn named_card(store: &mut MemoryStore, folder: &str, name: &str, house: &str) -> Card {
        let mut card = store.create_record(folder, name).unwrap();
        card.name = name.to_string();
        card.house = house.to_string();
        store.persist(&[card.clone()]).unwrap();
        card
    }

    #[test]
    fn test_add_and_remove() {
        let mut db = CardDatabase::new("Main");
        let id = CardId::new();

        db.add(id);
        db.add(id);
        assert_eq!(db.len(), 2);

        assert!(db.remove(id));
        assert!(db.is_empty());
        assert!(!db.remove(id));
    }

    #[test]
    fn test_add_folder_skips_existing_entries() {
        let mut store = MemoryStore::new();
        store.create_folder("Cards").unwrap();
        let jon = named_card(&mut store, "Cards", "Jon", "Storm");
        named_card(&mut store, "Cards", "Ana", "Stone");

        let mut db = CardDatabase::new("Main");
        db.add(jon.id);

        assert_eq!(db.add_folder(&store, "Cards").unwrap(), 1);
        assert_eq!(db.len(), 2);
        assert_eq!(db.add_folder(&store, "Cards").unwrap(), 0);
    }

    #[test]
    fn test_stale_entries_resolve_to_none_and_prune() {
        let mut store = MemoryStore::new();
        store.create_folder("Cards").unwrap();
        let jon = named_card(&mut store, "Cards", "Jon", "Storm");
        let ana = named_card(&mut store, "Cards", "Ana", "Stone");

        let mut db = CardDatabase::new("Main");
        db.add(jon.id);
        db.add(ana.id);
        store.delete_card(jon.id).unwrap();

        let resolved = db.resolve(&store).unwrap();
        assert!(resolved[0].is_none());
        assert_eq!(resolved[1].as_ref().unwrap().name, "Ana");

        assert_eq!(db.prune_stale(&store).unwrap(), 1);
        assert_eq!(db.entries, vec![ana.id]);
    }

    #[test]
    fn test_filter_by_name_or_house() {
        let mut store = MemoryStore::new();
        store.create_folder("Cards").unwrap();
        let mut db = CardDatabase::new("Main");
        for (name, house) in [("Jon", "Storm"), ("Ana", "Stone"), ("Edward", "Storm")] {
            let card = named_card(&mut store, "Cards", name, house);
            db.add(card.id);
        }

        assert_eq!(db.filter(&store, "storm").unwrap().len(), 2);
        assert_eq!(db.filter(&store, "AN").unwrap().len(), 1);
        assert_eq!(db.filter(&store, "  ").unwrap().len(), 3);
    }
}
