// 🗂️ Catalog Aggregator - One working set from many sources
//
// Sources, in precedence order:
// 1. Database index (stale entries skipped)
// 2. Folder scan (delegated to the store)
// 3. Explicit card references (stale references skipped)
//
// The working set is de-duplicated by CardId, first-seen order preserved.
// Two DIFFERENT cards sharing (name, house) both stay: that's the
// validator's concern, not ours.

use crate::entities::{Card, CardDatabase, CardDraft, CardId};
use crate::store::AssetStore;
use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, info, warn};

// ============================================================================
// SOURCES
// ============================================================================

/// Where to collect cards from. Every source is optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardSources<'a> {
    pub explicit: &'a [CardId],
    pub folder: Option<&'a str>,
    pub database: Option<&'a CardDatabase>,
}

impl<'a> CardSources<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: add explicit references
    pub fn with_explicit(mut self, ids: &'a [CardId]) -> Self {
        self.explicit = ids;
        self
    }

    /// Builder pattern: add a folder to scan
    pub fn with_folder(mut self, folder: &'a str) -> Self {
        self.folder = Some(folder);
        self
    }

    /// Builder pattern: add a database index
    pub fn with_database(mut self, database: &'a CardDatabase) -> Self {
        self.database = Some(database);
        self
    }
}

// ============================================================================
// WORKING SET
// ============================================================================

/// Transient, de-duplicated snapshot of cards for one operation
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    cards: Vec<Card>,
    seen: HashSet<CardId>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a card unless the same card is already present
    pub fn push(&mut self, card: Card) -> bool {
        if !self.seen.insert(card.id) {
            return false;
        }
        self.cards.push(card);
        true
    }

    pub fn contains(&self, id: CardId) -> bool {
        self.seen.contains(&id)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Card> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn into_cards(self) -> Vec<Card> {
        self.cards
    }
}

impl<'a> IntoIterator for &'a WorkingSet {
    type Item = &'a Card;
    type IntoIter = std::slice::Iter<'a, Card>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Merge every source into one working set
pub fn collect(store: &dyn AssetStore, sources: &CardSources<'_>) -> Result<WorkingSet> {
    let mut working_set = WorkingSet::new();
    let mut stale = 0;

    if let Some(database) = sources.database {
        for card in database.resolve(store)? {
            match card {
                Some(card) => {
                    working_set.push(card);
                }
                None => stale += 1,
            }
        }
    }

    if let Some(folder) = sources.folder {
        for card in store.find_cards_in_folder(folder)? {
            working_set.push(card);
        }
    }

    for id in sources.explicit {
        match store.load_card(*id)? {
            Some(card) => {
                working_set.push(card);
            }
            None => stale += 1,
        }
    }

    if stale > 0 {
        warn!(stale, "skipped stale card references");
    }
    debug!(cards = working_set.len(), "collected working set");

    Ok(working_set)
}

/// Catalog-wide lookup by natural key (whole store, not a working set).
///
/// If several stored cards share the key, the first one in store order wins.
pub fn find_by_key(store: &dyn AssetStore, name: &str, house: &str) -> Result<Option<Card>> {
    store.find_by_natural_key(name, house)
}

// ============================================================================
// CARD AUTHORING
// ============================================================================

/// Result of creating a card from an editor draft
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Card),
    InvalidFolder(String),
}

/// Create a new card asset in `folder` from a draft
pub fn create_card(
    store: &mut dyn AssetStore,
    folder: &str,
    draft: &CardDraft,
) -> Result<CreateOutcome> {
    if !store.is_valid_folder(folder)? {
        return Ok(CreateOutcome::InvalidFolder(folder.to_string()));
    }

    let mut card = store.create_record(folder, &draft.asset_name())?;
    card.apply_draft(draft);
    store.persist(std::slice::from_ref(&card))?;
    let card = store.load_card(card.id)?.unwrap_or(card);

    info!(asset = %card.asset_name, id = %card.id, "created card");
    Ok(CreateOutcome::Created(card))
}

/// Overwrite an existing card with a draft. `None` when the card is gone.
pub fn apply_to_existing(
    store: &mut dyn AssetStore,
    id: CardId,
    draft: &CardDraft,
) -> Result<Option<Card>> {
    let Some(mut card) = store.load_card(id)? else {
        return Ok(None);
    };

    card.apply_draft(draft);
    store.persist(std::slice::from_ref(&card))?;

    info!(asset = %card.asset_name, id = %card.id, "applied draft to card");
    store.load_card(id)
}
