// 🃏 Card Entity - Stable identity + authored values
//
// "Card name is a VALUE (can change), Card UUID is IDENTITY (never changes)"
//
// Problem solved:
// - Same card reached through a folder scan AND a database index → one entry
// - Renaming a character doesn't break database indexes pointing at it
// - (name, house) stays a NATURAL key for humans and CSV sheets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Health assigned to a freshly created card.
pub const DEFAULT_HEALTH: i32 = 100;

/// Asset name for a draft with neither name nor house.
pub const NEW_CARD_ASSET_NAME: &str = "Card_NewCharacter";

// ============================================================================
// IDENTITY
// ============================================================================

/// Stable identity assigned at creation, immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(uuid::Uuid);

impl CardId {
    pub fn new() -> Self {
        CardId(uuid::Uuid::new_v4())
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CardId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim()).map(CardId)
    }
}

/// Natural key `(name, house)`, folded for case-insensitive comparison.
///
/// Folding is per character to upper case, one-to-one mappings only:
/// "ß" stays "ß" and the Kelvin sign does not match "k".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    name: String,
    house: String,
}

impl NaturalKey {
    pub fn new(name: &str, house: &str) -> Self {
        NaturalKey {
            name: fold_case(name),
            house: fold_case(house),
        }
    }
}

fn fold_case(s: &str) -> String {
    s.chars()
        .map(|c| {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(u), None) => u,
                _ => c,
            }
        })
        .collect()
}

// ============================================================================
// PORTRAIT REFERENCE
// ============================================================================

/// Opaque reference to a registered portrait asset (its asset path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortraitRef(String);

impl PortraitRef {
    pub fn new(path: impl Into<String>) -> Self {
        PortraitRef(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// "Art/Portraits/Jonn_Stone.png" → "Jonn_Stone.png"
    pub fn file_name(&self) -> &str {
        self.0.rsplit(['/', '\\']).next().unwrap_or(&self.0)
    }

    /// "Art/Portraits/Jonn_Stone.png" → "Jonn_Stone"
    pub fn stem(&self) -> &str {
        file_stem(self.file_name())
    }

    /// Approximate lookup by name: full file name or bare stem, case-insensitive.
    pub fn matches_name(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }
        let query_lower = query.to_lowercase();
        self.file_name().to_lowercase() == query_lower
            || self.stem().to_lowercase() == file_stem(query).to_lowercase()
    }
}

fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(pos) => &file_name[..pos],
    }
}

// ============================================================================
// CARD ENTITY
// ============================================================================

/// Card Entity - one character card.
///
/// Identity: `id` (never changes)
/// Values: everything else (can change over time)
///
/// The natural key `(name, house)` is NOT enforced here; duplicates are
/// an authoring error reported by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    pub id: CardId,

    /// Name of the stored asset (used to attribute report lines)
    pub asset_name: String,

    /// Folder the asset lives in ("Cards/Storm")
    pub folder: String,

    // ========================================================================
    // AUTHORED VALUES
    // ========================================================================
    pub name: String,
    pub title: String,
    pub house: String,
    pub loyalty: String,
    pub age: i32,
    pub health: i32,
    pub xp: i32,
    pub influence_rate: i32,
    pub special_ability: String,
    pub oath_slots: Vec<String>,
    pub status: Vec<String>,
    pub portrait: Option<PortraitRef>,

    // ========================================================================
    // VERSIONING
    // ========================================================================
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Create an empty card (health defaults to 100)
    pub fn new(folder: impl Into<String>, asset_name: impl Into<String>) -> Self {
        Card {
            id: CardId::new(),
            asset_name: asset_name.into(),
            folder: folder.into(),
            name: String::new(),
            title: String::new(),
            house: String::new(),
            loyalty: String::new(),
            age: 0,
            health: DEFAULT_HEALTH,
            xp: 0,
            influence_rate: 0,
            special_ability: String::new(),
            oath_slots: Vec::new(),
            status: Vec::new(),
            portrait: None,
            version: 1,
            updated_at: Utc::now(),
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.name, &self.house)
    }

    /// Case-insensitive match on both name and house
    pub fn matches_key(&self, name: &str, house: &str) -> bool {
        self.natural_key() == NaturalKey::new(name, house)
    }

    /// Does this card live in `folder` (or any folder below it)?
    pub fn is_in_folder(&self, folder: &str) -> bool {
        folder_contains(folder, &self.folder)
    }

    /// Overwrite every authored value from an editor draft
    pub fn apply_draft(&mut self, draft: &CardDraft) {
        self.name = draft.name.clone();
        self.title = draft.title.clone();
        self.house = draft.house.clone();
        self.loyalty = draft.loyalty.clone();
        self.age = draft.age;
        self.health = draft.health;
        self.xp = draft.xp;
        self.influence_rate = draft.influence_rate;
        self.special_ability = draft.special_ability.clone();
        self.oath_slots = draft.oath_slots.clone();
        self.status = draft.status.clone();
        self.portrait = draft.portrait.clone();
    }

    /// SHA-256 over the authored values (identity and versioning are not hashed)
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.name.as_str(),
            self.title.as_str(),
            self.house.as_str(),
            self.loyalty.as_str(),
            self.special_ability.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        for number in [self.age, self.health, self.xp, self.influence_rate] {
            hasher.update(number.to_le_bytes());
        }
        for list in [&self.oath_slots, &self.status] {
            for item in list {
                hasher.update(item.as_bytes());
                hasher.update([0x1e]);
            }
            hasher.update([0x1d]);
        }
        if let Some(portrait) = &self.portrait {
            hasher.update(portrait.path().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Create next version (for persisting changed values)
    pub fn next_version(&self) -> Card {
        let mut next = self.clone();
        next.version += 1;
        next.updated_at = Utc::now();
        next
    }
}

/// `card_folder` is `folder` itself or nested below it.
pub fn folder_contains(folder: &str, card_folder: &str) -> bool {
    let folder = folder.trim_end_matches('/');
    card_folder == folder
        || card_folder
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/'))
}

// ============================================================================
// EDITOR DRAFT
// ============================================================================

/// A fully-formed card value handed over by an editor form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    pub name: String,
    pub title: String,
    pub house: String,
    pub loyalty: String,
    pub age: i32,
    pub health: i32,
    pub xp: i32,
    pub influence_rate: i32,
    pub special_ability: String,
    pub oath_slots: Vec<String>,
    pub status: Vec<String>,
    pub portrait: Option<PortraitRef>,

    /// Asset name to use instead of "{name}_{house}"
    pub asset_name_override: Option<String>,
}

impl Default for CardDraft {
    fn default() -> Self {
        CardDraft {
            name: String::new(),
            title: String::new(),
            house: String::new(),
            loyalty: String::new(),
            age: 0,
            health: DEFAULT_HEALTH,
            xp: 0,
            influence_rate: 0,
            special_ability: String::new(),
            oath_slots: Vec::new(),
            status: Vec::new(),
            portrait: None,
            asset_name_override: None,
        }
    }
}

impl CardDraft {
    pub fn new(name: impl Into<String>, house: impl Into<String>) -> Self {
        CardDraft {
            name: name.into(),
            house: house.into(),
            ..Default::default()
        }
    }

    /// Builder pattern: add title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder pattern: add portrait
    pub fn with_portrait(mut self, portrait: PortraitRef) -> Self {
        self.portrait = Some(portrait);
        self
    }

    /// Asset name this draft would be stored under
    pub fn asset_name(&self) -> String {
        let raw = match &self.asset_name_override {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ if self.name.trim().is_empty() && self.house.trim().is_empty() => {
                return NEW_CARD_ASSET_NAME.to_string();
            }
            _ => format!("{}_{}", self.name, self.house),
        };
        make_safe_name(&raw)
    }
}

impl From<&Card> for CardDraft {
    fn from(card: &Card) -> Self {
        CardDraft {
            name: card.name.clone(),
            title: card.title.clone(),
            house: card.house.clone(),
            loyalty: card.loyalty.clone(),
            age: card.age,
            health: card.health,
            xp: card.xp,
            influence_rate: card.influence_rate,
            special_ability: card.special_ability.clone(),
            oath_slots: card.oath_slots.clone(),
            status: card.status.clone(),
            portrait: card.portrait.clone(),
            asset_name_override: None,
        }
    }
}

// ============================================================================
// ASSET NAMING
// ============================================================================

/// Make a string usable as an asset file name.
///
/// "Jonn Stone_Storm" → "Jonn_Stone_Storm", "a/b:c" → "a_b_c", "  " → "Card"
pub fn make_safe_name(s: &str) -> String {
    if s.trim().is_empty() {
        return "Card".to_string();
    }

    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Pick a free asset name: "Base", then "Base 1", "Base 2", ...
pub fn unique_asset_name<F>(base: &str, mut is_taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !is_taken(base) {
        return base.to_string();
    }

    (1..)
        .map(|n| format!("{} {}", base, n))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
