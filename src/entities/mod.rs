// Entity Models
//
// Each entity has:
// - Stable identity (UUID) that NEVER changes
// - Authored values that the editor and the importer overwrite in place

pub mod card;
pub mod card_database;

pub use card::{
    folder_contains, make_safe_name, unique_asset_name, Card, CardDraft, CardId, NaturalKey,
    PortraitRef, DEFAULT_HEALTH, NEW_CARD_ASSET_NAME,
};
pub use card_database::CardDatabase;
