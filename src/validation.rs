// ✅ Card Validator - Authoring rules over a working set
//
// Every rule runs on every card; nothing stops early. Missing card
// references are aggregation noise and are skipped silently.
//
// Rules:
// 1. Name not blank
// 2. Title not blank
// 3. Portrait assigned
// 4. No negative stats (age, health, xp, influence rate)
// 5. (name, house) unique, case-insensitive (reported on 2nd+ occurrence)

use crate::entities::{Card, CardId, NaturalKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::info;

/// Report line for a working set without issues
pub const CLEAN_REPORT: &str = "No issues found.";

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    EmptyName,
    EmptyTitle,
    MissingPortrait,
    NegativeStats,
    /// Carries the key as written on the offending card ("Jon::Storm")
    DuplicateKey(String),
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::EmptyName => write!(f, "Name is empty."),
            IssueKind::EmptyTitle => write!(f, "Title is empty."),
            IssueKind::MissingPortrait => write!(f, "Portrait missing."),
            IssueKind::NegativeStats => write!(f, "Negative number in stats."),
            IssueKind::DuplicateKey(key) => write!(f, "Duplicate Name+House [{}].", key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub card_id: CardId,
    pub asset_name: String,
    pub kind: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.asset_name, self.kind)
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub checked: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Human-readable lines; a clean report is `["No issues found."]`
    pub fn lines(&self) -> Vec<String> {
        if self.is_clean() {
            return vec![CLEAN_REPORT.to_string()];
        }
        self.issues.iter().map(|issue| issue.to_string()).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Checked: {} cards, Issues: {} ({} duplicate keys)",
            self.checked,
            self.issues.len(),
            self.issues
                .iter()
                .filter(|i| matches!(i.kind, IssueKind::DuplicateKey(_)))
                .count()
        )
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Run every rule over the cards.
///
/// Accepts plain `&Card` items or `Option<&Card>` (absent entries skipped).
pub fn validate_cards<'a, I, C>(cards: I) -> ValidationReport
where
    I: IntoIterator<Item = C>,
    C: Into<Option<&'a Card>>,
{
    let mut report = ValidationReport::default();
    let mut seen_keys: HashSet<NaturalKey> = HashSet::new();

    for entry in cards {
        let Some(card): Option<&Card> = entry.into() else {
            continue;
        };
        report.checked += 1;
        let mut flag = |kind: IssueKind| {
            report.issues.push(ValidationIssue {
                card_id: card.id,
                asset_name: card.asset_name.clone(),
                kind,
            })
        };

        // Rule 1-2: required text
        if card.name.trim().is_empty() {
            flag(IssueKind::EmptyName);
        }
        if card.title.trim().is_empty() {
            flag(IssueKind::EmptyTitle);
        }

        // Rule 3: portrait
        if card.portrait.is_none() {
            flag(IssueKind::MissingPortrait);
        }

        // Rule 4: stats (one line per card, whatever the number of offenders)
        if [card.age, card.health, card.xp, card.influence_rate]
            .iter()
            .any(|n| *n < 0)
        {
            flag(IssueKind::NegativeStats);
        }

        // Rule 5: natural key
        if !seen_keys.insert(card.natural_key()) {
            flag(IssueKind::DuplicateKey(format!("{}::{}", card.name, card.house)));
        }
    }

    info!("{}", report.summary());
    report
}

/// Validate and render the report lines
pub fn validate<'a, I, C>(cards: I) -> Vec<String>
where
    I: IntoIterator<Item = C>,
    C: Into<Option<&'a Card>>,
{
    validate_cards(cards).lines()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PortraitRef;

    fn create_valid_card(name: &str, house: &str) -> Card {
        let mut card = Card::new("Cards", format!("{}_{}", name, house));
        card.name = name.to_string();
        card.house = house.to_string();
        card.title = "Wrongchild".to_string();
        card.portrait = Some(PortraitRef::new("Art/portrait.png"));
        card
    }

    #[test]
    fn test_validate_clean_set() {
        let cards = vec![create_valid_card("Jon", "Storm"), create_valid_card("Ana", "Stone")];

        let report = validate_cards(&cards);
        assert!(report.is_clean());
        assert_eq!(report.checked, 2);
        assert_eq!(validate(&cards), vec!["No issues found."]);
    }

    #[test]
    fn test_validate_empty_set_is_clean() {
        let cards: Vec<Card> = Vec::new();
        assert_eq!(validate(&cards), vec![CLEAN_REPORT]);
    }

    #[test]
    fn test_validate_broken_card_reports_every_rule() {
        let mut card = Card::new("Cards", "Broken");
        card.age = -1;

        let lines = validate(std::slice::from_ref(&card));

        assert!(lines.len() >= 4);
        assert!(lines.contains(&"Broken: Name is empty.".to_string()));
        assert!(lines.contains(&"Broken: Title is empty.".to_string()));
        assert!(lines.contains(&"Broken: Portrait missing.".to_string()));
        assert!(lines.contains(&"Broken: Negative number in stats.".to_string()));
    }

    #[test]
    fn test_blank_name_counts_as_empty() {
        let mut card = create_valid_card("Jon", "Storm");
        card.name = "   ".to_string();

        let report = validate_cards(std::slice::from_ref(&card));
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::EmptyName);
    }

    #[test]
    fn test_several_negative_stats_give_one_line() {
        let mut card = create_valid_card("Jon", "Storm");
        card.health = -5;
        card.xp = -1;

        assert_eq!(validate(std::slice::from_ref(&card)), vec![
            "Jon_Storm: Negative number in stats."
        ]);
    }

    #[test]
    fn test_duplicate_key_reported_once_on_second_card() {
        let first = create_valid_card("Jon", "Storm");
        let mut second = create_valid_card("JON", "storm");
        second.asset_name = "Second".to_string();

        let report = validate_cards([&first, &second]);

        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].card_id, second.id);
        assert_eq!(
            report.lines(),
            vec!["Second: Duplicate Name+House [JON::storm]."]
        );
    }

    #[test]
    fn test_third_occurrence_also_reported() {
        let cards = vec![
            create_valid_card("Jon", "Storm"),
            create_valid_card("Jon", "Storm"),
            create_valid_card("jon", "STORM"),
        ];

        let report = validate_cards(&cards);
        assert_eq!(report.issues.len(), 2);
        assert!(report.summary().contains("2 duplicate keys"));
    }

    #[test]
    fn test_missing_entries_are_skipped() {
        let card = create_valid_card("Jon", "Storm");
        let entries = vec![None, Some(&card), None];

        let report = validate_cards(entries);
        assert!(report.is_clean());
        assert_eq!(report.checked, 1);
    }
}
