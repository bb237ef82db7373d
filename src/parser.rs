// 🏗️ CSV Parser - Lenient line tokenizer + header mapping
//
// Authoring sheets are exported by hand from spreadsheets, so this parser
// never fails: bad quoting, missing columns and junk numbers all degrade to
// best-effort values instead of errors.

use std::collections::HashMap;

// ============================================================================
// LINE SPLITTING
// ============================================================================

/// Split raw text on any CR/LF boundary, dropping empty lines.
///
/// Quoted fields cannot span lines: splitting happens before tokenization.
pub fn split_lines(raw_text: &str) -> Vec<&str> {
    raw_text
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .collect()
}

// ============================================================================
// TOKENIZER
// ============================================================================

/// Tokenize one CSV line into fields.
///
/// Rules:
/// - Fields are comma-separated
/// - Inside double quotes, commas are literal
/// - `""` inside quotes decodes to a single `"`
/// - An unterminated quote runs to end of line (no error)
/// - No trimming; an empty line yields one empty field
///
/// # Examples:
/// ```
/// use card_studio::parser::tokenize_line;
/// assert_eq!(tokenize_line(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
/// assert_eq!(tokenize_line(""), vec![""]);
/// ```
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }

    fields.push(current);
    fields
}

// ============================================================================
// COLUMN MAPPER
// ============================================================================

/// HeaderMap - column name → index, case-insensitive, trimmed.
///
/// When a header repeats a column name, the LAST occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    columns: HashMap<String, usize>,
}

impl HeaderMap {
    /// Build the mapping from a tokenized header row
    pub fn build<S: AsRef<str>>(header_fields: &[S]) -> Self {
        let columns = header_fields
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_ref().trim().to_lowercase(), index))
            .collect();
        HeaderMap { columns }
    }

    /// Index of a column, if the header has it
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.get(&column.trim().to_lowercase()).copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index_of(column).is_some()
    }

    /// Cell value for `column` in `row`; "" when the column is unknown
    /// or the row is too short.
    pub fn get<'a, S: AsRef<str>>(&self, row: &'a [S], column: &str) -> &'a str {
        self.index_of(column)
            .and_then(|index| row.get(index))
            .map(|cell| cell.as_ref())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// NUMBERS
// ============================================================================

/// Lenient integer parsing: blank or unparsable text → `fallback`.
///
/// Surrounding whitespace and a leading sign are accepted.
pub fn parse_int_or(text: &str, fallback: i32) -> i32 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return fallback;
    }
    trimmed.parse().unwrap_or(fallback)
}
