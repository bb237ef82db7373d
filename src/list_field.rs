// 🧾 List-Field Codec - multi-value cells ("Weak;Hated")
//
// Limitation: no escaping. A value containing ';' splits on decode.

/// Separator between values inside one cell
pub const DELIMITER: char = ';';

/// Split a cell into trimmed, non-empty values
pub fn decode(cell: &str) -> Vec<String> {
    cell.split(DELIMITER)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join values into one cell
pub fn encode<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| v.as_ref())
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_trims_and_drops_empty_pieces() {
        assert_eq!(decode("Weak; Hated ;;"), vec!["Weak", "Hated"]);
    }

    #[test]
    fn test_decode_blank_cell() {
        assert!(decode("").is_empty());
        assert!(decode("  ").is_empty());
        assert!(decode(" ; ; ").is_empty());
    }

    #[test]
    fn test_encode_then_decode() {
        let values = vec!["A".to_string(), "B".to_string()];
        assert_eq!(encode(&values), "A;B");
        assert_eq!(decode(&encode(&values)), values);
    }

    #[test]
    fn test_semicolon_inside_value_is_not_preserved() {
        let encoded = encode(&["a;b"]);
        assert_eq!(decode(&encoded), vec!["a", "b"]);
    }
}
