use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::log;

/// Collector numbers: a standalone run of 1-4 digits.
static COLLECTOR_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,4}\b").expect("collector number pattern"));

/// Set codes: a standalone 3-4 character uppercase alphanumeric token.
static SET_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z0-9]{3,4}\b").expect("set code pattern"));

/// Language markers printed next to the set code in the footer.
const LANGUAGE_CODES: [&str; 11] = [
    "EN", "JP", "FR", "DE", "IT", "CN", "RU", "KO", "ES", "PT", "PH",
];

/// Candidate card identity read from one capture.
///
/// Any field may be empty; an empty field means the text was not readable,
/// which is a normal outcome rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedIdentity {
    pub name: String,
    pub set_code: String,
    pub collector_number: String,
    pub raw_footer_text: String,
}

/// Strips everything except letters, digits, whitespace, hyphens and middle dots.
pub fn normalize_line(line: &str) -> String {
    line.chars()
        .filter(|&c| c.is_ascii_alphanumeric() || c.is_whitespace() || c == '-' || c == '·')
        .collect::<String>()
        .trim()
        .to_string()
}

fn normalize_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .map(|l| normalize_line(l.as_ref()))
        .filter(|l| !l.is_empty())
        .collect()
}

fn is_set_code(token: &str) -> bool {
    !token.chars().all(|c| c.is_ascii_digit()) && !LANGUAGE_CODES.contains(&token)
}

/// Builds a `ParsedIdentity` from the OCR lines of the name band and the footer band.
pub fn parse_identity<S: AsRef<str>>(name_lines: &[S], footer_lines: &[S]) -> ParsedIdentity {
    let name = normalize_lines(name_lines)
        .into_iter()
        .next()
        .unwrap_or_default();

    // OCR case is unreliable on small print, so match against upper case.
    let footer_text = normalize_lines(footer_lines).join(" ").to_uppercase();
    log(&format!("Raw footer: \"{}\"", footer_text));

    let collector_number = COLLECTOR_NUMBER
        .find(&footer_text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let set_code = SET_CODE
        .find_iter(&footer_text)
        .map(|m| m.as_str())
        .find(|token| is_set_code(token))
        .unwrap_or_default()
        .to_string();

    ParsedIdentity {
        name,
        set_code,
        collector_number,
        raw_footer_text: footer_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line("  Lightning Bolt!! "), "Lightning Bolt");
        assert_eq!(normalize_line("Jace, the Mind-Sculptor"), "Jace the Mind-Sculptor");
        assert_eq!(normalize_line("MH2 · EN"), "MH2 · EN");
        assert_eq!(normalize_line("~|*"), "");
    }

    #[test]
    fn test_name_is_first_surviving_line() {
        let identity = parse_identity(&["@@", "  ", "Counterspell", "Instant"], &NONE);
        assert_eq!(identity.name, "Counterspell");
    }

    #[test]
    fn test_empty_input() {
        let identity = parse_identity(&NONE, &NONE);
        assert_eq!(identity, ParsedIdentity::default());
    }

    #[test]
    fn test_footer_set_and_number() {
        let identity = parse_identity(&["Lightning Bolt"], &["100 R", "MH2 · EN  Illus. Artist"]);
        assert_eq!(identity.collector_number, "100");
        assert_eq!(identity.set_code, "MH2");
        assert_eq!(identity.raw_footer_text, "100 R MH2 · EN  ILLUS ARTIST");
    }

    #[test]
    fn test_lowercase_footer_is_upcased() {
        let identity = parse_identity(&NONE, &["0042 dmu en"]);
        assert_eq!(identity.collector_number, "0042");
        assert_eq!(identity.set_code, "DMU");
    }

    #[test]
    fn test_language_code_only() {
        let identity = parse_identity(&NONE, &["EN"]);
        assert_eq!(identity.set_code, "");
        assert_eq!(identity.collector_number, "");
    }

    #[test]
    fn test_numeric_tokens_are_not_set_codes() {
        let identity = parse_identity(&NONE, &["1234 567 ONE"]);
        assert_eq!(identity.collector_number, "1234");
        assert_eq!(identity.set_code, "ONE");
    }

    #[test]
    fn test_long_numbers_are_not_collector_numbers() {
        let identity = parse_identity(&NONE, &["12345 ABC"]);
        assert_eq!(identity.collector_number, "");
        assert_eq!(identity.set_code, "ABC");
    }

    #[test]
    fn test_first_qualifying_set_code_wins() {
        let identity = parse_identity(&NONE, &["7 2X2 NEO"]);
        assert_eq!(identity.set_code, "2X2");
    }

    #[test]
    fn test_absent_number_with_set_code() {
        let identity = parse_identity(&["Opt"], &["ELD"]);
        assert_eq!(identity.name, "Opt");
        assert_eq!(identity.set_code, "ELD");
        assert!(identity.collector_number.is_empty());
    }
}
