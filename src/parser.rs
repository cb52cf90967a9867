//! Customer lookup input parsing
//!
//! Turns free-text input ("SVI 089/258", "SV107", "charizard") into a typed
//! lookup request. Matching is priority-ordered; anything the grammar does not
//! recognize falls through to a name search.

use lazy_static::lazy_static;
use regex::Regex;

/// Parsed form of a customer lookup string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    /// Plain text, searched against card names
    NameSearch { query: String },
    /// Printed set abbreviation plus in-set number ("SVI 89")
    SetAndNumber { set_code: String, number: String },
    /// Number with an explicit set total but no set code ("4/102")
    BareNumber { number: String, total: String },
    /// Letter-prefixed number, e.g. a promo ("SV107", "SV107/SV122")
    PrefixedNumber { number: String, total: Option<String> },
}

lazy_static! {
    // "SV107/SV122" - same letter prefix on both sides of the slash
    static ref PREFIX_PAIR: Regex =
        Regex::new(r"^([A-Za-z]+)([0-9]+)\s*/\s*([A-Za-z]+)([0-9]+)$").unwrap();
    // "SVI 089/258" or "PAF GG07/GG70"
    static ref SET_NUMBER_TOTAL: Regex =
        Regex::new(r"^([A-Za-z0-9]+)\s+([A-Za-z]*)([0-9]+)\s*/\s*([A-Za-z]*)([0-9]+)$").unwrap();
    // "SVI 89" or "PAF GG07"
    static ref SET_NUMBER: Regex =
        Regex::new(r"^([A-Za-z0-9]+)\s+([A-Za-z]*)([0-9]+)$").unwrap();
    // "4/102"
    static ref BARE_PAIR: Regex = Regex::new(r"^([0-9]+)\s*/\s*([0-9]+)$").unwrap();
    // "SV107"
    static ref PREFIXED: Regex = Regex::new(r"^([A-Za-z]+)([0-9]+)$").unwrap();
    // letters prefix + digit run, for canonical number comparison
    static ref CANONICAL: Regex = Regex::new(r"^([A-Za-z]*)0*([0-9]+)$").unwrap();
}

/// Parse a lookup string into its typed form
pub fn parse(input: &str) -> ParsedInput {
    let input = input.trim();

    if let Some(c) = PREFIX_PAIR.captures(input) {
        if c[1].eq_ignore_ascii_case(&c[3]) {
            return ParsedInput::PrefixedNumber {
                number: format!("{}{}", c[1].to_uppercase(), &c[2]),
                total: Some(format!("{}{}", c[3].to_uppercase(), &c[4])),
            };
        }
    }

    if let Some(c) = SET_NUMBER_TOTAL.captures(input) {
        return ParsedInput::SetAndNumber {
            set_code: c[1].to_uppercase(),
            number: canonical_number(&format!("{}{}", &c[2], &c[3])),
        };
    }

    if let Some(c) = SET_NUMBER.captures(input) {
        return ParsedInput::SetAndNumber {
            set_code: c[1].to_uppercase(),
            number: canonical_number(&format!("{}{}", &c[2], &c[3])),
        };
    }

    if let Some(c) = BARE_PAIR.captures(input) {
        return ParsedInput::BareNumber {
            number: canonical_number(&c[1]),
            total: canonical_number(&c[2]),
        };
    }

    if let Some(c) = PREFIXED.captures(input) {
        return ParsedInput::PrefixedNumber {
            number: format!("{}{}", c[1].to_uppercase(), &c[2]),
            total: None,
        };
    }

    ParsedInput::NameSearch {
        query: input.to_string(),
    }
}

/// Canonical form of a card number for comparisons: upper-cased letter prefix,
/// leading zeros stripped from the digit run, never empty (minimum "0").
pub fn canonical_number(raw: &str) -> String {
    let raw = raw.trim();
    match CANONICAL.captures(raw) {
        Some(c) => format!("{}{}", c[1].to_uppercase(), &c[2]),
        None => raw.to_uppercase(),
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
