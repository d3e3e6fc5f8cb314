//! Identifier recognition for free-text search queries
//!
//! A new-search request body is a free-text string that may contain one or
//! more bibliographic identifiers (DOI, ISBN, ISSN, PubMed ID). Recognition
//! is regex-based, with checksum validation where the format defines one.

use once_cell::sync::Lazy;
use regex::Regex;

/// A recognized bibliographic identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Digital Object Identifier, e.g. `10.1234/abcd.5678`
    Doi(String),
    /// ISBN-10 or ISBN-13, normalized to bare digits (checksum-validated)
    Isbn(String),
    /// ISSN in `NNNN-NNNC` form (check digit validated)
    Issn(String),
    /// PubMed ID (a bare digit string)
    Pmid(String),
}

static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10\.\d{4,9}/[^\s\x00\x22<>]+").unwrap());

static ISSN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}-\d{3}[\dXx]\b").unwrap());

// ISBN candidates: 10 or 13 digits, possibly hyphen/space separated, X check
// digit allowed for ISBN-10. Validation happens after stripping separators.
static ISBN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[\d][\d\- ]{8,16}[\dXx]\b").unwrap());

/// Extract every recognizable identifier from a free-text query.
///
/// DOIs are matched first; ISBN and ISSN candidates are checksum-validated
/// before being accepted. A query consisting solely of digits (fewer than
/// ten) is treated as a PubMed ID, matching common search-box usage.
pub fn extract_identifiers(text: &str) -> Vec<Identifier> {
    let mut found = Vec::new();

    for m in DOI_RE.find_iter(text) {
        // Strip punctuation that commonly trails a DOI pasted out of prose
        let doi = m.as_str().trim_end_matches(['.', ',', ';', ')', ']']);
        found.push(Identifier::Doi(doi.to_string()));
    }

    for m in ISBN_RE.find_iter(text) {
        let digits: String = m
            .as_str()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let valid = match digits.len() {
            10 => valid_isbn10(&digits),
            13 => valid_isbn13(&digits),
            _ => false,
        };
        if valid {
            found.push(Identifier::Isbn(digits.to_uppercase()));
        }
    }

    for m in ISSN_RE.find_iter(text) {
        let issn = m.as_str().to_uppercase();
        if valid_issn(&issn) {
            found.push(Identifier::Issn(issn));
        }
    }

    let trimmed = text.trim();
    if found.is_empty()
        && !trimmed.is_empty()
        && trimmed.len() < 10
        && trimmed.bytes().all(|b| b.is_ascii_digit())
    {
        found.push(Identifier::Pmid(trimmed.to_string()));
    }

    found
}

fn digit_value(c: char) -> Option<u32> {
    c.to_digit(10)
}

fn valid_isbn10(s: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in s.chars().enumerate() {
        let value = if i == 9 && (c == 'X' || c == 'x') {
            10
        } else {
            match digit_value(c) {
                Some(d) => d,
                None => return false,
            }
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

fn valid_isbn13(s: &str) -> bool {
    if !s.starts_with("978") && !s.starts_with("979") {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in s.chars().enumerate() {
        let d = match digit_value(c) {
            Some(d) => d,
            None => return false,
        };
        sum += d * if i % 2 == 0 { 1 } else { 3 };
    }
    sum % 10 == 0
}

fn valid_issn(s: &str) -> bool {
    let digits: Vec<char> = s.chars().filter(|c| *c != '-').collect();
    if digits.len() != 8 {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in digits.iter().take(7).enumerate() {
        let d = match digit_value(*c) {
            Some(d) => d,
            None => return false,
        };
        sum += d * (8 - i as u32);
    }
    let check = (11 - sum % 11) % 11;
    let last = digits[7];
    if check == 10 {
        last == 'X'
    } else {
        last.to_digit(10) == Some(check)
    }
}
