//! Delimiter-specifier resolution and sniffing.
//!
//! A specifier is either empty (sniff against a sample), a named alias
//! (`csv`, `tab`, `pipe`, ...), a single arbitrary character, a
//! multi-character literal token, or a structured-format keyword (`json`,
//! `parquet`).

use std::path::Path;

use crate::{error::IngestError, split::SplitStrategy};

/// How an input file's rows are obtained and divided into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    /// Text lines split into fields.
    Delimited(SplitStrategy),
    /// One complete JSON record per physical line; no field splitting.
    JsonLines,
    /// Pre-parsed row objects from the columnar reader.
    Parquet,
}

impl Dialect {
    pub fn is_structured(&self) -> bool {
        !matches!(self, Dialect::Delimited(_))
    }

    /// Display form used in log lines.
    pub fn describe(&self) -> String {
        match self {
            Dialect::Delimited(SplitStrategy::Char('\t')) => "\\t".to_string(),
            Dialect::Delimited(SplitStrategy::Char(c)) => c.to_string(),
            Dialect::Delimited(SplitStrategy::Token(t)) => t.clone(),
            Dialect::JsonLines => "json".to_string(),
            Dialect::Parquet => "parquet".to_string(),
        }
    }
}

/// Maps a non-empty delimiter specifier to a dialect. Aliases are
/// case-insensitive; anything longer than one character that is not an
/// alias or format keyword becomes a literal multi-character token.
pub fn parse_spec(spec: &str) -> Option<Dialect> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    let strategy = match lowered.as_str() {
        "csv" | "comma" | "," => SplitStrategy::Char(','),
        "tab" | "tsv" | "\t" | "\\t" => SplitStrategy::Char('\t'),
        "pipe" | "|" => SplitStrategy::Char('|'),
        "json" | "jsonl" => return Some(Dialect::JsonLines),
        "parquet" => return Some(Dialect::Parquet),
        _ => {
            let mut chars = trimmed.chars();
            let first = chars.next().expect("non-empty specifier");
            if chars.next().is_none() {
                SplitStrategy::Char(first)
            } else {
                SplitStrategy::Token(trimmed.to_string())
            }
        }
    };
    Some(Dialect::Delimited(strategy))
}

/// File-extension default used when no specifier is given: structured
/// formats are recognized by suffix, everything else is sniffed as text.
pub fn dialect_for_extension(path: &Path) -> Option<Dialect> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("parquet") => Some(Dialect::Parquet),
        Some(ext) if ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("jsonl") => {
            Some(Dialect::JsonLines)
        }
        _ => None,
    }
}

const SNIFF_CANDIDATES: &[char] = &[',', '|', '\t'];

/// Examines the first non-empty line of a sample and returns the first
/// candidate delimiter that divides it into at least two fields. Only the
/// header line is consulted; data rows may quote delimiters and would
/// skew a whole-sample count.
pub fn sniff(sample: &str) -> Result<Dialect, IngestError> {
    let line = sample
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or(IngestError::DialectUnresolved)?;
    SNIFF_CANDIDATES
        .iter()
        .find(|candidate| line.contains(**candidate))
        .map(|candidate| Dialect::Delimited(SplitStrategy::Char(*candidate)))
        .ok_or(IngestError::DialectUnresolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_aliases_resolve() {
        assert_eq!(
            parse_spec("CSV"),
            Some(Dialect::Delimited(SplitStrategy::Char(',')))
        );
        assert_eq!(
            parse_spec("tsv"),
            Some(Dialect::Delimited(SplitStrategy::Char('\t')))
        );
        assert_eq!(
            parse_spec("pipe"),
            Some(Dialect::Delimited(SplitStrategy::Char('|')))
        );
        assert_eq!(
            parse_spec("\\t"),
            Some(Dialect::Delimited(SplitStrategy::Char('\t')))
        );
    }

    #[test]
    fn structured_keywords_resolve() {
        assert_eq!(parse_spec("json"), Some(Dialect::JsonLines));
        assert_eq!(parse_spec("PARQUET"), Some(Dialect::Parquet));
    }

    #[test]
    fn arbitrary_single_character() {
        assert_eq!(
            parse_spec(";"),
            Some(Dialect::Delimited(SplitStrategy::Char(';')))
        );
    }

    #[test]
    fn multi_character_token() {
        assert_eq!(
            parse_spec("::"),
            Some(Dialect::Delimited(SplitStrategy::Token("::".into())))
        );
    }

    #[test]
    fn empty_spec_defers_to_sniffing() {
        assert_eq!(parse_spec(""), None);
        assert_eq!(parse_spec("   "), None);
    }

    #[test]
    fn sniffs_comma_pipe_and_tab() {
        assert_eq!(
            sniff("a,b,c\n1,2,3\n").unwrap(),
            Dialect::Delimited(SplitStrategy::Char(','))
        );
        assert_eq!(
            sniff("a|b\n1|2\n").unwrap(),
            Dialect::Delimited(SplitStrategy::Char('|'))
        );
        assert_eq!(
            sniff("a\tb\n1\t2\n").unwrap(),
            Dialect::Delimited(SplitStrategy::Char('\t'))
        );
    }

    #[test]
    fn candidate_order_breaks_ties() {
        // Both comma and pipe appear in the header; comma is tried first.
        assert_eq!(
            sniff("a,b|c\n").unwrap(),
            Dialect::Delimited(SplitStrategy::Char(','))
        );
    }

    #[test]
    fn leading_blank_lines_are_ignored() {
        assert_eq!(
            sniff("\n\na|b\n").unwrap(),
            Dialect::Delimited(SplitStrategy::Char('|'))
        );
    }

    #[test]
    fn unsniffable_sample_is_an_error() {
        assert!(matches!(
            sniff("single column\nno delimiters\n"),
            Err(IngestError::DialectUnresolved)
        ));
        assert!(matches!(sniff(""), Err(IngestError::DialectUnresolved)));
    }

    #[test]
    fn extension_defaults() {
        assert_eq!(
            dialect_for_extension(Path::new("rows.parquet")),
            Some(Dialect::Parquet)
        );
        assert_eq!(
            dialect_for_extension(Path::new("rows.jsonl")),
            Some(Dialect::JsonLines)
        );
        assert_eq!(dialect_for_extension(Path::new("rows.csv")), None);
    }
}
