//! Field splitting: one physical line into an ordered sequence of raw
//! field strings, per the resolved splitting strategy.

/// Concrete splitting strategy for delimited lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Quote-aware tokenization on a single delimiter character.
    Char(char),
    /// Literal substring split on a multi-character token.
    Token(String),
}

pub fn split_line(line: &str, strategy: &SplitStrategy) -> Vec<String> {
    match strategy {
        SplitStrategy::Char(delimiter) => split_quoted(line, *delimiter),
        SplitStrategy::Token(token) => line
            .split(token.as_str())
            .map(|field| strip_quotes(field.trim()).to_string())
            .collect(),
    }
}

/// Rejoins fields with the strategy's delimiter. The inverse of
/// [`split_line`] for fields free of quoting edge cases.
pub fn join_fields(fields: &[String], strategy: &SplitStrategy) -> String {
    let separator = match strategy {
        SplitStrategy::Char(delimiter) => delimiter.to_string(),
        SplitStrategy::Token(token) => token.clone(),
    };
    fields.join(&separator)
}

/// Single-character tokenization with double-quote grouping: a delimiter
/// inside a quoted region does not split, and a doubled quote inside a
/// quoted region is a literal quote.
fn split_quoted(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                current.push('"');
                chars.next();
            } else {
                in_quotes = !in_quotes;
                current.push('"');
            }
        } else if ch == delimiter && !in_quotes {
            fields.push(current);
            current = String::new();
        } else {
            current.push(ch);
        }
    }
    fields.push(current);

    fields
        .into_iter()
        .map(|field| strip_quotes(field.trim()).to_string())
        .collect()
}

/// Strips one outer quote pair, but only when the field is longer than two
/// characters and the first and last characters form a matching `""` or
/// `''` pair. Leaves single-character quoted fields intact.
fn strip_quotes(field: &str) -> &str {
    if field.len() > 2 {
        let bytes = field.as_bytes();
        let first = bytes[0];
        let last = bytes[field.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return &field[1..field.len() - 1];
        }
    }
    field
}
