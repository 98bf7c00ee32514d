//! I/O utilities: encoding resolution, byte-line decoding, and the
//! always-quoted CSV writer used for the statistics report.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

/// The `-` path convention routes output through stdout.
pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Decodes one raw line. A malformed byte sequence is an error rather than
/// a replacement character, so the row reader can count and skip the row.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Opens the report destination: a file path, or stdout for `None`/`-`.
/// Report output is always quoted for round-trip safety.
pub fn open_report_writer(path: Option<&Path>) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating report file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(b',')
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn utf8_is_the_default_encoding() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(
            resolve_encoding(Some("windows-1252")).unwrap(),
            WINDOWS_1252
        );
        assert!(resolve_encoding(Some("not-an-encoding")).is_err());
    }

    #[test]
    fn invalid_bytes_surface_as_errors() {
        assert!(decode_bytes(&[0xff, 0xfe, 0xfd], UTF_8).is_err());
        assert_eq!(decode_bytes(b"plain", UTF_8).unwrap(), "plain");
    }

    #[test]
    fn windows_1252_decodes_high_bytes() {
        let decoded = decode_bytes(&[b'C', b'a', b'f', 0xe9], WINDOWS_1252).unwrap();
        assert_eq!(decoded, "Caf\u{e9}");
    }
}
