use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

use crate::signal::EkgExport;

/// Parser settings for Apple Health EKG exports.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Header key whose value carries the sampling rate, e.g. `Messrate,"512 Hertz"`.
    pub rate_label: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            rate_label: "Messrate".into(),
        }
    }
}

/// Loose sample-line test: drop the first `.`, the first `,` and one leading
/// `-`, then require a non-empty run of ASCII digits.
pub fn is_numeric_line(line: &str) -> bool {
    let residue = remove_first(line, '.');
    let residue = remove_first(&residue, ',');
    let residue = residue.strip_prefix('-').unwrap_or(&residue);
    !residue.is_empty() && residue.bytes().all(|b| b.is_ascii_digit())
}

fn remove_first(text: &str, ch: char) -> String {
    match text.find(ch) {
        Some(pos) => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..pos]);
            out.push_str(&text[pos + ch.len_utf8()..]);
            out
        }
        None => text.to_string(),
    }
}

/// Parse an export with the default `Messrate` label.
pub fn parse_apple_watch_csv(text: &str) -> EkgExport {
    parse_apple_watch_csv_with(text, &ParserOptions::default())
}

/// Split an export into header metadata, samples and sampling rate.
///
/// Never fails: every line either becomes a sample, becomes a metadata entry,
/// or is dropped. An export without samples yields an empty signal.
pub fn parse_apple_watch_csv_with(text: &str, options: &ParserOptions) -> EkgExport {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rate_label = options.rate_label.to_lowercase();
    let mut export = EkgExport::default();
    for line in text.split(is_line_break) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_numeric_line(trimmed) {
            let normalized = trimmed.replace(',', ".");
            match normalized.parse::<f64>() {
                Ok(value) => export.signal.push(value),
                Err(_) => debug!("dropping undecodable sample {:?}", trimmed),
            }
        } else if let Some((key, value)) = trimmed.split_once(',') {
            let key = key.trim();
            let value = strip_quotes(value.trim());
            if key.to_lowercase() == rate_label {
                match parse_rate(value) {
                    Some(fs) => export.sampling_rate = Some(fs),
                    None => debug!("ignoring unreadable sampling rate {:?}", value),
                }
            }
            export.metadata.insert(key, value);
        }
    }
    export
}

/// Line boundaries recognised in exports: `\n`, `\r`, vertical tab, form
/// feed, the file/group/record separators, NEL and the Unicode line and
/// paragraph separators.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

fn strip_quotes(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

fn parse_rate(value: &str) -> Option<f64> {
    let token = value.split_whitespace().next()?;
    let fs: f64 = token.replace(',', ".").parse().ok()?;
    (fs.is_finite() && fs > 0.0).then_some(fs)
}

/// Read and parse an export from disk.
pub fn read_apple_watch_csv(path: &Path, options: &ParserOptions) -> Result<EkgExport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_apple_watch_csv_with(&text, options))
}
