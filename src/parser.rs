use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::BufRead;
use std::path::Path;

use crate::error::Error;
use crate::model::{Entry, KeyParsingMode};

/// Parse `.env` text with strict key rules.
///
/// Malformed lines are skipped, so this never fails.
pub fn parse_str(input: &str) -> Vec<Entry> {
    parse_str_with_mode(input, KeyParsingMode::Strict)
}

pub fn parse_str_with_mode(input: &str, key_parsing_mode: KeyParsingMode) -> Vec<Entry> {
    parse_str_with_source(input, None, key_parsing_mode, false)
}

/// Like [`parse_str`], failing only when `input` is not UTF-8.
pub fn parse_bytes(input: &[u8]) -> Result<Vec<Entry>, std::str::Utf8Error> {
    parse_bytes_with_mode(input, KeyParsingMode::Strict)
}

pub fn parse_bytes_with_mode(
    input: &[u8],
    key_parsing_mode: KeyParsingMode,
) -> Result<Vec<Entry>, std::str::Utf8Error> {
    let text = std::str::from_utf8(input)?;
    Ok(parse_str_with_mode(text, key_parsing_mode))
}

/// Read `reader` to the end and parse it. Errors name the path `<reader>`.
pub fn parse_reader<R: BufRead>(mut reader: R) -> Result<Vec<Entry>, Error> {
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|err| Error::io("<reader>", err))?;
    parse_bytes(&buf).map_err(|source| Error::InvalidEncoding {
        path: "<reader>".into(),
        source,
    })
}

/// Why a statement was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Malformed {
    InvalidSyntax,
    MissingKey,
    InvalidKey,
    UnterminatedQuote,
}

impl Display for Malformed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSyntax => write!(f, "invalid syntax"),
            Self::MissingKey => write!(f, "missing key"),
            Self::InvalidKey => write!(f, "invalid key"),
            Self::UnterminatedQuote => write!(f, "unterminated quote"),
        }
    }
}

pub(crate) fn parse_str_with_source(
    input: &str,
    source: Option<&Path>,
    key_parsing_mode: KeyParsingMode,
    as_template: bool,
) -> Vec<Entry> {
    let normalized = normalize_newlines(input);
    let input = normalized.as_ref();

    let mut entries = Vec::new();
    let mut by_key = HashMap::<String, usize>::new();

    let mut offset = 0usize;
    let mut line_num = 1u32;
    let bytes = input.as_bytes();

    while offset < bytes.len() {
        let statement_start = offset;
        let statement_line = line_num;
        let mut idx = offset;
        let mut newline_count = 0u32;
        let mut active_quote: Option<u8> = None;
        let mut value_started = false;
        let mut value_quote_allowed = false;
        let is_comment = input[statement_start..]
            .trim_start_matches([' ', '\t'])
            .starts_with('#');

        while idx < bytes.len() {
            let byte = bytes[idx];

            if byte == b'\n' {
                newline_count += 1;
                if active_quote.is_none() {
                    break;
                }
            } else if let Some(quote) = active_quote {
                if byte == quote && !is_escaped(bytes, idx) {
                    active_quote = None;
                }
            } else if !is_comment && !value_started && is_separator(bytes, idx, key_parsing_mode) {
                value_started = true;
                value_quote_allowed = true;
            } else if value_started {
                // Only a quote opening the value starts a quoted region.
                if value_quote_allowed && (byte == b'"' || byte == b'\'' || byte == b'`') {
                    active_quote = Some(byte);
                }
                if !byte.is_ascii_whitespace() {
                    value_quote_allowed = false;
                }
            }
            idx += 1;
        }

        // An unterminated quote swallows the rest of the input; rewind so
        // only its first line is skipped.
        if active_quote.is_some() {
            idx = input[statement_start..]
                .find('\n')
                .map(|pos| statement_start + pos)
                .unwrap_or(bytes.len());
            newline_count = u32::from(idx < bytes.len());
        }

        let statement = &input[statement_start..idx];
        match parse_line(
            statement,
            source,
            key_parsing_mode,
            as_template,
        ) {
            Ok(Some(mut entry)) => {
                entry.line = statement_line;
                if let Some(existing_idx) = by_key.get(&entry.key).copied() {
                    let previous = std::mem::replace(&mut entries[existing_idx], entry);
                    tracing::debug!(
                        key = %previous.key,
                        line = statement_line,
                        previous_line = previous.line,
                        "duplicate key, keeping last value"
                    );
                } else {
                    by_key.insert(entry.key.clone(), entries.len());
                    entries.push(entry);
                }
            }
            Ok(None) => {}
            Err((column, reason)) => {
                tracing::warn!(
                    file = %source.map(|path| path.display().to_string()).unwrap_or_default(),
                    line = statement_line,
                    column,
                    %reason,
                    "skipping malformed line"
                );
            }
        }

        if idx < bytes.len() && bytes[idx] == b'\n' {
            idx += 1;
        }
        line_num += newline_count;
        offset = idx;
    }

    entries
}

/// `\r\n` and lone `\r` both become `\n`.
fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if input.contains('\r') {
        Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(input)
    }
}

fn is_escaped(bytes: &[u8], idx: usize) -> bool {
    let backslashes = bytes[..idx]
        .iter()
        .rev()
        .take_while(|byte| **byte == b'\\')
        .count();
    backslashes % 2 == 1
}

/// `=` always separates key and value. In strict mode `KEY: value` is
/// accepted too, since strict keys can never contain a colon.
fn is_separator(bytes: &[u8], idx: usize, key_parsing_mode: KeyParsingMode) -> bool {
    match bytes[idx] {
        b'=' => true,
        b':' => {
            key_parsing_mode == KeyParsingMode::Strict
                && bytes
                    .get(idx + 1)
                    .is_some_and(|next| *next == b' ' || *next == b'\t')
        }
        _ => false,
    }
}

fn find_separator(working: &str, key_parsing_mode: KeyParsingMode) -> Option<usize> {
    let bytes = working.as_bytes();
    (0..bytes.len()).find(|idx| is_separator(bytes, *idx, key_parsing_mode))
}

type LineResult = Result<Option<Entry>, (u32, Malformed)>;

fn parse_line(
    line: &str,
    source: Option<&Path>,
    key_parsing_mode: KeyParsingMode,
    as_template: bool,
) -> LineResult {
    let mut working = line.trim_start();
    if working.is_empty() || working.starts_with('#') {
        return Ok(None);
    }

    if let Some(rest) = working.strip_prefix("export")
        && rest
            .chars()
            .next()
            .map(|ch| ch.is_whitespace())
            .unwrap_or(false)
    {
        working = rest.trim_start();
    }

    if working.is_empty() {
        return Err((1, Malformed::MissingKey));
    }

    let Some(sep_idx) = find_separator(working, key_parsing_mode) else {
        let column = working.chars().count() as u32 + 1;
        return Err((column, Malformed::InvalidSyntax));
    };

    let key = working[..sep_idx].trim_end();
    if key.is_empty() {
        return Err((1, Malformed::MissingKey));
    }
    if !is_valid_key(key, key_parsing_mode) {
        return Err((1, Malformed::InvalidKey));
    }

    let value_input = working[sep_idx + 1..].trim_start();
    let value_column = (line.len() - value_input.len()) as u32 + 1;
    let value = parse_value(value_input, value_column, as_template)?;

    Ok(Some(Entry {
        key: key.to_owned(),
        value,
        source: source.map(Path::to_path_buf),
        line: 0,
    }))
}

fn parse_value(
    input: &str,
    column: u32,
    as_template: bool,
) -> Result<String, (u32, Malformed)> {
    if input.is_empty() {
        return Ok(String::new());
    }

    if input.starts_with('\'') {
        return parse_single_quoted(input, column, as_template);
    }
    if input.starts_with('"') {
        return parse_double_quoted(input, column, as_template);
    }
    if input.starts_with('`') {
        let parsed = parse_literal_quoted(input, '`', column)?;
        return Ok(if as_template {
            unquoted_template(&parsed)
        } else {
            parsed
        });
    }

    // Unquoted values end at the first `#`; quote a value that needs one.
    let value = input
        .split_once('#')
        .map_or(input, |(value, _)| value)
        .trim_end();
    Ok(if as_template {
        unquoted_template(value)
    } else {
        value.to_owned()
    })
}

fn parse_single_quoted(
    input: &str,
    column: u32,
    as_template: bool,
) -> Result<String, (u32, Malformed)> {
    let parsed = parse_literal_quoted(input, '\'', column)?;
    // Fully escaped so the expander leaves single-quoted text alone.
    Ok(if as_template {
        parsed.replace('\\', "\\\\").replace('$', "\\$")
    } else {
        parsed
    })
}

fn parse_literal_quoted(
    input: &str,
    quote: char,
    column: u32,
) -> Result<String, (u32, Malformed)> {
    let mut closing_idx = None;
    for (idx, ch) in input.char_indices().skip(1) {
        if ch == quote {
            if is_escaped(input.as_bytes(), idx) {
                continue;
            }
            closing_idx = Some(idx);
            break;
        }
    }

    let Some(end_idx) = closing_idx else {
        return Err((column, Malformed::UnterminatedQuote));
    };

    check_tail(input, end_idx, column)?;
    Ok(input[1..end_idx].to_owned())
}

fn parse_double_quoted(
    input: &str,
    column: u32,
    as_template: bool,
) -> Result<String, (u32, Malformed)> {
    let mut out = String::with_capacity(input.len().saturating_sub(2));
    let mut escaped = false;
    let mut closing_idx = None;

    for (idx, ch) in input.char_indices().skip(1) {
        if escaped {
            let unescaped = match ch {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                '\\' | '$' if as_template => {
                    out.push('\\');
                    ch
                }
                _ => ch,
            };
            out.push(unescaped);
            escaped = false;
            continue;
        }

        match ch {
            '\\' => escaped = true,
            '"' => {
                closing_idx = Some(idx);
                break;
            }
            _ => out.push(ch),
        }
    }

    let Some(end_idx) = closing_idx else {
        return Err((column, Malformed::UnterminatedQuote));
    };

    check_tail(input, end_idx, column)?;
    Ok(out)
}

/// Expansion templates read `\\` as a backslash and `\$` as a dollar sign.
/// A `\$` written in an unquoted value stays an escape; every other
/// backslash is doubled so it survives expansion.
fn unquoted_template(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek() != Some(&'$') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn check_tail(input: &str, end_idx: usize, column: u32) -> Result<(), (u32, Malformed)> {
    let tail = input[end_idx + 1..].trim_start();
    if !tail.is_empty() && !tail.starts_with('#') {
        return Err((column + end_idx as u32 + 1, Malformed::InvalidSyntax));
    }
    Ok(())
}

fn is_valid_key(key: &str, key_parsing_mode: KeyParsingMode) -> bool {
    let allowed = |byte: u8| match key_parsing_mode {
        KeyParsingMode::Strict => {
            byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'-')
        }
        KeyParsingMode::Permissive => byte.is_ascii_graphic() && byte != b'=',
    };
    !key.is_empty() && key.bytes().all(allowed)
}
