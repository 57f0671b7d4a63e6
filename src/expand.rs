//! Variable expansion for parsed entries.
//!
//! References are resolved against the other entries of the same file
//! first and the [`HostEnv`] second. Anything that cannot be resolved is
//! kept verbatim, so expansion never fails.

use std::collections::{HashMap, HashSet};

use crate::env::HostEnv;
use crate::model::Entry;

/// Expand `$VAR`, `${VAR}` and `${VAR:-default}` references in place.
///
/// `\$` produces a literal `$` and `\\` a literal backslash. Every entry
/// that takes part in a reference cycle keeps its value as written,
/// whatever order the entries appear in.
pub fn expand(entries: &mut [Entry], host: &HostEnv) {
    let mut resolver = SubstitutionResolver::new(entries, host);
    for entry in entries.iter_mut() {
        entry.value = resolver.resolve_entry(&entry.key);
    }
}

/// Expand a single template against `host` only. `\$` and `\\` are
/// escapes here too.
pub fn expand_str(input: &str, host: &HostEnv) -> String {
    let mut resolver = SubstitutionResolver::new(&[], host);
    resolver.expand_value(input, &mut Vec::new())
}

struct SubstitutionResolver<'a> {
    raw_values: HashMap<String, String>,
    resolved_values: HashMap<String, String>,
    cyclic: HashSet<String>,
    host: &'a HostEnv,
}

impl<'a> SubstitutionResolver<'a> {
    fn new(entries: &[Entry], host: &'a HostEnv) -> Self {
        let raw_values = entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect();

        Self {
            raw_values,
            resolved_values: HashMap::new(),
            cyclic: HashSet::new(),
            host,
        }
    }

    fn resolve_entry(&mut self, key: &str) -> String {
        self.resolve_key(key, &mut Vec::new()).unwrap_or_default()
    }

    fn resolve_key(&mut self, key: &str, stack: &mut Vec<String>) -> Option<String> {
        if let Some(existing) = self.resolved_values.get(key) {
            return Some(existing.clone());
        }

        let Some(raw_value) = self.raw_values.get(key).cloned() else {
            return self.host.get_var(key).map(str::to_owned);
        };

        stack.push(key.to_owned());
        let expanded = self.expand_value(&raw_value, stack);
        stack.pop();

        // Cycle members are marked before their frames return, so a cached
        // value never depends on which key the walk started from.
        let value = if self.cyclic.contains(key) {
            unescape(&raw_value)
        } else {
            expanded
        };
        self.resolved_values.insert(key.to_owned(), value.clone());
        Some(value)
    }

    fn expand_value(&mut self, raw_value: &str, stack: &mut Vec<String>) -> String {
        expand_template(raw_value, |placeholder| {
            self.resolve_placeholder(placeholder, stack)
        })
    }

    fn resolve_placeholder(
        &mut self,
        placeholder: &Placeholder<'_>,
        stack: &mut Vec<String>,
    ) -> String {
        let name = placeholder.name;
        let value = if let Some(start) = stack.iter().position(|item| item == name) {
            tracing::debug!(%name, "cyclic reference left unexpanded");
            self.cyclic.extend(stack[start..].iter().cloned());
            None
        } else {
            self.resolve_key(name, stack)
        };

        match (value, placeholder.default) {
            (Some(value), Some(_)) if !value.is_empty() => value,
            (Some(value), None) => value,
            (_, Some(default)) => self.expand_value(default, stack),
            (None, None) => {
                tracing::debug!(%name, "unresolved reference left as written");
                placeholder.token.to_owned()
            }
        }
    }
}

/// A template's text with escapes removed and references left as written.
fn unescape(template: &str) -> String {
    expand_template(template, |placeholder| placeholder.token.to_owned())
}

struct Placeholder<'s> {
    name: &'s str,
    default: Option<&'s str>,
    token: &'s str,
}

fn expand_template<F>(input: &str, mut resolve: F) -> String
where
    F: FnMut(&Placeholder<'_>) -> String,
{
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0usize;
    let mut idx = 0usize;
    let bytes = input.as_bytes();

    while idx < bytes.len() {
        if bytes[idx] == b'\\'
            && let Some(&next @ (b'$' | b'\\')) = bytes.get(idx + 1)
        {
            out.push_str(&input[cursor..idx]);
            out.push(char::from(next));
            idx += 2;
            cursor = idx;
            continue;
        }

        if bytes[idx] != b'$' {
            idx += 1;
            continue;
        }

        let Some((placeholder, token_end)) = parse_placeholder(input, idx) else {
            idx += 1;
            continue;
        };

        out.push_str(&input[cursor..idx]);
        out.push_str(&resolve(&placeholder));

        cursor = token_end;
        idx = token_end;
    }

    out.push_str(&input[cursor..]);
    out
}

fn parse_placeholder(input: &str, start: usize) -> Option<(Placeholder<'_>, usize)> {
    let bytes = input.as_bytes();
    if start + 1 >= bytes.len() {
        return None;
    }

    if bytes[start + 1] == b'{' {
        let body_start = start + 2;
        let body_end = find_closing_brace(bytes, body_start)?;
        let body = &input[body_start..body_end];

        let (name, default) = match body.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };
        if name.is_empty() || !name.bytes().all(is_braced_var_char) {
            return None;
        }

        let token_end = body_end + 1;
        return Some((
            Placeholder {
                name,
                default,
                token: &input[start..token_end],
            },
            token_end,
        ));
    }

    let name_start = start + 1;
    if !is_unbraced_var_start(bytes[name_start]) {
        return None;
    }

    let mut name_end = name_start + 1;
    while name_end < bytes.len() && is_unbraced_var_char(bytes[name_end]) {
        name_end += 1;
    }

    Some((
        Placeholder {
            name: &input[name_start..name_end],
            default: None,
            token: &input[start..name_end],
        },
        name_end,
    ))
}

/// Defaults may nest further `${...}` references.
fn find_closing_brace(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in bytes[from..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' if depth == 0 => return Some(from + offset),
            b'}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn is_braced_var_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' || byte == b'-'
}

fn is_unbraced_var_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_unbraced_var_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}
