use std::io::{self, Write};

use colored::Colorize;

use crate::model::{EnvFile, KeyLookup};

/// How a whole file is printed when no key is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Pretty JSON object, two-space indent, keys in parse order.
    #[default]
    Json,
    /// `KEY="value"` lines that parse back to the same entries.
    Dotenv,
}

/// Writes per-file results to an output stream.
#[derive(Debug)]
pub struct Reporter<W> {
    out: W,
    format: OutputFormat,
    color: bool,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            color: false,
        }
    }

    /// Highlight key lookup paths. The `colored` global override still
    /// applies on top of this.
    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print every resolved entry of `file`.
    pub fn report_file(&mut self, file: &EnvFile) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let rendered = render_json(file).map_err(io::Error::other)?;
                writeln!(self.out, "{rendered}")
            }
            OutputFormat::Dotenv => write!(self.out, "{}", render_dotenv(file)),
        }
    }

    /// Print whether `key` is defined in `file`.
    pub fn report_key(&mut self, file: &EnvFile, key: &str) -> io::Result<bool> {
        let lookup = file.lookup(key);
        writeln!(self.out, "{}", render_lookup(&lookup, self.color))?;
        Ok(lookup.is_found())
    }
}

pub fn render_json(file: &EnvFile) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&file.to_map())
}

pub fn render_dotenv(file: &EnvFile) -> String {
    let mut out = String::new();
    for entry in &file.entries {
        out.push_str(&entry.key);
        out.push_str("=\"");
        push_escaped(&mut out, &entry.value);
        out.push_str("\"\n");
    }
    out
}

/// `<path>: KEY=value` with a green path, or `<path>: KEY not found` with a
/// red one.
pub fn render_lookup(lookup: &KeyLookup<'_>, color: bool) -> String {
    match lookup {
        KeyLookup::Found { path, key, value } => {
            let label = format!("{}:", path.display());
            let label = if color {
                label.green().to_string()
            } else {
                label
            };
            format!("{label} {key}={value}")
        }
        KeyLookup::NotFound { path, key } => {
            let label = format!("{}:", path.display());
            let label = if color { label.red().to_string() } else { label };
            format!("{label} {key} not found")
        }
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' => out.push_str("\\$"),
            _ => out.push(ch),
        }
    }
}
