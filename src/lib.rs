//! Check `.env` files.
//!
//! [`EnvLoader`] resolves a path, directory or glob pattern (or the nearest
//! `.env` above the working directory), parses each file, and expands
//! `${VAR}` references against the file itself and a [`HostEnv`] snapshot.
//! [`Reporter`] prints the result as JSON, as dotenv text, or as a
//! per-file key check.
//!
//! Nothing here mutates the process environment.

mod env;
mod error;
mod expand;
mod loader;
mod model;
mod parser;
mod report;
mod resolver;

pub use env::HostEnv;
pub use error::Error;
pub use expand::{expand, expand_str};
pub use loader::{EnvLoader, LoadReport, from_pattern};
pub use model::{Entry, EnvFile, KeyLookup, KeyParsingMode, SubstitutionMode};
pub use parser::{parse_bytes, parse_bytes_with_mode, parse_reader, parse_str, parse_str_with_mode};
pub use report::{OutputFormat, Reporter, render_dotenv, render_json, render_lookup};
pub use resolver::{DEFAULT_FILE, find_upward, resolve_paths};
