use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use testenv::{
    DEFAULT_FILE, EnvLoader, Error, HostEnv, KeyParsingMode, OutputFormat, Reporter,
    SubstitutionMode,
};

const LOG_ENV: &str = "TESTENV_LOG";

/// Test .env files: find them, parse them, expand ${VAR} references and print
/// the result.
#[derive(Debug, Parser)]
#[command(name = "testenv", version, disable_version_flag = true)]
struct Cli {
    /// Path to a .env file, a directory containing one, or a glob pattern.
    /// Without it the nearest .env in this or a parent directory is used.
    path: Option<String>,

    /// Key to check. Without it every key is printed.
    key: Option<String>,

    /// Print version
    #[arg(short = 'v', visible_short_alias = 'V', long, action = ArgAction::Version)]
    version: (),

    /// Output format for whole-file dumps
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Keep ${VAR} references as written
    #[arg(long)]
    no_expand: bool,

    /// Do not fall back to this process's environment when expanding
    #[arg(long)]
    ignore_process_env: bool,

    /// Accept any printable ASCII key except `=`
    #[arg(long)]
    permissive_keys: bool,

    /// When to color key check results
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,

    /// Log more to stderr (repeat for more detail)
    #[arg(long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Dotenv,
}

impl From<Format> for OutputFormat {
    fn from(value: Format) -> Self {
        match value {
            Format::Json => OutputFormat::Json,
            Format::Dotenv => OutputFormat::Dotenv,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn enabled(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal(),
        }
    }
}

impl Cli {
    fn loader(&self, current_dir: PathBuf, host: HostEnv) -> EnvLoader {
        let loader = EnvLoader::new()
            .current_dir(current_dir)
            .substitution_mode(if self.no_expand {
                SubstitutionMode::Disabled
            } else {
                SubstitutionMode::Expand
            })
            .key_parsing_mode(if self.permissive_keys {
                KeyParsingMode::Permissive
            } else {
                KeyParsingMode::Strict
            })
            .host(host);

        match &self.path {
            Some(pattern) => loader.pattern(pattern.as_str()),
            None => loader,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("testenv: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // TESTENV_LOG, when set, replaces the verbosity-derived level.
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false)
                .with_target(false),
        )
        .init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let color = cli.color.enabled();
    colored::control::set_override(color);

    let current_dir = std::env::current_dir().context("failed to read current directory")?;
    let host = if cli.ignore_process_env {
        HostEnv::empty()
    } else {
        HostEnv::capture()
    };

    let report = match cli.loader(current_dir, host).load() {
        Ok(report) => report,
        Err(Error::NoEnvFile { pattern }) => {
            print_no_file(pattern.as_deref());
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    let stdout = io::stdout().lock();
    let mut reporter = Reporter::new(stdout, cli.format.into()).color(color);
    for outcome in &report.outcomes {
        match (outcome, &cli.key) {
            (Ok(file), Some(key)) => {
                reporter.report_key(file, key)?;
            }
            (Ok(file), None) => reporter.report_file(file)?,
            (Err(err), _) => {
                eprintln!("testenv: skipping {err}");
            }
        }
    }
    reporter
        .into_inner()
        .flush()
        .context("failed to flush stdout")?;

    if report.has_failures() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_no_file(pattern: Option<&str>) {
    let name = DEFAULT_FILE.red();
    match pattern {
        Some(pattern) => eprintln!("No {name} file found matching `{pattern}`"),
        None => eprintln!("No {name} file found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("testenv").chain(args.iter().copied()))
            .expect("parse should succeed")
    }

    #[test]
    fn defaults_use_discovery_and_expansion() {
        let cli = parse(&[]);
        assert_eq!(cli.path, None);
        assert_eq!(cli.key, None);
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.color, ColorMode::Auto);
        assert!(!cli.no_expand);
        assert!(!cli.ignore_process_env);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn positional_path_and_key() {
        let cli = parse(&["config/*.env", "DATABASE_URL"]);
        assert_eq!(cli.path.as_deref(), Some("config/*.env"));
        assert_eq!(cli.key.as_deref(), Some("DATABASE_URL"));
    }

    #[test]
    fn flags_map_onto_loader_settings() {
        let cli = parse(&[
            "--no-expand",
            "--permissive-keys",
            "--format",
            "dotenv",
            "--color",
            "never",
            "--verbose",
            "--verbose",
            ".env",
        ]);
        assert!(cli.no_expand);
        assert!(cli.permissive_keys);
        assert_eq!(OutputFormat::from(cli.format), OutputFormat::Dotenv);
        assert!(!cli.color.enabled());
        assert_eq!(cli.verbose, 2);

        let entries = cli
            .loader(PathBuf::from("."), HostEnv::empty())
            .parse_only("A:B=${X}\n", None);
        assert_eq!(entries[0].key, "A:B");
        assert_eq!(entries[0].value, "${X}");
    }

    #[test]
    fn version_flags_short_circuit() {
        for flag in ["-v", "-V", "--version"] {
            let err = Cli::try_parse_from(["testenv", flag]).expect_err("version exits early");
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        }
    }

    #[test]
    fn help_flag_short_circuits() {
        let err = Cli::try_parse_from(["testenv", "-h"]).expect_err("help exits early");
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
