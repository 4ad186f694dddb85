//! `linkwise run|validate|unmatched`: config-driven record linkage.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

use linkwise_linkage::load::{load_csv_file, load_json_table, write_csv};
use linkwise_linkage::{
    KeyFunctions, LinkConfig, LinkError, MatchCriterion, MatchSummary, Matcher, Table,
};

use crate::exit_codes::{link_exit_code, EXIT_RUNTIME};
use crate::CliError;

#[derive(Subcommand)]
pub enum LinkCommands {
    /// Link the right table to the left table using the config's rules
    #[command(after_help = "\
Examples:
  linkwise run people.link.toml
  linkwise run people.link.toml --json
  linkwise run people.link.toml --unique --output matches.json")]
    Run {
        /// Path to the .link.toml config file
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides [output] json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Only the best match per record pair
        #[arg(long)]
        unique: bool,
    },

    /// Validate a config and its input files without matching
    #[command(after_help = "\
Examples:
  linkwise validate people.link.toml")]
    Validate {
        /// Path to the .link.toml config file
        config: PathBuf,
    },

    /// Print right records that no rule matched
    #[command(after_help = "\
Examples:
  linkwise unmatched people.link.toml
  linkwise unmatched people.link.toml --csv > unmatched.csv")]
    Unmatched {
        /// Path to the .link.toml config file
        config: PathBuf,

        /// Output CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },
}

pub fn cmd_link(cmd: LinkCommands) -> Result<(), CliError> {
    match cmd {
        LinkCommands::Run {
            config,
            json,
            output,
            unique,
        } => cmd_link_run(config, json, output, unique),
        LinkCommands::Validate { config } => cmd_link_validate(config),
        LinkCommands::Unmatched { config, csv } => cmd_link_unmatched(config, csv),
    }
}

fn link_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError {
        code,
        message: msg.into(),
        hint: None,
    }
}

impl From<LinkError> for CliError {
    fn from(err: LinkError) -> Self {
        let hint = match &err {
            LinkError::ColumnCollision { .. } => {
                Some("set `suffixes` in the config to a different pair".to_string())
            }
            LinkError::InvalidCriterion { .. } => {
                Some("rules are numbered from #0 in [[rules]] order".to_string())
            }
            LinkError::DuplicateKey { .. } | LinkError::NullKey { .. } => {
                Some("the key field must hold a unique, non-empty value per record".to_string())
            }
            _ => None,
        };
        CliError {
            code: link_exit_code(&err),
            message: err.to_string(),
            hint,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

struct Loaded {
    config: LinkConfig,
    base_dir: PathBuf,
    matcher: Matcher,
    criteria: Vec<MatchCriterion>,
}

fn load_table(path: &Path) -> Result<Table, LinkError> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        let data = std::fs::read_to_string(path)
            .map_err(|e| LinkError::Io(format!("{}: {e}", path.display())))?;
        load_json_table(&data)
    } else {
        load_csv_file(path)
    }
}

fn load(config_path: &Path) -> Result<Loaded, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| link_err(EXIT_RUNTIME, format!("cannot read config: {e}")))?;
    let config = LinkConfig::from_toml(&config_str)?;
    let criteria = config.resolve_rules(&KeyFunctions::new())?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let left_path = config.left.path(&base_dir);
    let right_path = config.right.path(&base_dir);
    log::info!("loading {} and {}", left_path.display(), right_path.display());
    let left = load_table(&left_path)?;
    let right = load_table(&right_path)?;

    let matcher = Matcher::new(left, &config.left.key, right, &config.right.key)?
        .with_suffixes(config.suffixes());
    matcher.check_fields(&criteria)?;

    Ok(Loaded {
        config,
        base_dir,
        matcher,
        criteria,
    })
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunOutput<'a> {
    name: &'a str,
    engine_version: &'static str,
    left_key: &'a str,
    right_key: &'a str,
    unique: bool,
    summary: &'a MatchSummary,
    matches: &'a Table,
}

fn cmd_link_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    unique: bool,
) -> Result<(), CliError> {
    let loaded = load(&config_path)?;
    let matcher = &loaded.matcher;

    let result = matcher.create_matches(&loaded.criteria)?;
    let summary = matcher.summary(&result)?;

    let output = RunOutput {
        name: &loaded.config.name,
        engine_version: env!("CARGO_PKG_VERSION"),
        left_key: result.left_key(),
        right_key: result.right_key(),
        unique,
        summary: &summary,
        matches: if unique {
            result.unique_matches()
        } else {
            result.matched_data()
        },
    };
    let json_str = serde_json::to_string_pretty(&output)
        .map_err(|e| link_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    let output_file = output_file.or_else(|| {
        loaded
            .config
            .output
            .json
            .as_ref()
            .map(|p| loaded.base_dir.join(p))
    });
    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| link_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    eprintln!(
        "link '{}': {} matches ({} unique), {} unmatched right record(s)",
        loaded.config.name,
        summary.total_matches,
        summary.unique_matches,
        summary.unmatched_right,
    );
    for rule in &summary.per_rule {
        eprintln!(
            "  rule #{} {} (type_id {}): {} match(es)",
            rule.rule, rule.method, rule.type_id, rule.matches
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_link_validate(config_path: PathBuf) -> Result<(), CliError> {
    let loaded = load(&config_path)?;
    let matcher = &loaded.matcher;
    eprintln!(
        "valid: '{}' with {} rule(s); {} left record(s) keyed by {}, {} right record(s) keyed by {}",
        loaded.config.name,
        loaded.criteria.len(),
        matcher.left().len(),
        matcher.left_key(),
        matcher.right().len(),
        matcher.right_key(),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// unmatched
// ---------------------------------------------------------------------------

fn cmd_link_unmatched(config_path: PathBuf, csv_output: bool) -> Result<(), CliError> {
    let loaded = load(&config_path)?;
    let matcher = &loaded.matcher;

    let result = matcher.create_matches(&loaded.criteria)?;
    let unmatched = matcher.unmatched(&result)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if csv_output {
        write_csv(&unmatched, &mut handle)?;
    } else {
        let json_str = serde_json::to_string_pretty(&unmatched)
            .map_err(|e| link_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;
        writeln!(handle, "{json_str}").map_err(|e| link_err(EXIT_RUNTIME, e.to_string()))?;
    }

    eprintln!(
        "{} of {} right record(s) unmatched",
        unmatched.len(),
        matcher.right().len()
    );
    Ok(())
}
