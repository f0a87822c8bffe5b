//! orgfile - organize files by date and remove proven duplicates.
//!
//! Paths are read from standard input, one per line. Every line produces one
//! action record on standard output; nothing changes on disk without
//! `--commit`.
//!
//! Usage:
//!   find /import -type f | orgfile move --target-dir ~/Photos
//!   find ~/Photos -type f | orgfile dedup --commit
//!   orgfile undo --commit < actions.log

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use orgfile_core::{Mode, OrgConfig, RuleSet, TimestampRule, DEFAULT_TEMPLATE};
use orgfile_ops::{undo_replayer, ActionRecord, RecordFormat, Session};

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "ORGFILE_LOG";

#[derive(Parser)]
#[command(
    name = "orgfile",
    version,
    about = "Organize files into a date-partitioned tree and remove proven duplicates",
    long_about = "orgfile reads file paths from standard input and decides, per path, \
                  where the file belongs and whether it duplicates content seen earlier.\n\n\
                  Runs are dry by default; pass --commit to touch the filesystem. The \
                  records written to standard output can be replayed with `orgfile undo`."
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Move files into TARGET_DIR/<date>/<name>
    Move {
        /// Root of the date-partitioned tree
        #[arg(short, long)]
        target_dir: PathBuf,

        /// strftime template for the date subdirectory
        #[arg(long, default_value = DEFAULT_TEMPLATE)]
        template: String,

        /// Timestamp rule as <parent|name>:<pattern>, in priority order
        #[arg(long = "rule", value_name = "APPLIES_TO:PATTERN")]
        rules: Vec<TimestampRule>,

        /// TOML file with [[rule]] entries
        #[arg(long = "rules", value_name = "FILE")]
        rules_file: Option<PathBuf>,

        #[command(flatten)]
        hashing: HashArgs,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Delete files whose content was already seen earlier in the input
    Dedup {
        /// Only paths matching this glob may be deleted
        #[arg(long)]
        filter: Option<String>,

        #[command(flatten)]
        hashing: HashArgs,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Reverse actions from records read on standard input
    Undo {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Apply changes (default is a dry run)
    #[arg(short, long)]
    commit: bool,

    /// Output format for action records
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args)]
struct HashArgs {
    /// External hashing command fed the file on stdin (e.g. "sha1sum")
    #[arg(long, value_name = "COMMAND")]
    hash_command: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<OutputFormat> for RecordFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => RecordFormat::Text,
            OutputFormat::Json => RecordFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(command) = cli.command else {
        return Err(eyre!("please specify a command (move, dedup or undo)"));
    };

    match command {
        Command::Move {
            target_dir,
            template,
            rules,
            rules_file,
            hashing,
            common,
        } => {
            let config = OrgConfig::builder()
                .mode(Mode::Move)
                .target_dir(Some(target_dir))
                .template(template)
                .rules(rule_set(rules, rules_file.as_deref())?)
                .hash_command(hashing.hash_command)
                .commit(common.commit)
                .build()
                .wrap_err("Invalid configuration")?;
            run_pipeline(&config, common.format.into())
        }
        Command::Dedup {
            filter,
            hashing,
            common,
        } => {
            let config = OrgConfig::builder()
                .mode(Mode::Dedup)
                .dedup_filter(filter)
                .hash_command(hashing.hash_command)
                .commit(common.commit)
                .build()
                .wrap_err("Invalid configuration")?;
            run_pipeline(&config, common.format.into())
        }
        Command::Undo { common } => {
            let config = OrgConfig::builder()
                .mode(Mode::Undo)
                .commit(common.commit)
                .build()
                .wrap_err("Invalid configuration")?;
            run_undo(&config, common.format.into())
        }
    }
}

/// Install the stderr log subscriber.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

/// Rules given on the command line come first, then rules from the file.
/// Without either, the built-in rules apply.
fn rule_set(rules: Vec<TimestampRule>, file: Option<&Path>) -> Result<RuleSet> {
    let Some(file) = file else {
        return Ok(if rules.is_empty() {
            RuleSet::default()
        } else {
            RuleSet::new(rules)
        });
    };

    let mut set = RuleSet::new(rules);
    for rule in RuleSet::load(file)?.into_vec() {
        set.push(rule);
    }
    Ok(set)
}

/// Run the move or dedup pipeline over standard input.
fn run_pipeline(config: &OrgConfig, format: RecordFormat) -> Result<()> {
    let mut session = Session::from_config(config)?;
    if !config.commit {
        info!("dry run; pass --commit to apply changes");
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    // Raw bytes, so paths that are not valid UTF-8 still reach the session.
    for line in stdin.lock().split(b'\n') {
        let line = line.context("Failed to read standard input")?;
        if let Some(execution) = session.process_bytes(&line) {
            write_record(&mut out, &execution.record, format)?;
        }
    }

    let summary = session.summary();
    info!("{}", summary.summary());
    if !summary.is_success() {
        warn!(failed = summary.failed, "some actions failed");
    }
    Ok(())
}

/// Replay records from standard input backwards.
fn run_undo(config: &OrgConfig, format: RecordFormat) -> Result<()> {
    let lines = io::stdin()
        .lock()
        .split(b'\n')
        .collect::<io::Result<Vec<_>>>()
        .context("Failed to read standard input")?;

    let report = undo_replayer(config).replay(&lines);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in &report.records {
        write_record(&mut out, record, format)?;
    }

    info!("{}", report.summary());
    if !report.is_complete_success() {
        warn!(
            failed = report.failed.len(),
            malformed = report.malformed,
            "undo incomplete"
        );
    }
    Ok(())
}

fn write_record(out: &mut impl Write, record: &ActionRecord, format: RecordFormat) -> Result<()> {
    writeln!(out, "{}", record.render(format)).context("Failed to write record")
}
