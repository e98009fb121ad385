//! Native operator CLI
//!
//! Headless access to the same library and probability table the browser
//! board uses, backed by a directory of JSON blobs.

use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use thiserror::Error;

use crate::paths::{PathLibrary, ProbabilityError, ProbabilityTable};
use crate::persistence::{BlobStore, FileBlobStore};
use crate::recorder::{RecorderConfig, record_with_progress};
use crate::settings::{Settings, SettingsError};
use crate::sim::RowCount;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Probability(#[from] ProbabilityError),

    #[error("recording incomplete, buckets {unfilled:?} still need paths")]
    Unfilled { unfilled: Vec<usize> },
}

impl CliError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unfilled { .. } => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "plinko-replay",
    about = "Record and inspect Plinko drop paths",
    version
)]
pub struct Cli {
    /// Directory holding paths.json, probabilities.json and settings.json
    #[arg(long, default_value = "plinko-data", global = true)]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record paths until every bucket is filled.
    Record(RecordArgs),

    /// Show stored path counts per row count and bucket.
    Status,

    /// Delete stored paths.
    Clear(ClearArgs),

    /// Show or edit bucket weights.
    #[command(subcommand)]
    Probabilities(ProbabilityCommand),
}

#[derive(Debug, Clone, Args)]
pub struct RecordArgs {
    #[arg(long, default_value_t = 16)]
    pub rows: u32,

    /// Paths per bucket (defaults to the stored setting)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub paths: Option<u32>,

    /// RNG seed for drop jitter (defaults to the clock)
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub struct ClearArgs {
    /// Only clear this row count
    #[arg(long)]
    pub rows: Option<u32>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ProbabilityCommand {
    /// Print weights and shares
    Show {
        #[arg(long)]
        rows: Option<u32>,
    },
    /// Replace the weights for one row count
    Set {
        #[arg(long)]
        rows: u32,
        /// One weight per bucket, comma separated
        #[arg(value_delimiter = ',', required = true, allow_negative_numbers = true)]
        weights: Vec<f64>,
    },
    /// Restore the default weights for every row count
    Reset,
}

fn parse_rows(rows: u32) -> Result<RowCount> {
    RowCount::from_rows(rows).ok_or(CliError::Settings(SettingsError::UnsupportedRows(rows)))
}

fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

struct Context {
    settings_path: PathBuf,
    settings: Settings,
    library: PathLibrary,
    probabilities: ProbabilityTable,
}

impl Context {
    fn open(data_dir: &std::path::Path) -> Self {
        let settings_path = data_dir.join("settings.json");
        let settings = Settings::load_from(&settings_path);
        let store: Rc<dyn BlobStore> = Rc::new(FileBlobStore::new(data_dir));
        let mut library = PathLibrary::new(store.clone(), settings.paths_per_bucket);
        library.ensure_loaded();
        let mut probabilities = ProbabilityTable::new(store);
        probabilities.load();
        Self {
            settings_path,
            settings,
            library,
            probabilities,
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli, &mut std::io::stdout().lock())
}

pub fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let mut ctx = Context::open(&cli.data_dir);
    match cli.command {
        Commands::Record(args) => run_record(&mut ctx, args, out),
        Commands::Status => run_status(&ctx, out),
        Commands::Clear(args) => {
            let rows = args.rows.map(parse_rows).transpose()?;
            ctx.library.clear(rows);
            match rows {
                Some(rows) => writeln!(out, "Cleared paths for {rows} rows")?,
                None => writeln!(out, "Cleared all paths")?,
            }
            Ok(())
        }
        Commands::Probabilities(cmd) => run_probabilities(&mut ctx, cmd, out),
    }
}

fn run_record(ctx: &mut Context, args: RecordArgs, out: &mut dyn Write) -> Result<()> {
    let rows = parse_rows(args.rows)?;
    // An explicit target becomes the stored cap for later runs and the board
    let paths = match args.paths {
        Some(paths) => {
            ctx.settings.paths_per_bucket = paths as usize;
            ctx.settings.save_to(&ctx.settings_path)?;
            ctx.library.set_cap(paths as usize);
            paths as usize
        }
        None => ctx.settings.paths_per_bucket,
    };
    let mut config = RecorderConfig::default();
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    let seed = args.seed.unwrap_or_else(clock_seed);
    log::info!("Recording {} rows, {} paths per bucket, seed {}", rows, paths, seed);

    let mut rng = Pcg32::seed_from_u64(seed);
    let report = record_with_progress(&mut ctx.library, rows, paths, &config, &mut rng, |tally| {
        log::info!("{}", tally.progress());
    });

    writeln!(
        out,
        "Recorded {} paths for {} rows in {} attempts ({} stalled)",
        report.accepted, rows, report.attempts, report.stalled
    )?;
    writeln!(out, "{}", ctx.library.status_line(rows))?;
    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::Unfilled {
            unfilled: report.unfilled,
        })
    }
}

fn run_status(ctx: &Context, out: &mut dyn Write) -> Result<()> {
    for stats in ctx.library.stats() {
        let ready = ctx
            .library
            .has_enough_paths(stats.rows, stats.rows.bucket_count());
        writeln!(
            out,
            "{:>2} rows: {} paths in {}/{} buckets{}",
            stats.rows.rows(),
            stats.total_paths,
            stats.buckets,
            stats.rows.bucket_count(),
            if ready { " (ready)" } else { "" }
        )?;
        writeln!(out, "  {}", ctx.library.status_line(stats.rows))?;
    }
    Ok(())
}

fn run_probabilities(ctx: &mut Context, cmd: ProbabilityCommand, out: &mut dyn Write) -> Result<()> {
    match cmd {
        ProbabilityCommand::Show { rows } => {
            let selected = match rows {
                Some(rows) => vec![parse_rows(rows)?],
                None => RowCount::ALL.to_vec(),
            };
            for rows in selected {
                let shares = ctx.probabilities.shares(rows);
                let line = ctx
                    .probabilities
                    .get(rows)
                    .iter()
                    .zip(&shares)
                    .enumerate()
                    .map(|(i, (w, s))| format!("B{}:{}({:.1}%)", i, w, s * 100.0))
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(out, "{:>2} rows: {}", rows.rows(), line)?;
            }
        }
        ProbabilityCommand::Set { rows, weights } => {
            let rows = parse_rows(rows)?;
            ctx.probabilities.set(rows, weights)?;
            writeln!(out, "Updated weights for {rows} rows")?;
        }
        ProbabilityCommand::Reset => {
            ctx.probabilities.reset();
            writeln!(out, "Weights reset to defaults")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("plinko-cli-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn exec(dir: &std::path::Path, args: &[&str]) -> (Result<()>, String) {
        let mut argv = vec!["plinko-replay", "--data-dir", dir.to_str().unwrap()];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let mut out = Vec::new();
        let result = run(cli, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_record_args() {
        let cli = Cli::try_parse_from(["plinko-replay", "record", "--rows", "8", "--paths", "2", "--seed", "7"])
            .unwrap();
        match cli.command {
            Commands::Record(args) => {
                assert_eq!(args.rows, 8);
                assert_eq!(args.paths, Some(2));
                assert_eq!(args.seed, Some(7));
                assert_eq!(args.max_attempts, None);
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_rows_rejected() {
        let dir = temp_dir("rows");
        let (result, _) = exec(&dir, &["record", "--rows", "10"]);
        assert!(matches!(
            result,
            Err(CliError::Settings(SettingsError::UnsupportedRows(10)))
        ));
    }

    #[test]
    fn test_record_then_status_and_clear() {
        let dir = temp_dir("record");
        let (result, out) = exec(
            &dir,
            &["record", "--rows", "8", "--paths", "1", "--seed", "3", "--max-attempts", "20000"],
        );
        assert!(result.is_ok(), "{out}");
        assert!(dir.join("paths.json").exists());

        let (_, status) = exec(&dir, &["status"]);
        assert!(status.contains(" 8 rows: 9 paths in 9/9 buckets (ready)"), "{status}");

        let (_, _) = exec(&dir, &["clear", "--rows", "8"]);
        let (_, status) = exec(&dir, &["status"]);
        assert!(status.contains(" 8 rows: 0 paths"), "{status}");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_probabilities_set_show_reset() {
        let dir = temp_dir("probs");
        let (result, _) = exec(
            &dir,
            &["probabilities", "set", "--rows", "8", "0,0,0,0,1,0,0,0,0"],
        );
        assert!(result.is_ok());
        let (_, shown) = exec(&dir, &["probabilities", "show", "--rows", "8"]);
        assert!(shown.contains("B4:1(100.0%)"), "{shown}");

        let (result, _) = exec(&dir, &["probabilities", "set", "--rows", "8", "1,2,3"]);
        assert!(matches!(result, Err(CliError::Probability(_))));

        exec(&dir, &["probabilities", "reset"]);
        let (_, shown) = exec(&dir, &["probabilities", "show", "--rows", "8"]);
        assert!(!shown.contains("B4:1(100.0%)"), "{shown}");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
