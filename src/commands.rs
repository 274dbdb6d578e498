//! Command implementations for the storediff CLI

use crate::acquire::{acquire, pack_snapshot, DataSource};
use crate::cli::{Commands, OutputFormat};
use crate::error::{Result, StorediffError};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::create_spinner;
use crate::resolver::{compare_store_sets, CancelToken, DiffOptions};
use crate::server::{DiffServer, ServerConfig};
use crate::snapshot::DirStoreSet;
use crate::store::StoreSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exit code for a comparison that found divergence.
pub const EXIT_DIVERGED: i32 = 1;

/// Executes a command, returning the process exit code.
pub fn execute_command(command: Commands) -> Result<i32> {
    match command {
        Commands::Compare {
            left,
            right,
            version_left,
            version_right,
            at_version,
            limit,
            samples,
            shape,
            sequential,
            timeout,
            format,
            output,
        } => compare_command(CompareArgs {
            left,
            right,
            version_left: version_left.or(at_version),
            version_right: version_right.or(at_version),
            limit,
            samples,
            shape,
            sequential,
            timeout,
            format,
            output,
        }),
        Commands::Show {
            source,
            version,
            format,
        } => show_command(&source, version, &format),
        Commands::Pack { directory, archive } => pack_command(&directory, &archive),
        Commands::Serve {
            bind,
            limit,
            timeout,
        } => serve_command(bind, limit, timeout),
    }
}

struct CompareArgs {
    left: String,
    right: String,
    version_left: Option<i64>,
    version_right: Option<i64>,
    limit: usize,
    samples: usize,
    shape: bool,
    sequential: bool,
    timeout: Option<u64>,
    format: String,
    output: Option<PathBuf>,
}

/// Compare two snapshots; exit 0 when identical, 1 when divergent.
fn compare_command(args: CompareArgs) -> Result<i32> {
    let format = OutputFormat::parse(&args.format).map_err(StorediffError::invalid_input)?;

    let spinner = create_spinner("Acquiring snapshots...");
    let left_source = DataSource::parse(&args.left)?;
    let right_source = DataSource::parse(&args.right)?;
    let left_acquired = acquire(&left_source)?;
    let right_acquired = acquire(&right_source)?;
    spinner.finish_and_clear();

    let left_set = DirStoreSet::open(left_acquired.path(), args.version_left)?;
    let right_set = DirStoreSet::open(right_acquired.path(), args.version_right)?;
    log::info!(
        "left version: {}, right version: {}",
        left_set.version(),
        right_set.version()
    );

    let options = DiffOptions {
        key_diff_limit: args.limit,
        sample_keys: args.samples,
        shape_diff: args.shape,
        parallel: !args.sequential,
        ..DiffOptions::default()
    };
    let cancel = match args.timeout {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    let spinner = create_spinner("Comparing stores...");
    let report = compare_store_sets(&left_set, &right_set, options, &cancel)?;
    spinner.finish_and_clear();

    match format {
        OutputFormat::Pretty => PrettyPrinter::print_report(&report),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&report)?),
    }

    if let Some(path) = &args.output {
        std::fs::write(path, JsonFormatter::format(&report)?)?;
        log::info!("report written to {}", path.display());
    }

    Ok(if report.is_identical() { 0 } else { EXIT_DIVERGED })
}

/// Show a snapshot's stores and root hashes.
fn show_command(source: &str, version: Option<i64>, format: &str) -> Result<i32> {
    let format = OutputFormat::parse(format).map_err(StorediffError::invalid_input)?;

    let source = DataSource::parse(source)?;
    let acquired = acquire(&source)?;
    let set = DirStoreSet::open(acquired.path(), version)?;

    match format {
        OutputFormat::Pretty => PrettyPrinter::print_store_set(&set),
        OutputFormat::Json => println!("{}", JsonFormatter::format_store_set(&set)?),
    }

    Ok(0)
}

/// Pack a snapshot directory into an archive.
fn pack_command(directory: &Path, archive: &Path) -> Result<i32> {
    pack_snapshot(directory, archive)?;
    println!("📦 Packed {} into {}", directory.display(), archive.display());
    Ok(0)
}

/// Run the HTTP comparison server until interrupted.
fn serve_command(bind: std::net::SocketAddr, limit: usize, timeout: u64) -> Result<i32> {
    let config = ServerConfig {
        bind_addr: bind,
        key_diff_limit: limit,
        request_timeout_secs: timeout,
    };
    let server = DiffServer::new(config);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(0)
}
