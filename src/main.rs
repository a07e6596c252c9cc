//! archivizm - format identification and duplicate detection for storage media.
//!
//! Usage:
//!   archivizm scan PATH          Identify every file and summarize the collection
//!   archivizm duplicates PATH    Find files with identical content
//!   archivizm identify FILE...   Identify individual files
//!   archivizm export PATH        Scan and write results to CSV, XLSX or JSON
//!   archivizm settings show      Print the active settings
//!   archivizm --help             Show help

mod export;
mod logging;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use archivizm_analyze::{
    DuplicateConfig, DuplicateView, PipelineConfig, ScanPipeline, duplicate_rows, project_rows,
};
use archivizm_core::{
    DisplayedField, ScanConfig, ScanScope, ScanSession, Settings, ToolStatus, WarningKind,
};
use archivizm_identify::{FormatIdentifier, IdentifyConfig};
use archivizm_scan::ScanPhase;

#[derive(Parser)]
#[command(
    name = "archivizm",
    version,
    about = "Format identification and duplicate detection for storage media",
    long_about = "archivizm walks a directory or mounted device, identifies the format \
                  of every file (siegfried when installed, magic bytes and extensions \
                  otherwise) and finds files with identical content."
)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Identify every file under a path and show a summary
    Scan {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        walk: WalkArgs,

        /// Also look for duplicate files
        #[arg(short, long)]
        duplicates: bool,

        /// Print one row per file using the displayed fields
        #[arg(short, long)]
        list: bool,

        /// Number of format and extension rows to show
        #[arg(short = 'n', long, default_value = "15")]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Find files with identical content
    Duplicates {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        walk: WalkArgs,

        /// Minimum file size to consider (e.g., "1KB", "1MB")
        #[arg(short, long, default_value = "0")]
        min_size: String,

        /// Leave zero-byte files out (overrides the settings file)
        #[arg(long)]
        exclude_empty: bool,

        /// List every hashed file, not just the duplicated ones
        #[arg(short, long)]
        all: bool,

        /// Maximum number of groups to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Also write the listing to a .csv, .xlsx or .json file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Identify individual files
    Identify {
        /// Files to identify
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Never run the signature tool; use heuristics only
        #[arg(long)]
        no_tool: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Scan and write results to a file (.csv, .xlsx or .json)
    Export {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        walk: WalkArgs,

        /// Output file (defaults to the export path in the settings file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Include duplicate analysis
        #[arg(short, long)]
        duplicates: bool,
    },

    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(clap::Args, Clone)]
struct WalkArgs {
    /// Only scan the top level of the path
    #[arg(long)]
    flat: bool,

    /// Skip entries whose name matches this glob (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Skip hidden entries
    #[arg(long)]
    no_hidden: bool,

    /// Worker threads (0 = one per core)
    #[arg(short, long, default_value = "0")]
    threads: usize,

    /// Never run the signature tool; use heuristics only
    #[arg(long)]
    no_tool: bool,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the active settings
    Show,
    /// Print the settings file location
    Path,
    /// Set the directory that relative export paths resolve against
    SetWorkingDir { dir: PathBuf },
    /// Set the default export file
    SetExportPath { path: PathBuf },
    /// Set the displayed fields (e.g. "path,size,format,digest")
    SetFields {
        #[arg(value_delimiter = ',', required = true)]
        fields: Vec<DisplayedField>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    let settings_path = match cli.settings {
        Some(path) => path,
        None => Settings::default_path().context("Cannot locate settings file")?,
    };
    let settings = Settings::load(&settings_path)?;

    match cli.command {
        Command::Scan {
            path,
            walk,
            duplicates,
            list,
            top,
            format,
        } => {
            let dup_config = duplicates.then(|| duplicate_config(&settings, 0, false)).transpose()?;
            let session = scan(&path, &walk, &settings, true, dup_config).await?;
            print_scan(&session, &settings, list, top, format)?;
        }
        Command::Duplicates {
            path,
            walk,
            min_size,
            exclude_empty,
            all,
            top,
            format,
            output,
        } => {
            let min_bytes = parse_size(&min_size)?;
            if let Some(output) = &output {
                export::ExportFormat::from_path(output)?;
            }
            let dup_config = duplicate_config(&settings, min_bytes, exclude_empty)?;
            eprintln!("Finding duplicates (min size: {})...", min_size);
            let session = scan(&path, &walk, &settings, false, Some(dup_config)).await?;
            let view = if all {
                DuplicateView::AllFiles
            } else {
                DuplicateView::DuplicatesOnly
            };
            print_duplicates(&session, view, top, format, output.as_deref())?;
        }
        Command::Identify {
            files,
            no_tool,
            format,
        } => {
            run_identify(&files, &settings, no_tool, format)?;
        }
        Command::Export {
            path,
            walk,
            output,
            duplicates,
        } => {
            let target = export_target(&settings, output.as_deref())?;
            let dup_config = duplicates.then(|| duplicate_config(&settings, 0, false)).transpose()?;
            let session = scan(&path, &walk, &settings, true, dup_config).await?;
            export::export_session(&session, &settings.fields(), &target)
                .with_context(|| format!("Export to {} failed", target.display()))?;
            eprintln!("Exported {} records to {}", session.records.len(), target.display());
            print_warning_count(&session);
        }
        Command::Settings { action } => {
            run_settings(action, settings, &settings_path)?;
        }
    }

    Ok(())
}

/// Resolve and check the export file before any scanning starts.
fn export_target(settings: &Settings, output: Option<&Path>) -> Result<PathBuf> {
    let target = settings
        .resolve_export_path(output)
        .ok_or_else(|| eyre!("No output file given and no export path configured"))?;
    export::ExportFormat::from_path(&target)?;
    Ok(target)
}

/// Build the identifier from the settings file, or a heuristic-only one.
fn build_identifier(settings: &Settings, no_tool: bool) -> Result<FormatIdentifier> {
    if no_tool {
        return Ok(FormatIdentifier::new(&IdentifyConfig::heuristic_only()));
    }
    let config = IdentifyConfig::builder()
        .tool_path(settings.tool_path.clone())
        .signature_file(settings.signature_file.clone())
        .build()
        .context("Invalid identification settings")?;
    Ok(FormatIdentifier::new(&config))
}

fn duplicate_config(settings: &Settings, min_size: u64, exclude_empty: bool) -> Result<DuplicateConfig> {
    DuplicateConfig::builder()
        .min_size(min_size)
        .exclude_empty(exclude_empty || settings.exclude_empty_duplicates)
        .build()
        .context("Invalid duplicate settings")
}

/// Run one scan session on a blocking worker, cancelled by Ctrl-C.
async fn scan(
    path: &Path,
    walk: &WalkArgs,
    settings: &Settings,
    identify: bool,
    duplicates: Option<DuplicateConfig>,
) -> Result<ScanSession> {
    let scan_config = ScanConfig::builder()
        .root(path)
        .scope(if walk.flat {
            ScanScope::Flat
        } else {
            ScanScope::Recursive
        })
        .ignore_patterns(walk.ignore.clone())
        .include_hidden(!walk.no_hidden)
        .threads(walk.threads)
        .build()
        .context("Invalid scan options")?;

    let config = PipelineConfig::builder()
        .scan(scan_config)
        .identify(identify)
        .duplicates(duplicates)
        .build()
        .context("Invalid scan options")?;

    let identifier = if identify {
        build_identifier(settings, walk.no_tool)?
    } else {
        FormatIdentifier::heuristic_only()
    };
    let pipeline = ScanPipeline::new(config).with_identifier(identifier);

    eprintln!("Scanning {}...", path.display());

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted, stopping scan...");
                cancel.cancel();
            }
        }
    });

    let mut rx = pipeline.subscribe();
    let progress = tokio::spawn(async move {
        let mut phase = ScanPhase::Walking;
        loop {
            match rx.recv().await {
                Ok(update) => {
                    if update.phase != phase {
                        phase = update.phase;
                        if phase == ScanPhase::Hashing {
                            eprintln!(
                                "Hashing candidates among {} files...",
                                update.files_scanned
                            );
                        }
                    }
                    tracing::debug!(
                        phase = ?update.phase,
                        files = update.files_scanned,
                        bytes = update.bytes_scanned,
                        errors = update.errors_count,
                        "progress"
                    );
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let worker_cancel = cancel.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.run(&worker_cancel))
        .await
        .context("Scan worker failed")?;

    interrupt.abort();
    let _ = progress.await;

    result.context("Scan failed")
}

fn print_scan(
    session: &ScanSession,
    settings: &Settings,
    list: bool,
    top_n: usize,
    format: OutputFormat,
) -> Result<()> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(session)?);
        return Ok(());
    }

    let summary = &session.summary;

    if list {
        let table = project_rows(&session.records, &settings.fields());
        println!("{}", table.headers().join("\t"));
        for row in &table.rows {
            println!("{}", row.join("\t"));
        }
    }

    println!();
    println!("{}", "─".repeat(70));
    println!(
        " {} - {}",
        session.root.display(),
        format_size(summary.total_bytes)
    );
    println!(
        " {} files, {} symlinks",
        summary.total_files, summary.symlinks
    );
    println!(" Scanned in {:.2}s", session.duration.as_secs_f64());
    print_tool_status(&session.tool_status);
    println!("{}", "─".repeat(70));
    println!();

    println!(" Formats:");
    print_counts(&summary.by_format, top_n);
    println!();

    println!(" Identification methods:");
    for (method, count) in &summary.by_method {
        println!("   {:<40} {:>8}", method.to_string(), count);
    }
    println!();

    println!(" Extensions:");
    print_counts(&summary.by_extension, top_n);
    println!();

    if session.duplicates.is_some() {
        if summary.duplicate_groups == 0 {
            println!(" No duplicate files found.");
        } else {
            println!(
                " {} duplicate groups ({} files), {} reclaimable",
                summary.duplicate_groups,
                summary.duplicate_files,
                format_size(summary.reclaimable_bytes)
            );
        }
        println!();
    }

    print_warning_count(session);
    Ok(())
}

fn print_duplicates(
    session: &ScanSession,
    view: DuplicateView,
    top_n: usize,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let rows = duplicate_rows(&session.records, session.duplicate_groups(), view);

    if let Some(output) = output {
        export::export_duplicates(&rows, output)
            .with_context(|| format!("Export to {} failed", output.display()))?;
        eprintln!("Exported {} rows to {}", rows.len(), output.display());
    }

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Duplicate File Report");
            println!("{}", "─".repeat(70));
            println!();

            let summary = &session.summary;
            if summary.duplicate_groups == 0 {
                println!(" No duplicate files found.");
            } else {
                println!(
                    " Found {} duplicate groups ({} files)",
                    summary.duplicate_groups, summary.duplicate_files
                );
                println!(
                    " Total reclaimable space: {}",
                    format_size(summary.reclaimable_bytes)
                );
            }
            println!();

            for (i, row) in rows.iter().take(top_n).enumerate() {
                println!(
                    " {} {} ({} files, {} each)",
                    i + 1,
                    row.digest.to_hex(),
                    row.paths.len(),
                    format_size(row.size)
                );
                for path in &row.paths {
                    println!("   {}", path.display());
                }
                println!();
            }
            if rows.len() > top_n {
                println!(" ... and {} more", rows.len() - top_n);
                println!();
            }

            print_warning_count(session);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }

    Ok(())
}

fn run_identify(
    files: &[PathBuf],
    settings: &Settings,
    no_tool: bool,
    format: OutputFormat,
) -> Result<()> {
    let identifier = build_identifier(settings, no_tool)?;

    let mut results = Vec::with_capacity(files.len());
    for file in files {
        if !file.is_file() {
            bail!("Not a regular file: {}", file.display());
        }
        let identification = identifier.identify(file);
        if let Some(warning) = &identification.warning {
            eprintln!("warning: {}: {}", warning.path.display(), warning.message);
        }
        results.push((file, identification.result));
    }

    match format {
        OutputFormat::Text => {
            print_tool_status(identifier.tool_status());
            for (file, result) in &results {
                let puid = result.puid.as_deref().unwrap_or("-");
                let mime = result.mime.as_deref().unwrap_or("-");
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    file.display(),
                    result.label,
                    result.method,
                    puid,
                    mime
                );
            }
        }
        OutputFormat::Json => {
            let json: Vec<_> = results
                .iter()
                .map(|(file, result)| serde_json::json!({ "path": file, "format": result }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}

fn run_settings(action: SettingsAction, mut settings: Settings, path: &Path) -> Result<()> {
    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        SettingsAction::Path => {
            println!("{}", path.display());
            return Ok(());
        }
        SettingsAction::SetWorkingDir { dir } => {
            let dir = dir.canonicalize().context("Invalid path")?;
            if !dir.is_dir() {
                bail!("Not a directory: {}", dir.display());
            }
            settings.working_directory = Some(dir);
        }
        SettingsAction::SetExportPath { path } => {
            export::ExportFormat::from_path(&path)?;
            settings.export_path = Some(path);
        }
        SettingsAction::SetFields { fields } => {
            settings.displayed_fields = fields;
        }
    }

    settings.save(path)?;
    eprintln!("Saved {}", path.display());
    Ok(())
}

fn print_tool_status(status: &ToolStatus) {
    match status {
        ToolStatus::Available { executable, .. } => {
            println!(" Signature tool: {}", executable.display());
        }
        ToolStatus::Unavailable { reason } => {
            println!(" Signature tool unavailable ({reason}); heuristic identification only");
        }
    }
}

fn print_counts(counts: &std::collections::BTreeMap<String, u64>, top_n: usize) {
    let mut sorted: Vec<(&String, &u64)> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (label, count) in sorted.iter().take(top_n) {
        println!("   {:<40} {:>8}", truncate(label, 40), count);
    }
    if sorted.len() > top_n {
        println!("   ... and {} more", sorted.len() - top_n);
    }
}

fn print_warning_count(session: &ScanSession) {
    println!("{} warning(s) during scan", session.errors.len());
    for (kind, count) in session.errors.counts_by_kind() {
        let label = match kind {
            WarningKind::ToolUnavailable => "signature tool failures",
            WarningKind::UnreadableEntry => "unreadable entries",
            WarningKind::HashFailure => "excluded from duplicate analysis",
            WarningKind::BrokenSymlink => "broken symlinks",
        };
        println!("   {count} {label}");
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}

/// Parse a size string (e.g., "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');
    let suffix = &s[digits.len()..];

    let multiplier: u64 = match suffix {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        _ => bail!("Unknown size suffix: {suffix}"),
    };
    let num: f64 = digits
        .parse()
        .with_context(|| format!("Invalid size: {s}"))?;

    Ok((num * multiplier as f64) as u64)
}
