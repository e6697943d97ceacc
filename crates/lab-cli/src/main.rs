//! Lab Digitizer CLI
//!
//! Command-line tool for digitizing lab sheets, reviewing the archived
//! tables, and exporting them as CSV or analysis scripts.

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use lab_core::{
    parse_csv, scan_images, write_csv_export, Config, DigitizationResult, Digitizer, Edit,
    EditScript, FileStore, GeminiDigitizer, ImagePayload, JsonFileDigitizer, Plot, ScriptFlavor,
    Session, SessionArchive, Table,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "lab-cli")]
#[command(about = "Digitize, review and export handwritten lab tables", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the scan archive
    #[arg(long, global = true)]
    archive_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Digitize an image and archive the result
    Capture {
        /// Image of the handwritten table
        #[arg(short, long)]
        image: PathBuf,

        /// Tag stored with the scan
        #[arg(short, long)]
        tag: Option<String>,

        /// Use a pre-digitized result (JSON) instead of calling the service
        #[arg(long)]
        result: Option<PathBuf>,
    },

    /// Digitize every image found under the given directories
    Scan {
        /// Root directories to scan
        #[arg(short, long, required = true)]
        root: Vec<PathBuf>,

        /// Tag stored with every scan
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Archive a table from a CSV file
    Import {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Image to keep alongside the table
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Tag stored with the scan
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// List archived scans, newest first
    List {
        /// Show the headers of each scan
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show an archived table
    Show {
        /// Scan ID (defaults to the newest)
        #[arg(short, long)]
        entry: Option<String>,

        /// Maximum number of rows to display
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Apply an edit script to an archived table
    Edit {
        /// Scan ID (defaults to the newest)
        #[arg(short, long)]
        entry: Option<String>,

        /// Path to edit script (JSON)
        #[arg(short, long)]
        script: PathBuf,

        /// Archive the edited table as a new scan
        #[arg(long)]
        save: bool,

        /// Tag for the saved scan
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Print the numeric series of an archived table
    Chart {
        /// Scan ID (defaults to the newest)
        #[arg(short, long)]
        entry: Option<String>,
    },

    /// Write an archived table as CSV
    Export {
        /// Scan ID (defaults to the newest)
        #[arg(short, long)]
        entry: Option<String>,

        /// Output directory (defaults to the configured export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print an analysis script for an archived table
    Script {
        /// Scan ID (defaults to the newest)
        #[arg(short, long)]
        entry: Option<String>,

        /// Script flavor (numpy or pandas)
        #[arg(long, default_value = "numpy")]
        flavor: String,
    },

    /// Create an edit script template
    CreateScript {
        /// Output path for the edit script
        #[arg(short, long)]
        output: PathBuf,

        /// Example cell edits to include (row:header:value)
        #[arg(short, long)]
        example: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,lab_core=info,lab_cli=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> lab_core::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.archive_dir {
        config.archive_dir = dir;
    }

    match cli.command {
        Commands::Capture { image, tag, result } => cmd_capture(&config, &image, tag, result).await,
        Commands::Scan { root, tag } => cmd_scan(&config, &root, tag).await,
        Commands::Import { file, image, tag } => cmd_import(&config, &file, image, tag),
        Commands::List { verbose } => cmd_list(&config, verbose),
        Commands::Show { entry, limit } => cmd_show(&config, entry, limit),
        Commands::Edit {
            entry,
            script,
            save,
            tag,
        } => cmd_edit(&config, entry, &script, save, tag),
        Commands::Chart { entry } => cmd_chart(&config, entry),
        Commands::Export { entry, output } => cmd_export(&config, entry, output),
        Commands::Script { entry, flavor } => cmd_script(&config, entry, &flavor),
        Commands::CreateScript { output, example } => cmd_create_script(&output, &example),
    }
}

fn open_session(config: &Config, tag: Option<String>) -> Session<FileStore> {
    let archive = SessionArchive::open(FileStore::new(&config.archive_dir));
    Session::new(archive).with_default_tag(tag.or_else(|| config.default_tag.clone()))
}

/// Open the scan with `entry` as ID, or the newest one
fn open_entry(config: &Config, entry: Option<String>) -> lab_core::Result<Session<FileStore>> {
    let mut session = open_session(config, None);
    match entry {
        Some(id) => session.open_entry(&id)?,
        None => session.open_latest()?,
    }
    Ok(session)
}

fn gemini(config: &Config) -> lab_core::Result<GeminiDigitizer> {
    let key = config.require_api_key()?;
    Ok(GeminiDigitizer::new(&config.endpoint, &config.model, key))
}

/// Run one capture of the image at `path` through the session
async fn capture_one<D: Digitizer>(
    session: &mut Session<FileStore>,
    digitizer: &D,
    path: &Path,
) -> lab_core::Result<()> {
    let image = ImagePayload::from_path(path)?;
    session.try_capture(digitizer, &image).await
}

async fn cmd_capture(
    config: &Config,
    image: &Path,
    tag: Option<String>,
    result: Option<PathBuf>,
) -> lab_core::Result<()> {
    let mut session = open_session(config, tag);

    match result {
        Some(result) => capture_one(&mut session, &JsonFileDigitizer::new(result), image).await?,
        None => capture_one(&mut session, &gemini(config)?, image).await?,
    }

    if let Some(entry) = session.archive().latest() {
        println!("Archived scan {}", entry.id);
    }
    if let Some(notes) = session.notes() {
        println!("Notes: {}", notes);
    }
    println!();
    print_table(session.table(), Some(10));

    Ok(())
}

async fn cmd_scan(config: &Config, roots: &[PathBuf], tag: Option<String>) -> lab_core::Result<()> {
    let images = scan_images(roots)?;
    println!("Found {} image(s)", images.len());
    if images.is_empty() {
        return Ok(());
    }

    let digitizer = gemini(config)?;
    let mut session = open_session(config, tag);
    let mut errors = Vec::new();

    for path in &images {
        println!("Digitizing: {}", path.display());
        match capture_one(&mut session, &digitizer, path).await {
            Ok(()) => {
                let table = session.table();
                println!("  {} columns, {} rows", table.column_count(), table.row_count());
            }
            Err(e) => errors.push((path.clone(), e)),
        }
    }

    println!();
    println!("Scan complete:");
    println!("  {} image(s) archived", images.len() - errors.len());

    if !errors.is_empty() {
        println!("\nErrors ({}):", errors.len());
        for (path, err) in &errors {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}

fn cmd_import(
    config: &Config,
    file: &Path,
    image: Option<PathBuf>,
    tag: Option<String>,
) -> lab_core::Result<()> {
    let table = parse_csv(file)?;
    let image = match image {
        Some(path) => ImagePayload::from_path(path)?.to_data_uri(),
        None => String::new(),
    };

    let mut session = open_session(config, tag);
    let ticket = session.begin_capture(image);
    session.complete_capture(ticket, Ok(DigitizationResult { table, notes: None }));

    if let Some(entry) = session.archive().latest() {
        info!("imported {} as scan {}", file.display(), entry.id);
        println!(
            "Imported {} rows from {} as scan {}",
            entry.table.row_count(),
            file.display(),
            entry.id
        );
    }

    Ok(())
}

fn cmd_list(config: &Config, verbose: bool) -> lab_core::Result<()> {
    let session = open_session(config, None);
    let entries = session.archive().list();

    println!("Scans ({}):", entries.len());
    println!();

    if entries.is_empty() {
        println!("  No archived scans yet.");
        return Ok(());
    }

    for entry in entries {
        let when = entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        let tag = entry
            .tag
            .as_deref()
            .map(|t| format!(" [{}]", t))
            .unwrap_or_default();

        println!(
            "  {}  {}{}  {}  {} points",
            entry.id,
            entry.title(),
            tag,
            when,
            entry.table.row_count()
        );
        if verbose {
            println!("      {}", entry.table.headers.join(" | "));
        }
    }

    Ok(())
}

fn cmd_show(config: &Config, entry: Option<String>, limit: Option<usize>) -> lab_core::Result<()> {
    let session = open_entry(config, entry)?;
    let table = session.table();

    println!("Columns: {}", table.column_count());
    println!("Rows: {}", table.row_count());
    println!();
    print_table(table, limit);

    Ok(())
}

fn cmd_edit(
    config: &Config,
    entry: Option<String>,
    script_path: &Path,
    save: bool,
    tag: Option<String>,
) -> lab_core::Result<()> {
    let script = EditScript::load(script_path)?;
    println!("Loaded edit script with {} edits", script.edits.len());

    let mut session = open_entry(config, entry)?;
    session.apply_script(&script)?;

    println!();
    print_table(session.table(), None);

    if save {
        if let Some(saved) = session.save_current(tag) {
            println!();
            println!("Saved edited table as scan {}", saved.id);
        }
    }

    Ok(())
}

fn cmd_chart(config: &Config, entry: Option<String>) -> lab_core::Result<()> {
    let session = open_entry(config, entry)?;

    match session.plot() {
        Plot::Series(series) => {
            let mut header = vec![series.x_label.as_str()];
            header.extend(series.y_labels.iter().map(String::as_str));
            println!("{}", header.join("\t"));
            println!("{}", "-".repeat(header.len() * 12));

            for point in &series.points {
                let mut values = vec![point.x.to_string()];
                values.extend(point.ys.iter().map(|y| y.to_string()));
                println!("{}", values.join("\t"));
            }
        }
        other => {
            if let Some(text) = other.guidance() {
                println!("{}", text);
            }
        }
    }

    Ok(())
}

fn cmd_export(config: &Config, entry: Option<String>, output: Option<PathBuf>) -> lab_core::Result<()> {
    let session = open_entry(config, entry)?;
    let dir = output.unwrap_or_else(|| config.export_dir.clone());

    let path = write_csv_export(session.table(), &dir, Utc::now())?;
    println!(
        "Exported {} rows to {}",
        session.table().row_count(),
        path.display()
    );

    Ok(())
}

fn cmd_script(config: &Config, entry: Option<String>, flavor: &str) -> lab_core::Result<()> {
    let flavor: ScriptFlavor = flavor.parse()?;
    let session = open_entry(config, entry)?;
    println!("{}", session.script(flavor));
    Ok(())
}

fn cmd_create_script(output: &Path, examples: &[String]) -> lab_core::Result<()> {
    let mut script = EditScript::new();

    // Parse example edits: "row:header:value"
    for example in examples {
        let parts: Vec<&str> = example.splitn(3, ':').collect();
        if parts.len() != 3 {
            eprintln!("Warning: Invalid example format '{}', expected 'row:header:value'", example);
            continue;
        }

        let row: usize = match parts[0].parse() {
            Ok(row) => row,
            Err(_) => {
                eprintln!("Warning: Invalid row '{}' in example", parts[0]);
                continue;
            }
        };

        script.add_edit(Edit::set_cell(row, parts[1], parts[2]));
    }

    // If no examples provided, add placeholders
    if script.edits.is_empty() {
        script.add_edit(Edit::rename_header(0, "Time (s)"));
        script.add_edit(Edit::set_cell(0, "Time (s)", "0.0"));
    }

    script.save(output)?;
    println!("Created edit script: {}", output.display());
    println!("Edits: {}", script.edits.len());
    println!();
    println!("Edit the file to add your changes, then run:");
    println!("  lab-cli edit --script {} [--entry <id>] [--save]", output.display());

    Ok(())
}

fn print_table(table: &Table, limit: Option<usize>) {
    println!("{}", table.headers.join("\t"));
    println!("{}", "-".repeat(table.column_count().max(1) * 12));

    let row_limit = limit.unwrap_or(table.row_count());
    for i in 0..table.row_count().min(row_limit) {
        let values: Vec<String> = table.headers.iter().map(|h| table.cell_text(i, h)).collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > row_limit {
        println!("... ({} more rows)", table.row_count() - row_limit);
    }
}
