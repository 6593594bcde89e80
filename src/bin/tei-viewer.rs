//! tei-viewer - Browse, edit and export a collection of TEI documents
//!
//! Usage:
//!     tei-viewer upload <files>...     Store TEI files
//!     tei-viewer table                 Show the current page as a table
//!     tei-viewer list                  Show the current page with the list layout
//!     tei-viewer show <id>             Print one record
//!     tei-viewer edit <id|url>         Print or replace one record
//!     tei-viewer remove <ids>...       Delete records
//!     tei-viewer clear                 Delete every record
//!     tei-viewer count                 Number of stored records
//!     tei-viewer export <format>       Export as csv, json, jsonp or xml
//!     tei-viewer settings <action>     Show or change settings
//!     tei-viewer stats                 Store statistics

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tei_viewer::config::{default_settings_path, Settings};
use tei_viewer::export::{ExportFormat, DEFAULT_JSONP_CALLBACK};
use tei_viewer::models::{BulkReport, Level, Notification};
use tei_viewer::nav::parse_record_id;
use tei_viewer::table::{TableAction, TableMenu, TableView};
use tei_viewer::transform::Pipeline;
use tei_viewer::viewer::Layout;
use tei_viewer::{default_db_path, RecordStore, TeiViewerError, Viewer};

#[derive(Parser)]
#[command(name = "tei-viewer")]
#[command(about = "Browse, edit and export TEI documents")]
#[command(version)]
struct Cli {
    /// Path to database file
    #[arg(long, short = 'd', global = true)]
    database: Option<PathBuf>,

    /// Path to settings file
    #[arg(long, short = 's', global = true)]
    settings: Option<PathBuf>,

    /// Directory holding transform definitions
    #[arg(long, short = 't', global = true)]
    transforms: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', default_value = "text", global = true)]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Default)]
struct PageArgs {
    /// Page number (1-based)
    #[arg(long, short = 'p', default_value = "1")]
    page: usize,

    /// Records per page (defaults to the recordsPerPage setting)
    #[arg(long, short = 'n')]
    per_page: Option<usize>,

    /// Hide a column (1-based, repeatable)
    #[arg(long)]
    hide: Vec<usize>,

    /// Sort by a column (1-based)
    #[arg(long)]
    sort: Option<usize>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    desc: bool,

    /// Only show rows with a visible cell containing this text
    #[arg(long)]
    search: Option<String>,

    /// Show the hide, show and sort menus
    #[arg(long)]
    menus: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store TEI files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the current page as a table
    Table(PageArgs),

    /// Show the current page with the list layout
    List(PageArgs),

    /// Print one record
    Show {
        /// Record id
        id: i64,
    },

    /// Print a record for editing, or replace it with a file's contents
    Edit {
        /// Record id or editor URL (e.g. /editor?id=5)
        target: String,

        /// File holding the new XML
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Delete records
    Remove {
        /// Record ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Delete every record
    Clear,

    /// Number of stored records
    Count,

    /// Export records
    Export {
        /// csv, json, jsonp or xml
        #[arg(value_name = "FORMAT")]
        kind: ExportFormat,

        /// Output file (defaults to stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// JSONP callback name
        #[arg(long, default_value = DEFAULT_JSONP_CALLBACK)]
        callback: String,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show store statistics
    Stats,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Restore the default settings
    Reset,
    /// Set one value by its key (e.g. recordsPerPage 25)
    Set { key: String, value: String },
}

/// Why a command did not succeed
enum Failure {
    /// Already surfaced as a notification
    Reported,
    Error(TeiViewerError),
}

impl From<TeiViewerError> for Failure {
    fn from(e: TeiViewerError) -> Self {
        Failure::Error(e)
    }
}

type CliResult<T> = std::result::Result<T, Failure>;

fn reported<T>(result: tei_viewer::Result<T>) -> CliResult<T> {
    result.map_err(|_| Failure::Reported)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let code = match start(&cli) {
        Ok(mut viewer) => {
            let result = run(&cli, &mut viewer);
            print_notifications(&viewer.take_notifications());
            exit_code(result)
        }
        Err(e) => exit_code(Err(Failure::Error(e))),
    };
    std::process::exit(code);
}

fn exit_code(result: CliResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(Failure::Reported) => 1,
        Err(Failure::Error(e)) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            1
        }
    }
}

fn settings_path(cli: &Cli) -> tei_viewer::Result<PathBuf> {
    match &cli.settings {
        Some(path) => Ok(path.clone()),
        None => default_settings_path(),
    }
}

fn start(cli: &Cli) -> tei_viewer::Result<Viewer> {
    let db_path = match &cli.database {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    let settings = Settings::load_or_default(settings_path(cli)?)?;
    let store = Arc::new(RecordStore::file(db_path));
    Ok(Viewer::new(store, settings, Pipeline::new(cli.transforms.clone())))
}

fn run(cli: &Cli, viewer: &mut Viewer) -> CliResult<()> {
    match &cli.command {
        Commands::Upload { files } => {
            let report = viewer.upload_paths(files);
            print_report(cli.format, &report, "uploaded");
            if !report.is_success() {
                return Err(Failure::Reported);
            }
        }

        Commands::Table(args) => show_page(cli, viewer, Layout::Table, args)?,
        Commands::List(args) => show_page(cli, viewer, Layout::List, args)?,

        Commands::Show { id } => {
            let record = viewer.store().get(*id)?;
            match cli.format {
                OutputFormat::Text => {
                    println!("{} {}", format!("#{}", record.id).bold(), record.filename);
                    println!("{}", record.xml);
                }
                OutputFormat::Json => println!("{}", to_json(&record)?),
            }
        }

        Commands::Edit { target, file } => {
            let id = parse_record_id(target)?;
            let mut session = reported(viewer.open_editor(id))?;
            match file {
                Some(path) => {
                    session.set_text(std::fs::read_to_string(path).map_err(TeiViewerError::from)?);
                    if !session.is_dirty() {
                        println!("No changes to {}", session.filename());
                        return Ok(());
                    }
                    let record = reported(viewer.save_editor(&session))?;
                    if cli.format == OutputFormat::Json {
                        println!("{}", to_json(&record)?);
                    }
                }
                None => {
                    reported(viewer.cancel_editor())?;
                    match cli.format {
                        OutputFormat::Text => {
                            println!("{}", session.title().bold());
                            println!("{}", session.text());
                        }
                        OutputFormat::Json => println!(
                            "{}",
                            to_json(&serde_json::json!({
                                "id": session.record_id(),
                                "title": session.title(),
                                "xml": session.text(),
                            }))?
                        ),
                    }
                }
            }
        }

        Commands::Remove { ids } => {
            let mut report = BulkReport::default();
            for id in ids {
                match viewer.store().remove(*id) {
                    Ok(()) => report.record_success(*id),
                    Err(e) => report.record_failure(id.to_string(), e),
                }
            }
            if cli.format == OutputFormat::Text {
                for failure in &report.failed {
                    eprintln!("{}: {}", "warning".yellow().bold(), failure.error);
                }
                if !report.succeeded.is_empty() {
                    println!("{} deleted", report.succeeded.len());
                }
            }
            print_report(cli.format, &report, "deleted");
            if !report.is_success() {
                return Err(Failure::Reported);
            }
        }

        Commands::Clear => {
            let report = viewer.delete_all();
            print_report(cli.format, &report, "deleted");
            if !report.is_success() {
                return Err(Failure::Reported);
            }
        }

        Commands::Count => {
            let count = viewer.store().count()?;
            match cli.format {
                OutputFormat::Text => println!("{}", count),
                OutputFormat::Json => println!("{}", to_json(&serde_json::json!({ "count": count }))?),
            }
        }

        Commands::Export {
            kind,
            output,
            callback,
        } => {
            if kind.uses_table_view() {
                reported(viewer.load_transform(Layout::Table))?;
                reported(viewer.refresh())?;
            }
            let content = reported(viewer.export(*kind, callback))?;
            match output {
                Some(path) => {
                    std::fs::write(path, &content).map_err(TeiViewerError::from)?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{}", content),
            }
        }

        Commands::Settings { action } => {
            let path = settings_path(cli)?;
            let mut settings = viewer.settings().clone();
            match action {
                SettingsAction::Show => {}
                SettingsAction::Reset => {
                    settings.reset();
                    settings.save(&path)?;
                }
                SettingsAction::Set { key, value } => {
                    settings.set(key, value)?;
                    settings.save(&path)?;
                }
            }
            viewer.apply_settings(settings);
            print_settings(cli.format, viewer.settings())?;
        }

        Commands::Stats => {
            let stats = viewer.store().stats()?;
            match cli.format {
                OutputFormat::Text => {
                    println!("TEI Viewer Statistics");
                    println!("=====================");
                    println!("Records:        {}", stats.records);
                    println!("XML bytes:      {}", stats.xml_bytes);
                    println!("Schema version: {}", stats.schema_version);
                }
                OutputFormat::Json => println!("{}", to_json(&stats)?),
            }
        }
    }

    Ok(())
}

fn show_page(cli: &Cli, viewer: &mut Viewer, layout: Layout, args: &PageArgs) -> CliResult<()> {
    reported(viewer.load_transform(layout))?;

    if let Some(n) = args.per_page {
        reported(viewer.dispatch(TableAction::SetRecordsPerPage(n)))?;
    }
    reported(viewer.dispatch(TableAction::SetPage(args.page.saturating_sub(1))))?;
    for column in &args.hide {
        reported(viewer.dispatch(TableAction::HideColumn(column.saturating_sub(1))))?;
    }
    if let Some(column) = args.sort {
        reported(viewer.dispatch(TableAction::SortBy {
            column: column.saturating_sub(1),
            descending: args.desc,
        }))?;
    }
    if let Some(text) = &args.search {
        reported(viewer.dispatch(TableAction::Search(text.clone())))?;
    }
    reported(viewer.refresh())?;

    let view = viewer.view();
    match cli.format {
        OutputFormat::Text => {
            if view.pagination.total == 0 {
                println!("No records stored. Upload some with `tei-viewer upload <files>`.");
            } else {
                print_table(&view);
            }
            if args.menus {
                let menus = viewer.menus();
                print_menu("Hide", &menus.hide);
                print_menu("Show", &menus.show);
                print_menu("Sort", &menus.sort);
            }
        }
        OutputFormat::Json if args.menus => println!(
            "{}",
            to_json(&serde_json::json!({ "table": view, "menus": viewer.menus() }))?
        ),
        OutputFormat::Json => println!("{}", to_json(&view)?),
    }
    Ok(())
}

fn print_table(view: &TableView) {
    let mut widths: Vec<usize> = view.columns.iter().map(|c| c.label.chars().count()).collect();
    for row in &view.rows {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let index_width = view
        .rows
        .last()
        .map(|r| r.index.to_string().len())
        .unwrap_or(1)
        .max(1);
    let separator = if view.show_borders { " | " } else { "  " };

    let header: Vec<String> = view
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", format!("{} {}", c.index + 1, c.label), w = w + 2))
        .collect();
    println!("{:>iw$}{}{}", "#", separator, header.join(separator).bold(), iw = index_width);

    for row in &view.rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = w + 2))
            .collect();
        println!(
            "{:>iw$}{}{}",
            row.index,
            separator,
            cells.join(separator),
            iw = index_width
        );
    }

    println!("\n{}", view.pagination.summary().dimmed());
}

fn print_menu(name: &str, menu: &TableMenu) {
    match menu {
        TableMenu::Items(items) => {
            let labels: Vec<String> = items
                .iter()
                .map(|i| format!("{} {}", i.index + 1, i.label))
                .collect();
            println!("{}: {}", name.bold(), labels.join(", "));
        }
        TableMenu::Placeholder(text) => println!("{}: {}", name.bold(), text.dimmed()),
    }
}

fn print_settings(format: OutputFormat, settings: &Settings) -> CliResult<()> {
    match format {
        OutputFormat::Text => {
            println!("Table layout:     {}", settings.xsl.selected_table);
            println!("List layout:      {}", settings.xsl.selected_list);
            println!("Unique filenames: {}", settings.unique_filenames);
            println!("Records per page: {}", settings.records_per_page);
            println!("Show borders:     {}", settings.show_borders);
            println!("Show tooltips:    {}", settings.show_tooltips);
            println!("Freeze header:    {}", settings.freeze_header);
        }
        OutputFormat::Json => println!("{}", to_json(settings)?),
    }
    Ok(())
}

fn print_report(format: OutputFormat, report: &BulkReport, verb: &str) {
    if format == OutputFormat::Json {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|f| serde_json::json!({ "item": f.item, "error": f.error.to_string() }))
            .collect();
        let mut out = serde_json::Map::new();
        out.insert(verb.to_string(), serde_json::json!(report.succeeded));
        out.insert("failed".to_string(), serde_json::Value::Array(failed));
        println!("{}", serde_json::Value::Object(out));
    }
}

fn print_notifications(notifications: &[Notification]) {
    for n in notifications {
        let tag = match n.level {
            Level::Success => "success".green().bold(),
            Level::Info => "info".blue().bold(),
            Level::Warning => "warning".yellow().bold(),
            Level::Danger => "danger".red().bold(),
        };
        eprintln!("{}: {}", tag, n.message);
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| Failure::Error(TeiViewerError::Config(format!("Failed to serialize JSON: {}", e))))
}
