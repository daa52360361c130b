use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pagepoint_core::{
    export_to_path, import_from_path, Alignment, Annotation, AnnotationStore, CsvError, DataType,
    ImportMode, Origin, Part, PointEdit, PressOutcome, SessionConfig, ViewerSession,
};
use pagepoint_pdf::{PdfDocument, RenderService, RgbaImage};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pagepoint")]
#[command(about = "Record and manage click coordinates on PDF pages")]
pub struct Cli {
    /// Increase log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file to use instead of the platform default
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render a page to PNG with the markers of a history file.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0, value_parser = parse_finite)]
        zoom: f64,
        #[arg(long)]
        history: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Click on a page. Records a new point unless the click lands on an
    /// existing marker.
    Record {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        history: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Canvas X in pixels at the given zoom
        #[arg(long, value_parser = parse_finite)]
        x: f64,
        /// Canvas Y in pixels at the given zoom
        #[arg(long, value_parser = parse_finite)]
        y: f64,
        #[arg(long, default_value_t = 1.0, value_parser = parse_finite)]
        zoom: f64,
        #[arg(long)]
        origin: Option<Origin>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Drag a point to a new canvas position on its page.
    Move {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        history: PathBuf,
        /// 1-based point number
        #[arg(long)]
        index: usize,
        #[arg(long, value_parser = parse_finite)]
        x: f64,
        #[arg(long, value_parser = parse_finite)]
        y: f64,
        #[arg(long, default_value_t = 1.0, value_parser = parse_finite)]
        zoom: f64,
        #[arg(long)]
        origin: Option<Origin>,
    },
    /// Edit the labels and coordinates of a point.
    Edit {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        history: PathBuf,
        /// 1-based point number
        #[arg(long)]
        index: usize,
        #[arg(long, requires = "raw_y", value_parser = parse_finite)]
        raw_x: Option<f64>,
        #[arg(long, requires = "raw_x", value_parser = parse_finite)]
        raw_y: Option<f64>,
        /// Adjusted X, used when the raw position is unchanged
        #[arg(long, requires = "y", value_parser = parse_finite)]
        x: Option<f64>,
        #[arg(long, requires = "x", value_parser = parse_finite)]
        y: Option<f64>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        part: Option<String>,
        #[arg(long)]
        datatype: Option<String>,
        #[arg(long)]
        align: Option<String>,
    },
    /// Switch the origin and recompute every point.
    Origin {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        history: PathBuf,
        #[arg(long)]
        origin: Origin,
        /// Use the size of one page for every point instead of each point's own page
        #[arg(long)]
        current_page_dims: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// List recorded points.
    List {
        #[arg(long)]
        history: PathBuf,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Delete one point.
    Delete {
        #[arg(long)]
        history: PathBuf,
        /// 1-based point number
        #[arg(long)]
        index: usize,
    },
    /// Delete every point.
    Clear {
        #[arg(long)]
        history: PathBuf,
    },
    /// Import a CSV file into the history.
    Import {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        #[arg(long)]
        history: PathBuf,
        #[arg(long, value_enum)]
        mode: ImportChoice,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ImportChoice {
    Replace,
    Append,
    /// Validate and report without touching the history
    Abort,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f64,
    height: f64,
}

#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    index: usize,
    #[serde(flatten)]
    annotation: &'a Annotation,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    let config = SessionConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, page, zoom, history, output } => {
            run_render(&config, &file, page, zoom, history.as_deref(), output.as_deref())
        }
        Commands::Record { file, history, page, x, y, zoom, origin, name } => {
            run_record(&config, &file, &history, page, (x, y), zoom, origin, name)
        }
        Commands::Move { file, history, index, x, y, zoom, origin } => {
            run_move(&config, &file, &history, index, (x, y), zoom, origin)
        }
        Commands::Edit {
            file, history, index, raw_x, raw_y, x, y, name, part, datatype, align,
        } => {
            let raw = raw_x.zip(raw_y);
            let adjusted = x.zip(y);
            let labels = Labels { name, part, datatype, align };
            run_edit(&config, &file, &history, index, raw, adjusted, labels)
        }
        Commands::Origin { file, history, origin, current_page_dims, page } => {
            run_origin(&config, &file, &history, origin, current_page_dims, page)
        }
        Commands::List { history, page, json } => run_list(&history, page, json),
        Commands::Delete { history, index } => run_delete(&history, index),
        Commands::Clear { history } => run_clear(&history),
        Commands::Import { source, history, mode } => run_import(&source, &history, mode),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env = env_logger::Env::default().default_filter_or(level);
    // A second init in the same process keeps the first logger.
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn run_info(file: &Path) -> Result<()> {
    let document = open_pdf(file)?;

    let pages = document
        .page_sizes()
        .iter()
        .map(|size| PageSizeOutput { width: size.width_pt, height: size.height_pt })
        .collect();
    let payload =
        InfoOutput { path: file.display().to_string(), page_count: document.page_count(), pages };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_render(
    config: &SessionConfig,
    file: &Path,
    page: u32,
    zoom: f64,
    history: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let document = open_pdf(file)?;
    let store = match history {
        Some(path) => load_history(path)?,
        None => AnnotationStore::new(),
    };

    let mut session = ViewerSession::with_store(config.clone(), store);
    session.go_to_page(&document, page_index(page)?)?;
    session.set_exact_zoom(zoom)?;

    let mut image = session.render_current(&document).context("failed to render page")?;
    for marker in session.visible_markers() {
        draw_marker(&mut image, marker.canvas_x, marker.canvas_y);
    }

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_record(
    config: &SessionConfig,
    file: &Path,
    history: &Path,
    page: u32,
    (x, y): (f64, f64),
    zoom: f64,
    origin: Option<Origin>,
    name: Option<String>,
) -> Result<()> {
    let document = open_pdf(file)?;
    let store = load_history_or_empty(history)?;
    let mut session = open_session(config, store, origin);
    session.go_to_page(&document, page_index(page)?)?;
    session.set_exact_zoom(zoom)?;

    match session.press(x, y, &document)? {
        PressOutcome::DragStarted(index) => {
            session.release();
            println!("hit #{} (no point recorded)", index + 1);
            Ok(())
        }
        PressOutcome::Recorded(index) => {
            if let Some(name) = name {
                session.rename(index, name)?;
            }
            if let Some(annotation) = session.store().get(index) {
                println!("{}", annotation.summary_line(index + 1));
            }
            save_history(history, session.store())
        }
    }
}

fn run_move(
    config: &SessionConfig,
    file: &Path,
    history: &Path,
    index: usize,
    (x, y): (f64, f64),
    zoom: f64,
    origin: Option<Origin>,
) -> Result<()> {
    let document = open_pdf(file)?;
    let store = load_history(history)?;
    let index = point_index(index, &store)?;
    let page_number = store.get(index).map(Annotation::page_number).unwrap_or(1);

    let mut session = open_session(config, store, origin);
    session.go_to_page(&document, page_index(page_number)?)?;
    session.set_exact_zoom(zoom)?;
    session.start_drag(index)?;
    session.drag_to(x, y, &document)?;
    session.release();

    if let Some(details) = session.details() {
        println!("{details}");
    }
    save_history(history, session.store())
}

struct Labels {
    name: Option<String>,
    part: Option<String>,
    datatype: Option<String>,
    align: Option<String>,
}

fn run_edit(
    config: &SessionConfig,
    file: &Path,
    history: &Path,
    index: usize,
    raw: Option<(f64, f64)>,
    adjusted: Option<(f64, f64)>,
    labels: Labels,
) -> Result<()> {
    let document = open_pdf(file)?;
    let store = load_history(history)?;
    let index = point_index(index, &store)?;

    let mut edit = match store.get(index) {
        Some(annotation) => PointEdit::from_annotation(annotation),
        None => anyhow::bail!("point #{} does not exist", index + 1),
    };
    if let Some(name) = labels.name {
        edit.name = name;
    }
    if let Some(part) = labels.part {
        edit.part = Part::from(part);
    }
    if let Some(datatype) = labels.datatype {
        edit.datatype = DataType::from(datatype);
    }
    if let Some(align) = labels.align {
        edit.alignment = Alignment::from(align);
    }
    if let Some(raw) = raw {
        edit.raw = raw;
    }
    if let Some(adjusted) = adjusted {
        edit.adjusted = adjusted;
    }

    let mut session = ViewerSession::with_store(config.clone(), store);
    let outcome = session.edit_point(index, edit, &document)?;
    log::info!("edited point #{} ({:?})", index + 1, outcome);

    if let Some(details) = session.details() {
        println!("{details}");
    }
    save_history(history, session.store())
}

fn run_origin(
    config: &SessionConfig,
    file: &Path,
    history: &Path,
    origin: Origin,
    current_page_dims: bool,
    page: u32,
) -> Result<()> {
    let document = open_pdf(file)?;
    let store = load_history(history)?;

    let config = config.clone().with_per_page_dimensions(!current_page_dims);
    let mut session = ViewerSession::with_store(config, store);
    session.go_to_page(&document, page_index(page)?)?;
    session.set_origin(origin, &document).context("failed to recompute coordinates")?;

    for (position, annotation) in session.store().iter().enumerate() {
        println!("{}", annotation.summary_line(position + 1));
    }
    save_history(history, session.store())
}

fn run_list(history: &Path, page: Option<u32>, json: bool) -> Result<()> {
    let store = load_history_or_empty(history)?;
    let entries: Vec<(usize, &Annotation)> = match page {
        Some(page) => store.markers_for_page(page),
        None => store.iter().enumerate().collect(),
    };

    if json {
        let payload: Vec<ListEntry<'_>> = entries
            .into_iter()
            .map(|(index, annotation)| ListEntry { index: index + 1, annotation })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (index, annotation) in entries {
            println!("{}", annotation.summary_line(index + 1));
        }
    }

    Ok(())
}

fn run_delete(history: &Path, index: usize) -> Result<()> {
    let mut store = load_history(history)?;
    let index = point_index(index, &store)?;
    let removed = store.delete(index)?;

    save_history(history, &store)?;
    println!(
        "deleted #{} (page {}, ({:.2}, {:.2}))",
        index + 1,
        removed.page_number(),
        removed.adjusted().0,
        removed.adjusted().1
    );
    Ok(())
}

fn run_clear(history: &Path) -> Result<()> {
    let mut store = load_history_or_empty(history)?;
    let count = store.len();
    store.clear();

    save_history(history, &store)?;
    println!("cleared {count} point(s)");
    Ok(())
}

fn run_import(source: &Path, history: &Path, choice: ImportChoice) -> Result<()> {
    let report = match import_from_path(source) {
        Ok(report) => report,
        Err(CsvError::NoValidData { warnings }) => {
            for warning in &warnings {
                eprintln!("warning: {warning}");
            }
            anyhow::bail!("no valid click data found in {}", source.display());
        }
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read {}", source.display()))
        }
    };

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }

    let mode = match choice {
        ImportChoice::Replace => ImportMode::Replace,
        ImportChoice::Append => ImportMode::Append,
        ImportChoice::Abort => {
            println!(
                "import aborted: {} valid point(s), {} skipped row(s)",
                report.annotations.len(),
                report.warnings.len()
            );
            return Ok(());
        }
    };

    let mut store = load_history_or_empty(history)?;
    let imported = report.annotations.len();
    store.apply_import(report.annotations, mode);
    save_history(history, &store)?;

    println!(
        "imported {imported} point(s), skipped {} row(s), history has {} point(s)",
        report.warnings.len(),
        store.len()
    );
    Ok(())
}

fn open_pdf(path: &Path) -> Result<PdfDocument> {
    ensure_file_exists(path)?;
    PdfDocument::open(path).context("failed to open PDF")
}

/// Session resumed over `store`. Without an explicit origin, the origin of
/// the most recent point stays active.
fn open_session(
    config: &SessionConfig,
    store: AnnotationStore,
    origin: Option<Origin>,
) -> ViewerSession {
    let origin = origin
        .or_else(|| store.last().map(Annotation::origin))
        .unwrap_or(config.default_origin);
    ViewerSession::with_store(config.clone().with_default_origin(origin), store)
}

fn load_history(path: &Path) -> Result<AnnotationStore> {
    ensure_file_exists(path)?;
    load_history_or_empty(path)
}

/// A missing history file, or one holding only the header, is an empty
/// history.
fn load_history_or_empty(path: &Path) -> Result<AnnotationStore> {
    if !path.exists() {
        return Ok(AnnotationStore::new());
    }

    match import_from_path(path) {
        Ok(report) => {
            for warning in &report.warnings {
                log::warn!("{}: skipped {warning}", path.display());
            }
            Ok(AnnotationStore::from_annotations(report.annotations))
        }
        Err(CsvError::NoValidData { warnings }) if warnings.is_empty() => {
            Ok(AnnotationStore::new())
        }
        Err(error) => {
            Err(error).with_context(|| format!("failed to read history {}", path.display()))
        }
    }
}

fn save_history(path: &Path, store: &AnnotationStore) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    export_to_path(path, store)
        .with_context(|| format!("failed to write history {}", path.display()))
}

/// Coordinates and zoom factors end up in the history file, which only
/// holds finite numbers.
fn parse_finite(value: &str) -> Result<f64, String> {
    let number: f64 = value.parse().map_err(|_| format!("'{value}' is not a number"))?;
    if !number.is_finite() {
        return Err(format!("'{value}' is not a finite number"));
    }
    Ok(number)
}

fn page_index(page: u32) -> Result<u32> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    Ok(page - 1)
}

fn point_index(index: usize, store: &AnnotationStore) -> Result<usize> {
    if index == 0 || index > store.len() {
        anyhow::bail!("point #{index} does not exist (history has {} point(s))", store.len());
    }
    Ok(index - 1)
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

/// Red ring of 5 px radius around the marker position.
fn draw_marker(image: &mut RgbaImage, center_x: f64, center_y: f64) {
    const RADIUS: f64 = 5.0;
    let color = image::Rgba([220, 30, 30, 255]);

    let min_x = (center_x - RADIUS - 1.0).floor().max(0.0) as u32;
    let min_y = (center_y - RADIUS - 1.0).floor().max(0.0) as u32;
    let max_x = ((center_x + RADIUS + 1.0).ceil() as u32).min(image.width());
    let max_y = ((center_y + RADIUS + 1.0).ceil() as u32).min(image.height());

    for py in min_y..max_y {
        for px in min_x..max_x {
            let dx = f64::from(px) + 0.5 - center_x;
            let dy = f64::from(py) + 0.5 - center_y;
            let distance = (dx * dx + dy * dy).sqrt();
            if (distance <= RADIUS && distance >= RADIUS - 2.0) || distance <= 1.5 {
                image.put_pixel(px, py, color);
            }
        }
    }
}
