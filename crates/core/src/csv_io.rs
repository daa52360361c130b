//! CSV export and import of the click history
//!
//! One row per annotation, twelve columns:
//!
//! ```text
//! Page,Origin,Raw_X,Raw_Y,X,Y,PART,NAME,MM_X,MM_Y,Data_Type,Align
//! ```
//!
//! Numbers are written with exactly two decimals. Free-text columns that
//! contain a delimiter or quote are quoted; every other row is plain
//! comma-joined text. Import is tolerant line by line: malformed rows are
//! skipped and reported, and only a file without a single usable row fails.

use crate::annotation::{Alignment, Annotation, DataType, Part};
use crate::transform::Origin;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Column headers, in file order
pub const HEADER: [&str; FIELD_COUNT] = [
    "Page", "Origin", "Raw_X", "Raw_Y", "X", "Y", "PART", "NAME", "MM_X", "MM_Y", "Data_Type",
    "Align",
];

pub const FIELD_COUNT: usize = 12;

/// Token whose presence marks the first row as a header
const HEADER_MARKER: &str = "Page";

/// Error types for CSV export and import
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no valid click data found ({} malformed row(s))", .warnings.len())]
    NoValidData { warnings: Vec<MalformedRow> },
}

pub type CsvResult<T> = Result<T, CsvError>;

/// Why a single row was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("invalid format, expected 12 columns, got {0}")]
    FieldCount(usize),

    #[error("invalid origin '{0}'")]
    InvalidOrigin(String),

    #[error("invalid page number '{0}'")]
    InvalidPage(String),

    #[error("invalid number '{value}' in column {column}")]
    InvalidNumber { column: &'static str, value: String },

    #[error("unreadable row: {0}")]
    Unreadable(String),
}

/// A skipped row and the reason it was skipped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct MalformedRow {
    /// 1-based line number in the source
    pub line: u64,
    pub reason: RowError,
}

/// Outcome of a successful import: at least one annotation was parsed.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub annotations: Vec<Annotation>,
    pub warnings: Vec<MalformedRow>,
}

/// Write the full history, header first, in collection order.
///
/// Rows are streamed; an I/O failure part way leaves the rows written so
/// far in place.
pub fn export_csv<'a, W, I>(writer: W, annotations: I) -> CsvResult<()>
where
    W: Write,
    I: IntoIterator<Item = &'a Annotation>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    csv_writer.write_record(HEADER)?;

    let mut rows = 0usize;
    for annotation in annotations {
        csv_writer.write_record(&annotation_row(annotation))?;
        rows += 1;
    }

    csv_writer.flush()?;
    log::debug!("exported {rows} annotation(s)");
    Ok(())
}

fn annotation_row(annotation: &Annotation) -> [String; FIELD_COUNT] {
    let (raw_x, raw_y) = annotation.raw();
    let (x, y) = annotation.adjusted();
    let (mm_x, mm_y) = annotation.mm();

    [
        annotation.page_number().to_string(),
        annotation.origin().to_string(),
        format!("{raw_x:.2}"),
        format!("{raw_y:.2}"),
        format!("{x:.2}"),
        format!("{y:.2}"),
        annotation.part.to_string(),
        annotation.name.clone(),
        format!("{mm_x:.2}"),
        format!("{mm_y:.2}"),
        annotation.datatype.to_string(),
        annotation.alignment.to_string(),
    ]
}

/// Parse a history file, skipping malformed rows.
///
/// Each line is parsed on its own, so an unbalanced quote in one row cannot
/// swallow the rows after it. Returns [`CsvError::NoValidData`] when no row
/// could be parsed; the caller then has nothing to merge and keeps its
/// collection as is.
pub fn import_csv<R: Read>(mut reader: R) -> CsvResult<ImportReport> {
    let mut input = Vec::new();
    reader.read_to_end(&mut input)?;

    let mut report = ImportReport::default();
    let mut first_row = true;

    for (number, line) in input.split(|byte| *byte == b'\n').enumerate() {
        let line_number = number as u64 + 1;

        let record = match read_line_record(line) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(err) => {
                push_warning(&mut report, line_number, RowError::Unreadable(err.to_string()));
                first_row = false;
                continue;
            }
        };

        let fields: Vec<&str> = record.iter().collect();

        if fields.len() == 1 && fields[0].trim().is_empty() {
            continue;
        }

        if first_row {
            first_row = false;
            if fields.iter().any(|field| field.contains(HEADER_MARKER)) {
                continue;
            }
        }

        match parse_row(&fields) {
            Ok(annotation) => report.annotations.push(annotation),
            Err(reason) => push_warning(&mut report, line_number, reason),
        }
    }

    if report.annotations.is_empty() {
        return Err(CsvError::NoValidData { warnings: report.warnings });
    }

    log::info!(
        "parsed {} annotation(s), skipped {} row(s)",
        report.annotations.len(),
        report.warnings.len()
    );
    Ok(report)
}

/// The single record on `line`, or `None` for an empty line.
fn read_line_record(line: &[u8]) -> Result<Option<csv::StringRecord>, csv::Error> {
    let mut csv_reader =
        csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(line);
    csv_reader.records().next().transpose()
}

fn push_warning(report: &mut ImportReport, line: u64, reason: RowError) {
    let warning = MalformedRow { line, reason };
    log::warn!("skipping {warning}");
    report.warnings.push(warning);
}

fn parse_row(fields: &[&str]) -> Result<Annotation, RowError> {
    if fields.len() != FIELD_COUNT {
        return Err(RowError::FieldCount(fields.len()));
    }

    // Surrounding whitespace on the line itself is not part of the data
    let page_field = fields[0].trim_start();
    let align_field = fields[FIELD_COUNT - 1].trim_end();

    let page_number = page_field
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|page| *page >= 1)
        .ok_or_else(|| RowError::InvalidPage(page_field.to_string()))?;

    let origin = fields[1]
        .parse::<Origin>()
        .map_err(|_| RowError::InvalidOrigin(fields[1].to_string()))?;

    let raw_x = parse_number(fields[2], "Raw_X")?;
    let raw_y = parse_number(fields[3], "Raw_Y")?;
    let x = parse_number(fields[4], "X")?;
    let y = parse_number(fields[5], "Y")?;
    let mm_x = parse_number(fields[8], "MM_X")?;
    let mm_y = parse_number(fields[9], "MM_Y")?;

    let part = Part::from(fields[6]);
    let datatype = DataType::from(fields[10]);
    let alignment = Alignment::from(align_field);

    if !(part.is_recommended() && datatype.is_recommended() && alignment.is_recommended()) {
        log::debug!("page {page_number} row uses custom tags: {part} / {datatype} / {alignment}");
    }

    Ok(Annotation::from_stored(
        page_number,
        origin,
        (raw_x, raw_y),
        (x, y),
        (mm_x, mm_y),
        fields[7],
        part,
        datatype,
        alignment,
    ))
}

fn parse_number(value: &str, column: &'static str) -> Result<f64, RowError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| RowError::InvalidNumber { column, value: value.to_string() })
}

/// Export to a file, creating or truncating it.
pub fn export_to_path<'a, I>(path: &Path, annotations: I) -> CsvResult<()>
where
    I: IntoIterator<Item = &'a Annotation>,
{
    let file = File::create(path)?;
    export_csv(BufWriter::new(file), annotations)
}

pub fn import_from_path(path: &Path) -> CsvResult<ImportReport> {
    let file = File::open(path)?;
    import_csv(BufReader::new(file))
}
