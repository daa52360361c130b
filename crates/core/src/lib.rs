//! Pagepoint Core Library
//!
//! Click annotations on document pages: origin-aware coordinate projection,
//! the click history, CSV persistence and the viewer session driving them.

pub mod annotation;
pub mod config;
pub mod csv_io;
pub mod error;
pub mod session;
pub mod store;
pub mod transform;

pub use annotation::{Alignment, Annotation, DataType, Part};
pub use config::{ConfigError, SessionConfig};
pub use csv_io::{
    export_csv, export_to_path, import_csv, import_from_path, CsvError, CsvResult, ImportReport,
    MalformedRow, RowError, HEADER,
};
pub use error::{AnnotationError, AnnotationResult};
pub use session::{PressOutcome, ViewerSession, VisibleMarker};
pub use store::{AnnotationStore, CoordinateEdit, ImportMode, PointEdit, RAW_EDIT_TOLERANCE};
pub use transform::{adjust, adjust_named, mm2pt, pt2mm, Origin, MM_PER_POINT};
