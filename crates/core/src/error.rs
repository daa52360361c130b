/// Errors raised by the annotation engine
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    /// An argument outside the accepted value set, e.g. an unknown origin token
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index {index} out of range (len={len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("render service error: {0}")]
    Render(#[from] pagepoint_pdf::RenderError),
}

pub type AnnotationResult<T> = Result<T, AnnotationError>;
