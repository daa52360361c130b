//! Rendering service for clickable document pages.
//!
//! Exposes the three things the annotation engine needs from a document:
//! how many pages it has, how big each page is in points, and a raster of a
//! page at a given zoom factor.

use image::{ImageBuffer, Rgba};
use lopdf::Document;
use std::fs;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Size assumed for pages whose MediaBox is missing or malformed (US Letter).
pub const FALLBACK_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f64,
    pub height_pt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// 0-based page index
    pub page_index: u32,
    /// Pixels per point
    pub scale: f64,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
}

pub type RenderResult<T> = Result<T, RenderError>;

/// The document side of the click workflow.
///
/// Page indices are 0-based here; annotations carry 1-based page numbers.
pub trait RenderService {
    fn page_count(&self) -> u32;
    fn page_size(&self, page_index: u32) -> RenderResult<PageSize>;
    fn render_page(&self, request: RenderRequest) -> RenderResult<RgbaImage>;
}

/// PDF document backed by `lopdf`.
///
/// Only page geometry is read; rendering produces a blank page canvas with a
/// thin frame at the requested scale.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    page_sizes: Vec<PageSize>,
}

impl PdfDocument {
    pub fn open(source: impl Into<OpenSource>) -> RenderResult<Self> {
        let bytes = match source.into() {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = parse_page_sizes(&bytes)?;
        log::debug!("opened PDF with {} page(s)", page_sizes.len());

        Ok(Self { page_sizes })
    }

    pub fn page_sizes(&self) -> &[PageSize] {
        &self.page_sizes
    }
}

fn parse_page_sizes(bytes: &[u8]) -> RenderResult<Vec<PageSize>> {
    if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(RenderError::EncryptedUnsupported);
    }

    let doc = Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    let mut sizes = Vec::with_capacity(pages.len());

    for (page_number, object_id) in pages {
        let dict = doc.get_dictionary(object_id)?;
        let size = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| obj.as_array().ok())
            .and_then(|array| {
                if array.len() != 4 {
                    return None;
                }
                let x0 = f64::from(array[0].as_float().ok()?);
                let y0 = f64::from(array[1].as_float().ok()?);
                let x1 = f64::from(array[2].as_float().ok()?);
                let y1 = f64::from(array[3].as_float().ok()?);
                Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
            })
            .unwrap_or_else(|| {
                log::warn!("page {page_number} has no usable MediaBox, assuming US Letter");
                FALLBACK_PAGE_SIZE
            });

        sizes.push(size);
    }

    if sizes.is_empty() {
        return Err(RenderError::NoPages);
    }

    Ok(sizes)
}

impl RenderService for PdfDocument {
    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    fn page_size(&self, page_index: u32) -> RenderResult<PageSize> {
        self.page_sizes.get(page_index as usize).copied().ok_or(RenderError::PageOutOfRange {
            page: page_index,
            page_count: self.page_count(),
        })
    }

    fn render_page(&self, request: RenderRequest) -> RenderResult<RgbaImage> {
        let page_size = self.page_size(request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }
}
