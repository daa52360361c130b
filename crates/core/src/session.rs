//! Viewer state around the annotation store.
//!
//! Holds what a page viewer tracks between input events (current page, zoom,
//! selected origin, the marker being dragged) and turns canvas events into
//! store calls. The document itself stays outside: every operation that needs
//! page geometry takes a [`RenderService`].

use crate::annotation::Annotation;
use crate::config::SessionConfig;
use crate::error::{AnnotationError, AnnotationResult};
use crate::store::{AnnotationStore, CoordinateEdit, ImportMode, PointEdit};
use crate::transform::Origin;
use pagepoint_pdf::{RenderRequest, RenderResult, RenderService, RgbaImage};

/// What a press on the canvas did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// The press landed on an existing marker, which is now being dragged
    DragStarted(usize),
    /// A new annotation was recorded at this index
    Recorded(usize),
}

/// A marker to draw on the current page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleMarker {
    /// Index in the full history
    pub index: usize,
    pub canvas_x: f64,
    pub canvas_y: f64,
}

#[derive(Debug, Clone)]
pub struct ViewerSession {
    config: SessionConfig,
    /// 0-based index of the page on screen
    current_page: u32,
    zoom: f64,
    origin: Origin,
    store: AnnotationStore,
    dragging: Option<usize>,
    selected: Option<usize>,
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl ViewerSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_store(config, AnnotationStore::new())
    }

    /// Resume a session over an existing history, e.g. one read from CSV.
    pub fn with_store(config: SessionConfig, store: AnnotationStore) -> Self {
        let selected = store.len().checked_sub(1);
        Self {
            origin: config.default_origin,
            config,
            current_page: 0,
            zoom: 1.0,
            store,
            dragging: None,
            selected,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// 1-based number of the page on screen, as stored in annotations
    pub fn page_number(&self) -> u32 {
        self.current_page + 1
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn dragging(&self) -> Option<usize> {
        self.dragging
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn canvas_to_raw(&self, canvas_x: f64, canvas_y: f64) -> (f64, f64) {
        (canvas_x / self.zoom, canvas_y / self.zoom)
    }

    /// Clamp into the configured limits. A NaN request lands on `min_zoom`.
    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        self.zoom = zoom.max(self.config.min_zoom).min(self.config.max_zoom);
        self.zoom
    }

    /// Set the zoom that incoming canvas coordinates were taken at.
    ///
    /// Nothing is clamped: a zoom outside the configured limits would map
    /// the coordinates to the wrong raw position, so it is refused.
    pub fn set_exact_zoom(&mut self, zoom: f64) -> AnnotationResult<f64> {
        let (min, max) = (self.config.min_zoom, self.config.max_zoom);
        if !(zoom.is_finite() && zoom >= min && zoom <= max) {
            return Err(AnnotationError::InvalidArgument(format!(
                "zoom {zoom} is outside the range {min}..={max}"
            )));
        }
        self.zoom = zoom;
        Ok(zoom)
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.set_zoom(self.zoom * self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.set_zoom(self.zoom / self.config.zoom_step)
    }

    pub fn reset_zoom(&mut self) -> f64 {
        self.zoom = 1.0;
        self.zoom
    }

    /// Returns whether the page changed.
    pub fn next_page<R: RenderService + ?Sized>(&mut self, renderer: &R) -> bool {
        if self.current_page + 1 < renderer.page_count() {
            self.current_page += 1;
            self.dragging = None;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.current_page > 0 {
            self.current_page -= 1;
            self.dragging = None;
            true
        } else {
            false
        }
    }

    pub fn go_to_page<R: RenderService + ?Sized>(
        &mut self,
        renderer: &R,
        page_index: u32,
    ) -> AnnotationResult<()> {
        let page_count = renderer.page_count();
        if page_index >= page_count {
            return Err(AnnotationError::PageOutOfRange { page: page_index + 1, page_count });
        }
        if page_index != self.current_page {
            self.dragging = None;
        }
        self.current_page = page_index;
        Ok(())
    }

    /// Dimensions in points of a 1-based page.
    pub fn page_dimensions<R: RenderService + ?Sized>(
        renderer: &R,
        page_number: u32,
    ) -> AnnotationResult<(f64, f64)> {
        let page_count = renderer.page_count();
        if page_number == 0 || page_number > page_count {
            return Err(AnnotationError::PageOutOfRange { page: page_number, page_count });
        }
        let size = renderer.page_size(page_number - 1)?;
        Ok((size.width_pt, size.height_pt))
    }

    fn current_dimensions<R: RenderService + ?Sized>(
        &self,
        renderer: &R,
    ) -> AnnotationResult<(f64, f64)> {
        Self::page_dimensions(renderer, self.page_number())
    }

    /// Dimensions used when re-deriving the annotation at `index`.
    fn dimensions_for<R: RenderService + ?Sized>(
        &self,
        renderer: &R,
        index: usize,
    ) -> AnnotationResult<(f64, f64)> {
        let annotation = self.store.get(index).ok_or(AnnotationError::IndexOutOfRange {
            index,
            len: self.store.len(),
        })?;

        if self.config.per_page_dimensions {
            Self::page_dimensions(renderer, annotation.page_number())
        } else {
            self.current_dimensions(renderer)
        }
    }

    /// Switch the active origin and re-derive the whole history under it.
    pub fn set_origin<R: RenderService + ?Sized>(
        &mut self,
        origin: Origin,
        renderer: &R,
    ) -> AnnotationResult<()> {
        if self.config.per_page_dimensions {
            self.store
                .set_origin_per_page(origin, |page| Self::page_dimensions(renderer, page))?;
        } else {
            let (width, height) = self.current_dimensions(renderer)?;
            self.store.set_origin(origin, width, height);
        }
        self.origin = origin;
        Ok(())
    }

    /// Handle a mouse press at canvas coordinates.
    ///
    /// A press within the marker tolerance of a marker on the current page
    /// starts dragging it; anywhere else records a new point.
    pub fn press<R: RenderService + ?Sized>(
        &mut self,
        canvas_x: f64,
        canvas_y: f64,
        renderer: &R,
    ) -> AnnotationResult<PressOutcome> {
        let (raw_x, raw_y) = self.canvas_to_raw(canvas_x, canvas_y);
        let tolerance = self.config.marker_tolerance_px / self.zoom;

        if let Some(index) = self.store.find_at(self.page_number(), raw_x, raw_y, tolerance) {
            log::debug!("press hit marker #{}", index + 1);
            self.dragging = Some(index);
            self.selected = Some(index);
            return Ok(PressOutcome::DragStarted(index));
        }

        let (width, height) = self.current_dimensions(renderer)?;
        self.store.record_click(self.page_number(), raw_x, raw_y, width, height, self.origin)?;
        let index = self.store.len() - 1;
        self.selected = Some(index);
        Ok(PressOutcome::Recorded(index))
    }

    /// Grab a marker by index instead of by position. The marker must be on
    /// the current page.
    pub fn start_drag(&mut self, index: usize) -> AnnotationResult<()> {
        let len = self.store.len();
        let annotation =
            self.store.get(index).ok_or(AnnotationError::IndexOutOfRange { index, len })?;
        if annotation.page_number() != self.page_number() {
            return Err(AnnotationError::InvalidArgument(format!(
                "point #{} is on page {}, not on page {}",
                index + 1,
                annotation.page_number(),
                self.page_number()
            )));
        }
        self.dragging = Some(index);
        self.selected = Some(index);
        Ok(())
    }

    /// Move the marker being dragged. Does nothing without a drag in flight.
    pub fn drag_to<R: RenderService + ?Sized>(
        &mut self,
        canvas_x: f64,
        canvas_y: f64,
        renderer: &R,
    ) -> AnnotationResult<Option<&Annotation>> {
        let Some(index) = self.dragging else {
            return Ok(None);
        };

        let (raw_x, raw_y) = self.canvas_to_raw(canvas_x, canvas_y);
        let (width, height) = self.current_dimensions(renderer)?;
        let annotation = self.store.move_point(index, raw_x, raw_y, width, height, self.origin)?;
        Ok(Some(annotation))
    }

    /// End the drag in flight, returning the index that was dragged.
    pub fn release(&mut self) -> Option<usize> {
        self.dragging.take()
    }

    /// Markers on the current page at their canvas position.
    pub fn visible_markers(&self) -> Vec<VisibleMarker> {
        self.store
            .markers_for_page(self.page_number())
            .into_iter()
            .map(|(index, annotation)| {
                let (canvas_x, canvas_y) = annotation.marker_position(self.zoom);
                VisibleMarker { index, canvas_x, canvas_y }
            })
            .collect()
    }

    pub fn render_current<R: RenderService + ?Sized>(
        &self,
        renderer: &R,
    ) -> RenderResult<RgbaImage> {
        renderer.render_page(RenderRequest { page_index: self.current_page, scale: self.zoom })
    }

    pub fn select(&mut self, index: usize) -> AnnotationResult<&Annotation> {
        let len = self.store.len();
        let annotation =
            self.store.get(index).ok_or(AnnotationError::IndexOutOfRange { index, len })?;
        self.selected = Some(index);
        Ok(annotation)
    }

    /// Coordinate readout for the selected point.
    pub fn details(&self) -> Option<String> {
        self.selected
            .and_then(|index| self.store.get(index))
            .map(Annotation::coordinate_details)
    }

    pub fn edit_point<R: RenderService + ?Sized>(
        &mut self,
        index: usize,
        edit: PointEdit,
        renderer: &R,
    ) -> AnnotationResult<CoordinateEdit> {
        let (width, height) = self.dimensions_for(renderer, index)?;
        let outcome = self.store.edit_point(index, edit, width, height)?;
        self.selected = Some(index);
        Ok(outcome)
    }

    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> AnnotationResult<()> {
        self.store.rename(index, name)?;
        self.selected = Some(index);
        Ok(())
    }

    /// Remove a point. Selection moves to the previous point, or to the first
    /// one when the head of the history was removed.
    pub fn delete(&mut self, index: usize) -> AnnotationResult<Annotation> {
        let removed = self.store.delete(index)?;

        self.dragging = match self.dragging {
            Some(dragged) if dragged == index => None,
            Some(dragged) if dragged > index => Some(dragged - 1),
            other => other,
        };
        self.selected = if self.store.is_empty() {
            None
        } else {
            Some(index.saturating_sub(1))
        };

        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.dragging = None;
        self.selected = None;
    }

    pub fn apply_import(&mut self, imported: Vec<Annotation>, mode: ImportMode) {
        self.dragging = None;
        self.store.apply_import(imported, mode);
        self.selected = self.store.len().checked_sub(1);
    }
}
