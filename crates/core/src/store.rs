//! Ordered click history with page-scoped marker lookup
//!
//! The store never reads ambient UI state: the active origin and the page
//! dimensions are passed into every call that needs them.

use crate::annotation::{Alignment, Annotation, DataType, Part};
use crate::error::{AnnotationError, AnnotationResult};
use crate::transform::Origin;

/// Raw edits closer than this (in points, per axis) to the stored value are
/// not treated as raw edits.
pub const RAW_EDIT_TOLERANCE: f64 = 0.01;

/// How imported annotations are merged into the existing history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Replace,
    Append,
}

/// Which coordinate set an edit ended up changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateEdit {
    /// Raw moved; adjusted and millimeter values were re-derived
    Raw,
    /// Raw stayed within tolerance; adjusted values (if any) were written as given
    AdjustedOnly,
}

/// Values submitted from an edit dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct PointEdit {
    pub name: String,
    pub part: Part,
    pub datatype: DataType,
    pub alignment: Alignment,
    pub raw: (f64, f64),
    pub adjusted: (f64, f64),
}

impl PointEdit {
    /// Start from the annotation's current values.
    pub fn from_annotation(annotation: &Annotation) -> Self {
        Self {
            name: annotation.name.clone(),
            part: annotation.part.clone(),
            datatype: annotation.datatype.clone(),
            alignment: annotation.alignment.clone(),
            raw: annotation.raw(),
            adjusted: annotation.adjusted(),
        }
    }
}

/// Click history in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_annotations(annotations: Vec<Annotation>) -> Self {
        Self { annotations }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Annotation> {
        self.annotations.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.annotations.iter()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn last(&self) -> Option<&Annotation> {
        self.annotations.last()
    }

    fn get_mut(&mut self, index: usize) -> AnnotationResult<&mut Annotation> {
        let len = self.annotations.len();
        self.annotations.get_mut(index).ok_or(AnnotationError::IndexOutOfRange { index, len })
    }

    /// Append a new annotation for a click at a raw position.
    pub fn record_click(
        &mut self,
        page_number: u32,
        raw_x: f64,
        raw_y: f64,
        page_width: f64,
        page_height: f64,
        origin: Origin,
    ) -> AnnotationResult<&Annotation> {
        ensure_finite("raw", raw_x, raw_y)?;
        let name = format!("point_{}", self.annotations.len() + 1);
        let annotation =
            Annotation::new(page_number, raw_x, raw_y, page_width, page_height, origin, name);

        log::debug!(
            "recorded {} on page {} at raw ({:.2}, {:.2})",
            annotation.name,
            page_number,
            raw_x,
            raw_y
        );

        self.annotations.push(annotation);
        Ok(&self.annotations[self.annotations.len() - 1])
    }

    /// Re-derive every annotation under `origin` using one set of page
    /// dimensions for all pages.
    ///
    /// Annotations on pages of a different size end up projected against the
    /// wrong page; see [`set_origin_per_page`](Self::set_origin_per_page).
    pub fn set_origin(&mut self, origin: Origin, page_width: f64, page_height: f64) {
        for annotation in &mut self.annotations {
            annotation.reproject(page_width, page_height, origin);
        }
        log::debug!("reprojected {} annotation(s) to {}", self.annotations.len(), origin);
    }

    /// Re-derive every annotation under `origin` using the dimensions of its
    /// own page.
    ///
    /// `page_dimensions` is called once per distinct page number. If any
    /// lookup fails the collection is left unchanged.
    pub fn set_origin_per_page<F>(
        &mut self,
        origin: Origin,
        mut page_dimensions: F,
    ) -> AnnotationResult<()>
    where
        F: FnMut(u32) -> AnnotationResult<(f64, f64)>,
    {
        let mut dimensions: Vec<(u32, (f64, f64))> = Vec::new();
        for annotation in &self.annotations {
            let page = annotation.page_number();
            if !dimensions.iter().any(|(known, _)| *known == page) {
                dimensions.push((page, page_dimensions(page)?));
            }
        }

        for annotation in &mut self.annotations {
            let page = annotation.page_number();
            let found = dimensions.iter().find(|(known, _)| *known == page);
            if let Some((_, (width, height))) = found {
                annotation.reproject(*width, *height, origin);
            }
        }

        log::debug!(
            "reprojected {} annotation(s) across {} page(s) to {}",
            self.annotations.len(),
            dimensions.len(),
            origin
        );
        Ok(())
    }

    /// Apply a raw-coordinate edit.
    ///
    /// Only a change larger than [`RAW_EDIT_TOLERANCE`] on either axis moves
    /// the point; smaller changes leave coordinates as they are and report
    /// [`CoordinateEdit::AdjustedOnly`].
    pub fn edit_raw(
        &mut self,
        index: usize,
        new_raw_x: f64,
        new_raw_y: f64,
        page_width: f64,
        page_height: f64,
        origin: Origin,
    ) -> AnnotationResult<CoordinateEdit> {
        ensure_finite("raw", new_raw_x, new_raw_y)?;
        let annotation = self.get_mut(index)?;
        let (raw_x, raw_y) = annotation.raw();

        if (new_raw_x - raw_x).abs() > RAW_EDIT_TOLERANCE
            || (new_raw_y - raw_y).abs() > RAW_EDIT_TOLERANCE
        {
            annotation.move_to(new_raw_x, new_raw_y, page_width, page_height, origin);
            Ok(CoordinateEdit::Raw)
        } else {
            Ok(CoordinateEdit::AdjustedOnly)
        }
    }

    /// Overwrite adjusted coordinates directly; raw is untouched.
    pub fn edit_adjusted(
        &mut self,
        index: usize,
        new_adjusted_x: f64,
        new_adjusted_y: f64,
    ) -> AnnotationResult<()> {
        ensure_finite("adjusted", new_adjusted_x, new_adjusted_y)?;
        self.get_mut(index)?.set_adjusted(new_adjusted_x, new_adjusted_y);
        Ok(())
    }

    /// Apply every field of an edit dialog.
    ///
    /// Labels and tags are always written. Coordinates follow the raw edit
    /// rule: a raw change beyond tolerance re-derives adjusted under the
    /// annotation's own origin, otherwise the submitted adjusted values win.
    pub fn edit_point(
        &mut self,
        index: usize,
        edit: PointEdit,
        page_width: f64,
        page_height: f64,
    ) -> AnnotationResult<CoordinateEdit> {
        ensure_finite("raw", edit.raw.0, edit.raw.1)?;
        ensure_finite("adjusted", edit.adjusted.0, edit.adjusted.1)?;
        let annotation = self.get_mut(index)?;
        annotation.name = edit.name;
        annotation.part = edit.part;
        annotation.datatype = edit.datatype;
        annotation.alignment = edit.alignment;
        let origin = annotation.origin();

        let outcome =
            self.edit_raw(index, edit.raw.0, edit.raw.1, page_width, page_height, origin)?;
        if outcome == CoordinateEdit::AdjustedOnly {
            self.edit_adjusted(index, edit.adjusted.0, edit.adjusted.1)?;
        }
        Ok(outcome)
    }

    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> AnnotationResult<()> {
        self.get_mut(index)?.name = name.into();
        Ok(())
    }

    /// Drag update: always takes the new raw position.
    pub fn move_point(
        &mut self,
        index: usize,
        new_raw_x: f64,
        new_raw_y: f64,
        page_width: f64,
        page_height: f64,
        origin: Origin,
    ) -> AnnotationResult<&Annotation> {
        ensure_finite("raw", new_raw_x, new_raw_y)?;
        let annotation = self.get_mut(index)?;
        annotation.move_to(new_raw_x, new_raw_y, page_width, page_height, origin);
        Ok(&*annotation)
    }

    pub fn delete(&mut self, index: usize) -> AnnotationResult<Annotation> {
        let len = self.annotations.len();
        if index >= len {
            return Err(AnnotationError::IndexOutOfRange { index, len });
        }
        Ok(self.annotations.remove(index))
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    /// Annotations on `page_number` with their index in the full history.
    pub fn markers_for_page(&self, page_number: u32) -> Vec<(usize, &Annotation)> {
        self.annotations
            .iter()
            .enumerate()
            .filter(|(_, annotation)| annotation.page_number() == page_number)
            .collect()
    }

    /// Lowest index on `page_number` whose raw position is within `tolerance`
    /// of the query on both axes.
    pub fn find_at(
        &self,
        page_number: u32,
        raw_x: f64,
        raw_y: f64,
        tolerance: f64,
    ) -> Option<usize> {
        self.annotations.iter().position(|annotation| {
            annotation.page_number() == page_number && annotation.is_near(raw_x, raw_y, tolerance)
        })
    }

    pub fn extend(&mut self, annotations: impl IntoIterator<Item = Annotation>) {
        self.annotations.extend(annotations);
    }

    pub fn replace_all(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
    }

    /// Merge parsed annotations into the history.
    pub fn apply_import(&mut self, imported: Vec<Annotation>, mode: ImportMode) {
        log::info!("importing {} annotation(s) ({:?})", imported.len(), mode);
        match mode {
            ImportMode::Replace => self.replace_all(imported),
            ImportMode::Append => self.extend(imported),
        }
    }
}

/// NaN or infinite coordinates would be written to CSV as text the importer
/// rejects.
fn ensure_finite(kind: &str, x: f64, y: f64) -> AnnotationResult<()> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(AnnotationError::InvalidArgument(format!(
            "{kind} coordinates must be finite, got ({x}, {y})"
        )))
    }
}

impl<'a> IntoIterator for &'a AnnotationStore {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.annotations.iter()
    }
}
