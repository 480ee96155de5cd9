//! Coordinate transformation from the preview surface to the output page
//!
//! Fields are placed in pixels relative to the top-left corner of the live
//! preview surface. The document artifact is produced by capturing that
//! surface as a raster and fitting the raster, aspect ratio preserved and
//! centered, onto a fixed-size page. Mapping a field means restating its
//! position relative to the live surface inside the rectangle the raster
//! occupies on the page.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::{FieldKind, FieldPlacement};

/// Capture pixels per millimetre (96 dpi)
pub const MM_TO_PX: f64 = 3.779527559;

/// Default width of a mapped field, in page units
pub const DEFAULT_FIELD_WIDTH: f64 = 60.0;

/// Default height of a mapped field, in page units
pub const DEFAULT_FIELD_HEIGHT: f64 = 15.0;

/// Width/height pair; pixels or page units depending on context
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// A4 portrait in millimetres
    pub const A4_MM: Size = Size {
        width: 210.0,
        height: 297.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_positive(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Where the captured raster lands on the page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageFit {
    pub scale: f64,
    pub rendered_width: f64,
    pub rendered_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl PageFit {
    /// Fit a capture of `capture` pixels onto `page`, preserving aspect ratio
    pub fn compute(capture: Size, page: Size, density: f64) -> Result<Self> {
        if !density.is_finite() || density <= 0.0 {
            return Err(CoreError::InvalidDensity(density));
        }
        if !capture.is_positive() {
            return Err(CoreError::DegenerateCapture {
                width: capture.width,
                height: capture.height,
            });
        }
        if !page.is_positive() {
            return Err(CoreError::DegeneratePage {
                width: page.width,
                height: page.height,
            });
        }

        let natural_width = capture.width / density;
        let natural_height = capture.height / density;

        let scale_x = page.width / natural_width;
        let scale_y = page.height / natural_height;
        let scale = scale_x.min(scale_y);

        let rendered_width = natural_width * scale;
        let rendered_height = natural_height * scale;

        Ok(Self {
            scale,
            rendered_width,
            rendered_height,
            offset_x: (page.width - rendered_width) / 2.0,
            offset_y: (page.height - rendered_height) / 2.0,
        })
    }

    /// Map a position given as a fraction of the surface into page units
    pub fn place(&self, rel_x: f64, rel_y: f64) -> (f64, f64) {
        (
            self.offset_x + rel_x * self.rendered_width,
            self.offset_y + rel_y * self.rendered_height,
        )
    }
}

/// Everything known about a capture at the moment it was taken
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureGeometry {
    /// Size of the live preview surface, in CSS pixels
    pub surface: Size,
    /// Size of the captured raster, in pixels
    pub capture: Size,
    /// Output page, in page units
    #[serde(default = "default_page")]
    pub page: Size,
    /// Capture pixels per page unit
    #[serde(default = "default_density")]
    pub density: f64,
}

fn default_page() -> Size {
    Size::A4_MM
}

fn default_density() -> f64 {
    MM_TO_PX
}

impl CaptureGeometry {
    /// Capture fitted onto an A4 page at 96 dpi
    pub fn a4(surface: Size, capture: Size) -> Self {
        Self {
            surface,
            capture,
            page: Size::A4_MM,
            density: MM_TO_PX,
        }
    }

    pub fn fit(&self) -> Result<PageFit> {
        PageFit::compute(self.capture, self.page, self.density)
    }
}

/// A field restated in page coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageField {
    pub field_id: String,
    pub recipient_id: String,
    pub kind: FieldKind,
    pub page_number: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Position of a point as a fraction of the surface size
pub fn relative_position(x: f64, y: f64, surface: Size) -> Result<(f64, f64)> {
    if !surface.is_positive() {
        return Err(CoreError::DegenerateSurface {
            width: surface.width,
            height: surface.height,
        });
    }
    Ok((x / surface.width, y / surface.height))
}

/// Map every placement onto page 1 of the output document
pub fn map_fields(geometry: &CaptureGeometry, fields: &[FieldPlacement]) -> Result<Vec<PageField>> {
    relative_position(0.0, 0.0, geometry.surface)?;
    let fit = geometry.fit()?;
    fields
        .iter()
        .map(|field| {
            if !field.x.is_finite() || !field.y.is_finite() {
                return Err(CoreError::InvalidFieldPosition(field.id.clone()));
            }
            let (rel_x, rel_y) = relative_position(field.x, field.y, geometry.surface)?;
            let (x, y) = fit.place(rel_x, rel_y);
            Ok(PageField {
                field_id: field.id.clone(),
                recipient_id: field.recipient_id.clone(),
                kind: field.kind,
                page_number: 1,
                x,
                y,
                width: DEFAULT_FIELD_WIDTH,
                height: DEFAULT_FIELD_HEIGHT,
            })
        })
        .collect()
}
