//! Render configuration
//!
//! All plotting parameters live in one immutable value passed to the
//! parser and the engine, so separate invocations never share state.

use crate::error::{Error, Result};

/// Plotting parameters for one render
///
/// Distances are device pixels; callers working in millimeters convert
/// with `mm * dpi / 25.4` before filling this in.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Dots per inch of the output raster
    pub dpi: f64,
    /// Isotropic offset applied to every aperture feature boundary,
    /// in pixels; negative shrinks
    pub grow_pixels: f64,
    /// X axis scale factor
    pub scale_x: f64,
    /// Y axis scale factor
    pub scale_y: f64,
    /// Blank margin added symmetrically around the combined bounding box
    pub border_pixels: f64,
    /// Strip height; 0 or oversize is clamped to the image height
    pub rows_per_strip: u32,
    /// Invert the polarity of the whole image
    pub invert_polarity: bool,
    /// Accepted but currently inert, see DESIGN.md
    pub rotation: f64,
    /// Count dark pixels while rendering for area reporting
    pub count_area: bool,
}

impl Default for RenderConfig {
    fn default() -> RenderConfig {
        RenderConfig {
            dpi: 2400.0,
            grow_pixels: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            border_pixels: 0.0,
            rows_per_strip: 512,
            invert_polarity: false,
            rotation: 0.0,
            count_area: false,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Default::default()
    }
    /// Check parameter ranges; run before any document is parsed
    pub fn validate(&self) -> Result<()> {
        if !self.dpi.is_finite() || self.dpi <= 0.0 {
            return Err(Error::config(format!("dpi must be > 0, got {}", self.dpi)));
        }
        if !self.border_pixels.is_finite() || self.border_pixels < 0.0 {
            return Err(Error::config(format!(
                "border must be >= 0 pixels, got {}",
                self.border_pixels
            )));
        }
        if !self.scale_x.is_finite() || !self.scale_y.is_finite()
            || self.scale_x == 0.0 || self.scale_y == 0.0
        {
            return Err(Error::config("scale factors must be finite and non-zero"));
        }
        if !self.grow_pixels.is_finite() || !self.rotation.is_finite() {
            return Err(Error::config("grow and rotation must be finite"));
        }
        Ok(())
    }
    /// Pixels per gerber inch on the x axis
    pub fn pixels_per_inch_x(&self) -> f64 {
        self.dpi * self.scale_x
    }
    /// Pixels per gerber inch on the y axis
    pub fn pixels_per_inch_y(&self) -> f64 {
        self.dpi * self.scale_y
    }
}
