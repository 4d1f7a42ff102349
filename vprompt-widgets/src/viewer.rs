//! Full-size image viewer with zoom and pan

use crate::document::Document;

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 3.0;
const WHEEL_STEP: f64 = 0.1;
const CLICK_ZOOM: f64 = 2.0;
/// Share of the window a fitted image may take
const FIT_FRACTION: f64 = 0.9;

/// Where the image is drawn, relative to the modal's top-left corner
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageViewer {
    open: bool,
    url: String,
    filename: String,
    caption: String,
    scale: f64,
    offset: (f64, f64),
}

impl ImageViewer {
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            ..Default::default()
        }
    }

    /// Show `url` and lock page scrolling
    pub fn open(&mut self, doc: &mut Document, url: impl Into<String>, filename: impl Into<String>) {
        self.url = url.into();
        self.filename = filename.into();
        self.caption = format!("{} (Press ESC to close)", self.filename);
        self.scale = 1.0;
        self.offset = (0.0, 0.0);
        self.open = true;
        doc.set_scroll_locked(true);
    }

    pub fn close(&mut self, doc: &mut Document) {
        self.open = false;
        self.scale = 1.0;
        self.offset = (0.0, 0.0);
        self.caption = self.filename.clone();
        doc.set_scroll_locked(false);
    }

    /// Wheel up zooms in, wheel down zooms out
    pub fn wheel(&mut self, delta_y: f64) {
        if !self.open || delta_y == 0.0 {
            return;
        }
        let step = if delta_y > 0.0 { -WHEEL_STEP } else { WHEEL_STEP };
        self.set_scale(self.scale + step);
    }

    /// Toggle between fit and 2x
    pub fn click(&mut self) {
        if !self.open {
            return;
        }
        if self.scale == 1.0 {
            self.set_scale(CLICK_ZOOM);
        } else {
            self.set_scale(1.0);
        }
    }

    pub fn double_click(&mut self) {
        if self.open {
            self.set_scale(1.0);
        }
    }

    /// Drag the image; only meaningful while zoomed in
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if self.open && self.scale > 1.0 {
            self.offset.0 += dx;
            self.offset.1 += dy;
        }
    }

    /// Returns true if the key was handled
    pub fn key(&mut self, doc: &mut Document, key: &str) -> bool {
        if self.open && key == "Escape" {
            self.close(doc);
            return true;
        }
        false
    }

    /// `(url, filename)` for the download button
    pub fn download_target(&self) -> Option<(&str, &str)> {
        if self.url.is_empty() {
            None
        } else {
            Some((&self.url, &self.filename))
        }
    }

    fn set_scale(&mut self, scale: f64) {
        // Round away float drift from repeated 0.1 steps
        let scale = (scale * 10.0).round() / 10.0;
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        if self.scale <= 1.0 {
            self.offset = (0.0, 0.0);
        }
    }

    /// Fit `image` into 90% of `bounds` without upscaling, then apply zoom
    /// around the centre and the pan offset
    pub fn layout(&self, image: (f64, f64), bounds: (f64, f64)) -> ImageRect {
        let (w, h) = image;
        let fit = if w > 0.0 && h > 0.0 {
            (bounds.0 * FIT_FRACTION / w)
                .min(bounds.1 * FIT_FRACTION / h)
                .min(1.0)
        } else {
            0.0
        };
        let width = w * fit * self.scale;
        let height = h * fit * self.scale;
        ImageRect {
            x: (bounds.0 - width) / 2.0 + self.offset.0,
            y: (bounds.1 - height) / 2.0 + self.offset.1,
            width,
            height,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }
}
