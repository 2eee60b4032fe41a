/// Pixel dimensions of a captured screenshot.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A named viewport used for one independent capture and analysis pass.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Device {
    pub name: String,
    /// Viewport size in CSS pixels.
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub pixel_ratio: f64,
    /// Smallest acceptable target edge, in CSS pixels.
    #[cfg_attr(feature = "serde-full", serde(default = "default_min_target_css"))]
    pub min_target_css: f64,
}

fn default_min_target_css() -> f64 {
    24.0
}

impl Device {
    pub fn new(name: impl Into<String>, width: u32, height: u32, pixel_ratio: f64) -> Self {
        Self {
            name: name.into(),
            viewport_width: width,
            viewport_height: height,
            pixel_ratio,
            min_target_css: default_min_target_css(),
        }
    }

    pub fn desktop() -> Self {
        Self::new("desktop", 1280, 800, 1.0)
    }

    pub fn ipad() -> Self {
        Self::new("ipad", 768, 1024, 2.0)
    }

    pub fn mobile() -> Self {
        Self::new("mobile", 390, 844, 3.0)
    }

    /// Viewport in screenshot (device) pixels.
    pub fn frame(&self) -> Frame {
        Frame::new(
            (self.viewport_width as f64 * self.pixel_ratio).round() as u32,
            (self.viewport_height as f64 * self.pixel_ratio).round() as u32,
        )
    }

    /// Minimum target edge in screenshot pixels.
    pub fn min_target_px(&self) -> f64 {
        self.min_target_css * self.pixel_ratio
    }

    /// Converts a CSS length into screenshot pixels for this device.
    pub fn css_to_px(&self, css: f64) -> f64 {
        css * self.pixel_ratio
    }
}
