///! Spotlight regions and crops for individual findings
use accessaudit_core_types::{BoundingBox, Frame};
use image::{imageops, DynamicImage, ImageOutputFormat, Rgba};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::errors::VisualError;

/// Outside-focus pixels keep this share of their brightness.
const DIM_FACTOR: f32 = 0.35;

/// Where to look for one finding on its screenshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotlightRegion {
    /// Finding box grown by the padding, inside the frame
    pub focus: BoundingBox,

    /// Full-width strip, one viewport tall, centered on the finding
    pub window: BoundingBox,
}

/// Computes the spotlight for a box on a capture of size `frame`.
///
/// `window_height` is the viewport height in screenshot pixels. Captures
/// shorter than that get a window covering the whole frame.
pub fn spotlight_region(
    bbox: &BoundingBox,
    frame: Frame,
    window_height: f64,
    padding: f64,
) -> SpotlightRegion {
    let focus = bbox.pad(padding.max(0.0)).clamp_to(frame);

    let frame_height = frame.height as f64;
    let height = window_height.clamp(0.0, frame_height);
    let (_, center_y) = bbox.center();
    let top = (center_y - height / 2.0).clamp(0.0, frame_height - height);
    let window = BoundingBox::new(0.0, top, frame.width as f64, top + height);

    SpotlightRegion { focus, window }
}

/// Cuts the window out of a PNG screenshot and dims everything outside the
/// focus box. Returns PNG bytes.
pub fn crop_spotlight(png: &[u8], region: &SpotlightRegion) -> Result<Vec<u8>, VisualError> {
    let image = image::load_from_memory(png)?.to_rgba8();
    let frame = Frame::new(image.width(), image.height());

    let window = region.window.clamp_to(frame);
    if window.is_degenerate() {
        return Err(VisualError::InvalidInput(format!(
            "spotlight window {:?} lies outside {}x{} screenshot",
            region.window, frame.width, frame.height
        )));
    }

    let x = window.x1.floor() as u32;
    let y = window.y1.floor() as u32;
    let width = (window.x2.ceil() as u32).saturating_sub(x).max(1);
    let height = (window.y2.ceil() as u32).saturating_sub(y).max(1);
    let mut cropped = imageops::crop_imm(&image, x, y, width, height).to_image();

    // focus in crop-local coordinates
    let fx1 = region.focus.x1 - x as f64;
    let fy1 = region.focus.y1 - y as f64;
    let fx2 = region.focus.x2 - x as f64;
    let fy2 = region.focus.y2 - y as f64;

    for (px, py, pixel) in cropped.enumerate_pixels_mut() {
        let (cx, cy) = (px as f64 + 0.5, py as f64 + 0.5);
        let inside = cx >= fx1 && cx <= fx2 && cy >= fy1 && cy <= fy2;
        if !inside {
            let Rgba([r, g, b, a]) = *pixel;
            *pixel = Rgba([dim(r), dim(g), dim(b), a]);
        }
    }

    let mut out = Vec::new();
    DynamicImage::ImageRgba8(cropped).write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)?;
    Ok(out)
}

fn dim(channel: u8) -> u8 {
    (channel as f32 * DIM_FACTOR).round() as u8
}
