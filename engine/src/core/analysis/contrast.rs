//! Caption color selection
//!
//! Picks a text/stroke pair that contrasts with the average color of the ROI.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::Roi;
use crate::core::{CoreError, CoreResult, FrameSize, Rgb};

/// Luminance above which a background counts as light
const LIGHT_BACKGROUND_LUMINANCE: f64 = 127.0;

/// Brightest value allowed for text over a light background
const DARK_TEXT_MAX_VALUE: f64 = 105.0 / 255.0;

/// Text fill and outline colors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionColors {
    pub text: Rgb,
    pub stroke: Rgb,
}

impl Default for CaptionColors {
    fn default() -> Self {
        Self {
            text: Rgb::WHITE,
            stroke: Rgb::WHITE.scaled_down(3),
        }
    }
}

/// Computes contrasting text and stroke colors for the ROI background.
///
/// The ROI average is inverted and converted to HSV. Over dark backgrounds
/// the value is pushed to full brightness; over light backgrounds it is capped
/// so the text stays dark. Hue and saturation are kept either way, and the
/// stroke is the text color divided by three.
pub fn get_contrasting_color(frame: &RgbImage, roi: &Roi) -> CoreResult<CaptionColors> {
    let (frame_width, frame_height) = frame.dimensions();
    if !roi.fits_within(FrameSize::new(frame_width, frame_height)) {
        return Err(CoreError::InvalidRoi {
            x: roi.x,
            y: roi.y,
            width: roi.width,
            height: roi.height,
            frame_width,
            frame_height,
        });
    }

    let background = average_color(frame, roi);
    let inverted = Rgb::new(255 - background.r, 255 - background.g, 255 - background.b);
    let (hue, saturation, value) = rgb_to_hsv(inverted);

    let value = if background.luminance() > LIGHT_BACKGROUND_LUMINANCE {
        value.min(DARK_TEXT_MAX_VALUE)
    } else {
        1.0
    };

    let text = hsv_to_rgb(hue, saturation, value);
    Ok(CaptionColors {
        text,
        stroke: text.scaled_down(3),
    })
}

/// Per-channel mean over the ROI, truncated to integers
fn average_color(frame: &RgbImage, roi: &Roi) -> Rgb {
    let mut sums = [0u64; 3];
    for y in roi.y..roi.y + roi.height {
        for x in roi.x..roi.x + roi.width {
            let pixel = frame.get_pixel(x, y).0;
            for (sum, channel) in sums.iter_mut().zip(pixel) {
                *sum += u64::from(channel);
            }
        }
    }
    let count = roi.area().max(1);
    Rgb::new(
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
    )
}

fn rgb_to_hsv(color: Rgb) -> (f64, f64, f64) {
    let r = f64::from(color.r) / 255.0;
    let g = f64::from(color.g) / 255.0;
    let b = f64::from(color.b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    if delta == 0.0 {
        return (0.0, 0.0, max);
    }

    let saturation = delta / max;
    let sector = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    (sector / 6.0, saturation, max)
}

fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let to_byte = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;

    if saturation == 0.0 {
        let v = to_byte(value);
        return Rgb::new(v, v, v);
    }

    let sector = (hue * 6.0).rem_euclid(6.0);
    let i = sector.floor();
    let f = sector - i;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));

    let (r, g, b) = match i as u8 {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    };
    Rgb::new(to_byte(r), to_byte(g), to_byte(b))
}
