use std::path::Path;

use ab_glyph::{FontArc, FontVec, PxScale};
use anyhow::Context;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::models::{DetectionRegion, round2};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_GAP: i32 = 10;

/// Label drawn above a region, e.g. `ABC123 (0.87)`
pub fn format_label(text: &str, confidence: f64) -> String {
    let rounded = round2(confidence);
    if rounded.fract() == 0.0 {
        format!("{} ({:.1})", text, rounded)
    } else {
        format!("{} ({})", text, rounded)
    }
}

/// DejaVu Sans Mono, used for labels unless another font is configured
const DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// Draws region outlines and their labels onto frames
pub struct FrameAnnotator {
    font: FontArc,
    scale: PxScale,
}

impl FrameAnnotator {
    /// Annotator using the bundled label font
    pub fn new() -> anyhow::Result<Self> {
        let font = FontArc::try_from_slice(DEFAULT_FONT)
            .map_err(|e| anyhow::anyhow!("Invalid bundled font: {}", e))?;
        Ok(Self::with_font(font))
    }

    pub fn with_font(font: impl Into<FontArc>) -> Self {
        Self {
            font: font.into(),
            scale: PxScale::from(24.0),
        }
    }

    pub fn load_font(path: &Path) -> anyhow::Result<FontVec> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font {:?}", path))?;
        FontVec::try_from_vec(bytes).map_err(|e| anyhow::anyhow!("Invalid font {:?}: {}", path, e))
    }

    /// Draw a two pixel box at `region` and `label` just above it
    pub fn annotate(&self, frame: &mut RgbImage, region: &DetectionRegion, label: &str) {
        let width = region.width() + 1;
        let height = region.height() + 1;
        if width <= 0 || height <= 0 {
            return;
        }

        let outer = Rect::at(region.x1, region.y1).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(frame, outer, BOX_COLOR);
        if width > 2 && height > 2 {
            let inner = Rect::at(region.x1 + 1, region.y1 + 1)
                .of_size((width - 2) as u32, (height - 2) as u32);
            draw_hollow_rect_mut(frame, inner, BOX_COLOR);
        }

        let (_, text_h) = text_size(self.scale, &self.font, label);
        let y = (region.y1 - LABEL_GAP - text_h as i32).max(0);
        let x = region.x1.max(0);
        draw_text_mut(frame, BOX_COLOR, x, y, self.scale, &self.font, label);
    }
}
