//! Text Layout - Wrapped Campaign Message Overlay
//!
//! Layout (`TextBlock`) is computed separately from painting so placement
//! rules can be checked without rasterizing anything.

use image::{GrayImage, Pixel, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::color::{parse_hex, Rgb};
use crate::fonts::Face;
use crate::observer::{PipelineEvent, PipelineObserver};

pub const FONT_SIZE_RATIO: f32 = 0.08;
pub const MAX_TEXT_WIDTH_RATIO: f32 = 0.85;
pub const LINE_SPACING: f32 = 1.3;
pub const PADDING_X: u32 = 30;
pub const PADDING_Y: u32 = 25;
pub const EDGE_MARGIN: i64 = 50;
pub const SAFE_MARGIN: i64 = 20;
pub const PORTRAIT_ASPECT: f64 = 0.7;
pub const PORTRAIT_BOTTOM_MARGIN: f64 = 0.05;

const PANEL_ALPHA: u8 = 200;
const SHADOW_OFFSET: i64 = 3;
const SHADOW_ALPHA: u8 = 180;
const OUTLINE_RADIUS: i64 = 2;

pub const DEFAULT_PANEL: Rgb = Rgb([255, 87, 51]);
pub const DEFAULT_FILL: Rgb = Rgb::WHITE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    #[default]
    Bottom,
    Center,
}

impl FromStr for TextPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "center" | "centre" => Ok(Self::Center),
            other => Err(format!("unknown text position: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextLine {
    pub text: String,
    pub width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PanelBox {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
    pub font_px: u32,
    pub line_height: u32,
    pub panel: PanelBox,
    pub position: TextPosition,
}

pub fn font_size_for(width: u32, height: u32) -> u32 {
    ((width.min(height) as f32 * FONT_SIZE_RATIO) as u32).max(1)
}

/// Greedy word wrap. A word wider than `max_width` gets a line to itself.
pub fn wrap_words(face: &Face, text: &str, px: u32, max_width: u32) -> Vec<TextLine> {
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        let mut candidate = current.clone();
        candidate.push(word);
        let joined = candidate.join(" ");
        if face.measure(&joined, px) <= max_width {
            current = candidate;
        } else if current.is_empty() {
            lines.push(word.to_string());
        } else {
            lines.push(current.join(" "));
            current = vec![word];
        }
    }
    if !current.is_empty() {
        lines.push(current.join(" "));
    }

    lines
        .into_iter()
        .map(|text| TextLine {
            width: face.measure(&text, px),
            text,
        })
        .collect()
}

/// Lay out `text` over a `width` x `height` image. `None` when there is nothing to draw.
pub fn layout(
    face: &Face,
    text: &str,
    width: u32,
    height: u32,
    position: TextPosition,
) -> Option<TextBlock> {
    let font_px = font_size_for(width, height);
    let max_width = (width as f32 * MAX_TEXT_WIDTH_RATIO) as u32;
    let lines = wrap_words(face, text, font_px, max_width);
    if lines.is_empty() {
        return None;
    }

    let line_height = (font_px as f32 * LINE_SPACING) as u32;
    let widest = lines.iter().map(|l| l.width).max().unwrap_or(0);
    let panel_w = widest + PADDING_X * 2;
    let panel_h = lines.len() as u32 * line_height + PADDING_Y * 2;

    let (w, h) = (width as i64, height as i64);
    let (pw, ph) = (panel_w as i64, panel_h as i64);
    let x = (w - pw).div_euclid(2);
    let y = match position {
        TextPosition::Bottom => {
            let bottom_margin = if (width as f64 / height as f64) < PORTRAIT_ASPECT {
                (height as f64 * PORTRAIT_BOTTOM_MARGIN) as i64
            } else {
                EDGE_MARGIN
            };
            h - ph - bottom_margin
        }
        TextPosition::Top => EDGE_MARGIN,
        TextPosition::Center => (h - ph).div_euclid(2),
    };

    // keep the panel off the edges; a panel wider than the image pins to the margin
    let x = SAFE_MARGIN.max(x.min(w - pw - SAFE_MARGIN));
    let y = SAFE_MARGIN.max(y.min(h - ph - SAFE_MARGIN));

    Some(TextBlock {
        lines,
        font_px,
        line_height,
        panel: PanelBox {
            x,
            y,
            width: panel_w,
            height: panel_h,
        },
        position,
    })
}

/// Resolved overlay colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStyle {
    pub panel: Rgb,
    pub fill: Rgb,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            panel: DEFAULT_PANEL,
            fill: DEFAULT_FILL,
        }
    }
}

impl TextStyle {
    /// Parse brand colours; anything unparseable falls back and is reported.
    pub fn resolve(panel: &str, fill: &str, observer: &dyn PipelineObserver) -> Self {
        let mut pick = |field: &'static str, value: &str, default: Rgb| {
            parse_hex(value).unwrap_or_else(|_| {
                observer.on_event(&PipelineEvent::ColorFallback {
                    field,
                    value: value.to_string(),
                });
                default
            })
        };
        Self {
            panel: pick("primary_color", panel, DEFAULT_PANEL),
            fill: pick("font_color", fill, DEFAULT_FILL),
        }
    }
}

pub struct TextLayoutEngine {
    face: Face,
    style: TextStyle,
}

impl TextLayoutEngine {
    pub fn new(face: Face, style: TextStyle) -> Self {
        Self { face, style }
    }

    pub fn face(&self) -> &Face {
        &self.face
    }

    pub fn style(&self) -> TextStyle {
        self.style
    }

    pub fn layout(
        &self,
        text: &str,
        width: u32,
        height: u32,
        position: TextPosition,
    ) -> Option<TextBlock> {
        layout(&self.face, text, width, height, position)
    }

    pub fn overlay_text(&self, image: &RgbaImage, text: &str, position: TextPosition) -> RgbaImage {
        let mut canvas = image.clone();
        if let Some(block) = self.layout(text, image.width(), image.height(), position) {
            self.paint(&mut canvas, &block);
        }
        canvas
    }

    /// Panel, then per line: shadow, outline, fill.
    pub fn paint(&self, canvas: &mut RgbaImage, block: &TextBlock) {
        let panel = block.panel;
        fill_rect(canvas, panel, self.style.panel.to_rgba(PANEL_ALPHA));

        let shadow = Rgb::BLACK.to_rgba(SHADOW_ALPHA);
        let outline = Rgb::BLACK.to_rgba(255);
        let fill = self.style.fill.to_rgba(255);

        let mut text_y = panel.y + PADDING_Y as i64;
        for line in &block.lines {
            let mask = self.face.rasterize(&line.text, block.font_px);
            let text_x = panel.x + (panel.width as i64 - line.width as i64).div_euclid(2);

            stamp(canvas, &mask, text_x + SHADOW_OFFSET, text_y + SHADOW_OFFSET, shadow);
            for dx in -OUTLINE_RADIUS..=OUTLINE_RADIUS {
                for dy in -OUTLINE_RADIUS..=OUTLINE_RADIUS {
                    if dx != 0 || dy != 0 {
                        stamp(canvas, &mask, text_x + dx, text_y + dy, outline);
                    }
                }
            }
            stamp(canvas, &mask, text_x, text_y, fill);

            text_y += block.line_height as i64;
        }
    }
}

fn fill_rect(canvas: &mut RgbaImage, rect: PanelBox, color: Rgba<u8>) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let x0 = rect.x.clamp(0, cw);
    let y0 = rect.y.clamp(0, ch);
    let x1 = (rect.x + rect.width as i64).clamp(0, cw);
    let y1 = (rect.y + rect.height as i64).clamp(0, ch);
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.get_pixel_mut(x as u32, y as u32).blend(&color);
        }
    }
}

/// Blend `color` through a coverage mask placed at (x, y).
fn stamp(canvas: &mut RgbaImage, mask: &GrayImage, x: i64, y: i64, color: Rgba<u8>) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    for (mx, my, coverage) in mask.enumerate_pixels() {
        let c = coverage.0[0];
        if c == 0 {
            continue;
        }
        let (px, py) = (x + mx as i64, y + my as i64);
        if px < 0 || py < 0 || px >= cw || py >= ch {
            continue;
        }
        let alpha = (c as u16 * color.0[3] as u16 / 255) as u8;
        let src = Rgba([color.0[0], color.0[1], color.0[2], alpha]);
        canvas.get_pixel_mut(px as u32, py as u32).blend(&src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::RecordingObserver;

    fn face() -> Face {
        Face::builtin()
    }

    #[test]
    fn font_size_is_eight_percent_of_short_side() {
        assert_eq!(font_size_for(1080, 1920), 86);
        assert_eq!(font_size_for(1920, 1080), 86);
        assert_eq!(font_size_for(5, 5), 1);
    }

    #[test]
    fn wrapped_lines_fit_unless_single_word() {
        let text =
            "Spring into action with gear built for every early morning run and long weekend ride";
        for (w, h) in [(1080, 1080), (1080, 1920), (1920, 1080), (300, 300)] {
            let px = font_size_for(w, h);
            let limit = (w as f32 * MAX_TEXT_WIDTH_RATIO) as u32;
            let lines = wrap_words(&face(), text, px, limit);
            assert!(!lines.is_empty());
            for line in &lines {
                assert!(
                    line.width <= limit || !line.text.contains(' '),
                    "{w}x{h}: {:?} is {} wide, limit {}",
                    line.text,
                    line.width,
                    limit
                );
            }
            let rejoined: Vec<String> = lines.iter().map(|l| l.text.clone()).collect();
            assert_eq!(rejoined.join(" "), text);
        }
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let lines = wrap_words(&face(), "go SUPERCALIFRAGILISTIC go", 16, 100);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["go", "SUPERCALIFRAGILISTIC", "go"]);
        assert!(lines[1].width > 100);
    }

    #[test]
    fn blank_text_has_no_layout() {
        assert!(layout(&face(), "   ", 1080, 1080, TextPosition::Bottom).is_none());
    }

    #[test]
    fn bottom_panel_uses_fixed_margin_on_landscape() {
        let block = layout(&face(), "Get fit", 1920, 1080, TextPosition::Bottom).unwrap();
        let p = block.panel;
        assert_eq!(block.lines.len(), 1);
        assert_eq!(p.height, block.line_height + 2 * PADDING_Y);
        assert_eq!(p.y, 1080 - p.height as i64 - 50);
        assert_eq!(p.x, (1920 - p.width as i64) / 2);
    }

    #[test]
    fn bottom_panel_uses_relative_margin_on_portrait() {
        let block = layout(&face(), "Get fit", 1080, 1920, TextPosition::Bottom).unwrap();
        assert_eq!(block.panel.y, 1920 - block.panel.height as i64 - 96);
    }

    #[test]
    fn top_and_center_positions() {
        let top = layout(&face(), "Hello", 1080, 1080, TextPosition::Top).unwrap();
        assert_eq!(top.panel.y, 50);
        let center = layout(&face(), "Hello", 1080, 1080, TextPosition::Center).unwrap();
        assert_eq!(center.panel.y, (1080 - center.panel.height as i64) / 2);
    }

    #[test]
    fn panel_is_clamped_away_from_edges() {
        let block =
            layout(&face(), "A long message on a tiny image", 120, 90, TextPosition::Bottom)
                .unwrap();
        assert_eq!(block.panel.x, SAFE_MARGIN);
        assert_eq!(block.panel.y, SAFE_MARGIN);
    }

    #[test]
    fn bad_colours_fall_back_and_are_reported() {
        let observer = RecordingObserver::default();
        let style = TextStyle::resolve("not-a-colour", "#000000", &observer);
        assert_eq!(style.panel, DEFAULT_PANEL);
        assert_eq!(style.fill, Rgb::BLACK);
        assert_eq!(observer.take().len(), 1);
    }

    #[test]
    fn overlay_paints_panel_and_text() {
        let engine = TextLayoutEngine::new(face(), TextStyle::default());
        let base = RgbaImage::from_pixel(400, 400, Rgba([0, 0, 0, 255]));
        let out = engine.overlay_text(&base, "SALE", TextPosition::Center);
        assert_eq!(out.dimensions(), base.dimensions());

        let block = engine.layout("SALE", 400, 400, TextPosition::Center).unwrap();
        // panel corner: primary colour at alpha 200 over black
        let corner = out.get_pixel(block.panel.x as u32 + 1, block.panel.y as u32 + 1);
        assert_eq!(corner.0[3], 255);
        assert!(corner.0[0] > 190 && corner.0[1] > 60 && corner.0[2] > 30);
        // white fill somewhere inside the panel
        assert!(out.pixels().any(|p| p.0[..3] == [255, 255, 255]));
        // outside the panel untouched
        assert_eq!(out.get_pixel(0, 0), base.get_pixel(0, 0));
    }

    #[test]
    fn position_parses_from_str() {
        assert_eq!("TOP".parse::<TextPosition>().unwrap(), TextPosition::Top);
        assert_eq!("centre".parse::<TextPosition>().unwrap(), TextPosition::Center);
        assert!("left".parse::<TextPosition>().is_err());
    }
}
