//! Font resolution and glyph rasterization
//!
//! Layout code only sees a `Face`: it can measure a line and turn it into a
//! coverage mask. Where the face comes from is the resolver's business, and
//! the built-in bitmap face is always available as a last resort.

use image::{GrayImage, Luma};
use rusttype::{point, Font, Scale};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::observer::{PipelineEvent, PipelineObserver};

#[derive(Debug, Error)]
pub enum FontError {
    #[error("Font file {path} could not be loaded")]
    Unreadable { path: PathBuf },

    #[error("No bold sans-serif system font found")]
    NoSystemFont,
}

pub trait FontResolver: Send + Sync {
    fn resolve(&self) -> Result<Face, FontError>;
}

/// Resolve a face, reporting and degrading to the built-in face on failure.
pub fn resolve_or_builtin(resolver: &dyn FontResolver, observer: &dyn PipelineObserver) -> Face {
    match resolver.resolve() {
        Ok(face) => face,
        Err(e) => {
            observer.on_event(&PipelineEvent::FontFallback {
                reason: e.to_string(),
            });
            Face::builtin()
        }
    }
}

/// Families tried in order, all at bold weight.
const PREFERRED_FAMILIES: &[fontdb::Family<'static>] = &[
    fontdb::Family::Name("DejaVu Sans"),
    fontdb::Family::Name("Liberation Sans"),
    fontdb::Family::Name("Arial"),
    fontdb::Family::Name("Helvetica"),
    fontdb::Family::SansSerif,
];

/// Brand font file first, then installed system fonts.
#[derive(Debug, Default, Clone)]
pub struct SystemFontResolver {
    preferred_file: Option<PathBuf>,
}

impl SystemFontResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferred_file(path: Option<PathBuf>) -> Self {
        Self {
            preferred_file: path,
        }
    }

    fn load_file(path: &Path) -> Result<Face, FontError> {
        let unreadable = || FontError::Unreadable {
            path: path.to_path_buf(),
        };
        let data = std::fs::read(path).map_err(|_| unreadable())?;
        let font = Font::try_from_vec(data).ok_or_else(unreadable)?;
        Ok(Face::Outline(OutlineFace {
            font,
            name: path.display().to_string(),
        }))
    }
}

impl FontResolver for SystemFontResolver {
    fn resolve(&self) -> Result<Face, FontError> {
        if let Some(path) = &self.preferred_file {
            match Self::load_file(path) {
                Ok(face) => return Ok(face),
                Err(e) => tracing::debug!(error = %e, "brand font rejected, probing system fonts"),
            }
        }

        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        for family in PREFERRED_FAMILIES {
            let query = fontdb::Query {
                families: std::slice::from_ref(family),
                weight: fontdb::Weight::BOLD,
                stretch: fontdb::Stretch::Normal,
                style: fontdb::Style::Normal,
            };
            let Some(id) = db.query(&query) else {
                continue;
            };
            let name = db
                .face(id)
                .and_then(|info| info.families.first().map(|(n, _)| n.clone()))
                .unwrap_or_else(|| format!("{:?}", family));
            let loaded = db.with_face_data(id, |data, index| {
                Font::try_from_vec_and_index(data.to_vec(), index)
            });
            if let Some(Some(font)) = loaded {
                return Ok(Face::Outline(OutlineFace { font, name }));
            }
        }

        Err(FontError::NoSystemFont)
    }
}

/// Always hands out the built-in face. Useful for headless hosts and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinFontResolver;

impl FontResolver for BuiltinFontResolver {
    fn resolve(&self) -> Result<Face, FontError> {
        Ok(Face::builtin())
    }
}

#[derive(Clone)]
pub enum Face {
    Outline(OutlineFace),
    Builtin(BuiltinFace),
}

impl std::fmt::Debug for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Face").field(&self.name()).finish()
    }
}

impl Face {
    pub fn builtin() -> Self {
        Face::Builtin(BuiltinFace)
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Face::Builtin(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Face::Outline(o) => &o.name,
            Face::Builtin(_) => "builtin-5x7",
        }
    }

    /// Horizontal ink extent of `text` at `px`.
    pub fn measure(&self, text: &str, px: u32) -> u32 {
        match self {
            Face::Outline(o) => o.measure(text, px as f32),
            Face::Builtin(b) => b.measure(text, px),
        }
    }

    /// Coverage mask whose top-left corner is the text origin.
    pub fn rasterize(&self, text: &str, px: u32) -> GrayImage {
        match self {
            Face::Outline(o) => o.rasterize(text, px as f32),
            Face::Builtin(b) => b.rasterize(text, px),
        }
    }
}

#[derive(Clone)]
pub struct OutlineFace {
    font: Font<'static>,
    name: String,
}

impl OutlineFace {
    fn ink_span(&self, text: &str, scale: Scale) -> Option<(i32, i32, i32)> {
        let v = self.font.v_metrics(scale);
        let mut span: Option<(i32, i32, i32)> = None;
        for g in self.font.layout(text, scale, point(0.0, v.ascent)) {
            if let Some(bb) = g.pixel_bounding_box() {
                span = Some(match span {
                    None => (bb.min.x, bb.max.x, bb.max.y),
                    Some((lo, hi, bottom)) => {
                        (lo.min(bb.min.x), hi.max(bb.max.x), bottom.max(bb.max.y))
                    }
                });
            }
        }
        span
    }

    fn measure(&self, text: &str, px: f32) -> u32 {
        match self.ink_span(text, Scale::uniform(px)) {
            Some((lo, hi, _)) => (hi - lo).max(0) as u32,
            None => 0,
        }
    }

    fn rasterize(&self, text: &str, px: f32) -> GrayImage {
        let scale = Scale::uniform(px);
        let v = self.font.v_metrics(scale);
        let line_h = (v.ascent - v.descent).ceil() as i32;
        let Some((lo, hi, bottom)) = self.ink_span(text, scale) else {
            return GrayImage::new(1, line_h.max(1) as u32);
        };
        let width = (hi - lo).max(1) as u32;
        let height = line_h.max(bottom).max(1) as u32;
        let mut mask = GrayImage::new(width, height);

        for g in self.font.layout(text, scale, point(0.0, v.ascent)) {
            let Some(bb) = g.pixel_bounding_box() else {
                continue;
            };
            g.draw(|gx, gy, coverage| {
                let x = gx as i32 + bb.min.x - lo;
                let y = gy as i32 + bb.min.y;
                if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
                    return;
                }
                let value = (coverage * 255.0).round().clamp(0.0, 255.0) as u8;
                let px = mask.get_pixel_mut(x as u32, y as u32);
                px.0[0] = px.0[0].max(value);
            });
        }
        mask
    }
}

/// 5x7 bitmap face. Lower case renders with the upper-case glyphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFace;

const CELL_ADVANCE: u32 = 6;
const CELL_LINE: u32 = 8;

impl BuiltinFace {
    fn cell(px: u32) -> u32 {
        ((px as f32 / CELL_LINE as f32).round() as u32).max(1)
    }

    fn measure(&self, text: &str, px: u32) -> u32 {
        let n = text.chars().count() as u32;
        if n == 0 {
            return 0;
        }
        let cell = Self::cell(px);
        n * CELL_ADVANCE * cell - cell
    }

    fn rasterize(&self, text: &str, px: u32) -> GrayImage {
        let cell = Self::cell(px);
        let width = self.measure(text, px).max(1);
        let mut mask = GrayImage::new(width, CELL_LINE * cell);

        for (i, ch) in text.chars().enumerate() {
            let origin_x = i as u32 * CELL_ADVANCE * cell;
            for (row, bits) in glyph_rows(ch).iter().enumerate() {
                for col in 0..5u32 {
                    if bits & (0b10000 >> col) == 0 {
                        continue;
                    }
                    let x0 = origin_x + col * cell;
                    let y0 = row as u32 * cell;
                    for dy in 0..cell {
                        for dx in 0..cell {
                            if x0 + dx < width {
                                mask.put_pixel(x0 + dx, y0 + dy, Luma([255]));
                            }
                        }
                    }
                }
            }
        }
        mask
    }
}

fn glyph_rows(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        ' ' => [0; 7],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '\'' => [0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        '"' => [0b01010, 0b01010, 0b01010, 0b00000, 0b00000, 0b00000, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '/' => [0b00000, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b00000],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '&' => [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101],
        '%' => [0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011],
        '#' => [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010],
        '$' => [0b00100, 0b01111, 0b10100, 0b01110, 0b00101, 0b11110, 0b00100],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::RecordingObserver;

    struct FailingResolver;

    impl FontResolver for FailingResolver {
        fn resolve(&self) -> Result<Face, FontError> {
            Err(FontError::NoSystemFont)
        }
    }

    #[test]
    fn builtin_measure_scales_with_size() {
        let face = Face::builtin();
        // 16px -> 2px cells, 3 chars * 12 - 2
        assert_eq!(face.measure("ABC", 16), 34);
        assert_eq!(face.measure("", 16), 0);
        assert!(face.measure("ABC", 80) > face.measure("ABC", 16));
    }

    #[test]
    fn builtin_mask_matches_measure() {
        let face = Face::builtin();
        let mask = face.rasterize("Hi!", 24);
        assert_eq!(mask.width(), face.measure("Hi!", 24));
        assert_eq!(mask.height(), 24);
        assert!(mask.pixels().any(|p| p.0[0] == 255));
    }

    #[test]
    fn builtin_space_has_no_ink() {
        let mask = Face::builtin().rasterize("   ", 8);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn lower_case_shares_upper_case_glyphs() {
        let face = Face::builtin();
        assert_eq!(face.rasterize("sale", 8), face.rasterize("SALE", 8));
    }

    #[test]
    fn failed_resolution_degrades_to_builtin() {
        let observer = RecordingObserver::default();
        let face = resolve_or_builtin(&FailingResolver, &observer);
        assert!(face.is_builtin());
        assert!(matches!(
            observer.take().as_slice(),
            [PipelineEvent::FontFallback { .. }]
        ));
    }

    #[test]
    fn unreadable_brand_font_is_reported() {
        let err = SystemFontResolver::load_file(Path::new("/nonexistent/brand.ttf")).unwrap_err();
        assert!(matches!(err, FontError::Unreadable { .. }));
    }
}
