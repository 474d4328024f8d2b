//! Brand colour parsing and RGB distance helpers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    pub fn to_rgba(self, alpha: u8) -> image::Rgba<u8> {
        let [r, g, b] = self.0;
        image::Rgba([r, g, b, alpha])
    }

    pub fn hex(&self) -> String {
        let [r, g, b] = self.0;
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid hex colour: {0:?}")]
pub struct ColorParseError(pub String);

/// Accepts `#RGB` and `#RRGGBB`, with or without the leading `#`.
pub fn parse_hex(value: &str) -> Result<Rgb, ColorParseError> {
    let digits = value.trim().trim_start_matches('#');
    let bad = || ColorParseError(value.to_string());
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(bad());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| bad());
    match digits.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in digits.chars().enumerate() {
                let v = channel(&c.to_string())?;
                out[i] = v * 17;
            }
            Ok(Rgb(out))
        }
        6 => Ok(Rgb([
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        ])),
        _ => Err(bad()),
    }
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s)
    }
}

/// Squared Euclidean distance in RGB space.
pub fn distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            (d * d) as u32
        })
        .sum()
}

/// True when any pixel lies strictly closer than `threshold` to `target`.
pub fn any_pixel_within(image: &image::RgbImage, target: [u8; 3], threshold: u32) -> bool {
    let limit = threshold * threshold;
    image.pixels().any(|p| distance_sq(p.0, target) < limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_forms() {
        assert_eq!(parse_hex("#FF5733").unwrap(), Rgb([255, 87, 51]));
        assert_eq!(parse_hex("3498db").unwrap(), Rgb([52, 152, 219]));
        assert_eq!(parse_hex("#fff").unwrap(), Rgb::WHITE);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("red").is_err());
        assert!(parse_hex("").is_err());
        assert!(parse_hex("#GGGGGG").is_err());
    }

    #[test]
    fn hex_round_trips_through_display() {
        assert_eq!(Rgb([255, 87, 51]).to_string(), "#FF5733");
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance_sq([0, 0, 0], [3, 4, 0]), 25);
        assert_eq!(distance_sq([10, 10, 10], [10, 10, 10]), 0);
    }

    #[test]
    fn pixel_search_uses_strict_threshold() {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([100, 100, 100]));
        assert!(any_pixel_within(&img, [130, 100, 100], 50));
        assert!(!any_pixel_within(&img, [150, 100, 100], 50));
    }
}
