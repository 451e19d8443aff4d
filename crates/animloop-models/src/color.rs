//! RGB colors and chroma key colors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance in RGB space.
    ///
    /// Comparisons on squared distances order the same as on distances, so
    /// callers only take the square root when reporting.
    pub fn distance_sq(&self, other: &Rgb) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }

    pub fn distance(&self, other: &Rgb) -> f64 {
        (self.distance_sq(other) as f64).sqrt()
    }

    /// Upper-case `RRGGBB`.
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Where a key color came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyColorSource {
    /// Picked to be far from every foreground color, then baked in
    Synthesized,
    /// Read off an existing flat background
    Detected,
}

/// Color to be keyed out of the generated video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KeyColor {
    rgb: Rgb,
    hex: String,
    source: KeyColorSource,
}

impl KeyColor {
    pub fn new(rgb: Rgb, source: KeyColorSource) -> Self {
        Self {
            hex: rgb.to_hex(),
            rgb,
            source,
        }
    }

    pub fn synthesized(rgb: Rgb) -> Self {
        Self::new(rgb, KeyColorSource::Synthesized)
    }

    pub fn detected(rgb: Rgb) -> Self {
        Self::new(rgb, KeyColorSource::Detected)
    }

    pub fn rgb(&self) -> Rgb {
        self.rgb
    }

    /// Upper-case `RRGGBB`.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// `0xRRGGBB`, the form FFmpeg color options accept.
    pub fn ffmpeg_hex(&self) -> String {
        format!("0x{}", self.hex)
    }

    pub fn source(&self) -> KeyColorSource {
        self.source
    }

    pub fn is_detected(&self) -> bool {
        self.source == KeyColorSource::Detected
    }
}

impl fmt::Display for KeyColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex)
    }
}
