//! Hex Colors - `#RRGGBB` Parsing and Canonical Form
//!
//! Palette entries arrive as free-form hex strings. Everything downstream
//! (dedup, manifests, hashes) compares the canonical uppercase form.

use std::fmt;
use std::str::FromStr;

use image::Rgb;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("empty color string")]
    Empty,

    #[error("color '{0}' must start with '#'")]
    MissingHash(String),

    #[error("color '{0}' must have exactly 6 hex digits")]
    InvalidLength(String),

    #[error("invalid hex character '{1}' in color '{0}'")]
    InvalidHex(String, char),
}

/// An opaque RGB color written as `#RRGGBB`.
///
/// Equality is by channel value, so `#abcdef` and `#ABCDEF` are the same color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexColor([u8; 3]);

impl HexColor {
    pub const BLACK: HexColor = HexColor([0, 0, 0]);

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Parse `#RRGGBB` (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, ColorError> {
        if s.is_empty() {
            return Err(ColorError::Empty);
        }
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| ColorError::MissingHash(s.to_string()))?;

        if let Some(c) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidHex(s.to_string(), c));
        }
        if hex.len() != 6 {
            return Err(ColorError::InvalidLength(s.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| ColorError::InvalidLength(s.to_string()))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }

    pub fn channels(&self) -> [u8; 3] {
        self.0
    }

    pub fn to_rgb(&self) -> Rgb<u8> {
        Rgb(self.0)
    }
}

impl From<[u8; 3]> for HexColor {
    fn from(channels: [u8; 3]) -> Self {
        Self(channels)
    }
}

impl From<Rgb<u8>> for HexColor {
    fn from(rgb: Rgb<u8>) -> Self {
        Self(rgb.0)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical uppercase form, e.g. `#1A2B3C`.
impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
