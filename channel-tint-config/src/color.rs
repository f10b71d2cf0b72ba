//! Hex color parsing and perceptual brightness classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ColorParseError;

/// Luma threshold on the 0-255 scale. Colors strictly below it are dark.
pub const DARK_LUMA_THRESHOLD: u32 = 128;

/// An opaque RGB color written as `#rrggbb` (or the `#rgb` shorthand).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`, `#rgb`, or either form without the leading `#`.
    pub fn parse(input: &str) -> Result<Self, ColorParseError> {
        let trimmed = input.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidDigit(input.to_string()));
        }

        match hex.len() {
            6 => {
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 2], 16)
                        .map_err(|_| ColorParseError::InvalidDigit(input.to_string()))
                };
                Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
            }
            3 => {
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| ColorParseError::InvalidDigit(input.to_string()))
                };
                Ok(Self::new(channel(0)?, channel(1)?, channel(2)?))
            }
            len => Err(ColorParseError::InvalidLength {
                input: input.to_string(),
                len,
            }),
        }
    }

    /// Broadcast luma (`0.299R + 0.587G + 0.114B`) on the 0-255 scale.
    pub fn luma(&self) -> f64 {
        self.luma_milli() as f64 / 1000.0
    }

    /// Whether the color reads as dark, i.e. its luma is below 128.
    ///
    /// Computed in integer thousandths so the boundary at exactly 128 is exact.
    pub fn is_dark(&self) -> bool {
        self.luma_milli() < DARK_LUMA_THRESHOLD * 1000
    }

    fn luma_milli(&self) -> u32 {
        299 * u32::from(self.r) + 587 * u32::from(self.g) + 114 * u32::from(self.b)
    }

    pub fn as_array(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HexColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_long_and_short_forms() {
        assert_eq!(HexColor::parse("#f2f2f2").unwrap(), HexColor::new(242, 242, 242));
        assert_eq!(HexColor::parse("F2F2F2").unwrap(), HexColor::new(242, 242, 242));
        assert_eq!(HexColor::parse("#fff").unwrap(), HexColor::new(255, 255, 255));
        assert_eq!(HexColor::parse(" #0a0 ").unwrap(), HexColor::new(0, 170, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            HexColor::parse("#12345"),
            Err(ColorParseError::InvalidLength { len: 5, .. })
        ));
        assert!(matches!(
            HexColor::parse("#gggggg"),
            Err(ColorParseError::InvalidDigit(_))
        ));
        assert!(HexColor::parse("").is_err());
        assert!(HexColor::parse("red").is_err());
    }

    #[test]
    fn test_display_is_lowercase_long_form() {
        assert_eq!(HexColor::parse("#ABC").unwrap().to_string(), "#aabbcc");
    }

    #[test]
    fn test_black_is_dark_white_is_light() {
        assert!(HexColor::parse("#000000").unwrap().is_dark());
        assert!(!HexColor::parse("#ffffff").unwrap().is_dark());
    }

    #[test]
    fn test_luma_boundary() {
        // Gray 128 has luma exactly 128.0, which is not below the threshold
        let boundary = HexColor::new(128, 128, 128);
        assert_eq!(boundary.luma(), 128.0);
        assert!(!boundary.is_dark());

        let just_below = HexColor::new(127, 127, 127);
        assert!(just_below.is_dark());
    }

    #[test]
    fn test_default_tint_luma() {
        let color = HexColor::parse("#f2f2f2").unwrap();
        assert!((color.luma() - 242.0).abs() < f64::EPSILON);
        assert!(!color.is_dark());
    }

    #[test]
    fn test_serde_as_string() {
        let color: HexColor = serde_yaml_ng::from_str("\"#336699\"").unwrap();
        assert_eq!(color, HexColor::new(0x33, 0x66, 0x99));
        let yaml = serde_yaml_ng::to_string(&color).unwrap();
        assert!(yaml.contains("'#336699'") || yaml.contains("\"#336699\""));
    }
}
