use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Matches `#RRGGBB` and `#RRGGBBAA`.
static HEX_COLOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})$").expect("Invalid hex color regex")
});

/// An 8-bit RGBA colour as stored in the configuration document.
///
/// Colours are written as hex codes (`#RRGGBB` when opaque, `#RRGGBBAA`
/// otherwise). Older documents stored colours as comma-separated unit floats
/// (`0.75,0.75,0.75` or `1,0,0,0.5`); [`Color::parse`] still accepts those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    /// Opaque colour from 8-bit channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Build a colour from channels in the `0.0..=1.0` range.
    ///
    /// Out-of-range channels are clamped.
    pub fn from_unit_floats(r: f32, g: f32, b: f32, a: f32) -> Self {
        fn channel(value: f32) -> u8 {
            (value.clamp(0.0, 1.0) * 255.0).round() as u8
        }

        Self {
            r: channel(r),
            g: channel(g),
            b: channel(b),
            a: channel(a),
        }
    }

    /// Channels as unit floats, in RGBA order.
    pub fn to_unit_floats(self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        ]
    }

    pub fn is_opaque(self) -> bool {
        self.a == 255
    }

    /// Format as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(self) -> String {
        if self.is_opaque() {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Check whether a string is a well-formed 6 or 8 digit hex colour.
    pub fn is_valid_hex(hex: &str) -> bool {
        HEX_COLOR_PATTERN.is_match(hex)
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        if !Self::is_valid_hex(hex) {
            return None;
        }

        let digits = &hex[1..];
        let channel = |index: usize| u8::from_str_radix(&digits[index..index + 2], 16).ok();

        let r = channel(0)?;
        let g = channel(2)?;
        let b = channel(4)?;
        let a = if digits.len() == 8 { channel(6)? } else { 255 };

        Some(Self { r, g, b, a })
    }

    /// Parse a colour value from the configuration document.
    ///
    /// Hex codes are tried first. Anything else is read as the legacy
    /// `r,g,b[,a]` unit-float format; an unparsable alpha falls back to opaque.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if text.starts_with('#') {
            return Self::from_hex(text);
        }

        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            return None;
        }

        let component = |s: &str| s.parse::<f32>().ok().filter(|v| v.is_finite());
        let r = component(parts[0])?;
        let g = component(parts[1])?;
        let b = component(parts[2])?;
        let a = parts.get(3).and_then(|s| component(s)).unwrap_or(1.0);

        Some(Self::from_unit_floats(r, g, b, a))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hex_round_trip() {
        let color = Color::from_hex("#1A2B3C").unwrap();
        assert_eq!(color, Color::rgb(0x1A, 0x2B, 0x3C));
        assert_eq!(color.to_hex(), "#1A2B3C");
    }

    #[test]
    fn test_translucent_hex_keeps_alpha() {
        let color = Color::from_hex("#FF000080").unwrap();
        assert_eq!(color.a, 0x80);
        assert_eq!(color.to_hex(), "#FF000080");
    }

    #[test]
    fn test_lowercase_hex_accepted() {
        assert_eq!(Color::parse("#e6b400"), Some(Color::rgb(0xE6, 0xB4, 0x00)));
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(!Color::is_valid_hex("#12345"));
        assert!(!Color::is_valid_hex("#GGGGGG"));
        assert!(!Color::is_valid_hex("123456"));
        assert_eq!(Color::parse("#12"), None);
    }

    #[test]
    fn test_legacy_float_format() {
        assert_eq!(
            Color::parse("0.75,0.75,0.75"),
            Some(Color::rgb(191, 191, 191))
        );
        assert_eq!(Color::parse("1, 0, 0, 0.5"), Some(Color::rgba(255, 0, 0, 128)));
    }

    #[test]
    fn test_legacy_bad_alpha_is_opaque() {
        assert_eq!(Color::parse("0,0,1,abc"), Some(Color::rgb(0, 0, 255)));
    }

    #[test]
    fn test_legacy_too_few_components() {
        assert_eq!(Color::parse("1,0"), None);
        assert_eq!(Color::parse("red"), None);
        assert_eq!(Color::parse(""), None);
    }

    proptest! {
        #[test]
        fn hex_formatting_round_trips(r in any::<u8>(), g in any::<u8>(), b in any::<u8>(), a in any::<u8>()) {
            let color = Color::rgba(r, g, b, a);
            prop_assert_eq!(Color::parse(&color.to_hex()), Some(color));
        }

        #[test]
        fn unit_floats_round_trip(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let color = Color::rgb(r, g, b);
            let [fr, fg, fb, fa] = color.to_unit_floats();
            prop_assert_eq!(Color::from_unit_floats(fr, fg, fb, fa), color);
        }
    }
}
