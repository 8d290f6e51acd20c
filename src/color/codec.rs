use crate::error::ColorError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A canvas color. Always exactly six hex digits once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    r: u8,
    g: u8,
    b: u8,
}

impl HexColor {
    pub const BLACK: Self = Self::from_rgb(0, 0, 0);

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse any input the repair rules can reduce to six hex digits.
    pub fn parse(raw: &str) -> Result<Self, ColorError> {
        let digits = repair_digits(raw)?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ColorError::InvalidHex(raw.into()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Decimal `r, g, b` triplet; each channel is clamped into 0–255.
    pub fn from_decimal_triplet(r: i64, g: i64, b: i64) -> Self {
        let clamp = |v: i64| u8::try_from(v.clamp(0, 255)).unwrap_or(u8::MAX);
        Self::from_rgb(clamp(r), clamp(g), clamp(b))
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    pub fn is_black(self) -> bool {
        self == Self::BLACK
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Reduce `raw` to six lowercase hex digits (no leading `#`).
///
/// Repair rules, applied after stripping up to two leading `#`:
/// - 3 digits expand per channel (`f0a` → `ff00aa`)
/// - 6 digits are kept
/// - 7 or 8 digits drop the trailing alpha
/// - 1, 2, 4 or 5 digits are right-padded with the last digit
///
/// Anything else, or any non-hex character, is rejected.
fn repair_digits(raw: &str) -> Result<String, ColorError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("##")
        .or_else(|| trimmed.strip_prefix('#'))
        .unwrap_or(trimmed);

    if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ColorError::InvalidHex(raw.into()));
    }

    let body = body.to_ascii_lowercase();
    let repaired = match body.len() {
        3 => body.chars().flat_map(|c| [c, c]).collect(),
        6 => body,
        7 | 8 => body[..6].to_string(),
        1 | 2 | 4 | 5 => {
            let last = body.chars().last().unwrap_or('0');
            let mut padded = body;
            while padded.len() < 6 {
                padded.push(last);
            }
            padded
        }
        _ => return Err(ColorError::InvalidHex(raw.into())),
    };
    Ok(repaired)
}

/// Normalize to the canvas's native `#rrggbb` form.
pub fn normalize_hex(raw: &str) -> Result<String, ColorError> {
    HexColor::parse(raw).map(|c| c.to_string())
}

/// Compare two color strings after normalization, so `#FFF` equals `#ffffff`.
/// Unparseable inputs never match.
pub fn colors_match(a: &str, b: &str) -> bool {
    matches!((HexColor::parse(a), HexColor::parse(b)), (Ok(x), Ok(y)) if x == y)
}

fn scale_down(channel: u8) -> u8 {
    // round(c / 255 * 9), exact in integer arithmetic
    let scaled = (u32::from(channel) * 9 * 2 + 255) / (255 * 2);
    u8::try_from(scaled).unwrap_or(9)
}

fn scale_up(digit: u8) -> u8 {
    let scaled = (u32::from(digit) * 255 * 2 + 9) / (9 * 2);
    u8::try_from(scaled).unwrap_or(u8::MAX)
}

/// Encode as three digits 0–9, one per channel. Lossy.
pub fn to_compact(color: HexColor) -> String {
    let (r, g, b) = color.rgb();
    [r, g, b]
        .into_iter()
        .map(|c| char::from(b'0' + scale_down(c)))
        .collect()
}

/// Decode a three-digit compact code back to a canvas color.
pub fn from_compact(code: &str) -> Result<HexColor, ColorError> {
    let code = code.trim();
    let bytes = code.as_bytes();
    if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(ColorError::InvalidCompact(code.into()));
    }
    let digit = |i: usize| scale_up(bytes[i] - b'0');
    Ok(HexColor::from_rgb(digit(0), digit(1), digit(2)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_digit_hex_is_lowercased() {
        assert_eq!(normalize_hex("#FF5733").unwrap(), "#ff5733");
        assert_eq!(normalize_hex("2ECC71").unwrap(), "#2ecc71");
    }

    #[test]
    fn three_digit_hex_expands() {
        assert_eq!(normalize_hex("#f0a").unwrap(), "#ff00aa");
    }

    #[test]
    fn alpha_suffix_is_truncated() {
        assert_eq!(normalize_hex("#11223344").unwrap(), "#112233");
        assert_eq!(normalize_hex("#1122334").unwrap(), "#112233");
    }

    #[test]
    fn short_inputs_pad_with_last_digit() {
        assert_eq!(normalize_hex("#a").unwrap(), "#aaaaaa");
        assert_eq!(normalize_hex("#ab").unwrap(), "#abbbbb");
        assert_eq!(normalize_hex("#abcd").unwrap(), "#abcddd");
        assert_eq!(normalize_hex("#abcde").unwrap(), "#abcdee");
    }

    #[test]
    fn double_hash_is_accepted() {
        assert_eq!(normalize_hex("##00ff00").unwrap(), "#00ff00");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(normalize_hex("").is_err());
        assert!(normalize_hex("#").is_err());
        assert!(normalize_hex("#12345678901").is_err());
        assert!(normalize_hex("#gg0000").is_err());
        assert!(normalize_hex("{{color1}}").is_err());
    }

    #[test]
    fn colors_match_is_length_aware() {
        assert!(colors_match("#FFF", "#ffffff"));
        assert!(colors_match("#ff0000", "FF0000"));
        assert!(!colors_match("#ff0000", "#ff0001"));
        assert!(!colors_match("nope", "nope"));
    }

    #[test]
    fn compact_extremes() {
        assert_eq!(to_compact(HexColor::BLACK), "000");
        assert_eq!(to_compact(HexColor::from_rgb(255, 255, 255)), "999");
        assert_eq!(from_compact("909").unwrap(), HexColor::from_rgb(255, 0, 255));
    }

    #[test]
    fn compact_rounds_to_nearest_step() {
        // 128/255*9 = 4.52 -> 5
        assert_eq!(to_compact(HexColor::from_rgb(128, 0, 0)), "500");
        // 5/9*255 = 141.67 -> 142
        assert_eq!(from_compact("500").unwrap().rgb().0, 142);
    }

    #[test]
    fn compact_round_trip_is_monotonic_per_channel() {
        let mut previous = 0u8;
        for c in 0..=255u8 {
            let decoded = from_compact(&to_compact(HexColor::from_rgb(c, c, c)))
                .unwrap()
                .rgb()
                .0;
            assert!(decoded >= previous, "channel {c} decoded to {decoded} < {previous}");
            previous = decoded;
        }
    }

    #[test]
    fn compact_rejects_bad_codes() {
        assert!(from_compact("12").is_err());
        assert!(from_compact("1a2").is_err());
        assert!(from_compact("1234").is_err());
    }

    #[test]
    fn decimal_triplet_clamps() {
        assert_eq!(
            HexColor::from_decimal_triplet(300, -4, 128).to_string(),
            "#ff0080"
        );
    }

    #[test]
    fn serde_uses_hex_string() {
        let json = serde_json::to_string(&HexColor::from_rgb(1, 2, 3)).unwrap();
        assert_eq!(json, "\"#010203\"");
        let back: HexColor = serde_json::from_str("\"#ABC\"").unwrap();
        assert_eq!(back.to_string(), "#aabbcc");
    }
}
