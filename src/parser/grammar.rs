//! Tolerant token grammar for `x,y<sep>color` pixel tokens.
//!
//! A token is a coordinate pair, an optional `:`, optional blanks, then a
//! color in one of these forms:
//!
//! | form        | example               | mode          |
//! |-------------|-----------------------|---------------|
//! | hex         | `3,4#ff0000`, `3,4:#f00`, `3,4##ff0000` | strict |
//! | placeholder | `3,4#{{color2}}`      | strict        |
//! | compact     | `3,4:905`             | strict        |
//! | triplet     | `3,4: 255, 0, 0`, `3,4:rgb(255,0,0)` | both (strict: channels ≤ 255) |
//!
//! Strict mode needs a blank, line edge or punctuation around each token;
//! a comma only counts as a separator when followed by a blank. Loose mode
//! also splits comma runs such as `1,1#fff,2,2#000`.
//!
//! The scanner only classifies text. Bounds checks and color
//! normalization happen when tokens are resolved into commands.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Loose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawColor {
    /// 1–8 hex digits, not yet repaired.
    Hex(String),
    /// Three digits 0–9.
    Compact(String),
    Triplet(i64, i64, i64),
    /// Unresolved `{{name}}` left behind by a template.
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub x: i64,
    pub y: i64,
    pub color: RawColor,
}

const MAX_COORD_DIGITS: usize = 6;
const MAX_HEX_DIGITS: usize = 8;
const MAX_CHANNEL_DIGITS: usize = 3;

/// Scan `text` left to right and return every well-formed token.
/// Malformed candidates are skipped silently.
pub fn scan(text: &str, mode: Mode) -> Vec<RawToken> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if starts_number(bytes, i)
            && left_boundary(bytes, i, mode)
            && let Some((token, end)) = match_token(bytes, i, mode)
        {
            tokens.push(token);
            i = end;
            continue;
        }
        i += 1;
    }
    tokens
}

/// True when `text` holds at least one `{{name}}` in color position.
pub fn has_placeholders(text: &str) -> bool {
    scan(text, Mode::Strict)
        .iter()
        .any(|t| matches!(t.color, RawColor::Placeholder(_)))
}

fn starts_number(bytes: &[u8], i: usize) -> bool {
    match bytes[i] {
        b'0'..=b'9' => true,
        b'-' => bytes.get(i + 1).is_some_and(u8::is_ascii_digit),
        _ => false,
    }
}

fn left_boundary(bytes: &[u8], i: usize, mode: Mode) -> bool {
    let Some(prev) = i.checked_sub(1).map(|p| bytes[p]) else {
        return true;
    };
    match prev {
        b',' => mode == Mode::Loose,
        b'-' | b'.' | b'_' | b'#' => false,
        p => !p.is_ascii_alphanumeric(),
    }
}

fn right_boundary(bytes: &[u8], i: usize, mode: Mode) -> bool {
    let Some(&next) = bytes.get(i) else {
        return true;
    };
    match next {
        b',' => mode == Mode::Loose || bytes.get(i + 1).is_none_or(u8::is_ascii_whitespace),
        b'.' => bytes.get(i + 1).is_none_or(|b| !b.is_ascii_digit()),
        b'_' | b'#' => false,
        n => !n.is_ascii_alphanumeric(),
    }
}

fn skip_blanks(bytes: &[u8], mut i: usize) -> usize {
    while matches!(bytes.get(i), Some(b' ' | b'\t')) {
        i += 1;
    }
    i
}

fn digits(bytes: &[u8], start: usize, max: usize) -> Option<(i64, usize)> {
    let mut end = start;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let len = end - start;
    if len == 0 || len > max {
        return None;
    }
    let text = std::str::from_utf8(&bytes[start..end]).ok()?;
    Some((text.parse().ok()?, end))
}

fn signed(bytes: &[u8], start: usize) -> Option<(i64, usize)> {
    if bytes.get(start) == Some(&b'-') {
        let (value, end) = digits(bytes, start + 1, MAX_COORD_DIGITS)?;
        return Some((-value, end));
    }
    digits(bytes, start, MAX_COORD_DIGITS)
}

fn match_token(bytes: &[u8], start: usize, mode: Mode) -> Option<(RawToken, usize)> {
    let (x, i) = signed(bytes, start)?;
    if bytes.get(i) != Some(&b',') {
        return None;
    }
    let i = skip_blanks(bytes, i + 1);
    let (y, i) = signed(bytes, i)?;

    let has_colon = bytes.get(i) == Some(&b':');
    let i = skip_blanks(bytes, if has_colon { i + 1 } else { i });

    let (color, end) = if bytes.get(i) == Some(&b'#') {
        let i = if bytes.get(i + 1) == Some(&b'#') { i + 2 } else { i + 1 };
        placeholder(bytes, i).or_else(|| hex(bytes, i))?
    } else if has_colon {
        match triplet(bytes, i) {
            Some(found)
                if right_boundary(bytes, found.1, mode)
                    && (mode == Mode::Loose || plausible_triplet(bytes, &found)) =>
            {
                found
            }
            _ => compact(bytes, i)?,
        }
    } else {
        return None;
    };

    right_boundary(bytes, end, mode).then_some((RawToken { x, y, color }, end))
}

fn hex(bytes: &[u8], start: usize) -> Option<(RawColor, usize)> {
    let mut end = start;
    while bytes.get(end).is_some_and(u8::is_ascii_hexdigit) {
        end += 1;
    }
    let len = end - start;
    if len == 0 || len > MAX_HEX_DIGITS {
        return None;
    }
    let text = std::str::from_utf8(&bytes[start..end]).ok()?;
    Some((RawColor::Hex(text.to_string()), end))
}

fn placeholder(bytes: &[u8], start: usize) -> Option<(RawColor, usize)> {
    if !bytes[start..].starts_with(b"{{") {
        return None;
    }
    let name_start = skip_blanks(bytes, start + 2);
    let mut name_end = name_start;
    while bytes
        .get(name_end)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
    {
        name_end += 1;
    }
    if name_end == name_start {
        return None;
    }
    let close = skip_blanks(bytes, name_end);
    if !bytes[close..].starts_with(b"}}") {
        return None;
    }
    let name = std::str::from_utf8(&bytes[name_start..name_end]).ok()?;
    Some((RawColor::Placeholder(name.to_string()), close + 2))
}

fn compact(bytes: &[u8], start: usize) -> Option<(RawColor, usize)> {
    let end = start + 3;
    let code = bytes.get(start..end)?;
    if !code.iter().all(u8::is_ascii_digit) || bytes.get(end).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let text = std::str::from_utf8(code).ok()?;
    Some((RawColor::Compact(text.to_string()), end))
}

/// Strict mode only takes a triplet whose channels fit a byte and whose
/// last number is not really the start of the next `x,y` token.
fn plausible_triplet(bytes: &[u8], found: &(RawColor, usize)) -> bool {
    let (RawColor::Triplet(r, g, b), end) = found else {
        return false;
    };
    let in_range = [r, g, b].iter().all(|c| (0..=255).contains(*c));
    let next = bytes.get(skip_blanks(bytes, *end));
    in_range && !matches!(next, Some(b':' | b'#'))
}

fn triplet(bytes: &[u8], start: usize) -> Option<(RawColor, usize)> {
    let mut i = start;
    let lower = |b: u8| b.to_ascii_lowercase();
    if bytes.get(i..i + 3).is_some_and(|p| p.iter().map(|b| lower(*b)).eq(*b"rgb")) {
        i += 3;
    }
    let parenthesized = bytes.get(i) == Some(&b'(');
    if parenthesized {
        i = skip_blanks(bytes, i + 1);
    }

    let mut channels = [0i64; 3];
    for (n, channel) in channels.iter_mut().enumerate() {
        if n > 0 {
            i = skip_blanks(bytes, i);
            if bytes.get(i) != Some(&b',') {
                return None;
            }
            i = skip_blanks(bytes, i + 1);
        }
        let (value, end) = digits(bytes, i, MAX_CHANNEL_DIGITS)?;
        *channel = value;
        i = end;
    }

    if parenthesized {
        i = skip_blanks(bytes, i);
        if bytes.get(i) != Some(&b')') {
            return None;
        }
        i += 1;
    }
    let [r, g, b] = channels;
    Some((RawColor::Triplet(r, g, b), i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_token(x: i64, y: i64, color: &str) -> RawToken {
        RawToken {
            x,
            y,
            color: RawColor::Hex(color.into()),
        }
    }

    #[test]
    fn scans_hash_and_colon_forms() {
        let tokens = scan("1,2#ff0000 3,4:#00FF00 5, 6: #abc", Mode::Strict);
        assert_eq!(
            tokens,
            vec![
                hex_token(1, 2, "ff0000"),
                hex_token(3, 4, "00FF00"),
                hex_token(5, 6, "abc"),
            ]
        );
    }

    #[test]
    fn accepts_double_hash() {
        assert_eq!(scan("7,8##123456", Mode::Strict), vec![hex_token(7, 8, "123456")]);
    }

    #[test]
    fn keeps_out_of_range_and_negative_coordinates_for_later_checks() {
        let tokens = scan("20,5#00ff00 -1,3#fff", Mode::Strict);
        assert_eq!(tokens, vec![hex_token(20, 5, "00ff00"), hex_token(-1, 3, "fff")]);
    }

    #[test]
    fn compact_requires_colon_and_exactly_three_digits() {
        let tokens = scan("1,1:905 2,2:9050 3,3 905", Mode::Strict);
        assert_eq!(
            tokens,
            vec![RawToken {
                x: 1,
                y: 1,
                color: RawColor::Compact("905".into())
            }]
        );
    }

    #[test]
    fn placeholder_in_color_position() {
        let tokens = scan("4,4#{{color3}} 5,5#{{ colorCoins }}", Mode::Strict);
        assert_eq!(tokens[0].color, RawColor::Placeholder("color3".into()));
        assert_eq!(tokens[1].color, RawColor::Placeholder("colorCoins".into()));
        assert!(has_placeholders("pixels: 1,1#{{color1}}"));
        assert!(!has_placeholders("pixels: 1,1#ff0000"));
    }

    #[test]
    fn strict_rejects_comma_runs_loose_splits_them() {
        let run = "100,50#0000FF,1,1#0000FF,2,2#ff0000";
        assert!(scan(run, Mode::Strict).is_empty());
        let loose = scan(run, Mode::Loose);
        assert_eq!(
            loose,
            vec![
                hex_token(100, 50, "0000FF"),
                hex_token(1, 1, "0000FF"),
                hex_token(2, 2, "ff0000"),
            ]
        );
    }

    #[test]
    fn comma_followed_by_blank_separates_in_strict_mode() {
        assert_eq!(
            scan("1,1#fff, 2,2#000", Mode::Strict),
            vec![hex_token(1, 1, "fff"), hex_token(2, 2, "000")]
        );
    }

    #[test]
    fn spaced_triplets_win_over_compact_codes() {
        let text = "3,4: 255, 128, 0 5,5:rgb(1,2,3)";
        for mode in [Mode::Strict, Mode::Loose] {
            let tokens = scan(text, mode);
            assert_eq!(tokens[0].color, RawColor::Triplet(255, 128, 0));
            assert_eq!(tokens[1].color, RawColor::Triplet(1, 2, 3));
        }
    }

    #[test]
    fn strict_compact_list_is_not_read_as_triplet() {
        let tokens = scan("1,1:100, 2,2:900 3,3:905, 4, 4", Mode::Strict);
        let colors: Vec<RawColor> = tokens.into_iter().map(|t| t.color).collect();
        assert_eq!(
            colors,
            vec![
                RawColor::Compact("100".into()),
                RawColor::Compact("900".into()),
                RawColor::Compact("905".into()),
            ]
        );
    }

    #[test]
    fn hex_glued_to_letters_is_rejected() {
        assert!(scan("1,1#ff00zz", Mode::Strict).is_empty());
        assert!(scan("1,1#123456789", Mode::Strict).is_empty());
    }

    #[test]
    fn tokens_inside_words_or_decimals_are_ignored() {
        assert!(scan("v1,2#fff", Mode::Strict).is_empty());
        assert!(scan("0.5,2#fff", Mode::Strict).is_empty());
    }

    #[test]
    fn fence_and_punctuation_edges_are_boundaries() {
        assert_eq!(
            scan("`1,1#fff` (2,2#000).", Mode::Strict),
            vec![hex_token(1, 1, "fff"), hex_token(2, 2, "000")]
        );
    }

    #[test]
    fn multibyte_text_is_skipped_safely() {
        assert_eq!(
            scan("🎨 1,1#fff — é 2,2#000", Mode::Strict),
            vec![hex_token(1, 1, "fff"), hex_token(2, 2, "000")]
        );
    }
}
