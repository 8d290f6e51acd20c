//! JSON reply dialect used by the hosted chat backends.
//!
//! Replies look like `{"strategy": "...", "pixels": [{"x":1,"y":2,"color":"#fff"}]}`,
//! `{"pixels": ["1,2#ffffff", ...]}` or carry a full `"grid"` of 20 rows.
//! Models routinely emit JavaScript rather than JSON, so the text is
//! repaired before parsing.

use super::extract::strip_fences;
use super::grammar::{self, Mode, RawColor, RawToken};
use super::narrative::Narrative;
use serde_json::Value;

const MAX_FILL: usize = 400;

/// Tokens and narrative read from a JSON reply, or `None` when the reply
/// holds no parseable object.
pub fn parse(raw: &str) -> Option<(Vec<RawToken>, Narrative)> {
    let repaired = sanitize(raw)?;
    let value: Value = serde_json::from_str(&repaired).ok()?;
    let object = value.as_object()?;

    let mut tokens = Vec::new();
    if let Some(pixels) = object.get("pixels").and_then(Value::as_array) {
        for entry in pixels {
            tokens.extend(entry_tokens(entry));
        }
    }
    if tokens.is_empty()
        && let Some(rows) = object.get("grid").and_then(Value::as_array)
    {
        for (y, row) in rows.iter().enumerate() {
            let Some(cells) = row.as_array() else {
                continue;
            };
            for (x, cell) in cells.iter().enumerate() {
                if let Some(color) = cell.as_str().and_then(raw_color)
                    && let (Ok(x), Ok(y)) = (i64::try_from(x), i64::try_from(y))
                {
                    tokens.push(RawToken { x, y, color });
                }
            }
        }
    }

    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    };
    let narrative = Narrative {
        strategy: text("strategy"),
        intention: text("intention"),
        description: text("description").or_else(|| text("reasoning")),
        global_vision: text("global_vision"),
        neighbors: text("neighbors"),
        technical_issues: text("technical_issues"),
    };
    Some((tokens, narrative))
}

fn entry_tokens(entry: &Value) -> Vec<RawToken> {
    match entry {
        Value::String(s) => grammar::scan(s, Mode::Loose),
        Value::Object(map) => {
            let coord = |key: &str| match map.get(key)? {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.round() as i64)),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            let color = map
                .get("color")
                .or_else(|| map.get("c"))
                .and_then(Value::as_str)
                .and_then(raw_color);
            match (coord("x"), coord("y"), color) {
                (Some(x), Some(y), Some(color)) => vec![RawToken { x, y, color }],
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

fn raw_color(text: &str) -> Option<RawColor> {
    let text = text.trim();
    if let Some(inner) = text
        .trim_start_matches('#')
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
    {
        let name = inner.trim();
        return (!name.is_empty()).then(|| RawColor::Placeholder(name.to_string()));
    }
    let digits = text
        .strip_prefix("##")
        .or_else(|| text.strip_prefix('#'))
        .unwrap_or(text);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(RawColor::Hex(digits.to_string()));
    }
    // `rgb(r,g,b)` strings reuse the loose grammar by posing as a token.
    grammar::scan(&format!("0,0:{text}"), Mode::Loose)
        .into_iter()
        .next()
        .map(|t| t.color)
}

/// Repair the usual model mistakes so `serde_json` can read the object.
pub fn sanitize(raw: &str) -> Option<String> {
    let unfenced = strip_fences(raw);
    let expanded = expand_array_fill(&unfenced);
    let uncommented = strip_comments(&expanded);
    let start = uncommented.find('{')?;
    let end = uncommented.rfind('}')?;
    if end < start {
        return None;
    }
    let sliced = &uncommented[start..=end];
    Some(remove_trailing_commas(&quote_bare_keys(sliced)))
}

/// `Array(20).fill("#000000")` → a literal array of twenty strings.
fn expand_array_fill(text: &str) -> String {
    const MARKER: &str = "Array(";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(MARKER) {
        let head = &rest[..pos];
        let tail = &rest[pos + MARKER.len()..];
        if let Some((expansion, used)) = parse_fill(tail) {
            out.push_str(head.strip_suffix("new ").unwrap_or(head));
            out.push_str(&expansion);
            rest = &tail[used..];
        } else {
            out.push_str(&rest[..pos + MARKER.len()]);
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}

fn parse_fill(tail: &str) -> Option<(String, usize)> {
    let count_len = tail.find(|c: char| !c.is_ascii_digit())?;
    let count: usize = tail[..count_len].parse().ok()?;
    let after_count = tail[count_len..].strip_prefix(").fill(")?;
    let trimmed = after_count.trim_start();
    let quote = trimmed.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let body = &trimmed[1..];
    let close = body.find(quote)?;
    let value = &body[..close];
    let after_value = body[close + 1..].trim_start();
    let after_call = after_value.strip_prefix(')')?;

    let item = serde_json::to_string(value).ok()?;
    let items = vec![item; count.min(MAX_FILL)];
    let used = tail.len() - after_call.len();
    Some((format!("[{}]", items.join(",")), used))
}

/// Drop `//` and `/* */` comments that sit outside string literals.
fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match (c, chars.get(i + 1)) {
            ('"', _) => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn quote_bare_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut last_significant = ' ';
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                last_significant = '"';
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }
        if (c.is_ascii_alphabetic() || c == '_') && matches!(last_significant, '{' | ',') {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if chars.get(j) == Some(&':') {
                out.push('"');
                out.push_str(&ident);
                out.push('"');
            } else {
                out.push_str(&ident);
            }
            last_significant = 'a';
            continue;
        }
        if !c.is_whitespace() {
            last_significant = c;
        }
        out.push(c);
        i += 1;
    }
    out
}

fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
