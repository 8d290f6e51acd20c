use super::grammar::{self, Mode, RawColor, RawToken};
use super::narrative::{self, Narrative};
use super::{Dialect, ParseResult, Strategy, json};
use crate::canvas::{PixelCommand, in_bounds};
use crate::color::{HexColor, from_compact, vivid_color};
use rand::RngCore;
use std::collections::{HashMap, HashSet};

const KEYWORD: &str = "pixels:";

/// Turns raw model replies into pixel commands by trying each strategy in
/// order until one yields at least one command.
pub struct Extractor {
    dialect: Dialect,
}

impl Extractor {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn extract(&self, raw: &str, rng: &mut dyn RngCore) -> ParseResult {
        let unfenced = strip_fences(raw);
        let mut narrative = narrative::extract(&unfenced);

        if self.dialect == Dialect::Json
            && let Some((tokens, json_narrative)) = json::parse(raw)
        {
            narrative.merge_missing(json_narrative);
            let mut fill = PlaceholderFill::new(rng);
            let commands = resolve(tokens, Some(&mut fill));
            if !commands.is_empty() {
                return done(commands, narrative, Strategy::Json);
            }
        }

        if let Some(segment) = keyword_segments(&unfenced) {
            let commands = resolve(grammar::scan(&segment, Mode::Strict), None);
            if !commands.is_empty() {
                return done(commands, narrative, Strategy::Keyword);
            }
        }

        let commands = resolve(grammar::scan(&unfenced, Mode::Strict), None);
        if !commands.is_empty() {
            return done(commands, narrative, Strategy::WholeReply);
        }

        let mut fill = PlaceholderFill::new(rng);
        if grammar::has_placeholders(&unfenced) {
            let commands = resolve(grammar::scan(&unfenced, Mode::Strict), Some(&mut fill));
            if !commands.is_empty() {
                return done(commands, narrative, Strategy::PlaceholderRepair);
            }
        }

        let commands = resolve(grammar::scan(&unfenced, Mode::Loose), Some(&mut fill));
        if !commands.is_empty() {
            return done(commands, narrative, Strategy::Loose);
        }

        tracing::debug!(
            reply_chars = raw.chars().count(),
            has_intention = narrative.intention.is_some(),
            "no pixel commands extracted"
        );
        ParseResult::Empty {
            raw: raw.to_string(),
            narrative,
        }
    }
}

fn done(commands: Vec<PixelCommand>, narrative: Narrative, strategy: Strategy) -> ParseResult {
    tracing::debug!(strategy = %strategy, commands = commands.len(), "reply parsed");
    ParseResult::Commands {
        commands,
        narrative,
        strategy,
    }
}

/// Assigns one vivid color per placeholder name, so `{{color1}}` stays
/// consistent across a reply.
struct PlaceholderFill<'a> {
    rng: &'a mut dyn RngCore,
    assigned: HashMap<String, HexColor>,
}

impl<'a> PlaceholderFill<'a> {
    fn new(rng: &'a mut dyn RngCore) -> Self {
        Self {
            rng,
            assigned: HashMap::new(),
        }
    }

    fn color_for(&mut self, name: &str) -> HexColor {
        if let Some(color) = self.assigned.get(name) {
            return *color;
        }
        let color = vivid_color(&mut *self.rng);
        self.assigned.insert(name.to_string(), color);
        color
    }
}

/// Bounds-check, normalize and dedupe one strategy's token stream.
/// Out-of-range coordinates are dropped, never clamped, at this stage.
fn resolve(tokens: Vec<RawToken>, mut fill: Option<&mut PlaceholderFill<'_>>) -> Vec<PixelCommand> {
    let commands: Vec<PixelCommand> = tokens
        .into_iter()
        .filter_map(|token| {
            let x = i32::try_from(token.x).ok()?;
            let y = i32::try_from(token.y).ok()?;
            if !in_bounds(x, y) {
                return None;
            }
            let color = match token.color {
                RawColor::Hex(digits) => HexColor::parse(&digits).ok()?,
                RawColor::Compact(code) => from_compact(&code).ok()?,
                RawColor::Triplet(r, g, b) => HexColor::from_decimal_triplet(r, g, b),
                RawColor::Placeholder(name) => fill.as_deref_mut()?.color_for(&name),
            };
            Some(PixelCommand::new(x, y, color))
        })
        .collect();
    dedupe_last_wins(commands)
}

/// Keep the last command for each coordinate, ordered by that last
/// occurrence.
pub fn dedupe_last_wins(commands: Vec<PixelCommand>) -> Vec<PixelCommand> {
    let mut seen = HashSet::new();
    let mut kept: Vec<PixelCommand> = commands
        .into_iter()
        .rev()
        .filter(|cmd| seen.insert(cmd.coord()))
        .collect();
    kept.reverse();
    kept
}

const FENCE: &str = "```";

/// Info strings models put after an opening fence.
const LANGUAGE_TAGS: [&str; 8] = [
    "json", "jsonc", "javascript", "js", "text", "txt", "plaintext", "python",
];

/// Remove code fence markers while keeping their contents, including
/// anything written on the fence line itself.
pub fn strip_fences(raw: &str) -> String {
    raw.lines()
        .map(|line| match line.trim_start().strip_prefix(FENCE) {
            Some(after) => drop_language_tag(after).replace(FENCE, " "),
            None => line.replace(FENCE, " "),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A leading word is an info string when it is alone on the line or a
/// known language name followed by a blank.
fn drop_language_tag(after: &str) -> &str {
    let tag_len = after
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-')))
        .unwrap_or(after.len());
    let (tag, rest) = after.split_at(tag_len);
    if tag.is_empty() {
        return after;
    }
    let alone = rest.trim().is_empty();
    let known = LANGUAGE_TAGS.contains(&tag.to_ascii_lowercase().as_str())
        && rest.starts_with(char::is_whitespace);
    if alone || known { rest } else { after }
}

/// Text following each `pixels:` keyword, including continuation lines up
/// to the next section label. `None` when the keyword never appears.
fn keyword_segments(text: &str) -> Option<String> {
    let mut out = String::new();
    let mut found = false;
    let mut in_segment = false;
    for line in text.lines() {
        // ASCII lowercasing keeps byte offsets aligned with `line`.
        if let Some(idx) = line.to_ascii_lowercase().find(KEYWORD) {
            found = true;
            in_segment = true;
            out.push_str(&line[idx + KEYWORD.len()..]);
            out.push('\n');
            continue;
        }
        if in_segment {
            if narrative::is_label_line(line) {
                in_segment = false;
            } else {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    found.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn coords(result: &ParseResult) -> Vec<(i32, i32)> {
        result.commands().iter().map(PixelCommand::coord).collect()
    }

    #[test]
    fn keyword_line_wins_over_stray_tokens() {
        let reply = "Earlier I drew 1,1#ffffff.\npixels: 2,2#000000 3,3#111111\nMy intention: more";
        let result = Extractor::new(Dialect::Text).extract(reply, &mut rng());
        assert_eq!(result.strategy(), Some(Strategy::Keyword));
        assert_eq!(coords(&result), vec![(2, 2), (3, 3)]);
        assert_eq!(result.narrative().intention.as_deref(), Some("more"));
    }

    #[test]
    fn keyword_segment_spans_continuation_lines() {
        let reply = "pixels:\n1,1#ff0000\n2,2#00ff00\nGlobal vision: stripes\n9,9#0000ff";
        let result = Extractor::new(Dialect::Text).extract(reply, &mut rng());
        assert_eq!(coords(&result), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn inline_fence_keeps_its_commands() {
        let fenced = Extractor::new(Dialect::Text)
            .extract("```pixels: 1,1#ff0000 2,2#00ff00```", &mut rng());
        let bare = Extractor::new(Dialect::Text).extract("pixels: 1,1#ff0000 2,2#00ff00", &mut rng());
        assert_eq!(coords(&fenced), vec![(1, 1), (2, 2)]);
        assert_eq!(fenced.commands(), bare.commands());
    }

    #[test]
    fn fence_language_tags_are_dropped() {
        assert_eq!(strip_fences("```json\n{}\n```"), "\n{}\n");
        assert_eq!(strip_fences("```text 3,3#fff```"), " 3,3#fff ");
        assert_eq!(strip_fences("```3,3#fff```"), "3,3#fff ");
    }

    #[test]
    fn whole_reply_used_without_keyword() {
        let reply = "```\n4,4:#abcdef\n```";
        let result = Extractor::new(Dialect::Text).extract(reply, &mut rng());
        assert_eq!(result.strategy(), Some(Strategy::WholeReply));
        assert_eq!(coords(&result), vec![(4, 4)]);
    }

    #[test]
    fn placeholders_get_consistent_vivid_colors() {
        let reply = "pixels: 1,1#{{color1}} 2,2#{{color1}} 3,3#{{color2}}";
        let result = Extractor::new(Dialect::Text).extract(reply, &mut rng());
        assert_eq!(result.strategy(), Some(Strategy::PlaceholderRepair));
        let cmds = result.commands();
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0].color, cmds[1].color);
        assert!(!cmds[2].color.is_black());
    }

    #[test]
    fn loose_grammar_handles_comma_runs_and_triplets() {
        let reply = "1,1#ff0000,2,2#00ff00,3,3: 0, 0, 255";
        let result = Extractor::new(Dialect::Text).extract(reply, &mut rng());
        assert_eq!(result.strategy(), Some(Strategy::Loose));
        assert_eq!(coords(&result), vec![(1, 1), (2, 2), (3, 3)]);
        assert_eq!(result.commands()[2].color.to_string(), "#0000ff");
    }

    #[test]
    fn duplicates_reduce_to_last_occurrence() {
        let reply = "pixels: 1,1#ff0000 2,2#00ff00 1,1#0000ff";
        let result = Extractor::new(Dialect::Text).extract(reply, &mut rng());
        let cmds = result.commands();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[1].coord(), (1, 1));
        assert_eq!(cmds[1].color.to_string(), "#0000ff");
    }

    #[test]
    fn compact_codes_decode() {
        let result = Extractor::new(Dialect::Text).extract("pixels: 0,0:900", &mut rng());
        assert_eq!(result.commands()[0].color.to_string(), "#ff0000");
    }

    #[test]
    fn empty_result_keeps_intention() {
        let reply = "My intention: a blue river across the bottom rows";
        let result = Extractor::new(Dialect::Text).extract(reply, &mut rng());
        assert!(result.is_empty());
        assert_eq!(
            result.narrative().intention.as_deref(),
            Some("a blue river across the bottom rows")
        );
        match result {
            ParseResult::Empty { raw, .. } => assert_eq!(raw, reply),
            ParseResult::Commands { .. } => panic!("expected empty"),
        }
    }

    #[test]
    fn json_dialect_falls_back_to_tokens() {
        let reply = "I could not format JSON, sorry. pixels: 5,5#123456";
        let result = Extractor::new(Dialect::Json).extract(reply, &mut rng());
        assert_eq!(result.strategy(), Some(Strategy::Keyword));
        assert_eq!(coords(&result), vec![(5, 5)]);
    }

    #[test]
    fn json_dialect_reads_objects_and_drops_out_of_range() {
        let reply = r##"{"strategy":"frame","pixels":[{"x":0,"y":0,"color":"#fff"},{"x":25,"y":0,"color":"#fff"}]}"##;
        let result = Extractor::new(Dialect::Json).extract(reply, &mut rng());
        assert_eq!(result.strategy(), Some(Strategy::Json));
        assert_eq!(coords(&result), vec![(0, 0)]);
        assert_eq!(result.narrative().strategy.as_deref(), Some("frame"));
    }
}
