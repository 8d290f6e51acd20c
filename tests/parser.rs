use poietic_agent::canvas::PixelCommand;
use poietic_agent::color::HexColor;
use poietic_agent::parser::{Dialect, Extractor, ParseResult, Strategy};
use poietic_agent::training;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn parse(dialect: Dialect, raw: &str) -> ParseResult {
    Extractor::new(dialect).extract(raw, &mut StdRng::seed_from_u64(3))
}

fn pairs(result: &ParseResult) -> Vec<(i32, i32, String)> {
    result
        .commands()
        .iter()
        .map(|c| (c.x, c.y, c.color.to_string()))
        .collect()
}

const A1_REPLY: &str = "pixels: 0,0:#FF5733 19,19:#FF5733 0,19:#FF5733 19,0:#FF5733 \
                        9,9:#2ECC71 10,10:#2ECC71 10,9:#2ECC71 9,10:#2ECC71";

#[test]
fn anchor_reply_passes_the_first_exercise() {
    let spec = training::exercise("A1").unwrap();
    let result = parse(Dialect::Text, A1_REPLY);
    assert_eq!(result.commands().len(), 8);
    assert!(training::validate(spec, result.commands()));

    let missing_one: Vec<PixelCommand> = result.commands()[..7].to_vec();
    assert!(!training::validate(spec, &missing_one));
}

#[test]
fn out_of_range_entries_are_dropped_not_clamped() {
    let result = parse(Dialect::Text, "5,5#ff0000 20,5#00ff00 5,20#0000ff 19,19#ffff00");
    assert_eq!(
        pairs(&result),
        vec![
            (5, 5, "#ff0000".to_string()),
            (19, 19, "#ffff00".to_string())
        ]
    );
}

#[test]
fn fenced_and_bare_replies_parse_alike() {
    let bare = "pixels: 1,2#abcdef 3,4#123456";
    let fenced = format!("```text\n{bare}\n```");
    assert_eq!(
        pairs(&parse(Dialect::Text, bare)),
        pairs(&parse(Dialect::Text, &fenced))
    );
}

#[test]
fn single_line_fence_parses_like_the_bare_reply() {
    let bare = "pixels: 1,1#ff0000 2,2#00ff00";
    let fenced = format!("```{bare}```");
    assert_eq!(pairs(&parse(Dialect::Text, &fenced)).len(), 2);
    assert_eq!(
        pairs(&parse(Dialect::Text, bare)),
        pairs(&parse(Dialect::Text, &fenced))
    );
}

#[test]
fn fences_placeholders_and_narrative_together() {
    let bare = "pixels: 1,1#{{color1}} 2,2#{{color2}} 3,3#{{color1}}\n\
                My intention: a diagonal";
    let fenced = "```text\npixels: 1,1#{{color1}} 2,2#{{color2}} 3,3#{{color1}}\n```\n\
                  My intention: a diagonal";

    let plain = parse(Dialect::Text, bare);
    let wrapped = parse(Dialect::Text, fenced);

    assert_eq!(wrapped.strategy(), Some(Strategy::PlaceholderRepair));
    assert_eq!(plain.strategy(), wrapped.strategy());
    assert_eq!(pairs(&plain), pairs(&wrapped));
    assert_eq!(wrapped.narrative().intention.as_deref(), Some("a diagonal"));
    let cmds = wrapped.commands();
    assert_eq!(cmds.len(), 3);
    assert_eq!(cmds[0].color, cmds[2].color);
}

#[test]
fn spaced_decimal_triplet_keeps_its_color() {
    let result = parse(Dialect::Text, "pixels: 5,5: 255, 128, 0");
    assert_eq!(pairs(&result), vec![(5, 5, "#ff8000".to_string())]);
}

#[test]
fn json_reply_keeps_its_narrative() {
    let raw = r##"```json
{"strategy": "mirror the west edge", "intention": "a band of teal",
 "pixels": [{"x": 0, "y": 3, "color": "#008080"}, {"x": 1, "y": 3, "color": "#008080"}]}
```"##;
    let result = parse(Dialect::Json, raw);
    assert_eq!(result.strategy(), Some(Strategy::Json));
    assert_eq!(result.commands().len(), 2);
    assert_eq!(
        result.narrative().strategy.as_deref(),
        Some("mirror the west edge")
    );
    assert_eq!(result.narrative().intention.as_deref(), Some("a band of teal"));
}

#[test]
fn short_hex_expands() {
    let result = parse(Dialect::Text, "pixels: 7,7#f0a");
    assert_eq!(
        result.commands().first().map(|c| c.color),
        Some(HexColor::from_rgb(0xff, 0x00, 0xaa))
    );
}

#[test]
fn prose_only_reply_is_empty() {
    let result = parse(Dialect::Text, "The canvas feels calm today, I will wait.");
    assert!(result.is_empty());
    assert_eq!(result.strategy(), None);
}
