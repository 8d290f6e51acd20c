use serde::Serialize;

/// Free-text fields a reply may carry alongside its pixel commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Narrative {
    pub strategy: Option<String>,
    pub intention: Option<String>,
    pub description: Option<String>,
    pub global_vision: Option<String>,
    pub neighbors: Option<String>,
    pub technical_issues: Option<String>,
}

impl Narrative {
    pub fn is_empty(&self) -> bool {
        self.strategy.is_none()
            && self.intention.is_none()
            && self.description.is_none()
            && self.global_vision.is_none()
            && self.neighbors.is_none()
            && self.technical_issues.is_none()
    }

    /// Fill fields that are still empty from `other`.
    pub fn merge_missing(&mut self, other: Narrative) {
        fn fill(slot: &mut Option<String>, value: Option<String>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.strategy, other.strategy);
        fill(&mut self.intention, other.intention);
        fill(&mut self.description, other.description);
        fill(&mut self.global_vision, other.global_vision);
        fill(&mut self.neighbors, other.neighbors);
        fill(&mut self.technical_issues, other.technical_issues);
    }

    fn slot(&mut self, label: Label) -> &mut Option<String> {
        match label {
            Label::Strategy => &mut self.strategy,
            Label::Intention => &mut self.intention,
            Label::Description => &mut self.description,
            Label::GlobalVision => &mut self.global_vision,
            Label::Neighbors => &mut self.neighbors,
            Label::TechnicalIssues => &mut self.technical_issues,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Strategy,
    Intention,
    Description,
    GlobalVision,
    Neighbors,
    TechnicalIssues,
}

const MAX_LABEL_LEN: usize = 40;

fn classify(label: &str) -> Option<Label> {
    let label = label.trim().to_ascii_lowercase();
    let label = label.as_str();
    Some(match label {
        "strategy" | "my strategy" => Label::Strategy,
        "my intention" | "intention" | "q5" => Label::Intention,
        "description" | "what i drew" => Label::Description,
        "global vision" | "q3" => Label::GlobalVision,
        "interesting neighbors" | "neighbors" | "q4" => Label::Neighbors,
        "technical issues" | "q6" => Label::TechnicalIssues,
        _ => return None,
    })
}

fn strip_markup(line: &str) -> String {
    line.replace("**", "")
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '#' | '-' | '*' | '>'))
        .trim_end()
        .to_string()
}

/// Split `Label: value` if the line opens with something shaped like a
/// section label. Returns the raw label text and the value after the colon.
fn split_label(line: &str) -> Option<(String, String)> {
    let cleaned = strip_markup(line);
    let colon = cleaned.find(':')?;
    let label = &cleaned[..colon];
    if label.is_empty()
        || label.len() > MAX_LABEL_LEN
        || !label.starts_with(|c: char| c.is_ascii_alphabetic())
        || !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '\''))
    {
        return None;
    }
    Some((label.to_string(), cleaned[colon + 1..].trim().to_string()))
}

/// True when `line` opens a new labeled section (`Global vision:`,
/// `Q5:`, `pixels:` …).
pub fn is_label_line(line: &str) -> bool {
    split_label(line).is_some()
}

/// Collect labeled narrative fields. A field's value runs from its label
/// to the next label line or blank line. First occurrence wins.
pub fn extract(text: &str) -> Narrative {
    fn finish(current: &mut Option<(Label, String)>, narrative: &mut Narrative) {
        if let Some((label, value)) = current.take() {
            let value = value.trim().to_string();
            let slot = narrative.slot(label);
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value);
            }
        }
    }

    let mut narrative = Narrative::default();
    let mut current: Option<(Label, String)> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            finish(&mut current, &mut narrative);
            continue;
        }
        if let Some((label, value)) = split_label(line) {
            finish(&mut current, &mut narrative);
            if let Some(kind) = classify(&label) {
                current = Some((kind, value));
            }
            continue;
        }
        if let Some((_, value)) = current.as_mut() {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(&strip_markup(line));
        }
    }
    finish(&mut current, &mut narrative);
    narrative
}
