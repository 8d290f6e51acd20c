use super::engine::TeraEngine;
use super::renderer::Vars;
use crate::canvas::{LocalCanvasState, NeighborSnapshot, Position, density_hint};
use crate::color::HexColor;
use crate::error::PromptError;
use crate::parser::Dialect;
use crate::training::{CENTER_COLOR, CORNER_COLOR, ExerciseSpec};
use serde::Serialize;

/// Recent neighbor pixels quoted per neighbor.
const RECENT_PER_NEIGHBOR: usize = 8;

/// Everything one iteration's prompt is rendered from.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub iteration: u64,
    pub position: Option<Position>,
    pub canvas: LocalCanvasState,
    pub neighbors: Vec<NeighborSnapshot>,
    pub vivid: Vec<HexColor>,
    pub last_strategy: Option<String>,
    pub last_intention: Option<String>,
    pub local_description: Option<String>,
    pub global_description: Option<String>,
    pub custom_prompt: Option<String>,
    pub exercise: Option<&'static ExerciseSpec>,
    pub dialect: Dialect,
}

impl PromptContext {
    pub fn new(iteration: u64, dialect: Dialect) -> Self {
        Self {
            iteration,
            position: None,
            canvas: LocalCanvasState::new(),
            neighbors: Vec::new(),
            vivid: Vec::new(),
            last_strategy: None,
            last_intention: None,
            local_description: None,
            global_description: None,
            custom_prompt: None,
            exercise: None,
            dialect,
        }
    }

    /// Placeholder values for this context. Structured sections come from
    /// the engine's built-in templates.
    pub fn vars(&self, engine: &TeraEngine) -> Result<Vars, PromptError> {
        let position = self.position.unwrap_or_default();
        let palette = self.palette_section(engine)?;
        let neighbors = self.neighbor_section(engine)?;
        let density = density_hint(&self.neighbors);
        let grid = self.canvas.render_table();
        let color_palette = if self.canvas.is_empty() {
            palette.clone()
        } else {
            format!("{palette}\n{grid}")
        };
        let colors = self
            .vivid
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        let mut vars = Vars::new();
        let mut set = |key: &str, value: String| {
            vars.insert(key.to_string(), value);
        };
        set("position", position.to_string());
        set("x", position.x.to_string());
        set("myX", position.x.to_string());
        set("y", position.y.to_string());
        set("myY", position.y.to_string());
        set("compass", position.compass_name().to_string());
        set("positionDescription", position.compass_name().to_string());
        set("iteration", self.iteration.to_string());
        set("palette", palette);
        set("colorPalette", color_palette);
        set("grid", grid);
        set("colors", colors);
        set("neighbors", neighbors);
        set("neighbor_density", density.clone());
        set("neighborHint", density);
        set(
            "last_strategy",
            text_or(self.last_strategy.as_deref(), "none yet"),
        );
        set(
            "last_intention",
            text_or(self.last_intention.as_deref(), "none yet"),
        );
        set(
            "localDescription",
            text_or(
                self.local_description.as_deref(),
                "No previous local description",
            ),
        );
        set(
            "globalDescription",
            text_or(
                self.global_description.as_deref(),
                "No previous global description",
            ),
        );
        set(
            "custom_prompt",
            self.custom_prompt
                .as_deref()
                .map(sanitize_custom_prompt)
                .unwrap_or_default(),
        );
        set("colorCoins", CORNER_COLOR.to_string());
        set("colorCenter", CENTER_COLOR.to_string());
        set(
            "exercise",
            self.exercise.map(|e| e.id.to_string()).unwrap_or_default(),
        );
        set("format", format_hint(self.dialect).to_string());
        for (i, color) in self.vivid.iter().enumerate() {
            set(&format!("color{}", i + 1), color.to_string());
        }
        Ok(vars)
    }

    fn palette_section(&self, engine: &TeraEngine) -> Result<String, PromptError> {
        let mut ctx = tera::Context::new();
        let colors: Vec<String> = self.canvas.palette().iter().map(ToString::to_string).collect();
        ctx.insert("colors", &colors);
        ctx.insert("painted", &self.canvas.len());
        engine.render("palette", &ctx)
    }

    fn neighbor_section(&self, engine: &TeraEngine) -> Result<String, PromptError> {
        let views: Vec<NeighborView> = self.neighbors.iter().map(NeighborView::from).collect();
        let mut ctx = tera::Context::new();
        ctx.insert("neighbors", &views);
        engine.render("neighbors", &ctx).map(|s| s.trim_end().to_string())
    }
}

#[derive(Serialize)]
struct NeighborView {
    direction: String,
    position: String,
    pixel_count: usize,
    border_pct: u32,
    echo_pct: u32,
    last_strategy: Option<String>,
    recent: Vec<String>,
}

impl From<&NeighborSnapshot> for NeighborView {
    fn from(n: &NeighborSnapshot) -> Self {
        Self {
            direction: n.direction.to_string(),
            position: n.position.to_string(),
            pixel_count: n.pixel_count,
            border_pct: percent(n.border_similarity),
            echo_pct: percent(n.echo_ratio),
            last_strategy: n.last_strategy.clone(),
            recent: n
                .recent
                .iter()
                .take(RECENT_PER_NEIGHBOR)
                .map(|d| format!("{},{}{}", d.x, d.y, d.color))
                .collect(),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(ratio: f64) -> u32 {
    (ratio.clamp(0.0, 1.0) * 100.0).round() as u32
}

fn text_or(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// How the reply must encode pixels for the given dialect.
pub fn format_hint(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Text => {
            "Answer with one line in this exact format (x and y from 0 to 19):\n\
             pixels: x,y#HEX x,y#HEX ..."
        }
        Dialect::Json => {
            "Answer with a single JSON object (x and y from 0 to 19):\n\
             {\"strategy\": \"...\", \"intention\": \"...\", \"pixels\": [\"x,y#HEX\", \"x,y#HEX\"]}"
        }
    }
}

/// Strip instruction scaffolding a user may have pasted from an earlier
/// prompt: "NOW YOUR TURN" lines, `RVB:` and `Coordinates:` lines and
/// `<<TAG>>` markers.
pub fn sanitize_custom_prompt(raw: &str) -> String {
    let kept: Vec<String> = raw
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            let upper = t.to_ascii_uppercase();
            !(upper.starts_with("NOW YOUR TURN")
                || upper.starts_with("RVB:")
                || upper.starts_with("COORDINATES:"))
        })
        .map(strip_markers)
        .collect();
    kept.join("\n").trim().to_string()
}

fn strip_markers(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find("<<") {
        let after = &rest[open + 2..];
        match after.find(">>") {
            Some(close) if is_marker(&after[..close]) => {
                out.push_str(&rest[..open]);
                rest = &after[close + 2..];
            }
            _ => {
                out.push_str(&rest[..open + 2]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_marker(inner: &str) -> bool {
    let inner = inner.strip_prefix('/').unwrap_or(inner);
    !inner.is_empty()
        && inner
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
