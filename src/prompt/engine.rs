use crate::error::PromptError;
use tera::Tera;

/// Neighbor summary section. Always rendered from the live world view.
const NEIGHBORS_TEMPLATE: &str = "\
{% if neighbors | length == 0 %}No neighbors yet. You are alone on the canvas.\
{% else %}{% for n in neighbors %}- {{ n.direction }} at {{ n.position }}: {{ n.pixel_count }} px, \
border match {{ n.border_pct }}%, palette echo {{ n.echo_pct }}%\
{% if n.last_strategy %}, strategy \"{{ n.last_strategy }}\"{% endif %}\
{% if n.recent | length > 0 %}, recent: {{ n.recent | join(sep=\" \") }}{% endif %}
{% endfor %}{% endif %}";

/// Own-palette section: colors in use, most frequent first.
const PALETTE_TEMPLATE: &str = "\
{% if colors | length == 0 %}Your grid is still empty (all #000000).\
{% else %}Colors on your grid ({{ painted }} cells painted): {{ colors | join(sep=\", \") }}{% endif %}";

/// Tera-backed engine for the structured sections of a prompt.
///
/// Built-in sections are strict: a missing variable is a bug and fails
/// rendering. User-supplied fragments never go through Tera; see
/// [`super::renderer`].
pub struct TeraEngine {
    tera: Tera,
}

impl TeraEngine {
    /// Engine preloaded with the built-in sections.
    pub fn new() -> Result<Self, PromptError> {
        let mut engine = Self::empty();
        engine.add_template("neighbors", NEIGHBORS_TEMPLATE)?;
        engine.add_template("palette", PALETTE_TEMPLATE)?;
        Ok(engine)
    }

    /// Engine without any registered template.
    pub fn empty() -> Self {
        Self {
            tera: Tera::default(),
        }
    }

    /// Register (or replace) a template from a string.
    pub fn add_template(&mut self, name: &str, content: &str) -> Result<(), PromptError> {
        self.tera
            .add_raw_template(name, content)
            .map_err(|e| PromptError::Render {
                name: name.to_string(),
                message: e.to_string(),
            })
    }

    /// Render a named template with the given context.
    pub fn render(&self, name: &str, context: &tera::Context) -> Result<String, PromptError> {
        self.tera
            .render(name, context)
            .map_err(|e| PromptError::Render {
                name: name.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tera::Context;

    #[test]
    fn empty_engine_has_no_templates() {
        let engine = TeraEngine::empty();
        assert!(engine.render("neighbors", &Context::new()).is_err());
    }

    #[test]
    fn add_template_and_render() {
        let mut engine = TeraEngine::empty();
        engine.add_template("greeting", "Hello, {{ name }}!").unwrap();
        let mut ctx = Context::new();
        ctx.insert("name", "canvas");
        assert_eq!(engine.render("greeting", &ctx).unwrap(), "Hello, canvas!");
    }

    #[test]
    fn missing_variable_is_an_error() {
        let engine = TeraEngine::new().unwrap();
        let err = engine.render("palette", &Context::new()).unwrap_err();
        assert!(matches!(err, PromptError::Render { ref name, .. } if name == "palette"));
    }

    #[test]
    fn add_template_replaces_existing() {
        let mut engine = TeraEngine::empty();
        engine.add_template("t", "version 1").unwrap();
        engine.add_template("t", "version 2").unwrap();
        assert_eq!(engine.render("t", &Context::new()).unwrap(), "version 2");
    }

    #[test]
    fn palette_section_lists_colors() {
        let engine = TeraEngine::new().unwrap();
        let mut ctx = Context::new();
        ctx.insert("colors", &vec!["#ff0000", "#00ff00"]);
        ctx.insert("painted", &3);
        assert_eq!(
            engine.render("palette", &ctx).unwrap(),
            "Colors on your grid (3 cells painted): #ff0000, #00ff00"
        );
    }

    #[test]
    fn neighbors_section_handles_empty_list() {
        let engine = TeraEngine::new().unwrap();
        let mut ctx = Context::new();
        ctx.insert("neighbors", &Vec::<String>::new());
        assert_eq!(
            engine.render("neighbors", &ctx).unwrap(),
            "No neighbors yet. You are alone on the canvas."
        );
    }
}
