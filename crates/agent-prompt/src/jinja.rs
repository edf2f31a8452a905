//! MiniJinja-based template implementation
//!
//! [`JinjaTemplate`] wraps a single Jinja2 source string. The source is parsed
//! once at construction so syntax errors surface at startup, not on the first
//! request.

use crate::{PromptError, Result};
use minijinja::Environment;
use serde::Serialize;

/// A named prompt template backed by MiniJinja
///
/// Besides the MiniJinja builtins, templates can use:
/// - `fixed(n)`: format a number with `n` decimals (`{{ price | fixed(2) }}`)
/// - `pct`: format a number as a signed percentage (`{{ change | pct }}`)
///
/// ```
/// use agent_prompt::JinjaTemplate;
/// use serde_json::json;
///
/// let template = JinjaTemplate::new("quote", "{{ ticker }} at ${{ price | fixed(2) }}").unwrap();
/// let text = template.render(&json!({ "ticker": "AAPL", "price": 189.5 })).unwrap();
/// assert_eq!(text, "AAPL at $189.50");
/// ```
pub struct JinjaTemplate {
    name: String,
    source: String,
}

impl JinjaTemplate {
    /// Create a template, validating that the source parses
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let source = source.into();

        if source.trim().is_empty() {
            return Err(PromptError::EmptyTemplate(name));
        }

        environment()
            .template_from_str(&source)
            .map_err(|e| PromptError::TemplateParseFailed {
                name: name.clone(),
                detail: e.to_string(),
            })?;

        Ok(Self { name, source })
    }

    /// Template name, used in error messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unrendered template source
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the template with any serializable context
    pub fn render<S: Serialize>(&self, vars: &S) -> Result<String> {
        let value = minijinja::Value::from_serialize(vars);

        environment()
            .render_str(&self.source, value)
            .map_err(|e| PromptError::RenderError {
                name: self.name.clone(),
                detail: e.to_string(),
            })
    }
}

impl std::fmt::Debug for JinjaTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaTemplate")
            .field("name", &self.name)
            .field("len", &self.source.len())
            .finish()
    }
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("fixed", |value: f64, decimals: Option<usize>| {
        format!("{value:.prec$}", prec = decimals.unwrap_or(2))
    });
    env.add_filter("pct", |value: f64| format!("{value:+.2}%"));
    env
}
