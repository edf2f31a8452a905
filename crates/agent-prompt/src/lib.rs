//! Prompt construction for the stock market agent
//!
//! Two ways to produce prompt text:
//!
//! - [`JinjaTemplate`]: Jinja2 templates (`{{ variable }}`, filters, loops)
//!   rendered against any `Serialize` context
//! - [`PromptBuilder`]: a fluent API for building prompts piece by piece
//!
//! ```
//! use agent_prompt::{JinjaTemplate, PromptBuilder};
//! use serde_json::json;
//!
//! let system = PromptBuilder::new()
//!     .text("You are a financial analyst.")
//!     .section("Output")
//!     .bullet("One JSON object")
//!     .build();
//! assert!(system.contains("## Output"));
//!
//! let user = JinjaTemplate::new("user", "Analyze {{ ticker }}").unwrap();
//! assert_eq!(user.render(&json!({ "ticker": "MSFT" })).unwrap(), "Analyze MSFT");
//! ```

mod builder;
mod error;
mod jinja;

pub use builder::PromptBuilder;
pub use error::{PromptError, Result};
pub use jinja::JinjaTemplate;
