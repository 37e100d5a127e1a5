//! Templating for screens, payloads and storage values.
//!
//! Two renderers share one filter set and one fail-soft contract:
//! [`MessageRenderer`] handles blocks for state messages, while
//! [`TemplateEngine`] is the lighter pipeline used for API bodies and URLs.

mod engine;
pub mod filters;
pub mod path;
mod renderer;

pub use engine::TemplateEngine;
pub use renderer::MessageRenderer;
