//! Built-in Tools
//!
//! Tools every fresh registry starts with.

mod calculator;
mod web;

pub use calculator::{CalculatorTool, EvalError, evaluate};
pub use web::{MAX_BODY_BYTES, MAX_CONTENT_CHARS, WebContentTool, html_to_text};
