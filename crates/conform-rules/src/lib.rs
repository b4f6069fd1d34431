//! # conform-rules
//!
//! Built-in rules for conform.
//!
//! ## Available Rules
//!
//! | Id | Category | Fixable | Description |
//! |----|----------|---------|-------------|
//! | `no-trailing-whitespace` | style | yes | Forbids trailing spaces and tabs |
//! | `final-newline` | style | yes | Requires a line break at end of file |
//! | `no-tabs` | style | yes | Forbids tab characters |
//! | `max-line-length` | quality | no | Limits line length |
//! | `no-todo-comments` | quality | no | Reports TODO/FIXME markers in comments |
//! | `no-todo-macro` | quality | no | Forbids `todo!()`/`unimplemented!()` in Rust code |
//!
//! ## Usage
//!
//! ```ignore
//! use conform_core::{Engine, PartialConfig};
//!
//! let engine = Engine::new(conform_rules::builtin_registry()?);
//! let config = engine.resolve(&[PartialConfig::preset("recommended")])?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod final_newline;
pub mod max_line_length;
pub mod no_tabs;
pub mod no_todo_comments;
pub mod no_todo_macro;
pub mod no_trailing_whitespace;
mod presets;

pub use final_newline::FinalNewline;
pub use max_line_length::MaxLineLength;
pub use no_tabs::NoTabs;
pub use no_todo_comments::NoTodoComments;
pub use no_todo_macro::NoTodoMacro;
pub use no_trailing_whitespace::NoTrailingWhitespace;
pub use presets::{all_rules, builtin_registry, register_builtin, Preset};

/// Re-export core types for convenience.
pub use conform_core::{Rule, Severity, Violation};
