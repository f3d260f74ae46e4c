//! Locate the Python function, class or module enclosing a cursor and
//! prepare it for docstring generation.
//!
//! The crate parses a source text, resolves the entity under a cursor
//! with one of several interchangeable backends, cleans the entity's
//! code for use in a prompt, and plans the edit that writes a generated
//! docstring back into the source.

pub mod analyzer;
pub mod cleaner;
pub mod cli;
pub mod docstring;
pub mod entity;
pub mod models;
pub mod resolver;
pub mod server;

pub use analyzer::{create_analyzer, registry, AnalyzerError, CodeAnalyzer};
pub use cleaner::{clean, CleanError, CleaningMethod};
pub use entity::{CodeEntity, EntityKind, NamedEntity};
pub use resolver::resolve_entity;
